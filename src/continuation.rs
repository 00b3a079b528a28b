//! Continue-token codec for resumable list pagination.
//!
//! A token carries the last emitted key (stored relative to the list prefix)
//! and its revision, wrapped into an opaque hex-armored JSON payload. The
//! store round-trips tokens; everything else about them is the REST layer's
//! business.

use serde::Deserialize;
use serde::Serialize;

use crate::errors::Error;
use crate::errors::Result;

const TOKEN_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    v: u32,
    #[serde(rename = "rv")]
    revision: u64,
    #[serde(rename = "start")]
    start_key: String,
}

/// Encodes `(last_key, revision)` into an opaque resumption token.
///
/// The key is stored relative to `key_prefix` so tokens stay compact and do
/// not leak the full keyspace layout.
pub fn encode_continue(last_key: &str, key_prefix: &str, revision: u64) -> Result<String> {
    let start_key = last_key.strip_prefix(key_prefix).unwrap_or(last_key);
    let payload = TokenPayload {
        v: TOKEN_VERSION,
        revision,
        start_key: start_key.to_string(),
    };
    let bytes = serde_json::to_vec(&payload)
        .map_err(|e| Error::internal(format!("continue token encoding failed: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Decodes a token produced by [`encode_continue`], returning the absolute
/// key to resume after and the revision it was emitted at.
pub fn decode_continue(token: &str, key_prefix: &str) -> Result<(String, u64)> {
    let bytes = hex::decode(token).map_err(|e| Error::InvalidContinueToken {
        reason: format!("not a valid token encoding: {e}"),
    })?;
    let payload: TokenPayload =
        serde_json::from_slice(&bytes).map_err(|e| Error::InvalidContinueToken {
            reason: format!("malformed token payload: {e}"),
        })?;
    if payload.v != TOKEN_VERSION {
        return Err(Error::InvalidContinueToken {
            reason: format!("unsupported token version {}", payload.v),
        });
    }
    Ok((format!("{key_prefix}{}", payload.start_key), payload.revision))
}
