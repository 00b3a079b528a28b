//! Server-side filtering for list and watch.
//!
//! The store does not parse selector syntax; callers hand it an opaque filter
//! closure plus pagination fields and the store applies them.

use std::sync::Arc;

/// Caller-supplied filter closure over stored objects.
pub type FilterFn<O> = Arc<dyn Fn(&O) -> bool + Send + Sync>;

/// Filter + pagination bundle attached to list and watch calls.
///
/// `limit == 0` means unlimited. The continue token, when present, resumes a
/// previous page of the same prefix; it is opaque to callers and produced by
/// [`encode_continue`](crate::continuation::encode_continue).
#[derive(Clone)]
pub struct SelectionPredicate<O> {
    filter: Option<FilterFn<O>>,
    /// Maximum number of items a single list page returns. 0 = unlimited.
    pub limit: usize,
    /// Resumption token from a previous page.
    pub continue_token: Option<String>,
}

impl<O> SelectionPredicate<O> {
    /// The predicate that matches everything, with no page limit.
    pub fn everything() -> Self {
        Self {
            filter: None,
            limit: 0,
            continue_token: None,
        }
    }

    /// Attaches a filter closure.
    pub fn with_filter(mut self, filter: impl Fn(&O) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets the page limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the continue token.
    pub fn with_continue(mut self, token: impl Into<String>) -> Self {
        self.continue_token = Some(token.into());
        self
    }

    /// Whether the object passes the filter. No filter matches everything.
    pub fn matches(&self, obj: &O) -> bool {
        match &self.filter {
            Some(filter) => filter(obj),
            None => true,
        }
    }

    /// Whether this predicate filters nothing out.
    ///
    /// Remaining-item counts are only reported for empty predicates: with a
    /// filter in play the store cannot know how many of the remaining slots
    /// would match without walking them.
    pub fn is_empty(&self) -> bool {
        self.filter.is_none()
    }
}

impl<O> Default for SelectionPredicate<O> {
    fn default() -> Self {
        Self::everything()
    }
}

impl<O> std::fmt::Debug for SelectionPredicate<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionPredicate")
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("limit", &self.limit)
            .field("continue_token", &self.continue_token)
            .finish()
    }
}
