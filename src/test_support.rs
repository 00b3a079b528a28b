//! Shared fixtures for unit tests.

use std::collections::BTreeMap;

use crate::object::StorageObject;

/// Minimal object type exercising the full capability surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TestObject {
    pub name: String,
    pub uid: String,
    pub resource_version: String,
    pub data: String,
    pub labels: BTreeMap<String, String>,
    pub deletion_requested: bool,
    pub finalizers: Vec<String>,
}

impl TestObject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            uid: format!("uid-{name}"),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: &str) -> Self {
        self.data = data.to_string();
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_resource_version(mut self, rv: &str) -> Self {
        self.resource_version = rv.to_string();
        self
    }

    pub fn deleting(mut self) -> Self {
        self.deletion_requested = true;
        self
    }

    pub fn with_finalizer(mut self, finalizer: &str) -> Self {
        self.finalizers.push(finalizer.to_string());
        self
    }
}

impl StorageObject for TestObject {
    fn resource_version(&self) -> &str {
        &self.resource_version
    }

    fn set_resource_version(&mut self, rv: String) {
        self.resource_version = rv;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn uid(&self) -> &str {
        &self.uid
    }

    fn deletion_timestamp_set(&self) -> bool {
        self.deletion_requested
    }

    fn finalizers_empty(&self) -> bool {
        self.finalizers.is_empty()
    }
}
