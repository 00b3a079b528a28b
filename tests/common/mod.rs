//! Shared fixture for integration scenarios.

use std::collections::BTreeMap;

use revstore::StorageObject;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestObject {
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

pub fn rv(obj: &TestObject) -> u64 {
    obj.resource_version.parse().expect("stamped resource version")
}
