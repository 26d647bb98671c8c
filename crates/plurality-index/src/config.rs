//! Index configuration and operation manifest

use std::collections::BTreeMap;

use serde::Serialize;

use plurality_core::{IndexError, IndexResult};

/// Which messages an index aggregates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexConfig {
    /// Name the index is exposed under
    pub namespace: String,
    /// Required `content.type` of assertion messages
    pub assertion_type: String,
    /// Content field naming the entity being described
    pub dest_field: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            namespace: "about".to_owned(),
            assertion_type: "about".to_owned(),
            dest_field: "about".to_owned(),
        }
    }
}

impl IndexConfig {
    pub fn new(
        namespace: impl Into<String>,
        assertion_type: impl Into<String>,
        dest_field: impl Into<String>,
    ) -> Self {
        IndexConfig {
            namespace: namespace.into(),
            assertion_type: assertion_type.into(),
            dest_field: dest_field.into(),
        }
    }

    /// Every field must be nonempty
    pub fn validate(&self) -> IndexResult<()> {
        let fields = [
            ("namespace", &self.namespace),
            ("type", &self.assertion_type),
            ("destField", &self.dest_field),
        ];

        for (field, value) in fields {
            if value.is_empty() {
                return Err(IndexError::InvalidConfig { field });
            }
        }
        Ok(())
    }
}

/// How an operation delivers its result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// One result, once
    Async,
    /// A stream of results
    Source,
}

/// Name, version and operation table of an index
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub name: String,
    pub version: &'static str,
    pub operations: BTreeMap<&'static str, OperationKind>,
}

impl Manifest {
    pub fn new(config: &IndexConfig) -> Self {
        let operations = [
            ("socialValue", OperationKind::Async),
            ("latestValue", OperationKind::Async),
            ("socialValues", OperationKind::Async),
            ("latestValues", OperationKind::Async),
            ("socialValueStream", OperationKind::Source),
            ("socialValuesStream", OperationKind::Source),
            ("latestValueStream", OperationKind::Source),
            ("read", OperationKind::Source),
        ]
        .into_iter()
        .collect();

        Manifest {
            name: config.namespace.clone(),
            version: env!("CARGO_PKG_VERSION"),
            operations,
        }
    }
}
