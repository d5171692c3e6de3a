//! This module provides the Gene struct
//!
//! Genes are carried through model files unchanged, community assembly merges
//! them by id.
use std::fmt::{Display, Formatter};

use derive_builder::Builder;
use indexmap::IndexMap;
use serde_json::Value;

/// Structure Representing a Gene
#[derive(Builder, Clone, Debug, PartialEq)]
pub struct Gene {
    /// Used to identify the gene
    pub id: String,
    /// Human Readable Gene Name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Notes about the gene
    #[builder(default = "IndexMap::new()")]
    pub notes: IndexMap<String, Value>,
    /// Gene Annotations
    #[builder(default = "None")]
    pub annotation: Option<Value>,
}

impl Gene {
    pub fn new(id: String, name: Option<String>) -> Gene {
        Gene {
            id,
            name,
            notes: IndexMap::new(),
            annotation: None,
        }
    }
}

impl Display for Gene {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
