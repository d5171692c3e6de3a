//! This module provides the metabolite struct representing a metabolite

use derive_builder::Builder;
use indexmap::IndexMap;
use serde_json::Value;

use crate::community::ids::IdType;

/// Key in the metabolite notes holding the cached [`IdType`]
pub const ID_TYPE_NOTE: &str = "type";

/// Represents a metabolite
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct Metabolite {
    /// Used to identify the metabolite (must be unique)
    pub id: String,
    /// Human Readable name of the metabolite
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Which compartment the metabolite is in
    #[builder(default = "None")]
    pub compartment: Option<String>,
    /// Electrical charge of the Metabolite
    #[builder(default = "0")]
    pub charge: i32,
    /// Chemical Formula of the metabolite
    #[builder(default = "None")]
    pub formula: Option<String>,
    /// Notes about the metabolite
    #[builder(default = "IndexMap::new()")]
    pub notes: IndexMap<String, Value>,
    /// Metabolite annotations
    #[builder(default = "None")]
    pub annotation: Option<Value>,
}

impl Metabolite {
    /// ID convention cached in the notes by [`Metabolite::tag_id_type`], if any
    pub fn id_type(&self) -> Option<IdType> {
        self.notes
            .get(ID_TYPE_NOTE)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Classify the id and cache the result in the notes
    ///
    /// An existing tag is kept, since a rewritten id may no longer match the
    /// pattern it was classified with.
    pub fn tag_id_type(&mut self) -> IdType {
        if let Some(id_type) = self.id_type() {
            return id_type;
        }
        let id_type = IdType::classify(&self.id);
        self.notes
            .insert(ID_TYPE_NOTE.to_string(), Value::String(id_type.to_string()));
        id_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_cached() {
        let mut met = MetaboliteBuilder::default()
            .id("glc__D[e]".to_string())
            .build()
            .unwrap();
        assert_eq!(met.id_type(), None);
        assert_eq!(met.tag_id_type(), IdType::Bigg);
        // Once tagged, the id no longer decides the type
        met.id = "community_glc__D".to_string();
        assert_eq!(met.tag_id_type(), IdType::Bigg);
        assert_eq!(met.notes.get("type").unwrap(), "bigg");
    }
}
