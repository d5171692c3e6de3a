//! Module providing JSON IO for Models, in the layout used by COBRApy
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::metabolic_model::gene::Gene;
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::{ReactionBuilder, ReactionBuilderError};

// region JSON Model
/// Represents a JSON serialized model, used for reading and writing models in json format
#[derive(Serialize, Deserialize)]
struct JsonModel {
    metabolites: Vec<JsonMetabolite>,
    reactions: Vec<JsonReaction>,
    #[serde(default)]
    genes: Vec<JsonGene>,
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compartments: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    notes: IndexMap<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct JsonMetabolite {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compartment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    charge: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    formula: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    notes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annotation: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct JsonReaction {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    metabolites: IndexMap<String, f64>,
    lower_bound: f64,
    upper_bound: f64,
    #[serde(default)]
    gene_reaction_rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    objective_coefficient: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subsystem: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    notes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annotation: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct JsonGene {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    notes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annotation: Option<Value>,
}
// endregion JSON Model

// region Conversions
impl From<JsonGene> for Gene {
    fn from(g: JsonGene) -> Self {
        Self {
            id: g.id,
            name: g.name,
            notes: g.notes,
            annotation: g.annotation,
        }
    }
}

impl From<JsonMetabolite> for Metabolite {
    fn from(m: JsonMetabolite) -> Self {
        Self {
            id: m.id,
            name: m.name,
            compartment: m.compartment,
            charge: m.charge.unwrap_or_default(),
            formula: m.formula,
            notes: m.notes,
            annotation: m.annotation,
        }
    }
}

impl From<&Gene> for JsonGene {
    fn from(g: &Gene) -> Self {
        Self {
            id: g.id.clone(),
            name: g.name.clone(),
            notes: g.notes.clone(),
            annotation: g.annotation.clone(),
        }
    }
}

impl From<&Metabolite> for JsonMetabolite {
    fn from(m: &Metabolite) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            compartment: m.compartment.clone(),
            charge: Some(m.charge),
            formula: m.formula.clone(),
            notes: m.notes.clone(),
            annotation: m.annotation.clone(),
        }
    }
}

impl Model {
    /// Read a model from a COBRApy style JSON file
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Model, JsonError> {
        let path = path.as_ref();
        let model_str = fs::read_to_string(path).map_err(|err| JsonError::UnableToRead {
            path: path.display().to_string(),
            source: err,
        })?;
        let json_model = serde_json::from_str::<JsonModel>(&model_str).map_err(|err| {
            JsonError::UnableToParse {
                path: path.display().to_string(),
                source: err,
            }
        })?;
        Model::from_json(json_model)
    }

    /// Write the model as a COBRApy style JSON file
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), JsonError> {
        let json_model = self.to_json();
        let model_string = serde_json::to_string(&json_model)?;
        fs::write(path, model_string)?;
        Ok(())
    }

    fn from_json(json_model: JsonModel) -> Result<Self, JsonError> {
        let mut model = Model::new_empty();
        for g in json_model.genes {
            model.add_gene(Gene::from(g));
        }
        for m in json_model.metabolites {
            model.add_metabolite(Metabolite::from(m));
        }
        for rxn in json_model.reactions {
            let gene_reaction_rule = if rxn.gene_reaction_rule.is_empty() {
                None
            } else {
                Some(rxn.gene_reaction_rule)
            };
            let new_reaction = ReactionBuilder::default()
                .id(rxn.id.clone())
                .metabolites(rxn.metabolites)
                .name(rxn.name)
                .gene_reaction_rule(gene_reaction_rule)
                .lower_bound(rxn.lower_bound)
                .upper_bound(rxn.upper_bound)
                .subsystem(rxn.subsystem)
                .notes(rxn.notes)
                .annotation(rxn.annotation)
                .build()?;
            model.add_reaction(new_reaction);
            // Add the reaction to the objective function if desired
            if let Some(coef) = rxn.objective_coefficient.filter(|c| *c != 0.) {
                model.objective.insert(rxn.id, coef);
            }
        }
        model.id = json_model.id;
        model.name = json_model.name;
        model.compartments = json_model.compartments;
        model.version = json_model.version;
        model.notes = json_model.notes;
        Ok(model)
    }

    fn to_json(&self) -> JsonModel {
        let reactions = self
            .reactions
            .values()
            .map(|r| JsonReaction {
                id: r.id.clone(),
                name: r.name.clone(),
                metabolites: r.metabolites.clone(),
                lower_bound: r.lower_bound,
                upper_bound: r.upper_bound,
                gene_reaction_rule: r.gene_reaction_rule.clone().unwrap_or_default(),
                objective_coefficient: self.objective.get(&r.id).copied(),
                subsystem: r.subsystem.clone(),
                notes: r.notes.clone(),
                annotation: r.annotation.clone(),
            })
            .collect();
        JsonModel {
            metabolites: self.metabolites.values().map(JsonMetabolite::from).collect(),
            reactions,
            genes: self.genes.values().map(JsonGene::from).collect(),
            id: self.id.clone(),
            name: self.name.clone(),
            compartments: self.compartments.clone(),
            version: Some(self.version.clone().unwrap_or_else(|| "1".to_string())),
            notes: self.notes.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum JsonError {
    #[error("Unable to read {path}")]
    UnableToRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse json model {path}")]
    UnableToParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unable to build reaction")]
    UnableToBuildReaction(#[from] ReactionBuilderError),
    #[error("Serde json serialize error")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("Unable to write to file")]
    UnableToWrite(#[from] std::io::Error),
}

// endregion Conversions

#[cfg(test)]
mod json_tests {
    use super::*;
    use crate::community::{species, CommunityBuilder};
    use crate::test_utils::{species_a, species_b};
    use std::path::PathBuf;

    fn test_model(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join("test_models")
            .join(name)
    }

    #[test]
    fn json_metabolite() {
        let data = r#"{
"id":"cpd00027_e",
"name":"D-Glucose",
"compartment":"e",
"charge":0,
"formula":"C6H12O6",
"notes":{"type":"modelseed"},
"annotation":{"seed.compound":["cpd00027"]}
}"#;
        let met: JsonMetabolite = serde_json::from_str(data).unwrap();
        let met = Metabolite::from(met);
        assert_eq!(met.id, "cpd00027_e");
        assert_eq!(met.name.unwrap(), "D-Glucose");
        assert_eq!(met.compartment.unwrap(), "e");
        assert_eq!(met.charge, 0);
        assert_eq!(met.formula.unwrap(), "C6H12O6");
        assert_eq!(met.notes["type"], "modelseed");
    }

    #[test]
    fn json_reaction() {
        let data = r#"{
"id":"PFK",
"name":"Phosphofructokinase",
"metabolites":{"adp_c":1.0,"atp_c":-1.0,"f6p_c":-1.0,"fdp_c":1.0,"h_c":1.0},
"lower_bound":0.0,
"upper_bound":1000.0,
"gene_reaction_rule":"b3916 or b1723",
"subsystem":"Glycolysis/Gluconeogenesis"
}"#;
        let reaction: JsonReaction = serde_json::from_str(data).unwrap();
        assert_eq!(reaction.id, "PFK");
        assert_eq!(reaction.metabolites["f6p_c"], -1.0);
        assert_eq!(reaction.gene_reaction_rule, "b3916 or b1723");
        assert!(reaction.objective_coefficient.is_none());
        assert!(reaction.notes.is_empty());
    }

    #[test]
    fn read_fixture() {
        let model = Model::read_json(test_model("sa.json")).unwrap();
        assert_eq!(model.id.as_deref(), Some("sa"));
        assert_eq!(model.reactions.len(), 5);
        assert_eq!(model.metabolites.len(), 4);
        assert_eq!(
            model.objective,
            IndexMap::from([("GROWTH_A".to_string(), 1.)])
        );
        assert_eq!(model.reactions["EX_glc_e"].bounds(), (-10., 1000.));
        assert_eq!(
            model.reactions["GLCt"].gene_reaction_rule.as_deref(),
            Some("sa_0001")
        );
        assert_eq!(model.genes.len(), 1);
        model.validate().unwrap();
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            Model::read_json(test_model("does_not_exist.json")),
            Err(JsonError::UnableToRead { .. })
        ));
    }

    #[test]
    fn community_notes_survive() {
        let mut builder = CommunityBuilder::new();
        builder.add_species(species_a(), "sa.json").unwrap();
        builder.add_species(species_b(), "sb.json").unwrap();
        let community = builder.build().unwrap();

        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        community.write_json(file.path()).unwrap();
        let loaded = Model::read_json(file.path()).unwrap();
        assert_eq!(species(&loaded).unwrap(), species(&community).unwrap());
        assert_eq!(loaded.metabolites["glc_u"].notes["type"], "modelseed");
        assert_eq!(loaded.compartments, community.compartments);
        assert_eq!(loaded.objective, community.objective);
    }
}
