//! Two species community models sharing a lumen compartment
//!
//! A community model holds the reactions and metabolites of every member,
//! namespaced with a `<species_id>_` prefix. Exchange reactions of the
//! members become transport reactions into the shared lumen, and one
//! community exchange reaction per unique exchange id connects the lumen to
//! the system boundary. The members are listed in the `species` note of the
//! model, see [`species`].
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::ModelIoError;
use crate::metabolic_model::model::{Model, ModelError};

pub mod builder;
pub mod ids;
pub mod knockout;

pub use builder::{create_community_model, CommunityBuilder};
pub use knockout::{single_species_knockout, KnockoutGuard};

/// Id of the compartment shared by all members of a community
pub const LUMEN: &str = "u";
/// Name of the shared compartment
pub const LUMEN_NAME: &str = "Lumen";
/// Key of the model notes holding the species registry
pub const SPECIES_NOTE: &str = "species";

/// Member of a community model
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Species {
    /// Id of the source model, used as reaction and metabolite prefix
    pub id: String,
    /// Prefixed id of the member's objective reaction
    pub objective: String,
    /// File the member was loaded from
    pub filename: String,
}

impl Species {
    /// Prefix of every reaction and metabolite id belonging to this member
    pub fn prefix(&self) -> String {
        species_prefix(&self.id)
    }
}

pub(crate) fn species_prefix(species_id: &str) -> String {
    format!("{species_id}_")
}

/// Read the species registry of a community model
pub fn species(model: &Model) -> Result<Vec<Species>, CommunityError> {
    let missing = || CommunityError::MissingSpeciesRegistry(model_name(model));
    let registry = model.notes.get(SPECIES_NOTE).ok_or_else(missing)?;
    serde_json::from_value(registry.clone()).map_err(|_| missing())
}

/// Find a member of a community model by id
pub fn find_species(model: &Model, species_id: &str) -> Result<Species, CommunityError> {
    species(model)?
        .into_iter()
        .find(|s| s.id == species_id)
        .ok_or_else(|| CommunityError::SpeciesNotFound {
            species: species_id.to_string(),
            community: model_name(model),
        })
}

pub(crate) fn model_name(model: &Model) -> String {
    model.id.clone().unwrap_or_else(|| "<unnamed>".to_string())
}

/// Errors raised while assembling or manipulating community models
#[derive(Error, Debug)]
pub enum CommunityError {
    #[error("A community needs at least two species, got {0}")]
    TooFewModels(usize),
    #[error("Model from {source_file} has no id and none can be derived from the file name")]
    MissingModelId { source_file: String },
    #[error("Model id {id} from {source_file} is a duplicate in the community")]
    DuplicateModelId { id: String, source_file: String },
    #[error("Model {source_file} has {count} objective terms, exactly one growth objective is required")]
    ObjectiveTerms { source_file: String, count: usize },
    #[error("Unknown compartment suffix on metabolite {metabolite} in {source_file}")]
    UnknownIdType {
        metabolite: String,
        source_file: String,
    },
    #[error("Prefixed id {id} from {source_file} already exists in the community")]
    IdCollision { id: String, source_file: String },
    #[error("Exchange reaction {reaction} from {source_file} has no matching lumen metabolite")]
    InconsistentExchange {
        reaction: String,
        source_file: String,
    },
    #[error("Species {species} is not a member of community {community}")]
    SpeciesNotFound { species: String, community: String },
    #[error("Model {0} has no species registry")]
    MissingSpeciesRegistry(String),
    #[error(transparent)]
    Io(#[from] ModelIoError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
