//! Pairwise interaction analysis of community models
use thiserror::Error;

use crate::community::CommunityError;
use crate::io::ModelIoError;
use crate::metabolic_model::model::ModelError;

pub mod classify;
pub mod growth;
pub mod medium;

pub use classify::{evaluate_interaction, InteractionType};
pub use growth::{compute_growth_rates, compute_growth_rates_from_file, GrowthRateRecord};
pub use medium::{apply_medium, read_medium_json, Medium};

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("Community {community} has {count} species, growth rates need exactly two")]
    NotAPair { community: String, count: usize },
    #[error("Failed to read {path}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Medium file {path} must hold a JSON object of exchange reaction ids to bounds")]
    MediumFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    ModelIo(#[from] ModelIoError),
    #[error(transparent)]
    Community(#[from] CommunityError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
