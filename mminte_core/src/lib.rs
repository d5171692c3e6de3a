//! Core rust implementation of MMinte, predicting pairwise microbial interactions
//! from constraint based metabolic models.
//!
//! Single species models are merged into two species community models sharing
//! a lumen compartment, optimized together and with each species knocked out,
//! and the change in growth of each member classifies the interaction.

pub mod analysis;
pub mod community;
pub mod configuration;
pub mod interaction;
pub mod io;
pub mod metabolic_model;
pub mod optimize;

#[cfg(test)]
mod test_utils;
