//! Temporarily removing one species from a community model
use indexmap::IndexMap;
use log::debug;

use crate::community::{find_species, species, CommunityError, Species};
use crate::metabolic_model::model::Model;
use crate::optimize::ProblemSolution;

/// Silences one species of a community while it is alive
///
/// Every reaction of the species is forced to zero flux and its objective term
/// is removed. Dropping the guard restores the previous bounds and objective,
/// so the model is unchanged on every exit path.
pub struct KnockoutGuard<'a> {
    model: &'a mut Model,
    saved_bounds: Vec<(String, (f64, f64))>,
    saved_objective: IndexMap<String, f64>,
}

impl<'a> KnockoutGuard<'a> {
    /// Knock out `species_id`, which must be listed in the species registry
    ///
    /// A reaction belongs to the member with the longest matching prefix, so
    /// knocking out `sa` leaves the reactions of a member `sa_2` alone.
    pub fn new(model: &'a mut Model, species_id: &str) -> Result<Self, CommunityError> {
        let prefix = find_species(model, species_id)?.prefix();
        let shadowing: Vec<String> = species(model)?
            .iter()
            .filter(|s| s.id != species_id)
            .map(Species::prefix)
            .filter(|p| p.starts_with(&prefix))
            .collect();
        let owned = |rxn_id: &str| {
            rxn_id.starts_with(&prefix) && !shadowing.iter().any(|p| rxn_id.starts_with(p.as_str()))
        };
        let mut saved_bounds = Vec::new();
        for reaction in model.reactions.values_mut() {
            if owned(reaction.id.as_str()) {
                saved_bounds.push((reaction.id.clone(), reaction.bounds()));
                reaction.knock_out();
            }
        }
        let saved_objective = model.objective.clone();
        model.objective.retain(|rxn_id, _| !owned(rxn_id.as_str()));
        debug!(
            "Knocked out {} reactions of species {}",
            saved_bounds.len(),
            species_id
        );
        Ok(KnockoutGuard {
            model,
            saved_bounds,
            saved_objective,
        })
    }

    /// The community with the species knocked out
    pub fn model(&self) -> &Model {
        self.model
    }
}

impl Drop for KnockoutGuard<'_> {
    fn drop(&mut self) {
        for (rxn_id, bounds) in self.saved_bounds.drain(..) {
            if let Some(reaction) = self.model.reactions.get_mut(&rxn_id) {
                reaction.set_bounds(bounds);
            }
        }
        self.model.objective = std::mem::take(&mut self.saved_objective);
    }
}

/// Optimize a community with one species knocked out
///
/// Bounds and objective of the community are restored before returning,
/// including when the optimization fails.
pub fn single_species_knockout(
    model: &mut Model,
    species_id: &str,
) -> Result<ProblemSolution, CommunityError> {
    let guard = KnockoutGuard::new(model, species_id)?;
    let solution = guard.model().optimize()?;
    Ok(solution)
}
