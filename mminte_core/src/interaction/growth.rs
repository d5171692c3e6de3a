//! Growth rates of a two species community together and alone
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::community::{self, single_species_knockout};
use crate::interaction::classify::{evaluate_interaction, InteractionType, GROWTH_RATE_CUTOFF};
use crate::interaction::medium::{apply_medium, Medium};
use crate::interaction::InteractionError;
use crate::io::load_model;
use crate::metabolic_model::model::Model;
use crate::optimize::ProblemSolution;

/// Column names of the growth rate table, in order
pub const GROWTH_RATE_COLUMNS: [&str; 10] = [
    "A_ID",
    "B_ID",
    "TYPE",
    "TOGETHER",
    "A_TOGETHER",
    "B_TOGETHER",
    "A_ALONE",
    "B_ALONE",
    "A_CHANGE",
    "B_CHANGE",
];

/// Growth of both members of a pair, together and alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRateRecord {
    pub a_id: String,
    pub b_id: String,
    pub interaction: InteractionType,
    /// Combined objective value with both species present
    pub together: f64,
    pub a_together: f64,
    pub b_together: f64,
    pub a_alone: f64,
    pub b_alone: f64,
    /// Relative change of A's growth caused by B
    pub a_change: f64,
    /// Relative change of B's growth caused by A
    pub b_change: f64,
}

/// Objective flux of a reaction with values below the growth cutoff set to zero
fn growth(solution: &ProblemSolution, objective: &str) -> Option<f64> {
    solution
        .value(objective)
        .map(|v| if v < GROWTH_RATE_CUTOFF { 0. } else { v })
}

/// Compute growth rates of a two species community under a medium
///
/// The medium is applied to the model in place. The community is optimized
/// with both species, then with B knocked out (A alone) and with A knocked
/// out (B alone). When any of the three optimizations is not optimal the
/// interaction is [`InteractionType::Empty`] and only the values of the
/// optimal runs are filled in.
pub fn compute_growth_rates(
    pair_model: &mut Model,
    medium: &Medium,
) -> Result<GrowthRateRecord, InteractionError> {
    let species = community::species(pair_model)?;
    let [a, b] = species.as_slice() else {
        return Err(InteractionError::NotAPair {
            community: community::model_name(pair_model),
            count: species.len(),
        });
    };
    apply_medium(pair_model, medium);

    let together = pair_model.optimize()?;
    let a_alone = single_species_knockout(pair_model, &b.id)?;
    let b_alone = single_species_knockout(pair_model, &a.id)?;

    let a_together_growth = growth(&together, &a.objective);
    let b_together_growth = growth(&together, &b.objective);
    let a_alone_growth = growth(&a_alone, &a.objective);
    let b_alone_growth = growth(&b_alone, &b.objective);

    let record = match (
        a_together_growth,
        b_together_growth,
        a_alone_growth,
        b_alone_growth,
    ) {
        (Some(a_together), Some(b_together), Some(a_alone), Some(b_alone)) => {
            let (a_change, b_change, interaction) =
                evaluate_interaction(a_together, b_together, a_alone, b_alone);
            GrowthRateRecord {
                a_id: a.id.clone(),
                b_id: b.id.clone(),
                interaction,
                together: together.objective_value.unwrap_or(0.),
                a_together,
                b_together,
                a_alone,
                b_alone,
                a_change,
                b_change,
            }
        }
        _ => GrowthRateRecord {
            a_id: a.id.clone(),
            b_id: b.id.clone(),
            interaction: InteractionType::Empty,
            together: if together.status.is_optimal() {
                together.objective_value.unwrap_or(0.)
            } else {
                0.
            },
            a_together: a_together_growth.unwrap_or(0.),
            b_together: b_together_growth.unwrap_or(0.),
            a_alone: a_alone_growth.unwrap_or(0.),
            b_alone: b_alone_growth.unwrap_or(0.),
            a_change: 0.,
            b_change: 0.,
        },
    };
    debug!(
        "{} and {}: {} ({:?} together, {:?} and {:?} alone)",
        record.a_id,
        record.b_id,
        record.interaction,
        together.status,
        a_alone.status,
        b_alone.status
    );
    Ok(record)
}

/// Load a community model file and compute its growth rates
pub fn compute_growth_rates_from_file<P: AsRef<Path>>(
    path: P,
    medium: &Medium,
) -> Result<GrowthRateRecord, InteractionError> {
    let mut model = load_model(path.as_ref())?;
    compute_growth_rates(&mut model, medium)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::CommunityBuilder;
    use crate::test_utils::{species_a, species_b};
    use approx::assert_abs_diff_eq;

    fn pair() -> Model {
        let mut builder = CommunityBuilder::new();
        builder.add_species(species_a(), "sa.json").unwrap();
        builder.add_species(species_b(), "sb.json").unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn cross_feeding_is_commensalism() {
        let mut model = pair();
        let medium = Medium::from([("EX_glc_e".to_string(), 10.)]);
        let record = compute_growth_rates(&mut model, &medium).unwrap();
        assert_eq!(record.a_id, "sa");
        assert_eq!(record.b_id, "sb");
        assert_eq!(record.interaction, InteractionType::Commensalism);
        assert_abs_diff_eq!(record.together, 20., epsilon = 1e-4);
        assert_abs_diff_eq!(record.a_together, 10., epsilon = 1e-4);
        assert_abs_diff_eq!(record.b_together, 10., epsilon = 1e-4);
        assert_abs_diff_eq!(record.a_alone, 10., epsilon = 1e-4);
        assert_abs_diff_eq!(record.b_alone, 0., epsilon = 1e-4);
        assert!(record.a_change.abs() < 0.1);
        assert!(record.b_change > 0.1);
    }

    #[test]
    fn infeasible_pair_is_empty() {
        let mut model = pair();
        // B is forced to grow without a carbon source
        model.reactions["sb_GROWTH_B"].set_bounds((5., 1000.));
        let record = compute_growth_rates(&mut model, &Medium::new()).unwrap();
        assert_eq!(record.interaction, InteractionType::Empty);
        assert_eq!(record.together, 0.);
        assert_eq!(record.a_change, 0.);
        assert_eq!(record.b_change, 0.);
        // With B knocked out the forced flux is gone, so A alone is optimal
        assert_abs_diff_eq!(record.a_alone, 0., epsilon = 1e-6);
    }

    #[test]
    fn requires_a_community() {
        let mut model = species_a();
        assert!(matches!(
            compute_growth_rates(&mut model, &Medium::new()),
            Err(InteractionError::Community(
                community::CommunityError::MissingSpeciesRegistry(_)
            ))
        ));
    }
}
