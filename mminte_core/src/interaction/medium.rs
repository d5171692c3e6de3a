//! Growth media applied to exchange reactions
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use log::debug;

use crate::interaction::InteractionError;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::Reaction;

/// Exchange reaction id -> magnitude of the bound in the uptake direction
pub type Medium = IndexMap<String, f64>;

/// Set the uptake bound of an exchange reaction
///
/// For `met <=>` the lower bound becomes `-magnitude`, for `<=> met` the
/// upper bound becomes `magnitude`. Reactions without metabolites are left
/// alone.
fn set_active_bound(reaction: &mut Reaction, magnitude: f64) {
    if reaction.reactants().next().is_some() {
        reaction.lower_bound = -magnitude;
    } else if reaction.products().next().is_some() {
        reaction.upper_bound = magnitude;
    }
}

/// Restrict the exchange reactions of a model to a medium
///
/// Exchange reactions listed in the medium get their uptake bound set to the
/// medium magnitude, all other exchange reactions have it closed. Medium ids
/// missing from the model are ignored.
pub fn apply_medium(model: &mut Model, medium: &Medium) {
    let mut applied = 0;
    for reaction in model.reactions.values_mut().filter(|r| r.is_exchange()) {
        match medium.get(&reaction.id) {
            Some(magnitude) => {
                set_active_bound(reaction, *magnitude);
                applied += 1;
            }
            None => set_active_bound(reaction, 0.),
        }
    }
    debug!(
        "Applied {} of {} medium components to {}",
        applied,
        medium.len(),
        model.id.as_deref().unwrap_or("<unnamed>")
    );
}

/// Read a medium stored as a JSON object of exchange id -> bound
///
/// Bounds are stored as magnitudes, negative values are taken as absolute.
pub fn read_medium_json<P: AsRef<Path>>(path: P) -> Result<Medium, InteractionError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| InteractionError::ReadFile {
        path: path.display().to_string(),
        source: err,
    })?;
    let medium: IndexMap<String, f64> = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| InteractionError::MediumFormat {
            path: path.display().to_string(),
            source: err,
        })?;
    Ok(medium.into_iter().map(|(id, bound)| (id, bound.abs())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{reaction, species_a};
    use std::io::Write;

    #[test]
    fn apply() {
        let mut model = species_a();
        reaction(&mut model, "EX_o2_e", &[("o2_e", 1.)], (-1000., 1000.));
        let medium = Medium::from([
            ("EX_glc_e".to_string(), 5.),
            ("EX_o2_e".to_string(), 20.),
            ("EX_not_in_model".to_string(), 1.),
        ]);
        apply_medium(&mut model, &medium);
        assert_eq!(model.reactions["EX_glc_e"].bounds(), (-5., 1000.));
        // only products: the upper bound is the uptake direction
        assert_eq!(model.reactions["EX_o2_e"].bounds(), (-1000., 20.));
        // absent from the medium: uptake closed
        assert_eq!(model.reactions["EX_ac_e"].bounds(), (0., 1000.));
        // non exchange reactions untouched
        assert_eq!(model.reactions["GLCt"].bounds(), (0., 1000.));
        assert!(!model.reactions.contains_key("EX_not_in_model"));
    }

    #[test]
    fn empty_medium_closes_uptake() {
        let mut model = species_a();
        apply_medium(&mut model, &Medium::new());
        assert_eq!(model.reactions["EX_glc_e"].bounds(), (0., 1000.));
    }

    #[test]
    fn json_medium() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"EX_glc_e": -10.0, "EX_o2_e": 18.5}}"#).unwrap();
        let medium = read_medium_json(file.path()).unwrap();
        assert_eq!(medium["EX_glc_e"], 10.);
        assert_eq!(medium["EX_o2_e"], 18.5);
        assert_eq!(medium.get_index(0).map(|(k, _)| k.as_str()), Some("EX_glc_e"));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "[1, 2]").unwrap();
        assert!(matches!(
            read_medium_json(bad.path()),
            Err(InteractionError::MediumFormat { .. })
        ));
    }
}
