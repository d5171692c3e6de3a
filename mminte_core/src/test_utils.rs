//! Small models shared by the unit tests
use indexmap::IndexMap;

use crate::community::ids::IdType;
use crate::metabolic_model::metabolite::MetaboliteBuilder;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::ReactionBuilder;

pub(crate) fn reaction(model: &mut Model, id: &str, stoichiometry: &[(&str, f64)], bounds: (f64, f64)) {
    for (met_id, _) in stoichiometry {
        if !model.metabolites.contains_key(*met_id) {
            let compartment = IdType::classify(met_id)
                .compartment(met_id)
                .or_else(|| met_id.rsplit('_').next().map(str::to_string));
            model.add_metabolite(
                MetaboliteBuilder::default()
                    .id(met_id.to_string())
                    .compartment(compartment)
                    .build()
                    .unwrap(),
            );
        }
    }
    model.add_reaction(
        ReactionBuilder::default()
            .id(id.to_string())
            .metabolites(
                stoichiometry
                    .iter()
                    .map(|(m, c)| (m.to_string(), *c))
                    .collect::<IndexMap<_, _>>(),
            )
            .lower_bound(bounds.0)
            .upper_bound(bounds.1)
            .build()
            .unwrap(),
    );
}

/// Glucose consumer that secretes acetate
pub(crate) fn species_a() -> Model {
    let mut model = Model::new_empty();
    model.id = Some("sa".to_string());
    reaction(&mut model, "EX_glc_e", &[("glc_e", -1.)], (-10., 1000.));
    reaction(&mut model, "GLCt", &[("glc_e", -1.), ("glc_c", 1.)], (0., 1000.));
    reaction(&mut model, "GROWTH_A", &[("glc_c", -1.), ("ac_c", 1.)], (0., 1000.));
    reaction(&mut model, "ACt", &[("ac_c", -1.), ("ac_e", 1.)], (0., 1000.));
    reaction(&mut model, "EX_ac_e", &[("ac_e", -1.)], (0., 1000.));
    model.objective.insert("GROWTH_A".to_string(), 1.);
    model.add_compartment("c", "cytosol");
    model.add_compartment("e", "extracellular");
    model
}

/// Acetate consumer, glucose is exchanged but never used
pub(crate) fn species_b() -> Model {
    let mut model = Model::new_empty();
    model.id = Some("sb".to_string());
    reaction(&mut model, "EX_ac_e", &[("ac_e", -1.)], (-10., 1000.));
    reaction(&mut model, "ACt", &[("ac_e", -1.), ("ac_c", 1.)], (0., 1000.));
    reaction(&mut model, "GROWTH_B", &[("ac_c", -1.)], (0., 1000.));
    reaction(&mut model, "EX_glc_e", &[("glc_e", -1.)], (-10., 1000.));
    model.objective.insert("GROWTH_B".to_string(), 1.);
    model.add_compartment("c", "cytosol");
    model.add_compartment("e", "extracellular");
    model
}

/// Glucose consumer using BiGG style ids
pub(crate) fn bigg_species(id: &str) -> Model {
    let mut model = Model::new_empty();
    model.id = Some(id.to_string());
    reaction(&mut model, "EX_glc__D_e", &[("glc__D[e]", -1.)], (-10., 1000.));
    reaction(&mut model, "GLCt", &[("glc__D[e]", -1.), ("glc__D[c]", 1.)], (0., 1000.));
    reaction(&mut model, "GROWTH", &[("glc__D[c]", -1.)], (0., 1000.));
    model.objective.insert("GROWTH".to_string(), 1.);
    model
}
