//! Assembly of community models from single species models
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;

use crate::community::ids::{rewrite_compartment, IdType};
use crate::community::{species_prefix, CommunityError, Species, LUMEN, LUMEN_NAME, SPECIES_NOTE};
use crate::configuration::current;
use crate::io::load_model;
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::model::{Model, ModelError};
use crate::metabolic_model::reaction::{Reaction, EXCHANGE_PREFIX};

/// Incrementally merges single species models into a community model
///
/// Each call to [`CommunityBuilder::add_species`] takes ownership of a source
/// model and moves its content into the community, so the caller never sees a
/// half rewritten source model.
#[derive(Debug, Clone)]
pub struct CommunityBuilder {
    community: Model,
    species: Vec<Species>,
    /// Bounds of the source exchange reaction that created each community exchange
    exchange_bounds: IndexMap<String, (f64, f64)>,
}

impl Default for CommunityBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityBuilder {
    /// Start with an empty community holding only the lumen compartment
    pub fn new() -> Self {
        let mut community = Model::new_empty();
        community.add_compartment(LUMEN, LUMEN_NAME);
        CommunityBuilder {
            community,
            species: Vec::new(),
            exchange_bounds: IndexMap::new(),
        }
    }

    /// Number of species added so far
    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Merge a single species model loaded from `source` into the community
    ///
    /// The model id is used as prefix for the species' reactions and
    /// metabolites; when the model has no id the file stem of `source` is
    /// used. On error the community is left as it was before the call.
    pub fn add_species(&mut self, mut model: Model, source: &str) -> Result<(), CommunityError> {
        let species_id = model
            .id
            .clone()
            .or_else(|| {
                Path::new(source)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .ok_or_else(|| CommunityError::MissingModelId {
                source_file: source.to_string(),
            })?;
        if self.species.iter().any(|s| s.id == species_id) {
            return Err(CommunityError::DuplicateModelId {
                id: species_id,
                source_file: source.to_string(),
            });
        }
        if model.objective.len() != 1 {
            return Err(CommunityError::ObjectiveTerms {
                source_file: source.to_string(),
                count: model.objective.len(),
            });
        }
        for metabolite in model.metabolites.values_mut() {
            if metabolite.tag_id_type() == IdType::Unknown {
                return Err(CommunityError::UnknownIdType {
                    metabolite: metabolite.id.clone(),
                    source_file: source.to_string(),
                });
            }
        }

        let prefix = species_prefix(&species_id);
        let collision = |id: &str| CommunityError::IdCollision {
            id: id.to_string(),
            source_file: source.to_string(),
        };

        // New community exchange reactions (with the bounds they had in this
        // species) and lumen metabolites, committed at the end
        let mut new_exchanges: Vec<(Reaction, (f64, f64))> = Vec::new();
        let mut new_lumen: IndexMap<String, Metabolite> = IndexMap::new();
        // Exchange reaction id -> lumen metabolite of its transport reaction
        let mut transports: IndexMap<String, String> = IndexMap::new();
        for exchange in model.exchanges() {
            check_exchange(&species_id, exchange);
            let inconsistent = || CommunityError::InconsistentExchange {
                reaction: exchange.id.clone(),
                source_file: source.to_string(),
            };
            let (lumen, coefficient) = lumen_metabolite(&model, exchange).ok_or_else(inconsistent)?;
            if let Some(bounds) = self.exchange_bounds.get(&exchange.id) {
                if *bounds != exchange.bounds() {
                    warn!(
                        "Exchange reaction {} of {} has bounds {:?}, keeping {:?} from the first species",
                        exchange.id,
                        species_id,
                        exchange.bounds(),
                        bounds
                    );
                }
            } else if !new_exchanges.iter().any(|(r, _)| r.id == exchange.id) {
                let mut copy = exchange.clone();
                let configuration = current();
                copy.set_bounds((configuration.lower_bound, configuration.upper_bound));
                copy.metabolites = IndexMap::from([(lumen.id.clone(), coefficient)]);
                new_exchanges.push((copy, exchange.bounds()));
                if !self.community.metabolites.contains_key(&lumen.id) {
                    new_lumen.insert(lumen.id.clone(), lumen.clone());
                }
            }
            if !self.community.metabolites.contains_key(&lumen.id)
                && !new_lumen.contains_key(&lumen.id)
            {
                return Err(inconsistent());
            }
            transports.insert(exchange.id.clone(), lumen.id);
        }

        // Rename metabolites, the lumen is shared and keeps its ids
        let met_ids: IndexMap<String, String> = model
            .metabolites
            .values()
            .map(|met| {
                let new_id = if met.compartment.as_deref() == Some(LUMEN) {
                    met.id.clone()
                } else {
                    format!("{prefix}{}", met.id)
                };
                (met.id.clone(), new_id)
            })
            .collect();

        let mut reactions: IndexMap<String, Reaction> = IndexMap::new();
        let mut objective_id = None;
        for (old_id, mut reaction) in model.reactions.drain(..) {
            reaction.metabolites = reaction
                .metabolites
                .into_iter()
                .map(|(met_id, coef)| {
                    let new_id = met_ids.get(&met_id).cloned().unwrap_or(met_id);
                    (new_id, coef)
                })
                .collect();
            if let Some(lumen_id) = transports.get(&old_id) {
                *reaction.metabolites.entry(lumen_id.clone()).or_insert(0.) += 1.;
                let configuration = current();
                reaction.set_bounds((configuration.lower_bound, configuration.upper_bound));
                reaction.id = format!("{prefix}TR_{}", &old_id[EXCHANGE_PREFIX.len()..]);
            } else {
                reaction.id = format!("{prefix}{old_id}");
            }
            if model.objective.contains_key(&old_id) {
                objective_id = Some(reaction.id.clone());
            }
            if self.community.reactions.contains_key(&reaction.id)
                || reactions.contains_key(&reaction.id)
                || new_exchanges.iter().any(|(r, _)| r.id == reaction.id)
            {
                return Err(collision(&reaction.id));
            }
            reactions.insert(reaction.id.clone(), reaction);
        }

        let mut metabolites: IndexMap<String, Metabolite> = IndexMap::new();
        for (_, mut metabolite) in model.metabolites.drain(..) {
            if let Some(new_id) = met_ids.get(&metabolite.id) {
                metabolite.id = new_id.clone();
            }
            if self.community.metabolites.contains_key(&metabolite.id)
                || new_lumen.contains_key(&metabolite.id)
                || metabolites.contains_key(&metabolite.id)
            {
                if metabolite.compartment.as_deref() == Some(LUMEN) {
                    continue;
                }
                return Err(collision(&metabolite.id));
            }
            metabolites.insert(metabolite.id.clone(), metabolite);
        }

        let objective_coefficient = model.objective.values().next().copied().unwrap_or(1.);
        let objective_id = objective_id.ok_or_else(|| {
            CommunityError::Model(ModelError::UnknownObjectiveReaction(
                model.objective.keys().next().cloned().unwrap_or_default(),
            ))
        })?;

        // Commit
        debug!(
            "Adding species {} from {} with {} reactions and {} metabolites",
            species_id,
            source,
            reactions.len(),
            metabolites.len()
        );
        for (id, metabolite) in new_lumen {
            self.community.metabolites.insert(id, metabolite);
        }
        for (exchange, source_bounds) in new_exchanges {
            self.exchange_bounds.insert(exchange.id.clone(), source_bounds);
            self.community.add_reaction(exchange);
        }
        self.community.metabolites.extend(metabolites);
        self.community.reactions.extend(reactions);
        for (id, gene) in model.genes.drain(..) {
            self.community.genes.entry(id).or_insert(gene);
        }
        if let Some(compartments) = model.compartments.take() {
            for (id, name) in compartments {
                self.community.add_compartment(&id, &name);
            }
        }
        *self
            .community
            .objective
            .entry(objective_id.clone())
            .or_insert(0.) += objective_coefficient;
        self.species.push(Species {
            id: species_id,
            objective: objective_id,
            filename: source.to_string(),
        });
        Ok(())
    }

    /// Finish the community, at least two species are required
    pub fn build(mut self) -> Result<Model, CommunityError> {
        if self.species.len() < 2 {
            return Err(CommunityError::TooFewModels(self.species.len()));
        }
        let id = self
            .species
            .iter()
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join("x");
        self.community.id = Some(id);
        self.community.name = Some("Community".to_string());
        let registry = self
            .species
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "objective": s.objective,
                    "filename": s.filename,
                })
            })
            .collect();
        self.community
            .notes
            .insert(SPECIES_NOTE.to_string(), Value::Array(registry));
        Ok(self.community)
    }
}

/// Warn about exchange reactions that do not look like `met <=>`
fn check_exchange(species_id: &str, exchange: &Reaction) {
    if exchange.metabolites.len() > 1 {
        warn!(
            "Model {} exchange reaction {} has {} metabolites (expected one metabolite)",
            species_id,
            exchange.id,
            exchange.metabolites.len()
        );
    }
    for (met_id, coef) in &exchange.metabolites {
        if *coef >= 0. {
            warn!(
                "Model {} exchange reaction {} metabolite {} has positive coefficient (expected negative)",
                species_id, exchange.id, met_id
            );
        }
    }
}

/// Copy of the exchanged metabolite moved to the lumen, with its coefficient
fn lumen_metabolite(model: &Model, exchange: &Reaction) -> Option<(Metabolite, f64)> {
    let (met_id, coefficient) = exchange.metabolites.first()?;
    let mut metabolite = model.metabolites.get(met_id)?.clone();
    let id_type = metabolite.tag_id_type();
    metabolite.id = rewrite_compartment(&metabolite.id, LUMEN, id_type);
    metabolite.compartment = Some(LUMEN.to_string());
    Some((metabolite, *coefficient))
}

/// Load the models in `paths` and merge them into a community model
pub fn create_community_model<P: AsRef<Path>>(paths: &[P]) -> Result<Model, CommunityError> {
    if paths.len() < 2 {
        return Err(CommunityError::TooFewModels(paths.len()));
    }
    let mut builder = CommunityBuilder::new();
    for path in paths {
        let path = path.as_ref();
        let model = load_model(path)?;
        builder.add_species(model, &path.display().to_string())?;
    }
    builder.build()
}
