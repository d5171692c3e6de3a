//! This module provides the Model struct for representing an entire metabolic model
use log::debug;

use crate::configuration::current;
use crate::metabolic_model::gene::Gene;
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::reaction::Reaction;
use crate::optimize::problem::{Problem, ProblemError};
use crate::optimize::solvers::{create_solver, SolverError};
use crate::optimize::ProblemSolution;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// Represents a Genome Scale Metabolic Model
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    /// Map of reaction ids to Reaction Objects
    pub reactions: IndexMap<String, Reaction>,
    /// Map of gene ids to Gene Objects
    pub genes: IndexMap<String, Gene>,
    /// Map of metabolite ids to Metabolite Objects
    pub metabolites: IndexMap<String, Metabolite>,
    /// Map of reaction ids to objective function coefficients
    pub objective: IndexMap<String, f64>,
    /// Id associated with the Model
    pub id: Option<String>,
    /// Human readable name of the Model
    pub name: Option<String>,
    /// Compartments in the model
    ///
    /// An IndexMap<String, String> of {short name: long name}
    pub compartments: Option<IndexMap<String, String>>,
    /// A version identifier for the Model, stored as a string
    pub version: Option<String>,
    /// Free form notes, community models keep their species registry here
    pub notes: IndexMap<String, Value>,
}

impl Default for Model {
    fn default() -> Self {
        Model::new_empty()
    }
}

impl Model {
    pub fn new_empty() -> Self {
        Model {
            reactions: IndexMap::new(),
            genes: IndexMap::new(),
            metabolites: IndexMap::new(),
            objective: IndexMap::new(),
            id: None,
            name: None,
            compartments: None,
            version: None,
            notes: IndexMap::new(),
        }
    }

    /// Add a reaction to the model
    ///
    /// # Parameters
    /// - reaction: Reaction to add
    ///
    /// # Examples
    /// ```rust
    /// use mminte_core::metabolic_model::model::Model;
    /// use mminte_core::metabolic_model::reaction::ReactionBuilder;
    /// let mut model = Model::new_empty();
    /// let new_reaction = ReactionBuilder::default().id("new_reaction".to_string()).build().unwrap();
    /// model.add_reaction(new_reaction);
    /// ```
    pub fn add_reaction(&mut self, reaction: Reaction) {
        let id = reaction.id.clone();
        self.reactions.insert(id, reaction);
    }

    /// Add a metabolite to the model
    pub fn add_metabolite(&mut self, metabolite: Metabolite) {
        let id = metabolite.id.clone();
        self.metabolites.insert(id, metabolite);
    }

    /// Add a gene to the model
    ///
    /// # Parameters
    /// - gene: Gene to add
    ///
    /// # Examples
    /// ```rust
    /// use mminte_core::metabolic_model::gene::GeneBuilder;
    /// use mminte_core::metabolic_model::model::Model;
    /// let mut model=Model::new_empty();
    /// let new_gene = GeneBuilder::default().id("new_gene".to_string()).build().unwrap();
    /// model.add_gene(new_gene);
    /// ```
    pub fn add_gene(&mut self, gene: Gene) {
        let id = gene.id.clone();
        self.genes.insert(id, gene);
    }

    /// Register a compartment, keeping an existing name if already present
    pub fn add_compartment(&mut self, id: &str, name: &str) {
        self.compartments
            .get_or_insert_with(IndexMap::new)
            .entry(id.to_string())
            .or_insert_with(|| name.to_string());
    }

    /// Reactions whose id marks them as exchange reactions
    pub fn exchanges(&self) -> impl Iterator<Item = &Reaction> {
        self.reactions.values().filter(|r| r.is_exchange())
    }

    /// Check that every metabolite used by a reaction is part of the model
    pub fn validate(&self) -> Result<(), ModelError> {
        for rxn in self.reactions.values() {
            for met_id in rxn.metabolites.keys() {
                if !self.metabolites.contains_key(met_id) {
                    return Err(ModelError::UnknownMetabolite {
                        reaction: rxn.id.clone(),
                        metabolite: met_id.clone(),
                    });
                }
            }
        }
        for rxn_id in self.objective.keys() {
            if !self.reactions.contains_key(rxn_id) {
                return Err(ModelError::UnknownObjectiveReaction(rxn_id.clone()));
            }
        }
        Ok(())
    }

    /// Maximize the objective subject to steady state mass balance
    ///
    /// A non-optimal outcome (infeasible, unbounded, ...) is reported through
    /// the status of the returned solution, not as an error.
    pub fn optimize(&self) -> Result<ProblemSolution, ModelError> {
        self.validate()?;
        let problem = Problem::from_model(self)?;
        let configuration = current();
        let solver = create_solver(configuration.solver, configuration.tolerance)?;
        let solution = solver.solve(&problem)?;
        debug!(
            "Optimized model {} with {}: {:?}, objective {:?}",
            self.id.as_deref().unwrap_or("<unnamed>"),
            solver.name(),
            solution.status,
            solution.objective_value
        );
        Ok(solution)
    }
}

/// Errors associated with inconsistent models
#[derive(Error, Debug)]
pub enum ModelError {
    /// A reaction refers to a metabolite missing from the model
    #[error("Reaction {reaction} uses metabolite {metabolite} which is not in the model")]
    UnknownMetabolite { reaction: String, metabolite: String },
    /// The objective refers to a reaction missing from the model
    #[error("Objective reaction {0} is not in the model")]
    UnknownObjectiveReaction(String),
    /// The optimization problem could not be formulated
    #[error("Unable to formulate the optimization problem: {0}")]
    Problem(#[from] ProblemError),
    /// The solver could not be set up or failed
    #[error("Solver failure: {0}")]
    Solver(#[from] SolverError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metabolic_model::metabolite::MetaboliteBuilder;
    use crate::metabolic_model::reaction::ReactionBuilder;
    use crate::optimize::OptimizationStatus;

    /// glc_e <-> (EX, at most 10 in), glc_e -> biomass
    pub(crate) fn tiny_model() -> Model {
        let mut model = Model::new_empty();
        model.id = Some("tiny".to_string());
        model.add_metabolite(
            MetaboliteBuilder::default()
                .id("glc_e".to_string())
                .compartment(Some("e".to_string()))
                .build()
                .unwrap(),
        );
        model.add_reaction(
            ReactionBuilder::default()
                .id("EX_glc_e".to_string())
                .metabolites(IndexMap::from([("glc_e".to_string(), -1.0)]))
                .lower_bound(-10.)
                .upper_bound(1000.)
                .build()
                .unwrap(),
        );
        model.add_reaction(
            ReactionBuilder::default()
                .id("GROWTH".to_string())
                .metabolites(IndexMap::from([("glc_e".to_string(), -2.0)]))
                .lower_bound(0.)
                .build()
                .unwrap(),
        );
        model.objective.insert("GROWTH".to_string(), 1.0);
        model
    }

    #[test]
    fn optimize_tiny_model() {
        let model = tiny_model();
        let solution = model.optimize().unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        let growth = solution.value("GROWTH").unwrap();
        assert!((growth - 5.0).abs() < 1e-5, "growth was {}", growth);
        assert!((solution.objective_value.unwrap() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn infeasible_is_a_status() {
        let mut model = tiny_model();
        // Force growth while nothing can be taken up
        model.reactions["EX_glc_e"].set_bounds((0., 0.));
        model.reactions["GROWTH"].set_bounds((1., 1000.));
        let solution = model.optimize().unwrap();
        assert_ne!(solution.status, OptimizationStatus::Optimal);
        assert!(solution.value("GROWTH").is_none());
    }

    #[test]
    fn missing_metabolite() {
        let mut model = tiny_model();
        model.metabolites.shift_remove("glc_e");
        match model.validate() {
            Err(ModelError::UnknownMetabolite { metabolite, .. }) => assert_eq!(metabolite, "glc_e"),
            other => panic!("Unexpected result {:?}", other),
        }
    }
}
