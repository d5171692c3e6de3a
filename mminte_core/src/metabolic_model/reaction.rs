//! This module provides a struct for representing reactions
use crate::configuration::current;
use derive_builder::Builder;
use indexmap::IndexMap;
use serde_json::Value;

/// Prefix marking boundary (exchange) reactions
pub const EXCHANGE_PREFIX: &str = "EX_";

/// Represents a reaction in the metabolic model
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct Reaction {
    /// Used to identify the reaction
    pub id: String,
    /// Metabolite stoichiometry of the reaction, keyed by metabolite id
    #[builder(default = "IndexMap::new()")]
    pub metabolites: IndexMap<String, f64>,
    /// Human-readable reaction name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Gene Protein Reaction rule, kept as written in the source file
    #[builder(default = "None")]
    pub gene_reaction_rule: Option<String>,
    /// Lower flux bound
    #[builder(default = "current().lower_bound")]
    pub lower_bound: f64,
    /// Upper flux bound
    #[builder(default = "current().upper_bound")]
    pub upper_bound: f64,
    /// Reaction subsystem
    #[builder(default = "None")]
    pub subsystem: Option<String>,
    /// Notes about the reaction
    #[builder(default = "IndexMap::new()")]
    pub notes: IndexMap<String, Value>,
    /// Reaction Annotations
    #[builder(default = "None")]
    pub annotation: Option<Value>,
}

impl Reaction {
    /// Whether the reaction is a boundary reaction by the `EX_` naming convention
    pub fn is_exchange(&self) -> bool {
        self.id.starts_with(EXCHANGE_PREFIX)
    }

    /// Current (lower, upper) bounds
    pub fn bounds(&self) -> (f64, f64) {
        (self.lower_bound, self.upper_bound)
    }

    pub fn set_bounds(&mut self, (lower_bound, upper_bound): (f64, f64)) {
        self.lower_bound = lower_bound;
        self.upper_bound = upper_bound;
    }

    /// Force the flux through the reaction to zero
    pub fn knock_out(&mut self) {
        self.set_bounds((0., 0.));
    }

    /// Ids of the metabolites consumed when the flux is positive
    pub fn reactants(&self) -> impl Iterator<Item = &str> {
        self.metabolites
            .iter()
            .filter(|(_, coef)| **coef < 0.)
            .map(|(id, _)| id.as_str())
    }

    /// Ids of the metabolites produced when the flux is positive
    pub fn products(&self) -> impl Iterator<Item = &str> {
        self.metabolites
            .iter()
            .filter(|(_, coef)| **coef > 0.)
            .map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_follow_configuration() {
        let rxn = ReactionBuilder::default()
            .id("PFK".to_string())
            .build()
            .unwrap();
        assert_eq!(rxn.bounds(), (-1000., 1000.));
        assert!(!rxn.is_exchange());
    }

    #[test]
    fn reactants_and_products() {
        let mut metabolites = IndexMap::new();
        metabolites.insert("glc_e".to_string(), -1.0);
        metabolites.insert("glc_u".to_string(), 1.0);
        let mut rxn = ReactionBuilder::default()
            .id("EX_glc_e".to_string())
            .metabolites(metabolites)
            .lower_bound(-10.)
            .build()
            .unwrap();
        assert!(rxn.is_exchange());
        assert_eq!(rxn.reactants().collect::<Vec<_>>(), vec!["glc_e"]);
        assert_eq!(rxn.products().collect::<Vec<_>>(), vec!["glc_u"]);
        rxn.knock_out();
        assert_eq!(rxn.bounds(), (0., 0.));
    }
}
