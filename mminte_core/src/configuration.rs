//! Process wide defaults for bounds, solver selection and worker pools
use std::sync::{LazyLock, PoisonError, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    /// Lower bound given to reversible reactions created by the library
    pub lower_bound: f64,
    /// Upper bound given to reactions created by the library
    pub upper_bound: f64,
    /// Feasibility and optimality tolerance handed to the solver
    pub tolerance: f64,
    /// Solver used by [`crate::metabolic_model::model::Model::optimize`]
    pub solver: Solver,
    /// Upper limit on the default size of the worker pool
    pub processes: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: -1000.,
            upper_bound: 1000.,
            tolerance: 1e-08,
            solver: Solver::Clarabel,
            processes: 4,
        }
    }
}

/// Enum used to specify the default solver to use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Solver {
    /// Use the Clarabel interior point solver
    #[default]
    Clarabel,
    /// Use the microlp simplex solver, requires the minilp feature to be enabled
    Microlp,
    /// Use the HiGHS solver, requires the highs feature to be enabled
    Highs,
}

/// Snapshot of the current configuration
pub fn current() -> Configuration {
    CONFIGURATION
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the current configuration
pub fn set(configuration: Configuration) {
    *CONFIGURATION
        .write()
        .unwrap_or_else(PoisonError::into_inner) = configuration;
}
