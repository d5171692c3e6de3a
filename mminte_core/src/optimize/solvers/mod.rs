//! Solver backends for linear problems
use crate::configuration;
use crate::optimize::problem::Problem;
use crate::optimize::ProblemSolution;
use cfg_if::cfg_if;
use thiserror::Error;

pub mod clarabel;
#[cfg(feature = "highs")]
pub mod highs;
#[cfg(feature = "minilp")]
pub mod microlp;

/// A backend able to solve a linear [`Problem`]
///
/// Infeasible or unbounded problems are not errors, they are reported through
/// the status of the returned [`ProblemSolution`].
pub trait Solver: Send + Sync {
    /// Name of the backend, used in log messages
    fn name(&self) -> &'static str;

    /// Solve the problem
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError>;
}

/// Create the solver selected in the configuration
pub fn create_solver(
    solver: configuration::Solver,
    tolerance: f64,
) -> Result<Box<dyn Solver>, SolverError> {
    match solver {
        configuration::Solver::Clarabel => {
            Ok(Box::new(clarabel::ClarabelSolver::new(tolerance)))
        }
        configuration::Solver::Microlp => {
            cfg_if! {
                if #[cfg(feature = "minilp")] {
                    Ok(Box::new(microlp::MicrolpSolver::new()))
                } else {
                    Err(SolverError::Unavailable("microlp", "minilp"))
                }
            }
        }
        configuration::Solver::Highs => {
            cfg_if! {
                if #[cfg(feature = "highs")] {
                    Ok(Box::new(highs::HighsSolver::new(tolerance)))
                } else {
                    Err(SolverError::Unavailable("highs", "highs"))
                }
            }
        }
    }
}

/// Errors raised by solver backends
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Solver {0} requires building with the {1} feature")]
    Unavailable(&'static str, &'static str),
    #[error("Invalid solver settings: {0}")]
    Settings(String),
    #[error("Solver failed: {0}")]
    Backend(String),
}
