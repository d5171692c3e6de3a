//! Implements a solver interface for the pure Rust microlp simplex solver

use crate::optimize::constraint::Constraint;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};
use microlp::{ComparisonOp, LinearExpr, OptimizationDirection};

pub struct MicrolpSolver;

impl MicrolpSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MicrolpSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for MicrolpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let direction = match problem.objective().sense() {
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
        };
        let mut lp = microlp::Problem::new(direction);
        let coefficients = problem.objective().coefficients(problem.num_variables());
        let vars: Vec<microlp::Variable> = problem
            .variables()
            .map(|var| lp.add_var(coefficients[var.index], (var.lower_bound, var.upper_bound)))
            .collect();

        let expression = |terms: &[(usize, f64)]| {
            let mut expr = LinearExpr::empty();
            for (index, coef) in terms {
                expr.add(vars[*index], *coef);
            }
            expr
        };
        for constraint in problem.constraints() {
            match constraint {
                Constraint::Equality { terms, equals, .. } => {
                    if !terms.is_empty() {
                        lp.add_constraint(expression(terms), ComparisonOp::Eq, *equals);
                    }
                }
                Constraint::Inequality {
                    terms,
                    lower_bound,
                    upper_bound,
                    ..
                } => {
                    if lower_bound.is_finite() {
                        lp.add_constraint(expression(terms), ComparisonOp::Ge, *lower_bound);
                    }
                    if upper_bound.is_finite() {
                        lp.add_constraint(expression(terms), ComparisonOp::Le, *upper_bound);
                    }
                }
            }
        }

        match lp.solve() {
            Ok(solution) => {
                let x: Vec<f64> = vars.iter().map(|var| solution[*var]).collect();
                Ok(ProblemSolution {
                    status: OptimizationStatus::Optimal,
                    objective_value: Some(solution.objective()),
                    variable_values: Some(problem.label_values(&x)),
                })
            }
            Err(microlp::Error::Infeasible) => {
                Ok(ProblemSolution::failed(OptimizationStatus::Infeasible))
            }
            Err(microlp::Error::Unbounded) => {
                Ok(ProblemSolution::failed(OptimizationStatus::Unbounded))
            }
            #[allow(unreachable_patterns)]
            Err(err) => Err(SolverError::Backend(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bounded_maximization() {
        let mut problem = Problem::new_maximization();
        problem.add_new_variable("x", 0., 3.).unwrap();
        problem.add_new_variable("y", 0., 3.).unwrap();
        problem
            .add_new_inequality_constraint_by_id("cap", &["x", "y"], &[1., 1.], f64::NEG_INFINITY, 4.)
            .unwrap();
        problem.add_new_linear_objective_term_by_id("x", 1.).unwrap();
        problem.add_new_linear_objective_term_by_id("y", 1.).unwrap();
        let solution = MicrolpSolver::new().solve(&problem).unwrap();
        assert_abs_diff_eq!(solution.objective_value.unwrap(), 4., epsilon = 1e-8);
    }

    #[test]
    fn infeasible() {
        let mut problem = Problem::new_maximization();
        problem.add_new_variable("x", 0., 1.).unwrap();
        problem
            .add_new_equality_constraint_by_id("impossible", &["x"], &[1.], 5.)
            .unwrap();
        let solution = MicrolpSolver::new().solve(&problem).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
    }
}
