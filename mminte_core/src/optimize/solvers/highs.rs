//! Implements a solver interface for HiGHS

use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};
use highs::{HighsModelStatus, RowProblem, Sense};

pub struct HighsSolver {
    tolerance: f64,
}

impl HighsSolver {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl Solver for HighsSolver {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let mut lp = RowProblem::default();
        let coefficients = problem.objective().coefficients(problem.num_variables());
        let cols: Vec<_> = problem
            .variables()
            .map(|var| lp.add_column(coefficients[var.index], var.lower_bound..=var.upper_bound))
            .collect();
        for constraint in problem.constraints() {
            if constraint.terms().is_empty() {
                continue;
            }
            let (lower, upper) = constraint.range();
            let factors: Vec<_> = constraint
                .terms()
                .iter()
                .map(|(index, coef)| (cols[*index], *coef))
                .collect();
            lp.add_row(lower..=upper, factors);
        }

        let sense = match problem.objective().sense() {
            ObjectiveSense::Maximize => Sense::Maximise,
            ObjectiveSense::Minimize => Sense::Minimise,
        };
        let mut model = lp.optimise(sense);
        model.set_option("output_flag", false);
        model.set_option("primal_feasibility_tolerance", self.tolerance);
        model.set_option("dual_feasibility_tolerance", self.tolerance);
        let solved = model.solve();

        let status = match solved.status() {
            HighsModelStatus::Optimal => OptimizationStatus::Optimal,
            HighsModelStatus::Infeasible => OptimizationStatus::Infeasible,
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                OptimizationStatus::Unbounded
            }
            HighsModelStatus::SolveError | HighsModelStatus::ModelError => {
                OptimizationStatus::NumericalError
            }
            _ => OptimizationStatus::SolverHalted,
        };
        if !status.is_optimal() {
            return Ok(ProblemSolution::failed(status));
        }
        let x = solved.get_solution().columns().to_vec();
        Ok(ProblemSolution {
            status,
            objective_value: Some(problem.objective().evaluate(&x)),
            variable_values: Some(problem.label_values(&x)),
        })
    }
}
