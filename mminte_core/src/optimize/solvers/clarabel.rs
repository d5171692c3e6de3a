//! Implements a solver interface for Clarabel
//!
//! Clarabel solves conic programs of the form
//! `min 1/2 x'Px + q'x  s.t.  Ax + s = b, s in K`. Linear problems use P = 0,
//! equality rows go to a zero cone and bound rows to the nonnegative cone.

use crate::optimize::constraint::Constraint;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use nalgebra_sparse::{CooMatrix, CscMatrix as NalgebraCsc};

pub struct ClarabelSolver {
    tolerance: f64,
}

impl ClarabelSolver {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

/// Rows of `Ax + s = b` collected before assembly
#[derive(Default)]
struct RowSet {
    rows: Vec<(Vec<(usize, f64)>, f64)>,
}

impl RowSet {
    fn push(&mut self, terms: Vec<(usize, f64)>, rhs: f64) {
        self.rows.push((terms, rhs));
    }

    /// Add `lower <= terms <= upper` as up to two `<=` rows, skipping infinite sides
    fn push_range(&mut self, terms: &[(usize, f64)], lower: f64, upper: f64) {
        if upper.is_finite() {
            self.push(terms.to_vec(), upper);
        }
        if lower.is_finite() {
            self.push(terms.iter().map(|(i, c)| (*i, -c)).collect(), -lower);
        }
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

impl Solver for ClarabelSolver {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let n = problem.num_variables();
        if n == 0 {
            return Ok(ProblemSolution {
                status: OptimizationStatus::Optimal,
                objective_value: Some(0.),
                variable_values: Some(Default::default()),
            });
        }

        let mut equalities = RowSet::default();
        let mut inequalities = RowSet::default();
        for var in problem.variables() {
            if var.is_fixed() {
                equalities.push(vec![(var.index, 1.)], var.lower_bound);
            } else {
                inequalities.push_range(&[(var.index, 1.)], var.lower_bound, var.upper_bound);
            }
        }
        for constraint in problem.constraints() {
            match constraint {
                Constraint::Equality { terms, equals, .. } => {
                    if !terms.is_empty() {
                        equalities.push(terms.clone(), *equals)
                    }
                }
                Constraint::Inequality {
                    terms,
                    lower_bound,
                    upper_bound,
                    ..
                } => inequalities.push_range(terms, *lower_bound, *upper_bound),
            }
        }

        let num_eq = equalities.len();
        let num_ineq = inequalities.len();
        let m = num_eq + num_ineq;
        let mut coo = CooMatrix::new(m, n);
        let mut b = Vec::with_capacity(m);
        for (row, (terms, rhs)) in equalities
            .rows
            .into_iter()
            .chain(inequalities.rows)
            .enumerate()
        {
            for (col, coef) in terms {
                coo.push(row, col, coef);
            }
            b.push(rhs);
        }
        let (colptr, rowval, nzval) = NalgebraCsc::from(&coo).disassemble();
        let a = CscMatrix::new(m, n, colptr, rowval, nzval);
        let p = CscMatrix::new(n, n, vec![0; n + 1], vec![], vec![]);

        let mut q = problem.objective().coefficients(n);
        if problem.objective().sense() == ObjectiveSense::Maximize {
            q.iter_mut().for_each(|c| *c = -*c);
        }

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if num_eq > 0 {
            cones.push(SupportedConeT::ZeroConeT(num_eq));
        }
        if num_ineq > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(num_ineq));
        }

        let settings = DefaultSettingsBuilder::default()
            .verbose(false)
            .tol_gap_abs(self.tolerance)
            .tol_gap_rel(self.tolerance)
            .tol_feas(self.tolerance)
            .build()
            .map_err(|err| SolverError::Settings(err.to_string()))?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings);
        solver.solve();

        let status = match solver.solution.status {
            SolverStatus::Solved => OptimizationStatus::Optimal,
            SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                OptimizationStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                OptimizationStatus::Unbounded
            }
            SolverStatus::NumericalError => OptimizationStatus::NumericalError,
            _ => OptimizationStatus::SolverHalted,
        };
        match status {
            OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal => {
                let x = &solver.solution.x;
                Ok(ProblemSolution {
                    status,
                    objective_value: Some(problem.objective().evaluate(x)),
                    variable_values: Some(problem.label_values(x)),
                })
            }
            _ => Ok(ProblemSolution::failed(status)),
        }
    }
}
