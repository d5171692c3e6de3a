//! Provides struct representing an optimization problem
use crate::metabolic_model::model::Model;
use crate::optimize::constraint::Constraint;
use crate::optimize::objective::{Objective, ObjectiveSense};
use crate::optimize::variable::Variable;
use indexmap::IndexMap;
use thiserror::Error;

/// A linear optimization problem
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Objective to optimize
    objective: Objective,
    /// Variables of the optimization problem
    variables: IndexMap<String, Variable>,
    /// Constraints of the optimization problem
    constraints: IndexMap<String, Constraint>,
}

impl Problem {
    // region Creation Functions
    /// Create a new optimization problem
    pub fn new(objective_sense: ObjectiveSense) -> Self {
        Self {
            objective: Objective::new(objective_sense),
            variables: IndexMap::new(),
            constraints: IndexMap::new(),
        }
    }

    /// Create a new maximization problem
    pub fn new_maximization() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Formulate flux balance analysis for a model
    ///
    /// One variable per reaction bounded by the reaction bounds, one mass
    /// balance equality per metabolite that takes part in any reaction, and
    /// the model objective maximized.
    pub fn from_model(model: &Model) -> Result<Self, ProblemError> {
        let mut problem = Problem::new_maximization();
        let mut balances: IndexMap<&str, Vec<(usize, f64)>> = IndexMap::new();
        for rxn in model.reactions.values() {
            let index = problem.add_new_variable(&rxn.id, rxn.lower_bound, rxn.upper_bound)?;
            for (met_id, coef) in &rxn.metabolites {
                balances.entry(met_id.as_str()).or_default().push((index, *coef));
            }
        }
        for (met_id, terms) in balances {
            problem.add_constraint(Constraint::new_equality(met_id, terms, 0.))?;
        }
        for (rxn_id, coef) in &model.objective {
            problem.add_new_linear_objective_term_by_id(rxn_id, *coef)?;
        }
        Ok(problem)
    }
    // endregion Creation Functions

    // region Adding Variables
    /// Create a new continuous variable, returning its index
    pub fn add_new_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<usize, ProblemError> {
        if self.variables.contains_key(id) {
            return Err(ProblemError::VariableIdAlreadyExists(id.to_string()));
        }
        if lower_bound > upper_bound || lower_bound.is_nan() || upper_bound.is_nan() {
            return Err(ProblemError::InvalidVariableBounds(id.to_string()));
        }
        let index = self.variables.len();
        self.variables.insert(
            id.to_string(),
            Variable {
                id: id.to_string(),
                index,
                lower_bound,
                upper_bound,
            },
        );
        Ok(index)
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Add a constraint to the problem
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ProblemError> {
        let id = constraint.get_id().to_string();
        if self.constraints.contains_key(&id) {
            return Err(ProblemError::ConstraintAlreadyExists(id));
        }
        let (lower_bound, upper_bound) = constraint.range();
        if lower_bound > upper_bound {
            return Err(ProblemError::InvalidConstraintBounds(id));
        }
        if constraint
            .terms()
            .iter()
            .any(|(index, _)| *index >= self.variables.len())
        {
            return Err(ProblemError::NonExistentVariablesInConstraint(id));
        }
        self.constraints.insert(id, constraint);
        Ok(())
    }

    /// Create a new equality constraint using variable ids, and add it to the model
    pub fn add_new_equality_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), ProblemError> {
        let terms = self.terms_by_id(id, variables, coefficients)?;
        self.add_constraint(Constraint::new_equality(id, terms, equals))
    }

    /// Create a new inequality constraint using variable ids, and add it to the model
    pub fn add_new_inequality_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        let terms = self.terms_by_id(id, variables, coefficients)?;
        self.add_constraint(Constraint::new_inequality(
            id,
            terms,
            lower_bound,
            upper_bound,
        ))
    }

    fn terms_by_id(
        &self,
        constraint_id: &str,
        variables: &[&str],
        coefficients: &[f64],
    ) -> Result<Vec<(usize, f64)>, ProblemError> {
        variables
            .iter()
            .zip(coefficients)
            .map(|(v_id, coef)| match self.variables.get(*v_id) {
                Some(var) => Ok((var.index, *coef)),
                None => Err(ProblemError::NonExistentVariablesInConstraint(
                    constraint_id.to_string(),
                )),
            })
            .collect()
    }
    // endregion Adding Constraints

    // region Adding Objective Terms
    /// Add a new linear term to the objective using the variable id
    pub fn add_new_linear_objective_term_by_id(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        let index = match self.variables.get(variable_id) {
            Some(variable) => variable.index,
            None => {
                return Err(ProblemError::NonExistentVariablesInObjective(
                    variable_id.to_string(),
                ))
            }
        };
        self.objective.add_linear_term(index, coefficient);
        Ok(())
    }
    // endregion Adding Objective Terms

    // region Accessors
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn variables(&self) -> impl ExactSizeIterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn constraints(&self) -> impl ExactSizeIterator<Item = &Constraint> {
        self.constraints.values()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Pair solver output (ordered by variable index) with the variable ids
    pub fn label_values(&self, values: &[f64]) -> IndexMap<String, f64> {
        self.variables
            .values()
            .map(|var| (var.id.clone(), values[var.index]))
            .collect()
    }
    // endregion Accessors
}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when trying to add a variable with the same id as an existing variable
    #[error("Tried to add variable {0} which already exists")]
    VariableIdAlreadyExists(String),
    /// Error when trying to add variable with invalid bounds
    #[error("Variable {0} has lower_bound > upper_bound")]
    InvalidVariableBounds(String),
    /// Error when trying to add a constraint with the same id as an existing constraint
    #[error("Tried to add constraint {0} which already exists")]
    ConstraintAlreadyExists(String),
    /// Error when trying to add a constraint with invalid bounds
    #[error("Inequality constraint {0} has lower_bound > upper_bound")]
    InvalidConstraintBounds(String),
    /// Error when trying to add a constraint that contains variables not in the model
    #[error("Constraint {0} uses variables not in the problem")]
    NonExistentVariablesInConstraint(String),
    /// Error when trying to add an objective term which includes variables not in the model
    #[error("Objective term uses variable {0} which is not in the problem")]
    NonExistentVariablesInObjective(String),
}
