//! Provides struct for representing a constraint in an optimization problem

/// Represents a linear constraint in an optimization problem
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Represents an equality constraint, where `terms` = `equals`
    Equality {
        /// Identifier of the constraint (metabolite id for mass balances)
        id: String,
        /// Linear terms as (variable index, coefficient) pairs
        terms: Vec<(usize, f64)>,
        /// The right hand side of the equality constraint
        equals: f64,
    },
    /// Represents an inequality constraint,
    Inequality {
        /// Identifier of the constraint
        id: String,
        /// Linear terms as (variable index, coefficient) pairs
        terms: Vec<(usize, f64)>,
        /// The lowest value the sum of the terms can take
        lower_bound: f64,
        /// The highest value the sum of the terms can take
        upper_bound: f64,
    },
}

impl Constraint {
    pub fn new_equality(id: &str, terms: Vec<(usize, f64)>, equals: f64) -> Self {
        Constraint::Equality {
            id: id.to_string(),
            terms,
            equals,
        }
    }

    pub fn new_inequality(
        id: &str,
        terms: Vec<(usize, f64)>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Self {
        Constraint::Inequality {
            id: id.to_string(),
            terms,
            lower_bound,
            upper_bound,
        }
    }

    pub fn get_id(&self) -> &str {
        match self {
            Constraint::Equality { id, .. } | Constraint::Inequality { id, .. } => id,
        }
    }

    pub fn terms(&self) -> &[(usize, f64)] {
        match self {
            Constraint::Equality { terms, .. } | Constraint::Inequality { terms, .. } => terms,
        }
    }

    /// Range allowed for the sum of the terms as (lower, upper)
    pub fn range(&self) -> (f64, f64) {
        match self {
            Constraint::Equality { equals, .. } => (*equals, *equals),
            Constraint::Inequality {
                lower_bound,
                upper_bound,
                ..
            } => (*lower_bound, *upper_bound),
        }
    }
}
