//! Module providing representation of optimization problem variables
use std::fmt::{Display, Formatter};

/// A continuous variable of a linear problem
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Id of the variable, the reaction id for flux variables
    pub id: String,
    /// Position of the variable in the problem
    pub index: usize,
    /// Lowest value the variable can take
    pub lower_bound: f64,
    /// Highest value the variable can take
    pub upper_bound: f64,
}

impl Variable {
    /// Whether both bounds coincide
    pub fn is_fixed(&self) -> bool {
        self.lower_bound == self.upper_bound
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <= {} <= {}", self.lower_bound, self.id, self.upper_bound)
    }
}
