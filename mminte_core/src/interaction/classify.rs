//! Classification of pairwise interactions from growth rate changes
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Growth rates below this value are treated as no growth
pub const GROWTH_RATE_CUTOFF: f64 = 1e-12;
/// Relative growth change separating an effect from no effect
pub const EFFECT_THRESHOLD: f64 = 0.1;

/// Ecological interaction between two species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionType {
    /// Both species benefit
    Mutualism,
    /// One species benefits at the expense of the other
    Parasitism,
    /// One species benefits, the other is unaffected
    Commensalism,
    /// Both species are harmed
    Competition,
    /// One species is harmed, the other is unaffected
    Amensalism,
    /// Neither species is affected
    Neutralism,
    /// No classification possible
    Empty,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Mutualism => "Mutualism",
            InteractionType::Parasitism => "Parasitism",
            InteractionType::Commensalism => "Commensalism",
            InteractionType::Competition => "Competition",
            InteractionType::Amensalism => "Amensalism",
            InteractionType::Neutralism => "Neutralism",
            InteractionType::Empty => "Empty",
        }
    }
}

impl Display for InteractionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mutualism" => Ok(InteractionType::Mutualism),
            "Parasitism" => Ok(InteractionType::Parasitism),
            "Commensalism" => Ok(InteractionType::Commensalism),
            "Competition" => Ok(InteractionType::Competition),
            "Amensalism" => Ok(InteractionType::Amensalism),
            "Neutralism" => Ok(InteractionType::Neutralism),
            "Empty" => Ok(InteractionType::Empty),
            other => Err(format!("Unknown interaction type {other}")),
        }
    }
}

/// Which side of the threshold a relative change falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Positive,
    Negative,
    Neutral,
    /// Exactly on a threshold, or not a number
    Undetermined,
}

impl Effect {
    fn of(change: f64) -> Effect {
        if change > EFFECT_THRESHOLD {
            Effect::Positive
        } else if change < -EFFECT_THRESHOLD {
            Effect::Negative
        } else if change > -EFFECT_THRESHOLD && change < EFFECT_THRESHOLD {
            Effect::Neutral
        } else {
            Effect::Undetermined
        }
    }
}

/// Relative change of growth in the presence of the partner
///
/// Zero growth alone is replaced by [`GROWTH_RATE_CUTOFF`] so any growth
/// together reads as a large positive change.
pub fn percent_change(together: f64, alone: f64) -> f64 {
    let alone = if alone == 0. { GROWTH_RATE_CUTOFF } else { alone };
    (together - alone) / alone
}

/// Classify the interaction between species A and B
///
/// Returns the relative change of A, the relative change of B and the
/// interaction type.
pub fn evaluate_interaction(
    a_together: f64,
    b_together: f64,
    a_alone: f64,
    b_alone: f64,
) -> (f64, f64, InteractionType) {
    let a_change = percent_change(a_together, a_alone);
    let b_change = percent_change(b_together, b_alone);
    (a_change, b_change, classify(a_change, b_change))
}

/// Decision table over the relative changes of A and B
pub fn classify(a_change: f64, b_change: f64) -> InteractionType {
    use Effect::*;
    match (Effect::of(a_change), Effect::of(b_change)) {
        (Positive, Positive) => InteractionType::Mutualism,
        (Positive, Negative) | (Negative, Positive) => InteractionType::Parasitism,
        (Positive, Neutral) | (Neutral, Positive) => InteractionType::Commensalism,
        (Negative, Negative) => InteractionType::Competition,
        (Negative, Neutral) | (Neutral, Negative) => InteractionType::Amensalism,
        (Neutral, Neutral) => InteractionType::Neutralism,
        _ => InteractionType::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn decision_table() {
        assert_eq!(classify(0.5, 0.5), InteractionType::Mutualism);
        assert_eq!(classify(0.5, -0.5), InteractionType::Parasitism);
        assert_eq!(classify(-0.5, 0.5), InteractionType::Parasitism);
        assert_eq!(classify(0.5, 0.), InteractionType::Commensalism);
        assert_eq!(classify(0., 0.5), InteractionType::Commensalism);
        assert_eq!(classify(-0.5, -0.5), InteractionType::Competition);
        assert_eq!(classify(-0.5, 0.05), InteractionType::Amensalism);
        assert_eq!(classify(-0.05, -0.5), InteractionType::Amensalism);
        assert_eq!(classify(0.05, -0.05), InteractionType::Neutralism);
    }

    #[test]
    fn threshold_boundary() {
        assert_eq!(classify(0.1, 0.1), InteractionType::Empty);
        assert_eq!(classify(-0.1, 0.), InteractionType::Empty);
        assert_eq!(classify(0.5, 0.1), InteractionType::Empty);
        assert_eq!(classify(f64::NAN, 0.), InteractionType::Empty);
        // 11 over 10 is exactly the threshold
        let (a_change, b_change, interaction) = evaluate_interaction(11., 11., 10., 10.);
        assert_eq!(a_change, 0.1);
        assert_eq!(b_change, 0.1);
        assert_eq!(interaction, InteractionType::Empty);
    }

    #[test]
    fn zero_alone_growth() {
        let (a_change, b_change, interaction) = evaluate_interaction(1., 0., 0., 0.);
        assert_abs_diff_eq!(a_change, (1. - 1e-12) / 1e-12, epsilon = 1.);
        assert_abs_diff_eq!(b_change, -1., epsilon = 1e-12);
        assert_eq!(interaction, InteractionType::Parasitism);
    }

    #[test]
    fn pure() {
        let first = evaluate_interaction(0.3, 0.2, 0.4, 0.1);
        let second = evaluate_interaction(0.3, 0.2, 0.4, 0.1);
        assert_eq!(first, second);
        assert_eq!(first.2, InteractionType::Parasitism);
    }

    #[test]
    fn names_round_trip() {
        let name = InteractionType::Commensalism.to_string();
        assert_eq!(name, "Commensalism");
        assert_eq!(name.parse::<InteractionType>(), Ok(InteractionType::Commensalism));
        assert!("Symbiosis".parse::<InteractionType>().is_err());
    }
}
