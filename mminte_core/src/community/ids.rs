//! Compartment suffix conventions of metabolite ids
//!
//! BiGG ids end with a bracketed compartment (`glc__D[e]`), ModelSEED ids
//! with an underscore and compartment letter (`cpd00027_e`).
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use thiserror::Error;

static BIGG_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([cepu])\]$").unwrap_or_else(|err| panic!("invalid BiGG pattern: {err}"))
});

static MODELSEED_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_([ce])$").unwrap_or_else(|err| panic!("invalid ModelSEED pattern: {err}"))
});

/// Naming convention of a metabolite id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdType {
    Bigg,
    Modelseed,
    Unknown,
}

impl IdType {
    /// Detect the convention from the compartment suffix, BiGG taking precedence
    pub fn classify(id: &str) -> IdType {
        if BIGG_SUFFIX.is_match(id) {
            IdType::Bigg
        } else if MODELSEED_SUFFIX.is_match(id) {
            IdType::Modelseed
        } else {
            IdType::Unknown
        }
    }

    /// Compartment letter encoded in the id, if it follows this convention
    pub fn compartment(self, id: &str) -> Option<String> {
        let regex = match self {
            IdType::Bigg => &BIGG_SUFFIX,
            IdType::Modelseed => &MODELSEED_SUFFIX,
            IdType::Unknown => return None,
        };
        regex.captures(id).map(|caps| caps[1].to_string())
    }
}

impl Display for IdType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IdType::Bigg => "bigg",
            IdType::Modelseed => "modelseed",
            IdType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unrecognized id type {0}")]
pub struct ParseIdTypeError(String);

impl FromStr for IdType {
    type Err = ParseIdTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bigg" => Ok(IdType::Bigg),
            "modelseed" => Ok(IdType::Modelseed),
            "unknown" => Ok(IdType::Unknown),
            other => Err(ParseIdTypeError(other.to_string())),
        }
    }
}

/// Replace the compartment suffix of `id` with `compartment`
///
/// Ids of unknown type get `_<compartment>` appended.
pub fn rewrite_compartment(id: &str, compartment: &str, id_type: IdType) -> String {
    match id_type {
        IdType::Bigg => BIGG_SUFFIX
            .replace(id, NoExpand(&format!("[{compartment}]")))
            .into_owned(),
        IdType::Modelseed => MODELSEED_SUFFIX
            .replace(id, NoExpand(&format!("_{compartment}")))
            .into_owned(),
        IdType::Unknown => format!("{id}_{compartment}"),
    }
}
