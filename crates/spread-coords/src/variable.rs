//! The canonical, closed set of meteorological variables SynopticSpread
//! tracks. Kept as a tagged enum rather than a free-form string so that a
//! typo in a fetcher can't silently introduce an untracked variable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the four canonical variables every fetcher normalizes onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Variable {
    Precip,
    WindSpeed,
    Mslp,
    Hgt500,
}

impl Variable {
    pub const ALL: [Variable; 4] = [
        Variable::Precip,
        Variable::WindSpeed,
        Variable::Mslp,
        Variable::Hgt500,
    ];

    /// The short, uppercase-free string stored in the relational
    /// `variable` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Precip => "precip",
            Variable::WindSpeed => "wind_speed",
            Variable::Mslp => "mslp",
            Variable::Hgt500 => "hgt_500",
        }
    }

    /// The physical unit this variable is always normalized to before a
    /// fetcher hands a `FieldSet` back to the orchestrator.
    pub fn canonical_unit(&self) -> &'static str {
        match self {
            Variable::Precip => "mm",
            Variable::WindSpeed => "m/s",
            Variable::Mslp => "Pa",
            Variable::Hgt500 => "m",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown variable: {0}")]
pub struct ParseVariableError(pub String);

impl FromStr for Variable {
    type Err = ParseVariableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "precip" => Ok(Variable::Precip),
            "wind_speed" => Ok(Variable::WindSpeed),
            "mslp" => Ok(Variable::Mslp),
            "hgt_500" => Ok(Variable::Hgt500),
            other => Err(ParseVariableError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for v in Variable::ALL {
            assert_eq!(Variable::from_str(v.as_str()).unwrap(), v);
        }
    }

    #[test]
    fn rejects_unknown_variable() {
        assert!(Variable::from_str("dewpoint").is_err());
    }

    #[test]
    fn canonical_units_are_fixed() {
        assert_eq!(Variable::Precip.canonical_unit(), "mm");
        assert_eq!(Variable::WindSpeed.canonical_unit(), "m/s");
        assert_eq!(Variable::Mslp.canonical_unit(), "Pa");
        assert_eq!(Variable::Hgt500.canonical_unit(), "m");
    }
}
