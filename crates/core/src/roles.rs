//! Marketplace Roles

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The persona an identity acts as in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sells agricultural waste.
    Farmer,

    /// Buys agricultural waste for industrial use.
    Buyer,
}

impl Role {
    /// Stable lowercase identifier used in documents and caches.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Buyer => "buyer",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Farmer => "Farmer",
            Self::Buyer => "Buyer",
        }
    }

    /// The other side of the marketplace.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Farmer => Self::Buyer,
            Self::Buyer => Self::Farmer,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "farmer" => Ok(Self::Farmer),
            "buyer" => Ok(Self::Buyer),
            _ => Err(UnknownRole(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_case_insensitively() -> TestResult {
        assert_eq!("Farmer".parse::<Role>()?, Role::Farmer);
        assert_eq!(" buyer ".parse::<Role>()?, Role::Buyer);

        Ok(())
    }

    #[test]
    fn rejects_unknown_roles() {
        assert_eq!(
            "broker".parse::<Role>(),
            Err(UnknownRole("broker".to_string()))
        );
    }

    #[test]
    fn opposite_flips_sides() {
        assert_eq!(Role::Farmer.opposite(), Role::Buyer);
        assert_eq!(Role::Buyer.opposite(), Role::Farmer);
    }
}
