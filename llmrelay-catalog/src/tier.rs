//! Cost tier: the cross-provider comparison class assigned to every model.

use serde::{Deserialize, Serialize};

/// Cost class assigned per model so the router can compare across providers
/// without knowing each provider's pricing in advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Economy,
    Standard,
    Premium,
}

impl Tier {
    /// Tier immediately above this one, or `None` for `Premium`.
    pub fn escalate(self) -> Option<Tier> {
        match self {
            Tier::Economy => Some(Tier::Standard),
            Tier::Standard => Some(Tier::Premium),
            Tier::Premium => None,
        }
    }

    /// Derives a tier from a heuristic complexity score in `[0, 100]`.
    pub fn from_complexity(complexity: u8) -> Tier {
        if complexity <= 25 {
            Tier::Economy
        } else if complexity <= 60 {
            Tier::Standard
        } else {
            Tier::Premium
        }
    }

    /// The four static tier aliases plus `auto`, as exposed by `GET /v1/models`.
    pub fn alias(self) -> &'static str {
        match self {
            Tier::Economy => "economy",
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "economy" => Ok(Tier::Economy),
            "standard" => Ok(Tier::Standard),
            "premium" => Ok(Tier::Premium),
            _ => Err(()),
        }
    }
}
