//! Budget configuration: one row per period kind.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub period: BudgetPeriod,
    pub limit_usd: f64,
    pub enabled: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Outcome of one budget check against a single budget row (spec §4.6).
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetVerdict {
    /// `spend / limit < 0.8`.
    Allow { remaining_usd: f64 },
    /// `0.8 <= spend / limit < 1.0`: allow, but the pipeline must downgrade the model.
    AllowDowngrade { remaining_usd: f64 },
    /// `spend / limit >= 1.0`.
    Deny,
}

impl BudgetConfig {
    /// Evaluates spend against this budget's limit, per the 80%/100% thresholds in §4.6.
    pub fn evaluate(&self, spend_usd: f64) -> BudgetVerdict {
        if self.limit_usd <= 0.0 {
            return BudgetVerdict::Deny;
        }
        let percent = spend_usd / self.limit_usd * 100.0;
        let remaining = (self.limit_usd - spend_usd).max(0.0);
        if percent >= 100.0 {
            BudgetVerdict::Deny
        } else if percent >= 80.0 {
            BudgetVerdict::AllowDowngrade {
                remaining_usd: remaining,
            }
        } else {
            BudgetVerdict::Allow {
                remaining_usd: remaining,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(limit: f64) -> BudgetConfig {
        BudgetConfig {
            period: BudgetPeriod::Daily,
            limit_usd: limit,
            enabled: true,
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn below_80_percent_allows_without_downgrade() {
        assert_eq!(
            budget(1.0).evaluate(0.5),
            BudgetVerdict::Allow { remaining_usd: 0.5 }
        );
    }

    #[test]
    fn at_85_percent_downgrades() {
        // $1 daily budget, $0.85 spent: per the worked example in the spec.
        match budget(1.0).evaluate(0.85) {
            BudgetVerdict::AllowDowngrade { remaining_usd } => {
                assert!((remaining_usd - 0.15).abs() < 1e-9);
            }
            other => panic!("expected AllowDowngrade, got {other:?}"),
        }
    }

    #[test]
    fn at_100_percent_denies() {
        assert_eq!(budget(1.0).evaluate(1.0), BudgetVerdict::Deny);
    }

    #[test]
    fn over_100_percent_denies() {
        assert_eq!(budget(1.0).evaluate(1.5), BudgetVerdict::Deny);
    }
}
