use serde::{Deserialize, Serialize};

use super::conversion::ConversionScale;
use super::domain::ConductTier;

/// Unit a rule's threshold is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquivalenceUnit {
    ArrestEquivalent,
    ConfinementEquivalent,
}

impl EquivalenceUnit {
    pub const fn label(self) -> &'static str {
        match self {
            EquivalenceUnit::ArrestEquivalent => "arrest-day equivalents",
            EquivalenceUnit::ConfinementEquivalent => "confinement-day equivalents",
        }
    }
}

/// How a rule's windowed total is compared against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    EqualsZero,
    LessOrEqual,
    GreaterThan,
}

/// One row of the window rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub tier: ConductTier,
    pub lookback_years: u8,
    pub unit: EquivalenceUnit,
    pub threshold: f64,
    pub mode: ThresholdMode,
}

/// The full rule configuration: conversion ratios, one rule per tier, and
/// the baseline tier used when no rule matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub conversion: ConversionScale,
    pub baseline: ConductTier,
    pub rules: Vec<ClassificationRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            conversion: ConversionScale::default(),
            baseline: ConductTier::Good,
            rules: vec![
                ClassificationRule {
                    tier: ConductTier::Exceptional,
                    lookback_years: 8,
                    unit: EquivalenceUnit::ArrestEquivalent,
                    threshold: 0.0,
                    mode: ThresholdMode::EqualsZero,
                },
                ClassificationRule {
                    tier: ConductTier::Optimal,
                    lookback_years: 4,
                    unit: EquivalenceUnit::ConfinementEquivalent,
                    threshold: 1.0,
                    mode: ThresholdMode::LessOrEqual,
                },
                ClassificationRule {
                    tier: ConductTier::Good,
                    lookback_years: 2,
                    unit: EquivalenceUnit::ArrestEquivalent,
                    threshold: 2.0,
                    mode: ThresholdMode::LessOrEqual,
                },
                ClassificationRule {
                    tier: ConductTier::Insufficient,
                    lookback_years: 1,
                    unit: EquivalenceUnit::ArrestEquivalent,
                    threshold: 2.0,
                    mode: ThresholdMode::LessOrEqual,
                },
                ClassificationRule {
                    tier: ConductTier::Bad,
                    lookback_years: 1,
                    unit: EquivalenceUnit::ArrestEquivalent,
                    threshold: 2.0,
                    mode: ThresholdMode::GreaterThan,
                },
            ],
        }
    }
}

impl RuleTable {
    /// Invariants: positive conversion ratios, exactly one rule per tier,
    /// finite non-negative thresholds, at least a one-year window, and
    /// windows that never grow as tiers get worse (the longest window always
    /// belongs to the best tier).
    pub fn validate(&self) -> Result<(), RuleTableError> {
        if !self.conversion.is_valid() {
            return Err(RuleTableError::InvalidConversion);
        }

        for tier in ConductTier::ordered() {
            let count = self.rules.iter().filter(|rule| rule.tier == tier).count();
            if count == 0 {
                return Err(RuleTableError::MissingTier(tier));
            }
            if count > 1 {
                return Err(RuleTableError::DuplicateTier(tier));
            }
        }

        for rule in &self.rules {
            if rule.lookback_years == 0 {
                return Err(RuleTableError::ZeroLookback(rule.tier));
            }
            if !rule.threshold.is_finite() || rule.threshold < 0.0 {
                return Err(RuleTableError::InvalidThreshold(rule.tier));
            }
        }

        let mut by_severity = self.rules.clone();
        by_severity.sort_by_key(|rule| rule.tier.severity_rank());
        for pair in by_severity.windows(2) {
            if pair[1].lookback_years > pair[0].lookback_years {
                return Err(RuleTableError::WindowNotOrdered {
                    tier: pair[1].tier,
                    lookback_years: pair[1].lookback_years,
                    better_tier: pair[0].tier,
                    better_years: pair[0].lookback_years,
                });
            }
        }

        Ok(())
    }

    pub(crate) fn max_lookback_years(&self) -> u8 {
        self.rules
            .iter()
            .map(|rule| rule.lookback_years)
            .max()
            .unwrap_or(0)
    }
}

/// Rule table misconfiguration detected at classifier construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleTableError {
    #[error("conversion ratios must be positive and finite")]
    InvalidConversion,
    #[error("no rule configured for tier {0}")]
    MissingTier(ConductTier),
    #[error("more than one rule configured for tier {0}")]
    DuplicateTier(ConductTier),
    #[error("rule for tier {0} has a zero-year lookback window")]
    ZeroLookback(ConductTier),
    #[error("rule for tier {0} has a non-finite or negative threshold")]
    InvalidThreshold(ConductTier),
    #[error("rule for tier {tier} looks back {lookback_years}y, longer than the {better_years}y window of the better tier {better_tier}")]
    WindowNotOrdered {
        tier: ConductTier,
        lookback_years: u8,
        better_tier: ConductTier,
        better_years: u8,
    },
}
