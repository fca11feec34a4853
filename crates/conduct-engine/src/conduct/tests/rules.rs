use crate::conduct::classifier::ConductClassifier;
use crate::conduct::conversion::ConversionScale;
use crate::conduct::domain::ConductTier;
use crate::conduct::rules::{RuleTable, RuleTableError};

#[test]
fn default_table_validates() {
    RuleTable::default()
        .validate()
        .expect("default table is well formed");
}

#[test]
fn rejects_non_positive_conversion_ratio() {
    let mut table = RuleTable::default();
    table.conversion = ConversionScale {
        reprimand_days_per_confinement_day: 0.0,
        confinement_days_per_arrest_day: 2.0,
    };

    match table.validate() {
        Err(RuleTableError::InvalidConversion) => {}
        other => panic!("expected InvalidConversion, got {other:?}"),
    }
}

#[test]
fn rejects_missing_tier() {
    let mut table = RuleTable::default();
    table.rules.retain(|rule| rule.tier != ConductTier::Optimal);

    match table.validate() {
        Err(RuleTableError::MissingTier(ConductTier::Optimal)) => {}
        other => panic!("expected MissingTier, got {other:?}"),
    }
}

#[test]
fn rejects_duplicate_tier() {
    let mut table = RuleTable::default();
    let duplicate = table.rules[0].clone();
    table.rules.push(duplicate);

    match table.validate() {
        Err(RuleTableError::DuplicateTier(ConductTier::Exceptional)) => {}
        other => panic!("expected DuplicateTier, got {other:?}"),
    }
}

#[test]
fn rejects_zero_lookback() {
    let mut table = RuleTable::default();
    for rule in &mut table.rules {
        if rule.tier == ConductTier::Bad {
            rule.lookback_years = 0;
        }
    }

    match table.validate() {
        Err(RuleTableError::ZeroLookback(ConductTier::Bad)) => {}
        other => panic!("expected ZeroLookback, got {other:?}"),
    }
}

#[test]
fn rejects_non_finite_threshold() {
    let mut table = RuleTable::default();
    for rule in &mut table.rules {
        if rule.tier == ConductTier::Good {
            rule.threshold = f64::NAN;
        }
    }

    match table.validate() {
        Err(RuleTableError::InvalidThreshold(ConductTier::Good)) => {}
        other => panic!("expected InvalidThreshold, got {other:?}"),
    }
}

#[test]
fn rejects_window_growing_toward_worse_tiers() {
    let mut table = RuleTable::default();
    for rule in &mut table.rules {
        if rule.tier == ConductTier::Insufficient {
            rule.lookback_years = 3;
        }
    }

    match table.validate() {
        Err(RuleTableError::WindowNotOrdered {
            tier: ConductTier::Insufficient,
            lookback_years: 3,
            better_tier: ConductTier::Good,
            better_years: 2,
        }) => {}
        other => panic!("expected WindowNotOrdered, got {other:?}"),
    }
}

#[test]
fn classifier_construction_rejects_invalid_tables() {
    let mut table = RuleTable::default();
    table.rules.clear();

    match ConductClassifier::new(table) {
        Err(RuleTableError::MissingTier(_)) => {}
        Err(other) => panic!("expected MissingTier, got {other:?}"),
        Ok(_) => panic!("expected MissingTier, got a classifier"),
    }
}
