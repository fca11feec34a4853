use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AccumulatedSanctions, ConductTier, Sanction, SubjectId};
use super::rules::{ClassificationRule, EquivalenceUnit, RuleTable, RuleTableError, ThresholdMode};

/// Stateless evaluator applying the window rule table to a sanction history.
///
/// `classify` is a pure function of `(sanctions, now)`: the batch worker and
/// the on-write reclassification must agree bit-for-bit, so nothing here
/// reads a clock or any prior state.
pub struct ConductClassifier {
    table: RuleTable,
    ordered: Vec<ClassificationRule>,
}

impl ConductClassifier {
    pub fn new(table: RuleTable) -> Result<Self, RuleTableError> {
        table.validate()?;

        // Longest window first; on equal windows the better tier keeps
        // precedence (stable sort over the severity order).
        let mut ordered = table.rules.clone();
        ordered.sort_by_key(|rule| rule.tier.severity_rank());
        ordered.sort_by(|a, b| b.lookback_years.cmp(&a.lookback_years));

        Ok(Self { table, ordered })
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn classify(
        &self,
        subject_id: &SubjectId,
        sanctions: &[Sanction],
        now: DateTime<Utc>,
    ) -> ClassificationOutcome {
        let widest = sanctions_within(sanctions, now, self.table.max_lookback_years());
        let accumulated = self.table.conversion.accumulate(&widest);

        for rule in &self.ordered {
            let considered = sanctions_within(sanctions, now, rule.lookback_years);
            let total = self.windowed_total(rule.unit, &considered);

            if !self.rule_matches(rule, total) {
                continue;
            }

            let next_improvement_at = next_improvement(&considered, rule.lookback_years);
            let rationale = match rule.mode {
                ThresholdMode::EqualsZero => {
                    format!("no sanctions in the last {} year(s)", rule.lookback_years)
                }
                ThresholdMode::LessOrEqual => format!(
                    "{total:.2} {} in the last {} year(s), within the limit of {}",
                    rule.unit.label(),
                    rule.lookback_years,
                    rule.threshold
                ),
                ThresholdMode::GreaterThan => format!(
                    "{total:.2} {} in the last {} year(s), above the limit of {}",
                    rule.unit.label(),
                    rule.lookback_years,
                    rule.threshold
                ),
            };

            return ClassificationOutcome {
                subject_id: subject_id.clone(),
                tier: rule.tier,
                rationale,
                considered,
                next_improvement_at,
                accumulated,
                evaluation: EvaluationDetail {
                    window_years: rule.lookback_years,
                    unit: rule.unit,
                    total,
                    threshold: rule.threshold,
                    defaulted: false,
                },
            };
        }

        self.defaulted_outcome(subject_id, sanctions, now, accumulated)
    }

    fn windowed_total(&self, unit: EquivalenceUnit, considered: &[Sanction]) -> f64 {
        match unit {
            EquivalenceUnit::ArrestEquivalent => self.table.conversion.arrest_equivalent(considered),
            EquivalenceUnit::ConfinementEquivalent => {
                self.table.conversion.confinement_equivalent(considered)
            }
        }
    }

    fn rule_matches(&self, rule: &ClassificationRule, total: f64) -> bool {
        match rule.mode {
            ThresholdMode::EqualsZero => total == 0.0,
            ThresholdMode::LessOrEqual => {
                // A tier worse than the baseline never claims an empty
                // window; a subject with a clean year but a heavy second
                // year falls through to the baseline instead.
                if total == 0.0 && rule.tier.severity_rank() > self.table.baseline.severity_rank() {
                    return false;
                }
                total <= rule.threshold
            }
            ThresholdMode::GreaterThan => total > rule.threshold,
        }
    }

    /// Guard path for a table whose conditions leave a gap. The baseline
    /// rule's window supplies honest numbers; no sanctions are reported as
    /// considered and no improvement instant is projected.
    fn defaulted_outcome(
        &self,
        subject_id: &SubjectId,
        sanctions: &[Sanction],
        now: DateTime<Utc>,
        accumulated: AccumulatedSanctions,
    ) -> ClassificationOutcome {
        let baseline_rule = self
            .ordered
            .iter()
            .find(|rule| rule.tier == self.table.baseline);
        let (window_years, unit, threshold) = match baseline_rule {
            Some(rule) => (rule.lookback_years, rule.unit, rule.threshold),
            None => (0, EquivalenceUnit::ArrestEquivalent, 0.0),
        };
        let total = self.windowed_total(unit, &sanctions_within(sanctions, now, window_years));

        ClassificationOutcome {
            subject_id: subject_id.clone(),
            tier: self.table.baseline,
            rationale: format!(
                "no classification rule matched; defaulted to {}",
                self.table.baseline
            ),
            considered: Vec::new(),
            next_improvement_at: None,
            accumulated,
            evaluation: EvaluationDetail {
                window_years,
                unit,
                total,
                threshold,
                defaulted: true,
            },
        }
    }
}

fn window_cutoff(now: DateTime<Utc>, years: u8) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(u32::from(years) * 12))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn sanctions_within(sanctions: &[Sanction], now: DateTime<Utc>, years: u8) -> Vec<Sanction> {
    let cutoff = window_cutoff(now, years);
    sanctions
        .iter()
        .filter(|sanction| sanction.applied_at >= cutoff)
        .cloned()
        .collect()
}

/// The instant the oldest sanction in the winning window ages out of it:
/// its application date plus the window, plus one day. An empty window has
/// nothing left to decay.
fn next_improvement(considered: &[Sanction], years: u8) -> Option<DateTime<Utc>> {
    let oldest = considered.iter().min_by_key(|sanction| sanction.applied_at)?;
    oldest
        .applied_at
        .checked_add_months(Months::new(u32::from(years) * 12))
        .and_then(|instant| instant.checked_add_signed(Duration::days(1)))
}

/// Result of one classification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub subject_id: SubjectId,
    pub tier: ConductTier,
    pub rationale: String,
    pub considered: Vec<Sanction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_improvement_at: Option<DateTime<Utc>>,
    pub accumulated: AccumulatedSanctions,
    pub evaluation: EvaluationDetail,
}

/// Numbers behind the winning rule, kept for transparent audits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDetail {
    pub window_years: u8,
    pub unit: EquivalenceUnit,
    pub total: f64,
    pub threshold: f64,
    pub defaulted: bool,
}
