use chrono::{DateTime, Datelike, Months, Utc};
use serde::Serialize;

use super::domain::{
    AccumulatedSanctions, ClassificationState, ClassificationTransition, ConductTier, SubjectId,
};

/// Trend horizon for the dashboard, counted back from now.
pub(crate) const TREND_MONTHS: u32 = 6;

/// Roster-wide oversight snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ConductDashboard {
    pub total_subjects: usize,
    pub distribution: Vec<TierCount>,
    pub attention: Vec<AttentionEntry>,
    pub monthly_trend: Vec<MonthlyTrendPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierCount {
    pub tier: ConductTier,
    pub label: String,
    pub count: usize,
}

/// A subject currently on one of the two lowest tiers, worst first.
#[derive(Debug, Clone, Serialize)]
pub struct AttentionEntry {
    pub subject_id: SubjectId,
    pub name: String,
    pub tier: ConductTier,
    pub arrest_equivalent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_to_improvement: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTrendPoint {
    pub month: String,
    pub improvements: usize,
    pub regressions: usize,
}

/// Buckets recent transitions by calendar month, oldest first. Months with
/// no transitions still get a zeroed row so charts keep a fixed width.
pub(crate) fn monthly_trend(
    transitions: &[ClassificationTransition],
    now: DateTime<Utc>,
) -> Vec<MonthlyTrendPoint> {
    let mut points = Vec::with_capacity(TREND_MONTHS as usize);
    for offset in (0..TREND_MONTHS).rev() {
        let Some(instant) = now.checked_sub_months(Months::new(offset)) else {
            continue;
        };
        let month = month_key(instant);
        let improvements = transitions
            .iter()
            .filter(|transition| {
                month_key(transition.occurred_at) == month
                    && transition.to_tier.improves_on(transition.from_tier)
            })
            .count();
        let regressions = transitions
            .iter()
            .filter(|transition| {
                month_key(transition.occurred_at) == month
                    && transition.from_tier.improves_on(transition.to_tier)
            })
            .count();
        points.push(MonthlyTrendPoint {
            month,
            improvements,
            regressions,
        });
    }
    points
}

fn month_key(instant: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", instant.year(), instant.month())
}

/// Whole days until `instant`, rounded up. Already-past instants report 0.
pub(crate) fn days_until(now: DateTime<Utc>, instant: DateTime<Utc>) -> i64 {
    let seconds = (instant - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + 86_399) / 86_400
}

/// Read-model of a stored classification, with the tier label spelled out
/// for clients that render it directly.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationStateView {
    pub subject_id: SubjectId,
    pub tier: ConductTier,
    pub tier_label: &'static str,
    pub last_evaluated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_possible_improvement_at: Option<DateTime<Utc>>,
    pub accumulated: AccumulatedSanctions,
}

impl ClassificationState {
    pub fn view(&self) -> ClassificationStateView {
        ClassificationStateView {
            subject_id: self.subject_id.clone(),
            tier: self.current_tier,
            tier_label: self.current_tier.label(),
            last_evaluated_at: self.last_evaluated_at,
            next_possible_improvement_at: self.next_possible_improvement_at,
            accumulated: self.accumulated,
        }
    }
}
