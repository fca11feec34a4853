use serde::{Deserialize, Serialize};

use super::domain::{AccumulatedSanctions, Sanction, SanctionKind};

/// Cross-unit ratios turning heterogeneous sanction days into one canonical
/// measure. The regulation phrases different tiers in different base units,
/// so both the arrest-day and confinement-day equivalents are exposed and the
/// two stay numerically inverse: `arrest_equivalent = confinement_equivalent
/// / confinement_days_per_arrest_day`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionScale {
    pub reprimand_days_per_confinement_day: f64,
    pub confinement_days_per_arrest_day: f64,
}

impl Default for ConversionScale {
    fn default() -> Self {
        Self {
            reprimand_days_per_confinement_day: 2.0,
            confinement_days_per_arrest_day: 2.0,
        }
    }
}

impl ConversionScale {
    /// Sum day totals first, convert once. Division, never flooring, so one
    /// reprimand-day contributes a fractional equivalent instead of zero.
    pub fn confinement_equivalent(&self, sanctions: &[Sanction]) -> f64 {
        let totals = DayTotals::from_sanctions(sanctions);
        f64::from(totals.confinement_days)
            + f64::from(totals.reprimand_days) / self.reprimand_days_per_confinement_day
            + f64::from(totals.arrest_days) * self.confinement_days_per_arrest_day
    }

    pub fn arrest_equivalent(&self, sanctions: &[Sanction]) -> f64 {
        self.confinement_equivalent(sanctions) / self.confinement_days_per_arrest_day
    }

    pub(crate) fn accumulate(&self, sanctions: &[Sanction]) -> AccumulatedSanctions {
        let totals = DayTotals::from_sanctions(sanctions);
        AccumulatedSanctions {
            reprimand_days: totals.reprimand_days,
            confinement_days: totals.confinement_days,
            arrest_days: totals.arrest_days,
            arrest_equivalent: self.arrest_equivalent(sanctions),
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.reprimand_days_per_confinement_day.is_finite()
            && self.reprimand_days_per_confinement_day > 0.0
            && self.confinement_days_per_arrest_day.is_finite()
            && self.confinement_days_per_arrest_day > 0.0
    }
}

/// Raw per-kind day sums before any unit conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTotals {
    pub reprimand_days: u32,
    pub confinement_days: u32,
    pub arrest_days: u32,
}

impl DayTotals {
    pub fn from_sanctions(sanctions: &[Sanction]) -> Self {
        let mut totals = Self::default();
        for sanction in sanctions {
            match sanction.kind {
                SanctionKind::Reprimand => totals.reprimand_days += sanction.duration_days,
                SanctionKind::Confinement => totals.confinement_days += sanction.duration_days,
                SanctionKind::Arrest => totals.arrest_days += sanction.duration_days,
            }
        }
        totals
    }
}
