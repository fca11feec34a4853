use super::common::*;
use crate::conduct::conversion::{ConversionScale, DayTotals};
use crate::conduct::domain::SanctionKind;

#[test]
fn converts_mixed_kinds_into_confinement_days() {
    let subject = enlisted_subject("0001").id;
    let sanctions = vec![
        sanction("SAN-A", &subject, SanctionKind::Reprimand, 4, anchor()),
        sanction("SAN-B", &subject, SanctionKind::Confinement, 3, anchor()),
        sanction("SAN-C", &subject, SanctionKind::Arrest, 2, anchor()),
    ];

    let scale = ConversionScale::default();
    assert_eq!(scale.confinement_equivalent(&sanctions), 9.0);
    assert_eq!(scale.arrest_equivalent(&sanctions), 4.5);
}

#[test]
fn fractional_equivalents_are_preserved() {
    let subject = enlisted_subject("0001").id;
    let sanctions = vec![sanction(
        "SAN-A",
        &subject,
        SanctionKind::Reprimand,
        3,
        anchor(),
    )];

    let scale = ConversionScale::default();
    assert_eq!(scale.confinement_equivalent(&sanctions), 1.5);
    assert_eq!(scale.arrest_equivalent(&sanctions), 0.75);
}

#[test]
fn arrest_and_confinement_units_stay_in_exact_ratio() {
    let subject = enlisted_subject("0001").id;
    let sanctions = vec![
        sanction("SAN-A", &subject, SanctionKind::Reprimand, 5, anchor()),
        sanction("SAN-B", &subject, SanctionKind::Confinement, 1, anchor()),
        sanction("SAN-C", &subject, SanctionKind::Arrest, 1, anchor()),
    ];

    let scale = ConversionScale::default();
    assert_eq!(
        scale.arrest_equivalent(&sanctions) * scale.confinement_days_per_arrest_day,
        scale.confinement_equivalent(&sanctions)
    );
}

#[test]
fn custom_ratios_drive_both_units() {
    let subject = enlisted_subject("0001").id;
    let sanctions = vec![
        sanction("SAN-A", &subject, SanctionKind::Reprimand, 4, anchor()),
        sanction("SAN-B", &subject, SanctionKind::Confinement, 2, anchor()),
        sanction("SAN-C", &subject, SanctionKind::Arrest, 1, anchor()),
    ];

    let scale = ConversionScale {
        reprimand_days_per_confinement_day: 4.0,
        confinement_days_per_arrest_day: 3.0,
    };
    assert_eq!(scale.confinement_equivalent(&sanctions), 6.0);
    assert_eq!(scale.arrest_equivalent(&sanctions), 2.0);
}

#[test]
fn day_totals_sum_per_kind() {
    let subject = enlisted_subject("0001").id;
    let sanctions = vec![
        sanction("SAN-A", &subject, SanctionKind::Reprimand, 2, anchor()),
        sanction("SAN-B", &subject, SanctionKind::Reprimand, 3, anchor()),
        sanction("SAN-C", &subject, SanctionKind::Confinement, 4, anchor()),
        sanction("SAN-D", &subject, SanctionKind::Arrest, 1, anchor()),
    ];

    let totals = DayTotals::from_sanctions(&sanctions);
    assert_eq!(totals.reprimand_days, 5);
    assert_eq!(totals.confinement_days, 4);
    assert_eq!(totals.arrest_days, 1);
}
