use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;

use conduct_engine::{
    import_ledger, import_ledger_from_path, AppError, BulletinLedger, Clock, ConductService,
    RuleTable, SanctionKind, SubjectProfile,
};

use crate::infra::{seed_ledger, InMemoryConductStore};

/// Roster used when no bulletin is supplied on the command line.
const SAMPLE_BULLETIN: &str = "\
Subject ID,Name,Rank,Kind,Days,Applied At,Reason,Case Ref
MIL-0101,Ana Duarte,Private,,,,,
MIL-0102,Rui Costa,Corporal,confinement,3,2021-03-20,slept on watch,case-31
MIL-0103,Marta Lopes,Third Sergeant,arrest,4,2025-02-10,affray,case-44
MIL-0104,Tiago Nunes,First Sergeant,reprimand,2,2024-09-05,late duty report,
MIL-0105,Jorge Pinto,Captain,,,,,
";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Disciplinary bulletin CSV to load instead of the sample roster
    #[arg(long)]
    pub(crate) ledger: Option<PathBuf>,
    /// Evaluate classifications as of this date (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Print the transition log for every classified subject
    #[arg(long)]
    pub(crate) include_transitions: bool,
    /// Skip the what-if simulation portion of the demo
    #[arg(long)]
    pub(crate) skip_simulation: bool,
}

#[derive(Clone, Copy)]
struct DemoClock {
    now: DateTime<Utc>,
}

impl Clock for DemoClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        ledger,
        as_of,
        include_transitions,
        skip_simulation,
    } = args;

    println!("Disciplinary conduct demo");

    let imported: BulletinLedger = match &ledger {
        Some(path) => {
            println!("Data source: bulletin {}", path.display());
            import_ledger_from_path(path)?
        }
        None => {
            println!("Data source: built-in sample bulletin");
            import_ledger(SAMPLE_BULLETIN.as_bytes())?
        }
    };

    let store = Arc::new(InMemoryConductStore::default());
    let (subjects, sanctions) = seed_ledger(&store, imported)?;
    println!("Enrolled {subjects} subjects with {sanctions} recorded sanctions");

    let now = as_of
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now);
    println!("Evaluating as of {}", now.format("%Y-%m-%d"));

    let service = Arc::new(ConductService::with_clock(
        store.clone(),
        RuleTable::default(),
        DemoClock { now },
    )?);

    let summary = match service.recompute_all() {
        Ok(summary) => summary,
        Err(err) => {
            println!("  Recomputation unavailable: {err}");
            return Ok(());
        }
    };
    println!(
        "\nFull-roster recomputation: {} evaluated, {} updated, {} errors",
        summary.evaluated, summary.updated, summary.errors
    );

    let roster = store.roster();
    println!("\nConduct ratings");
    for profile in &roster {
        print_classification(&service, profile);
    }

    let enlisted: Vec<&SubjectProfile> = roster
        .iter()
        .filter(|profile| profile.rank.is_enlisted())
        .collect();

    if let Some(profile) = enlisted.first() {
        println!("\nLive sanction registration");
        match service.register_sanction(
            &profile.id,
            SanctionKind::Arrest,
            3,
            "insubordination during inspection",
            Some("demo-case".to_string()),
        ) {
            Ok(sanction) => {
                println!(
                    "- {} received {} for {} day(s) ({})",
                    profile.id,
                    sanction.kind.label(),
                    sanction.duration_days,
                    sanction.id
                );
                print_classification(&service, profile);
                match service.list_transitions(&profile.id) {
                    Ok(transitions) => {
                        if let Some(latest) = transitions.first() {
                            println!(
                                "  Transition: {} -> {} ({})",
                                latest.from_tier.label(),
                                latest.to_tier.label(),
                                latest.reason
                            );
                        }
                    }
                    Err(err) => println!("  Transition log unavailable: {err}"),
                }
            }
            Err(err) => println!("  Registration rejected: {err}"),
        }
    }

    if !skip_simulation {
        if let Some(profile) = enlisted.get(1).or_else(|| enlisted.first()) {
            println!("\nWhat-if simulation (nothing is persisted)");
            match service.simulate(&profile.id, SanctionKind::Confinement, 5) {
                Ok(outcome) => {
                    println!(
                        "- {}: 5 day(s) of confinement would move {} -> {} ({})",
                        profile.id,
                        outcome.before.tier.label(),
                        outcome.after.tier.label(),
                        if outcome.would_change {
                            "tier changes"
                        } else {
                            "tier holds"
                        }
                    );
                }
                Err(err) => println!("  Simulation unavailable: {err}"),
            }
        }
    }

    if include_transitions {
        println!("\nTransition log");
        for profile in &enlisted {
            match service.list_transitions(&profile.id) {
                Ok(transitions) if transitions.is_empty() => {
                    println!("- {}: no transitions recorded", profile.id);
                }
                Ok(transitions) => {
                    println!("- {}:", profile.id);
                    for transition in transitions {
                        println!(
                            "    {} {} -> {} ({}){}",
                            transition.occurred_at.format("%Y-%m-%d"),
                            transition.from_tier.label(),
                            transition.to_tier.label(),
                            transition.reason,
                            if transition.automatic {
                                ""
                            } else {
                                " [manual]"
                            }
                        );
                    }
                }
                Err(err) => println!("- {}: transition log unavailable: {err}", profile.id),
            }
        }
    }

    let dashboard = match service.dashboard() {
        Ok(dashboard) => dashboard,
        Err(err) => {
            println!("  Dashboard unavailable: {err}");
            return Ok(());
        }
    };

    println!("\nTier distribution ({} subjects)", dashboard.total_subjects);
    for row in &dashboard.distribution {
        println!("- {}: {}", row.label, row.count);
    }

    if dashboard.attention.is_empty() {
        println!("\nSubjects needing attention: none");
    } else {
        println!("\nSubjects needing attention");
        for entry in &dashboard.attention {
            let improvement = match entry.days_to_improvement {
                Some(days) => format!(", improves in {days} day(s)"),
                None => String::new(),
            };
            println!(
                "- {} {}: {} ({:.1} arrest-day equivalents{improvement})",
                entry.subject_id,
                entry.name,
                entry.tier.label(),
                entry.arrest_equivalent
            );
        }
    }

    println!("\nMonthly trend (improvements/regressions)");
    for point in &dashboard.monthly_trend {
        println!(
            "- {}: +{} / -{}",
            point.month, point.improvements, point.regressions
        );
    }

    if let Some(profile) = enlisted.first() {
        if let Ok(Some(state)) = service.get_current_classification(&profile.id) {
            match serde_json::to_string_pretty(&state.view()) {
                Ok(json) => println!("\nClassification payload for {}:\n{json}", profile.id),
                Err(err) => println!("\nClassification payload unavailable: {err}"),
            }
        }
    }

    Ok(())
}

fn print_classification<S, C>(service: &ConductService<S, C>, profile: &SubjectProfile)
where
    S: conduct_engine::ConductStore,
    C: Clock,
{
    if !profile.rank.is_enlisted() {
        println!(
            "- {} {} ({}): outside the enlisted scale, not classified",
            profile.id,
            profile.name,
            profile.rank.label()
        );
        return;
    }
    match service.get_current_classification(&profile.id) {
        Ok(Some(state)) => {
            let improvement = match state.next_possible_improvement_at {
                Some(at) => format!(", next improvement {}", at.format("%Y-%m-%d")),
                None => String::new(),
            };
            println!(
                "- {} {} ({}): {} ({:.1} arrest-day equivalents{improvement})",
                profile.id,
                profile.name,
                profile.rank.label(),
                state.current_tier.label(),
                state.accumulated.arrest_equivalent
            );
        }
        Ok(None) => println!(
            "- {} {} ({}): not evaluated yet",
            profile.id, profile.name, profile.rank.label()
        ),
        Err(err) => println!("- {}: classification unavailable: {err}", profile.id),
    }
}
