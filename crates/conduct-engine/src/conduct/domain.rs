use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for the person a sanction or classification belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub String);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for recorded sanctions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SanctionId(pub String);

impl fmt::Display for SanctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static SANCTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TRANSITION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_sanction_id() -> SanctionId {
    let id = SANCTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SanctionId(format!("SAN-{id:06}"))
}

pub(crate) fn next_transition_id() -> String {
    let id = TRANSITION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("TRN-{id:06}")
}

/// Rank scale. Only the enlisted ranks receive a conduct classification;
/// officer ranks are outside the scheme entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Private,
    Corporal,
    ThirdSergeant,
    SecondSergeant,
    FirstSergeant,
    Subtenant,
    Aspirant,
    SecondLieutenant,
    FirstLieutenant,
    Captain,
    Major,
    LieutenantColonel,
    Colonel,
}

impl Rank {
    pub const fn is_enlisted(self) -> bool {
        matches!(
            self,
            Rank::Private
                | Rank::Corporal
                | Rank::ThirdSergeant
                | Rank::SecondSergeant
                | Rank::FirstSergeant
                | Rank::Subtenant
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            Rank::Private => "private",
            Rank::Corporal => "corporal",
            Rank::ThirdSergeant => "third sergeant",
            Rank::SecondSergeant => "second sergeant",
            Rank::FirstSergeant => "first sergeant",
            Rank::Subtenant => "subtenant",
            Rank::Aspirant => "aspirant",
            Rank::SecondLieutenant => "second lieutenant",
            Rank::FirstLieutenant => "first lieutenant",
            Rank::Captain => "captain",
            Rank::Major => "major",
            Rank::LieutenantColonel => "lieutenant colonel",
            Rank::Colonel => "colonel",
        }
    }

    /// Enlisted scale, lowest to highest.
    pub const fn enlisted() -> [Rank; 6] {
        [
            Rank::Private,
            Rank::Corporal,
            Rank::ThirdSergeant,
            Rank::SecondSergeant,
            Rank::FirstSergeant,
            Rank::Subtenant,
        ]
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Rank {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "private" => Ok(Rank::Private),
            "corporal" => Ok(Rank::Corporal),
            "third sergeant" => Ok(Rank::ThirdSergeant),
            "second sergeant" => Ok(Rank::SecondSergeant),
            "first sergeant" => Ok(Rank::FirstSergeant),
            "subtenant" => Ok(Rank::Subtenant),
            "aspirant" => Ok(Rank::Aspirant),
            "second lieutenant" => Ok(Rank::SecondLieutenant),
            "first lieutenant" => Ok(Rank::FirstLieutenant),
            "captain" => Ok(Rank::Captain),
            "major" => Ok(Rank::Major),
            "lieutenant colonel" => Ok(Rank::LieutenantColonel),
            "colonel" => Ok(Rank::Colonel),
            _ => Err(ValidationError::UnknownRank(value.trim().to_string())),
        }
    }
}

/// Roster entry for a person known to the disciplinary system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub id: SubjectId,
    pub name: String,
    pub rank: Rank,
}

/// The three punitive sanction kinds the regulation recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    Reprimand,
    Confinement,
    Arrest,
}

impl SanctionKind {
    pub const fn label(self) -> &'static str {
        match self {
            SanctionKind::Reprimand => "reprimand",
            SanctionKind::Confinement => "confinement",
            SanctionKind::Arrest => "arrest",
        }
    }
}

impl fmt::Display for SanctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SanctionKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reprimand" => Ok(SanctionKind::Reprimand),
            "confinement" => Ok(SanctionKind::Confinement),
            "arrest" => Ok(SanctionKind::Arrest),
            _ => Err(ValidationError::UnknownSanctionKind(value.trim().to_string())),
        }
    }
}

/// A single punitive record fed into the classifier. Immutable once recorded
/// except through administrative correction of duration or application date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sanction {
    pub id: SanctionId,
    pub subject_id: SubjectId,
    pub kind: SanctionKind,
    pub duration_days: u32,
    pub applied_at: DateTime<Utc>,
    pub terminates_at: DateTime<Utc>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_case_ref: Option<String>,
}

/// The five conduct tiers, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConductTier {
    Exceptional,
    Optimal,
    Good,
    Insufficient,
    Bad,
}

impl ConductTier {
    pub const fn label(self) -> &'static str {
        match self {
            ConductTier::Exceptional => "exceptional",
            ConductTier::Optimal => "optimal",
            ConductTier::Good => "good",
            ConductTier::Insufficient => "insufficient",
            ConductTier::Bad => "bad",
        }
    }

    /// Position on the ordered scale; 0 is the best tier.
    pub const fn severity_rank(self) -> u8 {
        match self {
            ConductTier::Exceptional => 0,
            ConductTier::Optimal => 1,
            ConductTier::Good => 2,
            ConductTier::Insufficient => 3,
            ConductTier::Bad => 4,
        }
    }

    pub const fn improves_on(self, other: ConductTier) -> bool {
        self.severity_rank() < other.severity_rank()
    }

    pub const fn ordered() -> [ConductTier; 5] {
        [
            ConductTier::Exceptional,
            ConductTier::Optimal,
            ConductTier::Good,
            ConductTier::Insufficient,
            ConductTier::Bad,
        ]
    }
}

impl fmt::Display for ConductTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-kind day totals plus the canonical-unit conversion, derived from the
/// sanctions inside the largest evaluated window. The sanction list stays
/// authoritative; these numbers are a convenience snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccumulatedSanctions {
    pub reprimand_days: u32,
    pub confinement_days: u32,
    pub arrest_days: u32,
    pub arrest_equivalent: f64,
}

/// Current classification for one eligible subject. Mutated only by the
/// service; never created for subjects outside the enlisted scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationState {
    pub subject_id: SubjectId,
    pub current_tier: ConductTier,
    pub last_evaluated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_possible_improvement_at: Option<DateTime<Utc>>,
    pub accumulated: AccumulatedSanctions,
}

/// Append-only audit row recording one observed tier change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationTransition {
    pub id: String,
    pub subject_id: SubjectId,
    pub from_tier: ConductTier,
    pub to_tier: ConductTier,
    pub occurred_at: DateTime<Utc>,
    pub reason: String,
    pub automatic: bool,
}

/// Input validation failures surfaced synchronously to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("sanction duration must be a positive number of days (got {days})")]
    NonPositiveDuration { days: u32 },
    #[error("unknown sanction kind '{0}'")]
    UnknownSanctionKind(String),
    #[error("unknown rank '{0}'")]
    UnknownRank(String),
    #[error("subject {subject} holds rank {rank}, outside the enlisted scale")]
    IneligibleSubject { subject: SubjectId, rank: Rank },
}
