//! Core type definitions: challenges, steps, critiques and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Depth score used when a critique could not be obtained.
pub const NEUTRAL_DEPTH_SCORE: u8 = 5;

/// Lowest depth score a critique can carry.
pub const MIN_DEPTH_SCORE: u8 = 1;

/// Highest depth score a critique can carry.
pub const MAX_DEPTH_SCORE: u8 = 10;

/// Highest aggregate session score.
pub const MAX_SESSION_SCORE: u8 = 100;

/// Identifier of a challenge as issued by the challenge source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub String);

impl ChallengeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChallengeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Seniority tier a challenge targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Difficulty {
    Junior,
    Senior,
    Staff,
    Principal,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Junior => "Junior",
            Self::Senior => "Senior",
            Self::Staff => "Staff",
            Self::Principal => "Principal",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" => Ok(Self::Junior),
            "senior" => Ok(Self::Senior),
            "staff" => Ok(Self::Staff),
            "principal" => Ok(Self::Principal),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

impl TryFrom<String> for Difficulty {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Difficulty> for String {
    fn from(value: Difficulty) -> Self {
        value.as_str().to_string()
    }
}

/// A design challenge. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// Free-text technical context (scale, constraints, existing systems).
    pub context: String,
}

/// Unique identifier for a step within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub Uuid);

impl StepId {
    /// Create a new step ID with a UUIDv7 (time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StepId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Editable, no critique yet.
    Open,
    /// Submitted; critique call in flight.
    AwaitingCritique,
    /// Terminal: carries critique text and depth score.
    Critiqued,
}

impl StepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::AwaitingCritique => "awaiting_critique",
            Self::Critiqued => "critiqued",
        }
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-authored increment of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    /// 1-based position in the session.
    pub position: u32,
    pub content: String,
    pub critique: Option<String>,
    pub depth_score: Option<u8>,
    pub state: StepState,
    pub created_at: DateTime<Utc>,
}

impl Step {
    /// A fresh, empty, open step at the given position.
    pub fn open(position: u32) -> Self {
        Self {
            id: StepId::new(),
            position,
            content: String::new(),
            critique: None,
            depth_score: None,
            state: StepState::Open,
            created_at: Utc::now(),
        }
    }

    /// Content is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn is_critiqued(&self) -> bool {
        self.state == StepState::Critiqued
    }
}

/// Critique of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    pub text: String,
    pub depth_score: u8,
}

impl Critique {
    /// Build a critique, clamping the score into the valid range.
    pub fn new(text: impl Into<String>, depth_score: u8) -> Self {
        Self {
            text: text.into(),
            depth_score: depth_score.clamp(MIN_DEPTH_SCORE, MAX_DEPTH_SCORE),
        }
    }
}

/// Holistic evaluation of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Aggregate score, 0-100.
    pub score: u8,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

impl SessionResult {
    /// Placeholder result used when evaluation could not complete.
    pub fn unavailable(summary: impl Into<String>) -> Self {
        Self {
            score: 0,
            summary: summary.into(),
            strengths: vec!["N/A".to_string()],
            weaknesses: vec!["N/A".to_string()],
        }
    }
}
