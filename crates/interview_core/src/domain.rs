//! crates/interview_core/src/domain.rs
//!
//! Defines the pure, core data structures for a mock-interview session.
//! These structs are independent of any transport or UI representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The lifecycle phase of a single interview attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Setup,
    Interviewing,
    Feedback,
}

/// Who produced a given transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

/// One utterance in the interview transcript. The transcript is append-only
/// and owned exclusively by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn now(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Requested difficulty of the interviewer's questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

/// The parameters a candidate supplies before entering an interview.
/// Everything except `focus_area` is required to be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    pub role: String,
    pub company: String,
    pub job_description: String,
    pub resume_text: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub focus_area: Option<String>,
}

/// The structured end-of-session scoring artifact. Created once from the
/// full transcript; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReport {
    /// Metric name -> score on a 0-10 scale.
    pub scores: BTreeMap<String, u8>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
}

/// The wire shape the scoring model is asked to produce. Kept private so the
/// nested `feedback` object never leaks into the domain type.
#[derive(Deserialize)]
struct FeedbackWire {
    #[serde(default)]
    scores: BTreeMap<String, f64>,
    #[serde(default)]
    feedback: FeedbackListsWire,
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize, Default)]
struct FeedbackListsWire {
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
}

impl FeedbackReport {
    /// Parses a best-effort JSON scoring response from the model.
    ///
    /// Model output routinely arrives wrapped in markdown code fences or with
    /// stray prose around the object, so the payload is located by slicing from
    /// the first `{` to the last `}` before parsing. Malformed input yields
    /// `None` rather than an error; the caller treats an absent report as
    /// "scoring failed, offer a retry".
    pub fn from_model_output(raw: &str) -> Option<Self> {
        let stripped = raw
            .replace("```json", "")
            .replace("```", "");
        let start = stripped.find('{')?;
        let end = stripped.rfind('}')?;
        if end < start {
            return None;
        }
        let wire: FeedbackWire = serde_json::from_str(&stripped[start..=end]).ok()?;

        let scores = wire
            .scores
            .into_iter()
            .map(|(metric, value)| (metric, value.round().clamp(0.0, 10.0) as u8))
            .collect();

        Some(Self {
            scores,
            strengths: wire.feedback.strengths,
            improvements: wire.feedback.improvements,
            summary: wire.summary,
        })
    }
}
