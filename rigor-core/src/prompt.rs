//! Prompt construction and response parsing for the three model call sites.
//!
//! Requests ask for JSON. Responses are tolerated when wrapped in Markdown
//! fences or surrounded by prose; anything that still does not parse is a
//! [`Error::MalformedResponse`] and ends up as the call site's fallback.

use rigor_models::{ChatRequest, Message};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{
    Challenge, ChallengeId, Critique, Difficulty, MAX_DEPTH_SCORE, MAX_SESSION_SCORE,
    MIN_DEPTH_SCORE, SessionResult, Step,
};

const CHALLENGE_SYSTEM: &str = "You write system design interview challenges for software engineers. \
Respond with JSON only.";

const CRITIQUE_SYSTEM: &str = "You are a demanding staff engineer interviewing a candidate. \
For the candidate's latest step, reply with one pointed follow-up question or challenge that \
exposes a gap, a hidden assumption or a trade-off they skipped. Score the technical depth of \
the step from 1 (superficial) to 10 (expert). Respond with JSON only: \
{\"critique\": string, \"depthScore\": number}.";

const EVALUATION_SYSTEM: &str = "You are a hiring committee member grading a system design \
session. Weigh rigor, trade-off awareness and how the candidate responded to critiques. \
Respond with JSON only: {\"score\": number 0-100, \"summary\": string, \
\"strengths\": [string], \"weaknesses\": [string]}.";

// ────────────────────────────────────────────────────────────────────────────
// Requests
// ────────────────────────────────────────────────────────────────────────────

/// Request for `count` fresh challenges.
pub fn challenge_request(model: &str, count: usize) -> ChatRequest {
    let user = format!(
        "Generate {count} distinct system design challenges spanning different difficulty tiers. \
         Return a JSON array where each element has the fields \
         \"id\" (short kebab-case slug), \"title\", \"description\", \
         \"difficulty\" (one of Junior, Senior, Staff, Principal) and \
         \"context\" (scale, constraints and existing infrastructure)."
    );
    ChatRequest::new(
        model,
        vec![Message::system(CHALLENGE_SYSTEM), Message::user(user)],
    )
    .temperature(0.9)
    .json()
}

/// Request a critique of `current`, given a bounded window of earlier steps.
pub fn critique_request(
    model: &str,
    challenge: &Challenge,
    window: &[Step],
    current: &str,
) -> ChatRequest {
    let mut user = format!(
        "Challenge: {}\n{}\nContext: {}\n",
        challenge.title, challenge.description, challenge.context
    );

    if window.is_empty() {
        user.push_str("\nThis is the candidate's first step.\n");
    } else {
        user.push_str("\nPrevious steps:\n");
        for step in window {
            user.push_str(&format!("{}. {}\n", step.position, step.content.trim()));
            if let Some(critique) = &step.critique {
                user.push_str(&format!("   Interviewer: {}\n", critique.trim()));
            }
        }
    }

    user.push_str(&format!("\nLatest step:\n{}\n", current.trim()));

    ChatRequest::new(
        model,
        vec![Message::system(CRITIQUE_SYSTEM), Message::user(user)],
    )
    .temperature(0.7)
    .json()
}

/// Request a holistic evaluation of the graded steps.
pub fn evaluation_request(model: &str, challenge: &Challenge, steps: &[Step]) -> ChatRequest {
    let mut user = format!(
        "Challenge: {} ({})\n\nTranscript:\n",
        challenge.title, challenge.difficulty
    );
    for step in steps {
        user.push_str(&format!("Step {}: {}\n", step.position, step.content.trim()));
        match &step.critique {
            Some(critique) => user.push_str(&format!("Critique: {}\n", critique.trim())),
            None => user.push_str("Critique: (not yet critiqued)\n"),
        }
    }

    ChatRequest::new(
        model,
        vec![Message::system(EVALUATION_SYSTEM), Message::user(user)],
    )
    .temperature(0.2)
    .json()
}

// ────────────────────────────────────────────────────────────────────────────
// Response parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawChallenge {
    #[serde(default)]
    id: Option<String>,
    title: String,
    description: String,
    difficulty: Difficulty,
    #[serde(default)]
    context: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawChallengeList {
    Bare(Vec<RawChallenge>),
    Wrapped { challenges: Vec<RawChallenge> },
}

#[derive(Debug, Deserialize)]
struct RawCritique {
    #[serde(alias = "interrogation", alias = "question", alias = "text")]
    critique: String,
    #[serde(rename = "depthScore", alias = "depth_score", alias = "score")]
    depth_score: f64,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    score: f64,
    summary: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
}

/// Parse a challenge listing. An empty listing is malformed.
pub fn parse_challenges(text: &str) -> Result<Vec<Challenge>> {
    let json = extract_json(text)?;
    let raw = match serde_json::from_str::<RawChallengeList>(json)? {
        RawChallengeList::Bare(list) | RawChallengeList::Wrapped { challenges: list } => list,
    };

    if raw.is_empty() {
        return Err(Error::MalformedResponse("no challenges returned".to_string()));
    }

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, c)| Challenge {
            id: ChallengeId::new(
                c.id.filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| format!("challenge-{}", i + 1)),
            ),
            title: c.title,
            description: c.description,
            difficulty: c.difficulty,
            context: c.context,
        })
        .collect())
}

/// Parse a step critique, clamping the depth score into `1..=10`.
pub fn parse_critique(text: &str) -> Result<Critique> {
    let raw: RawCritique = serde_json::from_str(extract_json(text)?)?;
    if raw.critique.trim().is_empty() {
        return Err(Error::MalformedResponse("empty critique".to_string()));
    }
    let score = clamp_score(raw.depth_score, MIN_DEPTH_SCORE, MAX_DEPTH_SCORE)?;
    Ok(Critique::new(raw.critique.trim(), score))
}

/// Parse a session evaluation, clamping the score into `0..=100`.
pub fn parse_evaluation(text: &str) -> Result<SessionResult> {
    let raw: RawEvaluation = serde_json::from_str(extract_json(text)?)?;
    Ok(SessionResult {
        score: clamp_score(raw.score, 0, MAX_SESSION_SCORE)?,
        summary: raw.summary,
        strengths: raw.strengths,
        weaknesses: raw.weaknesses,
    })
}

fn clamp_score(value: f64, min: u8, max: u8) -> Result<u8> {
    if !value.is_finite() {
        return Err(Error::MalformedResponse(format!("score is not a number: {value}")));
    }
    Ok(value.round().clamp(f64::from(min), f64::from(max)) as u8)
}

/// Locate the single JSON value in a model reply.
///
/// Strips a leading Markdown fence, then scans for the first `{` or `[` and
/// returns the slice up to its matching close bracket.
pub fn extract_json(text: &str) -> Result<&str> {
    let mut s = text.trim();
    if s.starts_with("```") {
        s = s.trim_start_matches('`');
        if let Some(pos) = s.find('\n') {
            s = &s[pos + 1..];
        }
    }

    let bytes = s.as_bytes();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut start_idx: Option<usize> = None;

    for (idx, &byte) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' if start_idx.is_some() => in_string = true,
            b'{' | b'[' => {
                if start_idx.is_none() {
                    start_idx = Some(idx);
                }
                depth += 1;
            }
            b'}' | b']' if start_idx.is_some() => {
                depth -= 1;
                if depth == 0 {
                    let start = start_idx.unwrap_or(0);
                    return Ok(&s[start..=idx]);
                }
            }
            _ => {}
        }
    }

    Err(Error::MalformedResponse(format!(
        "no JSON value in response: {}",
        truncate(text, 120)
    )))
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
