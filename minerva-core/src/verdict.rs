//! Verdict extraction from the final agent turn
//!
//! The last turn of a terminated run is, by convention, the scam verdict.
//! Its shape is free text, so the structured fields persisted with it are
//! recovered heuristically:
//! - scam / not-scam determination
//! - confidence on a 0-100 scale (numeric or categorical label)
//! - a short summary (first paragraph)

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::{Turn, NO_ANALYSIS_MESSAGE};

static NEGATED_LEGIT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:not\s+(?:a\s+)?legitimate|illegitimate)\b").unwrap()
});

// A scam stated as the determination ("is a scam", "be a likely phishing attempt")
static SCAM_STATEMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:is|be)\s+(?:an?\s+)?(?:likely\s+|probable\s+|clear\s+)?(?:scam|fraud|phishing)").unwrap()
});

// "legitimate" only counts when it is the determination, not a mention of a real brand
static NOT_SCAM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:not\s+(?:a\s+)?scam|no\s+scam|not\s+fraudulent|(?:is|are|appears|seems|looks)\s+(?:to\s+be\s+)?(?:a\s+)?legitimate)\b",
    )
    .unwrap()
});

static SCAM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:scam\w*|fraud\w*|phishing)\b").unwrap()
});

static CONFIDENCE_NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidence(?:\s+level)?[^0-9a-z]{0,20}(\d+(?:\.\d+)?)\s*(%|/\s*100|/\s*10\b)?").unwrap()
});

static CONFIDENCE_LABEL_AFTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidence(?:\s+level)?[^0-9a-z]{0,20}(very\s+high|high|medium|moderate|low)\b").unwrap()
});

static CONFIDENCE_LABEL_BEFORE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(very\s+high|high|medium|moderate|low)\s+confidence").unwrap()
});

/// Structured reading of a final verdict turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    /// Full verdict text
    pub text: String,
    /// First paragraph of the verdict
    pub summary: Option<String>,
    /// Scam determination, when the text states one
    pub is_scam: Option<bool>,
    /// Confidence on a 0-100 scale, when the text states one
    pub confidence_level: Option<u8>,
}

impl AnalysisVerdict {
    /// Read the verdict from the final turn; `None` for an absent or empty turn
    pub fn from_turn(turn: Option<&Turn>) -> Option<Self> {
        let turn = turn?;
        if turn.is_empty() {
            return None;
        }
        Some(Self::from_text(&turn.text()))
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            summary: first_paragraph(text),
            is_scam: parse_is_scam(text),
            confidence_level: parse_confidence(text),
        }
    }

    /// Whether the verdict carries enough structure to be persisted
    pub fn is_determined(&self) -> bool {
        self.is_scam.is_some()
    }
}

/// Text shown to the user for the final turn of a run
pub fn verdict_text(turn: Option<&Turn>) -> String {
    match turn {
        Some(turn) if !turn.is_empty() => turn.text(),
        _ => NO_ANALYSIS_MESSAGE.to_string(),
    }
}

fn first_paragraph(text: &str) -> Option<String> {
    text.split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(|p| p.to_string())
}

fn parse_is_scam(text: &str) -> Option<bool> {
    if NEGATED_LEGIT_REGEX.is_match(text) {
        return Some(true);
    }
    if SCAM_STATEMENT_REGEX.is_match(text) {
        return Some(true);
    }
    if NOT_SCAM_REGEX.is_match(text) {
        return Some(false);
    }
    if SCAM_REGEX.is_match(text) {
        return Some(true);
    }
    None
}

fn parse_confidence(text: &str) -> Option<u8> {
    if let Some(scaled) = CONFIDENCE_NUMBER_REGEX
        .captures(text)
        .and_then(|caps| scale_confidence(&caps))
    {
        return Some(scaled);
    }

    let label = CONFIDENCE_LABEL_AFTER_REGEX
        .captures(text)
        .or_else(|| CONFIDENCE_LABEL_BEFORE_REGEX.captures(text))?
        .get(1)?
        .as_str()
        .to_lowercase();

    let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
    match label.as_str() {
        "very high" => Some(95),
        "high" => Some(90),
        "medium" | "moderate" => Some(60),
        "low" => Some(30),
        _ => None,
    }
}

/// Numeric confidence on a 0-100 scale; `None` when out of range
fn scale_confidence(caps: &Captures) -> Option<u8> {
    let raw = caps.get(1)?.as_str();
    let value: f64 = raw.parse().ok()?;
    let scaled = match caps.get(2).map(|m| m.as_str().replace(' ', "")) {
        Some(suffix) if suffix == "/10" => value * 10.0,
        Some(_) => value,
        // Bare fractions such as 0.95 are on a 0-1 scale
        None if raw.contains('.') && value <= 1.0 => value * 100.0,
        None => value,
    };
    (0.0..=100.0)
        .contains(&scaled)
        .then(|| scaled.round() as u8)
}
