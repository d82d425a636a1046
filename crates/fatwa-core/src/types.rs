//! Core types for fatwa requests and answers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from validating an inbound question.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuestionError {
    #[error("Question is empty")]
    Empty,
}

/// A caller's question, guaranteed non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Validate raw caller input.
    ///
    /// Surrounding whitespace is removed; what remains must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QuestionError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The trimmed question text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four Sunni schools of jurisprudence (madhahib).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum School {
    Hanafi,
    Maliki,
    Shafii,
    Hanbali,
}

impl School {
    /// All schools, in the order they are rendered.
    pub const ALL: [School; 4] = [
        School::Hanafi,
        School::Maliki,
        School::Shafii,
        School::Hanbali,
    ];

    /// The JSON key carrying this school's opinion.
    pub fn key(&self) -> &'static str {
        match self {
            School::Hanafi => "hanafi",
            School::Maliki => "maliki",
            School::Shafii => "shafii",
            School::Hanbali => "hanbali",
        }
    }
}

impl fmt::Display for School {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One school's answer to the question.
///
/// Every field may be missing: the backend is asked for all three but is not
/// trusted to deliver them, and renderers treat a missing field as blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolOpinion {
    /// The school's verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruling: Option<String>,

    /// Reasoning behind the verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    /// Scriptural citation (Quran or Sunnah)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// A validated comparative answer.
///
/// The four school keys are always present; `consensus` and `note` are
/// omitted from the serialized form when the backend did not supply them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatwaResult {
    /// The question as echoed by the backend (may be empty before the
    /// handler applies its echo policy)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub question: String,

    pub hanafi: SchoolOpinion,
    pub maliki: SchoolOpinion,
    pub shafii: SchoolOpinion,
    pub hanbali: SchoolOpinion,

    /// Points of agreement across schools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<String>,

    /// General remark or advice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl FatwaResult {
    /// Opinion of a single school.
    pub fn opinion(&self, school: School) -> &SchoolOpinion {
        match school {
            School::Hanafi => &self.hanafi,
            School::Maliki => &self.maliki,
            School::Shafii => &self.shafii,
            School::Hanbali => &self.hanbali,
        }
    }

    /// Iterate opinions in rendering order.
    pub fn opinions(&self) -> impl Iterator<Item = (School, &SchoolOpinion)> {
        School::ALL.into_iter().map(move |s| (s, self.opinion(s)))
    }

    /// Whether the backend echoed a question.
    pub fn has_question(&self) -> bool {
        !self.question.trim().is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
