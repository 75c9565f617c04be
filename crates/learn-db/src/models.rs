use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Generation status of a plan.
///
/// Advances monotonically:
///
/// ```text
/// generating -> structure_ready -> generated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Generating,
    StructureReady,
    Generated,
}

impl PlanStatus {
    /// Whether moving from `self` to `to` goes forward in the status order.
    pub fn can_advance_to(self, to: PlanStatus) -> bool {
        to > self
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Generating => "generating",
            Self::StructureReady => "structure_ready",
            Self::Generated => "generated",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generating" => Ok(Self::Generating),
            "structure_ready" => Ok(Self::StructureReady),
            "generated" => Ok(Self::Generated),
            other => Err(ParseEnumError::new("plan status", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Presentation mode requested for a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    #[default]
    Standard,
    Story,
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Standard => "standard",
            Self::Story => "story",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "" => Ok(Self::Standard),
            "story" => Ok(Self::Story),
            other => Err(ParseEnumError::new("plan mode", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// What the learner is trying to do, as detected by the outline step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LearningIntent {
    #[default]
    Learning,
    Solving,
    Preparing,
}

impl LearningIntent {
    /// Parse a model-supplied intent tag. Anything unrecognised is treated
    /// as plain learning.
    pub fn from_lenient(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.starts_with("solv") {
            Self::Solving
        } else if lowered.starts_with("prepar") {
            Self::Preparing
        } else {
            Self::Learning
        }
    }
}

impl fmt::Display for LearningIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Learning => "learning",
            Self::Solving => "solving",
            Self::Preparing => "preparing",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------

/// How a chapter's supplementary visual content is rendered.
///
/// `React` is the historical tag for tabular JSON content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VisualType {
    #[default]
    Text,
    Image,
    Mermaid,
    React,
}

impl VisualType {
    /// Parse a model-supplied visual tag, mapping common drift onto the
    /// four supported renderers. Unknown tags fall back to `Text`.
    pub fn from_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mermaid" | "diagram" | "flowchart" | "flow" | "graph" => Self::Mermaid,
            "react" | "table" | "tabular" | "json" => Self::React,
            "image" | "illustration" | "picture" | "img" => Self::Image,
            _ => Self::Text,
        }
    }
}

impl fmt::Display for VisualType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Mermaid => "mermaid",
            Self::React => "react",
        };
        f.write_str(s)
    }
}

impl FromStr for VisualType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "mermaid" => Ok(Self::Mermaid),
            "react" => Ok(Self::React),
            other => Err(ParseEnumError::new("visual type", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Error returned when parsing an invalid enum string.
#[derive(Debug, Clone)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A learning plan -- the learner's request plus its generated outline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub topic: String,
    pub urgency: String,
    pub level: String,
    pub language: String,
    pub mode: PlanMode,
    pub status: PlanStatus,
    pub intent: Option<LearningIntent>,
    pub curriculum_strategy: Option<String>,
    /// Base64-encoded PDF attached at submission. Not sent to clients.
    #[serde(skip_serializing, default)]
    pub document_context: Option<String>,
    pub next_steps: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn has_document(&self) -> bool {
        self.document_context
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }

    /// Detected intent, defaulting to plain learning before the outline runs.
    pub fn effective_intent(&self) -> LearningIntent {
        self.intent.unwrap_or_default()
    }
}

/// One ordered unit of curriculum within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chapter {
    pub id: Uuid,
    pub plan_id: Uuid,
    #[sqlx(rename = "chapter_order")]
    pub order: i32,
    pub title: String,
    pub mental_model: String,
    pub key_takeaway: String,
    pub explanation: String,
    pub common_misconception: String,
    pub real_world_example: String,
    pub quiz_question: String,
    pub quiz_answer: String,
    pub visual_type: VisualType,
    pub visual_content: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Chapter {
    /// A chapter is ready once the detail step has written an explanation.
    pub fn is_ready(&self) -> bool {
        !self.explanation.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_status_display_roundtrip() {
        for v in [
            PlanStatus::Generating,
            PlanStatus::StructureReady,
            PlanStatus::Generated,
        ] {
            let parsed: PlanStatus = v.to_string().parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn plan_status_only_advances_forward() {
        assert!(PlanStatus::Generating.can_advance_to(PlanStatus::StructureReady));
        assert!(PlanStatus::Generating.can_advance_to(PlanStatus::Generated));
        assert!(PlanStatus::StructureReady.can_advance_to(PlanStatus::Generated));
        assert!(!PlanStatus::Generated.can_advance_to(PlanStatus::StructureReady));
        assert!(!PlanStatus::StructureReady.can_advance_to(PlanStatus::StructureReady));
    }

    #[test]
    fn plan_mode_parse_is_case_insensitive() {
        assert_eq!("Story".parse::<PlanMode>().unwrap(), PlanMode::Story);
        assert_eq!("".parse::<PlanMode>().unwrap(), PlanMode::Standard);
        assert!("comic".parse::<PlanMode>().is_err());
    }

    #[test]
    fn intent_lenient_parsing() {
        assert_eq!(LearningIntent::from_lenient("SOLVING"), LearningIntent::Solving);
        assert_eq!(LearningIntent::from_lenient(" preparing "), LearningIntent::Preparing);
        assert_eq!(LearningIntent::from_lenient("learning"), LearningIntent::Learning);
        assert_eq!(LearningIntent::from_lenient("whatever"), LearningIntent::Learning);
    }

    #[test]
    fn visual_type_lenient_parsing_maps_drift() {
        assert_eq!(VisualType::from_lenient("Table"), VisualType::React);
        assert_eq!(VisualType::from_lenient("flowchart"), VisualType::Mermaid);
        assert_eq!(VisualType::from_lenient("illustration"), VisualType::Image);
        assert_eq!(VisualType::from_lenient("hologram"), VisualType::Text);
    }

    #[test]
    fn visual_type_strict_parse_rejects_unknown() {
        assert_eq!("react".parse::<VisualType>().unwrap(), VisualType::React);
        let err = "table".parse::<VisualType>().unwrap_err();
        assert!(err.to_string().contains("visual type"));
    }
}
