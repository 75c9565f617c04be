//! Maps a chapter's visual tag and content onto a renderable value.
//!
//! Every path is total: malformed model output degrades to text, nothing,
//! or an explicit "could not render" marker.

pub mod mermaid;
pub mod table;

use learn_db::models::VisualType;
use serde::Serialize;

pub use mermaid::sanitize as sanitize_mermaid;
pub use table::render_table;

/// Placeholder some clients write into `visual_content` before detail exists.
pub const LOADING_PLACEHOLDER: &str = "Content loading...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Visual {
    /// Nothing worth showing.
    None,
    /// Sanitised Mermaid source.
    Diagram { source: String },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Text { text: String },
    /// A prompt to send to the image generator on demand.
    Illustration { prompt: String },
    Unrenderable { message: String },
}

fn is_blank(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.is_empty() || trimmed == LOADING_PLACEHOLDER
}

pub fn render_visual(visual_type: VisualType, content: &str) -> Visual {
    if is_blank(content) {
        return Visual::None;
    }
    match visual_type {
        VisualType::Mermaid => Visual::Diagram {
            source: mermaid::sanitize(content),
        },
        VisualType::React => table::render_table(content),
        VisualType::Image => Visual::Illustration {
            prompt: content.trim().to_owned(),
        },
        VisualType::Text => Visual::Text {
            text: content.trim().to_owned(),
        },
    }
}
