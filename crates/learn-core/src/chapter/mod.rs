//! Per-chapter detail generation.

pub mod detail;
pub mod prompts;
pub mod service;

pub use detail::{ChapterDetail, parse_chapter_detail};
pub use prompts::build_detail_request;
pub use service::{generate_chapter_content, mark_chapter_completed};
