//! Plan submission and outline generation.

pub mod outline;
pub mod prompts;
pub mod service;

pub use outline::{Outline, parse_outline};
pub use prompts::{OutlineTemplate, build_outline_request, select_outline_template};
pub use service::{
    OutlineOutcome, PlanRequest, create_plan, generate_plan_content, get_plan_with_chapters,
    validate_document,
};
