//! StudyForge Guide — the generation pipeline backbone.
//!
//! Drives one streaming generation call per located section, parses the
//! semi-structured JSON reply defensively, and persists each accepted topic
//! immediately so a cancelled run loses nothing already generated.

pub mod analyze;
pub mod generator;
pub mod orchestrator;
pub mod parse;
pub mod prompts;

pub use analyze::{analyze_structure, sampled_text};
pub use generator::{LlmGenerator, SectionGenerator};
pub use orchestrator::{GuideConfig, GuideEvent, GuideOrchestrator};
pub use parse::{extract_json_object, parse_guide, parse_outline, strip_code_fences, GuidePayload};
