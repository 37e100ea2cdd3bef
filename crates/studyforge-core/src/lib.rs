//! StudyForge Core — shared data model, error type, cancellation.

pub mod cancel;
pub mod error;
pub mod types;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use types::*;
