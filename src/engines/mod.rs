//! Concrete transcription engine implementations.

pub mod external;
pub mod native;

mod whisper_logging;
