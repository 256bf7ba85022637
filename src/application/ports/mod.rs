mod transcription_engine;

pub use transcription_engine::{DecodingOptions, TranscriptionEngine, TranscriptionError};
