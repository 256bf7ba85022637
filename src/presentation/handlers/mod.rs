mod root;
mod transcription;

pub use root::{ROOT_MESSAGE, RootResponse, root_handler};
pub use transcription::{
    ErrorResponse, FILE_FIELD, TranscriptionResponse, transcription_handler,
};
