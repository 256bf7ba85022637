mod locale_tag;
mod transcript;
mod transcription;

pub use locale_tag::{DEFAULT_LOCALE, LOCALE_MAP, LocaleTag};
pub use transcript::{Segment, Transcript};
pub use transcription::Transcription;
