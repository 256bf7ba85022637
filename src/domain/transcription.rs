use super::locale_tag::LocaleTag;
use super::transcript::Transcript;

/// Caller-facing result of one transcription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    pub language: LocaleTag,
}

impl From<&Transcript> for Transcription {
    fn from(transcript: &Transcript) -> Self {
        Self {
            text: transcript.full_text(),
            language: LocaleTag::normalize(transcript.language.as_deref()),
        }
    }
}
