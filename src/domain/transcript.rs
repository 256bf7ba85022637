/// One unit of text produced by a transcription engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Raw engine output: ordered segments plus the language the engine detected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcript {
    pub segments: Vec<Segment>,
    pub language: Option<String>,
}

impl Transcript {
    pub fn new(segments: Vec<Segment>, language: Option<String>) -> Self {
        Self { segments, language }
    }

    /// Segment texts joined by a single space, with only the outer whitespace
    /// of the joined string trimmed.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}
