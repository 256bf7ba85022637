use parlance::domain::{Segment, Transcript, Transcription};

#[test]
fn given_no_segments_when_joining_then_text_is_empty() {
    let transcript = Transcript::new(Vec::new(), Some("en".to_string()));
    assert_eq!(transcript.full_text(), "");
}

#[test]
fn given_padded_segments_when_joining_then_only_outer_whitespace_is_trimmed() {
    let transcript = Transcript::new(
        vec![Segment::new("Hello"), Segment::new(" world ")],
        None,
    );
    assert_eq!(transcript.full_text(), "Hello  world");
}

#[test]
fn given_segments_when_joining_then_preserves_order() {
    let transcript = Transcript::new(
        vec![Segment::new("one"), Segment::new("two"), Segment::new("three")],
        None,
    );
    assert_eq!(transcript.full_text(), "one two three");
}

#[test]
fn given_uppercase_language_when_building_transcription_then_normalizes_locale() {
    let transcript = Transcript::new(vec![Segment::new("Hola")], Some("ES".to_string()));

    let transcription = Transcription::from(&transcript);

    assert_eq!(transcription.text, "Hola");
    assert_eq!(transcription.language.as_str(), "es-ES");
}

#[test]
fn given_missing_language_when_building_transcription_then_uses_default_locale() {
    let transcript = Transcript::new(vec![Segment::new("hi")], None);
    assert_eq!(Transcription::from(&transcript).language.as_str(), "en-GB");
}
