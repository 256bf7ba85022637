use std::fmt;

/// Locale returned whenever the detected language has no regional mapping.
pub const DEFAULT_LOCALE: LocaleTag = LocaleTag("en-GB");

/// Regional locale for each supported ISO-639-1 language code.
pub const LOCALE_MAP: [(&str, LocaleTag); 7] = [
    ("en", LocaleTag("en-GB")),
    ("pt", LocaleTag("pt-PT")),
    ("es", LocaleTag("es-ES")),
    ("fr", LocaleTag("fr-FR")),
    ("de", LocaleTag("de-DE")),
    ("it", LocaleTag("it-IT")),
    ("nl", LocaleTag("nl-NL")),
];

/// An `xx-YY` locale tag handed back to callers for voice/UI localization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocaleTag(&'static str);

impl LocaleTag {
    /// Maps an engine-reported language code to its locale tag.
    ///
    /// Lookup is case-insensitive. Unknown, empty or missing codes resolve to
    /// [`DEFAULT_LOCALE`]; this never fails.
    pub fn normalize(language: Option<&str>) -> Self {
        let Some(language) = language else {
            return DEFAULT_LOCALE;
        };

        let code = language.to_lowercase();
        LOCALE_MAP
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, tag)| *tag)
            .unwrap_or(DEFAULT_LOCALE)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for LocaleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
