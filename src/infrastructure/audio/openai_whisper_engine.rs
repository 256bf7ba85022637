use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::application::ports::{DecodingOptions, TranscriptionEngine, TranscriptionError};
use crate::domain::{Segment, Transcript};

use super::whisper_languages::iso_code;

/// Client for any OpenAI-compatible `/audio/transcriptions` endpoint.
///
/// Beam width is not part of that API and is not forwarded.
pub struct OpenAiWhisperEngine {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiWhisperEngine {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct VerboseTranscription {
    text: String,
    /// English language name (`"spanish"`), or a code on some compatible servers.
    language: Option<String>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Deserialize)]
struct VerboseSegment {
    text: String,
}

impl From<VerboseTranscription> for Transcript {
    fn from(response: VerboseTranscription) -> Self {
        let segments = if response.segments.is_empty() {
            if response.text.is_empty() {
                Vec::new()
            } else {
                vec![Segment::new(response.text)]
            }
        } else {
            response
                .segments
                .into_iter()
                .map(|segment| Segment::new(segment.text))
                .collect()
        };

        let language = response
            .language
            .map(|language| iso_code(&language).map(String::from).unwrap_or(language));

        Transcript::new(segments, language)
    }
}

#[async_trait]
impl TranscriptionEngine for OpenAiWhisperEngine {
    async fn transcribe(
        &self,
        audio_data: &[u8],
        _options: &DecodingOptions,
    ) -> Result<Transcript, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = multipart::Part::bytes(audio_data.to_vec())
            .file_name("audio")
            .mime_str("application/octet-stream")
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        tracing::debug!(model = %self.model, url = %url, "Sending audio to remote Whisper API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let result: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("parse response: {}", e)))?;

        tracing::info!(
            segments = result.segments.len(),
            language = result.language.as_deref().unwrap_or("none"),
            "Remote Whisper transcription completed"
        );

        Ok(result.into())
    }
}
