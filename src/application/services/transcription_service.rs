use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::application::ports::{DecodingOptions, TranscriptionEngine, TranscriptionError};
use crate::domain::Transcription;

/// Turns one uploaded audio payload into one [`Transcription`].
///
/// The engine is shared by every request. Calls into it are bounded by a
/// semaphore sized at construction; a limit of 1 serializes them. A permit is
/// held until the engine call completes, even after the caller has timed out.
pub struct TranscriptionService {
    engine: Arc<dyn TranscriptionEngine>,
    options: DecodingOptions,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl TranscriptionService {
    pub fn new(
        engine: Arc<dyn TranscriptionEngine>,
        options: DecodingOptions,
        max_concurrent: usize,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            engine,
            options,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    /// Rejects new transcriptions; calls already holding a permit finish.
    pub fn close(&self) {
        self.permits.close();
    }

    pub async fn transcribe(
        &self,
        audio_data: &[u8],
    ) -> Result<Transcription, TranscriptionServiceError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| TranscriptionServiceError::Unavailable)?;

        tracing::debug!(
            bytes = audio_data.len(),
            beam_size = self.options.beam_size,
            "Invoking transcription engine"
        );

        let engine = Arc::clone(&self.engine);
        let options = self.options;
        let audio = audio_data.to_vec();
        let call = tokio::spawn(async move {
            let result = engine.transcribe(&audio, &options).await;
            drop(permit);
            result
        });

        // Dropping the join handle on timeout detaches the task; it keeps its
        // permit until the engine returns.
        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                tracing::warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "Transcription timed out; engine work continues in background"
                );
                TranscriptionServiceError::TimedOut(limit)
            })?,
            None => call.await,
        };
        let transcript = joined.map_err(|e| {
            TranscriptionError::TranscriptionFailed(format!("engine task: {}", e))
        })??;

        let transcription = Transcription::from(&transcript);

        tracing::info!(
            segments = transcript.segments.len(),
            chars = transcription.text.len(),
            language_detected = transcript.language.as_deref().unwrap_or("none"),
            language = %transcription.language,
            "Transcription completed"
        );

        Ok(transcription)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionServiceError {
    #[error("engine: {0}")]
    Engine(#[from] TranscriptionError),
    #[error("engine did not respond within {0:?}")]
    TimedOut(Duration),
    #[error("transcription capacity unavailable")]
    Unavailable,
}
