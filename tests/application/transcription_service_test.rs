use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use parlance::application::ports::{DecodingOptions, TranscriptionEngine, TranscriptionError};
use parlance::application::services::{TranscriptionService, TranscriptionServiceError};
use parlance::domain::{Segment, Transcript};

use crate::helpers::{BlockingEngine, EchoEngine, FailingEngine, fixed_engine};

fn service(engine: Arc<dyn TranscriptionEngine>) -> TranscriptionService {
    TranscriptionService::new(engine, DecodingOptions::default(), 1, None)
}

#[tokio::test]
async fn given_zero_segments_when_transcribing_then_text_is_empty() {
    let service = service(fixed_engine(Vec::new(), Some("en")));

    let result = service.transcribe(b"audio").await.unwrap();

    assert_eq!(result.text, "");
    assert_eq!(result.language.as_str(), "en-GB");
}

#[tokio::test]
async fn given_padded_segments_when_transcribing_then_joins_and_trims_outer_whitespace() {
    let service = service(fixed_engine(vec!["Hello", " world "], Some("en")));

    let result = service.transcribe(b"audio").await.unwrap();

    assert_eq!(result.text, "Hello  world");
}

#[tokio::test]
async fn given_uppercase_language_when_transcribing_then_returns_regional_locale() {
    let service = service(fixed_engine(vec!["Hola"], Some("ES")));

    let result = service.transcribe(b"audio").await.unwrap();

    assert_eq!(result.text, "Hola");
    assert_eq!(result.language.as_str(), "es-ES");
}

#[tokio::test]
async fn given_unmapped_language_when_transcribing_then_falls_back_to_default() {
    let service = service(fixed_engine(vec!["こんにちは"], Some("ja")));

    let result = service.transcribe(b"audio").await.unwrap();

    assert_eq!(result.text, "こんにちは");
    assert_eq!(result.language.as_str(), "en-GB");
}

#[tokio::test]
async fn given_no_detected_language_when_transcribing_then_falls_back_to_default() {
    let service = service(fixed_engine(vec!["hi"], None));

    let result = service.transcribe(b"audio").await.unwrap();

    assert_eq!(result.language.as_str(), "en-GB");
}

#[tokio::test]
async fn given_failing_engine_when_transcribing_then_returns_engine_error() {
    let service = service(Arc::new(FailingEngine));

    let result = service.transcribe(b"garbage").await;

    assert!(matches!(
        result,
        Err(TranscriptionServiceError::Engine(
            TranscriptionError::DecodingFailed(_)
        ))
    ));
}

#[tokio::test]
async fn given_slow_engine_when_timeout_elapses_then_returns_timed_out() {
    let engine = Arc::new(EchoEngine {
        delay: Duration::from_millis(500),
    });
    let service = TranscriptionService::new(
        engine,
        DecodingOptions::default(),
        1,
        Some(Duration::from_millis(20)),
    );

    let result = service.transcribe(b"en:late").await;

    assert!(matches!(result, Err(TranscriptionServiceError::TimedOut(_))));
}

#[tokio::test]
async fn given_closed_service_when_transcribing_then_returns_unavailable() {
    let service = service(fixed_engine(vec!["hi"], Some("en")));
    service.close();

    let result = service.transcribe(b"audio").await;

    assert!(matches!(result, Err(TranscriptionServiceError::Unavailable)));
}

struct BeamRecordingEngine {
    seen: AtomicUsize,
}

#[async_trait]
impl TranscriptionEngine for BeamRecordingEngine {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        options: &DecodingOptions,
    ) -> Result<Transcript, TranscriptionError> {
        self.seen.store(options.beam_size, Ordering::SeqCst);
        Ok(Transcript::new(vec![Segment::new("ok")], None))
    }
}

#[tokio::test]
async fn given_configured_beam_size_when_transcribing_then_engine_receives_it() {
    let engine = Arc::new(BeamRecordingEngine {
        seen: AtomicUsize::new(0),
    });
    let service = TranscriptionService::new(
        Arc::clone(&engine) as Arc<dyn TranscriptionEngine>,
        DecodingOptions { beam_size: 5 },
        1,
        None,
    );

    service.transcribe(b"audio").await.unwrap();

    assert_eq!(engine.seen.load(Ordering::SeqCst), 5);
}

struct OverlapTrackingEngine {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl TranscriptionEngine for OverlapTrackingEngine {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        _options: &DecodingOptions,
    ) -> Result<Transcript, TranscriptionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Transcript::default())
    }
}

#[tokio::test]
async fn given_limit_of_one_when_called_concurrently_then_engine_calls_are_serialized() {
    let engine = Arc::new(OverlapTrackingEngine {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let service = Arc::new(TranscriptionService::new(
        Arc::clone(&engine) as Arc<dyn TranscriptionEngine>,
        DecodingOptions::default(),
        1,
        None,
    ));

    let calls: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.transcribe(b"audio").await })
        })
        .collect();
    for call in calls {
        call.await.unwrap().unwrap();
    }

    assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn given_blocking_engine_when_calls_time_out_then_engine_work_stays_serialized() {
    let engine = Arc::new(BlockingEngine::new(Duration::from_millis(150)));
    let service = TranscriptionService::new(
        Arc::clone(&engine) as Arc<dyn TranscriptionEngine>,
        DecodingOptions::default(),
        1,
        Some(Duration::from_millis(20)),
    );

    for _ in 0..4 {
        let result = service.transcribe(b"audio").await;
        assert!(matches!(result, Err(TranscriptionServiceError::TimedOut(_))));
    }

    assert_eq!(engine.peak(), 1);
}

#[tokio::test]
async fn given_limit_of_two_when_calls_time_out_then_engine_work_never_exceeds_limit() {
    let engine = Arc::new(BlockingEngine::new(Duration::from_millis(100)));
    let service = TranscriptionService::new(
        Arc::clone(&engine) as Arc<dyn TranscriptionEngine>,
        DecodingOptions::default(),
        2,
        Some(Duration::from_millis(10)),
    );

    for _ in 0..6 {
        let result = service.transcribe(b"audio").await;
        assert!(matches!(result, Err(TranscriptionServiceError::TimedOut(_))));
    }

    assert!(engine.peak() <= 2);
}
