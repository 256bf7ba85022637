use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use candle_core::{D, DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;

use crate::application::ports::{DecodingOptions, TranscriptionEngine, TranscriptionError};
use crate::domain::{Segment, Transcript};

use super::audio_decoder::decode_audio_to_pcm;
use super::whisper_languages::WHISPER_LANGUAGES;

const MEL_FILTERS_REPO: &str = "FL33TW00D-HF/whisper-base";
const MAX_DECODE_TOKENS: usize = 224;

/// Local Whisper inference on candle with language detection and beam search.
///
/// The model keeps a mutable KV cache, so inference holds a lock for the
/// duration of a request and runs on the blocking thread pool.
pub struct CandleWhisperEngine {
    runtime: Arc<WhisperRuntime>,
}

struct WhisperRuntime {
    model: Mutex<m::model::Whisper>,
    tokenizer: Tokenizer,
    config: Config,
    device: Device,
    mel_filters: Vec<f32>,
    tokens: SpecialTokens,
    language_tokens: Vec<(&'static str, u32)>,
    suppress_mask: Tensor,
}

struct SpecialTokens {
    sot: u32,
    transcribe: u32,
    no_timestamps: u32,
    eot: u32,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    log_prob: f32,
}

impl Hypothesis {
    /// Length-normalized score so long hypotheses are not penalized.
    fn score(&self, prompt_len: usize) -> f32 {
        let generated = self.tokens.len().saturating_sub(prompt_len).max(1);
        self.log_prob / generated as f32
    }
}

impl CandleWhisperEngine {
    pub fn new(model_id: &str) -> Result<Self, TranscriptionError> {
        let device = Device::cuda_if_available(0)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("device: {}", e)))?;

        tracing::info!(
            device = ?device,
            model = model_id,
            "Initializing Candle Whisper transcription engine"
        );

        let api = Api::new().map_err(|e| TranscriptionError::ModelLoadFailed(e.to_string()))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));
        let fetch = |file: &str| {
            repo.get(file)
                .map_err(|e| TranscriptionError::ModelLoadFailed(format!("{}: {}", file, e)))
        };
        let config_path = fetch("config.json")?;
        let tokenizer_path = fetch("tokenizer.json")?;
        let weights_path = fetch("model.safetensors")?;
        let mel_bytes_path = api
            .repo(Repo::new(MEL_FILTERS_REPO.to_string(), RepoType::Model))
            .get("melfilters.bytes")
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("melfilters.bytes: {}", e)))?;

        let config_contents = std::fs::read_to_string(&config_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("read config: {}", e)))?;
        let config: Config = serde_json::from_str(&config_contents)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("parse config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("tokenizer: {}", e)))?;
        let tokens = SpecialTokens {
            sot: token_id(&tokenizer, m::SOT_TOKEN)?,
            transcribe: token_id(&tokenizer, m::TRANSCRIBE_TOKEN)?,
            no_timestamps: token_id(&tokenizer, m::NO_TIMESTAMPS_TOKEN)?,
            eot: token_id(&tokenizer, m::EOT_TOKEN)?,
        };
        let language_tokens: Vec<(&'static str, u32)> = WHISPER_LANGUAGES
            .iter()
            .filter_map(|(code, _)| {
                tokenizer
                    .token_to_id(&format!("<|{}|>", code))
                    .map(|id| (*code, id))
            })
            .collect();

        let mel_bytes = std::fs::read(&mel_bytes_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("mel filters: {}", e)))?;
        let mel_filters = read_mel_filters(&mel_bytes, &config)?;
        let suppress_mask = build_suppress_mask(&config, &tokens, &device)?;

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)
                .map_err(|e| TranscriptionError::ModelLoadFailed(format!("weights: {}", e)))?
        };
        let model = m::model::Whisper::load(&vb, config.clone())
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("model: {}", e)))?;

        tracing::info!(
            languages = language_tokens.len(),
            "Candle Whisper engine loaded successfully"
        );

        Ok(Self {
            runtime: Arc::new(WhisperRuntime {
                model: Mutex::new(model),
                tokenizer,
                config,
                device,
                mel_filters,
                tokens,
                language_tokens,
                suppress_mask,
            }),
        })
    }
}

#[async_trait]
impl TranscriptionEngine for CandleWhisperEngine {
    async fn transcribe(
        &self,
        audio_data: &[u8],
        options: &DecodingOptions,
    ) -> Result<Transcript, TranscriptionError> {
        let runtime = Arc::clone(&self.runtime);
        let audio = audio_data.to_vec();
        let beam_size = options.beam_size.max(1);

        tokio::task::spawn_blocking(move || runtime.transcribe(&audio, beam_size))
            .await
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("inference task: {}", e)))?
    }
}

impl WhisperRuntime {
    fn transcribe(&self, audio: &[u8], beam_size: usize) -> Result<Transcript, TranscriptionError> {
        let pcm = decode_audio_to_pcm(audio)?;
        let mels = pcm
            .chunks(m::N_SAMPLES)
            .map(|chunk| self.mel_tensor(chunk))
            .collect::<Result<Vec<_>, _>>()?;

        let mut model = self
            .model
            .lock()
            .map_err(|_| TranscriptionError::TranscriptionFailed("model lock poisoned".to_string()))?;

        let mut language: Option<(&'static str, u32)> = None;
        let mut segments = Vec::with_capacity(mels.len());

        for (i, mel) in mels.iter().enumerate() {
            let audio_features = model
                .encoder
                .forward(mel, true)
                .map_err(failed("encoder"))?;

            if i == 0 {
                language = self.detect_language(&mut model, &audio_features)?;
                tracing::debug!(
                    language = language.map(|(code, _)| code).unwrap_or("none"),
                    "Detected spoken language"
                );
            }

            let mut prompt = vec![self.tokens.sot];
            if let Some((_, token)) = language {
                prompt.push(token);
            }
            prompt.extend([self.tokens.transcribe, self.tokens.no_timestamps]);

            tracing::debug!(segment = i, beam_size, "Transcribing audio segment");
            let text = self.beam_search(&mut model, &audio_features, &prompt, beam_size)?;
            if !text.is_empty() {
                segments.push(Segment::new(text));
            }
        }

        model.reset_kv_cache();

        Ok(Transcript::new(
            segments,
            language.map(|(code, _)| code.to_string()),
        ))
    }

    fn mel_tensor(&self, chunk: &[f32]) -> Result<Tensor, TranscriptionError> {
        let mut samples = chunk.to_vec();
        samples.resize(m::N_SAMPLES, 0.0);

        let mel = m::audio::pcm_to_mel(&self.config, &samples, &self.mel_filters);
        let n_mel = self.config.num_mel_bins;
        let n_frames = mel.len() / n_mel;

        Tensor::from_vec(mel, (1, n_mel, n_frames), &self.device).map_err(failed("mel tensor"))
    }

    /// Picks the language token with the highest logit after the SOT token.
    /// Returns `None` for English-only models, which carry no language tokens.
    fn detect_language(
        &self,
        model: &mut m::model::Whisper,
        audio_features: &Tensor,
    ) -> Result<Option<(&'static str, u32)>, TranscriptionError> {
        if self.language_tokens.is_empty() {
            return Ok(None);
        }

        let logits = self.next_token_logits(model, audio_features, &[self.tokens.sot])?;
        let logits = logits.to_vec1::<f32>().map_err(failed("language logits"))?;

        Ok(self
            .language_tokens
            .iter()
            .filter_map(|(code, id)| logits.get(*id as usize).map(|logit| (*code, *id, *logit)))
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(code, id, _)| (code, id)))
    }

    fn beam_search(
        &self,
        model: &mut m::model::Whisper,
        audio_features: &Tensor,
        prompt: &[u32],
        beam_size: usize,
    ) -> Result<String, TranscriptionError> {
        let mut live = vec![Hypothesis {
            tokens: prompt.to_vec(),
            log_prob: 0.0,
        }];
        let mut finished: Vec<Hypothesis> = Vec::new();

        for _ in 0..MAX_DECODE_TOKENS {
            let mut candidates: Vec<(usize, u32, f32)> = Vec::new();
            for (beam, hypothesis) in live.iter().enumerate() {
                let logits = self.next_token_logits(model, audio_features, &hypothesis.tokens)?;
                let log_probs = candle_nn::ops::log_softmax(
                    &logits
                        .broadcast_add(&self.suppress_mask)
                        .map_err(failed("suppress"))?,
                    D::Minus1,
                )
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(failed("log softmax"))?;

                for (token, log_prob) in top_k(&log_probs, beam_size) {
                    candidates.push((beam, token, hypothesis.log_prob + log_prob));
                }
            }

            candidates.sort_unstable_by(|a, b| b.2.total_cmp(&a.2));

            let mut next = Vec::with_capacity(beam_size);
            for (beam, token, log_prob) in candidates {
                if next.len() == beam_size {
                    break;
                }
                let mut tokens = live[beam].tokens.clone();
                if token == self.tokens.eot {
                    finished.push(Hypothesis { tokens, log_prob });
                } else {
                    tokens.push(token);
                    next.push(Hypothesis { tokens, log_prob });
                }
            }

            live = next;
            if finished.len() >= beam_size || live.is_empty() {
                break;
            }
        }

        let pool = if finished.is_empty() { live } else { finished };
        let Some(best) = pool
            .into_iter()
            .max_by(|a, b| a.score(prompt.len()).total_cmp(&b.score(prompt.len())))
        else {
            return Ok(String::new());
        };

        let text = self
            .tokenizer
            .decode(&best.tokens[prompt.len()..], true)
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("detokenize: {}", e)))?;

        Ok(text.trim().to_string())
    }

    /// Logits for the token following `tokens`, as an f32 vector over the vocabulary.
    fn next_token_logits(
        &self,
        model: &mut m::model::Whisper,
        audio_features: &Tensor,
        tokens: &[u32],
    ) -> Result<Tensor, TranscriptionError> {
        let input = Tensor::new(tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(failed("token tensor"))?;

        let hidden = model
            .decoder
            .forward(&input, audio_features, true)
            .map_err(failed("decoder"))?;
        let last = hidden
            .i((.., tokens.len() - 1..))
            .map_err(failed("decoder output"))?;

        model
            .decoder
            .final_linear(&last)
            .and_then(|t| t.i((0, 0)))
            .and_then(|t| t.to_dtype(DType::F32))
            .map_err(failed("linear"))
    }
}

fn failed(stage: &'static str) -> impl Fn(candle_core::Error) -> TranscriptionError {
    move |e| TranscriptionError::TranscriptionFailed(format!("{}: {}", stage, e))
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32, TranscriptionError> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| TranscriptionError::ModelLoadFailed(format!("token not found: {}", token)))
}

/// Additive mask removing tokens that must never appear in transcribed text:
/// the model's configured suppress list and every special token after EOT.
fn build_suppress_mask(
    config: &Config,
    tokens: &SpecialTokens,
    device: &Device,
) -> Result<Tensor, TranscriptionError> {
    let mask: Vec<f32> = (0..config.vocab_size as u32)
        .map(|id| {
            let suppressed = config.suppress_tokens.contains(&id) || id > tokens.eot;
            if suppressed { f32::NEG_INFINITY } else { 0.0 }
        })
        .collect();

    Tensor::new(mask.as_slice(), device)
        .map_err(|e| TranscriptionError::ModelLoadFailed(format!("suppress mask: {}", e)))
}

fn top_k(values: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (i as u32, *v))
        .collect();

    if k == 0 {
        return Vec::new();
    }
    if indexed.len() > k {
        indexed.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
    }
    indexed.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));
    indexed
}

fn read_mel_filters(bytes: &[u8], config: &Config) -> Result<Vec<f32>, TranscriptionError> {
    let expected_len = config.num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(TranscriptionError::ModelLoadFailed(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
