pub mod audio_decoder;
mod candle_whisper_engine;
mod openai_whisper_engine;
mod whisper_languages;

pub use candle_whisper_engine::CandleWhisperEngine;
pub use openai_whisper_engine::OpenAiWhisperEngine;
