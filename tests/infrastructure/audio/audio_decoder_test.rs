use parlance::application::ports::TranscriptionError;
use parlance::infrastructure::audio::audio_decoder::{TARGET_SAMPLE_RATE, decode_audio_to_pcm};

fn build_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_size = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;

    let mut wav = Vec::with_capacity(44 + data_size as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for &s in samples {
        wav.extend_from_slice(&s.to_le_bytes());
    }
    wav
}

#[test]
fn given_16khz_mono_wav_when_decoding_then_returns_same_number_of_samples() {
    let wav = build_wav(TARGET_SAMPLE_RATE, 1, &vec![1000i16; 1600]);

    let pcm = decode_audio_to_pcm(&wav).unwrap();

    assert_eq!(pcm.len(), 1600);
}

#[test]
fn given_stereo_wav_when_decoding_then_downmixes_to_mono() {
    let frames = 800;
    let mut samples = Vec::with_capacity(frames * 2);
    for _ in 0..frames {
        samples.push(i16::MAX / 2);
        samples.push(0);
    }
    let wav = build_wav(TARGET_SAMPLE_RATE, 2, &samples);

    let pcm = decode_audio_to_pcm(&wav).unwrap();

    assert_eq!(pcm.len(), frames);
    assert!(pcm.iter().all(|s| (*s - 0.25).abs() < 0.01));
}

#[test]
fn given_44100hz_wav_when_decoding_then_resamples_to_16khz() {
    let wav = build_wav(44_100, 1, &vec![0i16; 44_100]);

    let pcm = decode_audio_to_pcm(&wav).unwrap();

    // one second of input, within a sample of rounding
    let expected = TARGET_SAMPLE_RATE as usize;
    assert!((expected - 1..=expected).contains(&pcm.len()));
}

#[test]
fn given_corrupted_bytes_when_decoding_then_returns_error() {
    let garbage = vec![0xFFu8; 128];

    let result = decode_audio_to_pcm(&garbage);

    assert!(matches!(
        result,
        Err(TranscriptionError::UnsupportedFormat(_)) | Err(TranscriptionError::DecodingFailed(_))
    ));
}

#[test]
fn given_empty_bytes_when_decoding_then_returns_decoding_error() {
    let result = decode_audio_to_pcm(&[]);

    assert!(matches!(result, Err(TranscriptionError::DecodingFailed(_))));
}
