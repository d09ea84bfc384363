//! WAV container wrapping for transcription uploads
//!
//! Providers expect a RIFF/WAVE file, while the capture pipeline hands us
//! raw little-endian PCM. The header is derived from the recording snapshot
//! so chunk sizes always match the payload.

use crate::config::RecordingConfig;
use crate::error::TranscribeError;
use std::io::Cursor;

const BITS_PER_SAMPLE: u16 = 16;

/// Wrap raw s16le PCM bytes in a WAV container
pub fn encode_wav(pcm: &[u8], config: &RecordingConfig) -> Result<Vec<u8>, TranscribeError> {
    if pcm.len() % 2 != 0 {
        return Err(TranscribeError::AudioFormat(format!(
            "PCM length {} is not 16-bit sample aligned",
            pcm.len()
        )));
    }

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut buffer, spec).map_err(|e| {
        TranscribeError::AudioFormat(format!("failed to create WAV writer: {}", e))
    })?;

    for sample in pcm.chunks_exact(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]);
        writer
            .write_sample(value)
            .map_err(|e| TranscribeError::AudioFormat(format!("failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| TranscribeError::AudioFormat(format!("failed to finalize WAV: {}", e)))?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes_match_payload() {
        let config = RecordingConfig::default();
        let pcm: Vec<u8> = (0..32000u32).map(|i| (i % 256) as u8).collect();

        let wav = encode_wav(&pcm, &config).unwrap();

        // 44-byte canonical header followed by the payload
        assert_eq!(wav.len(), 44 + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        // data chunk size field equals the PCM payload length
        let data_len = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_len as usize, pcm.len());
    }

    #[test]
    fn test_round_trip_recovers_pcm_byte_for_byte() {
        let config = RecordingConfig::default();
        let pcm: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();

        let wav = encode_wav(&pcm, &config).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, config.channels);
        assert_eq!(spec.sample_rate, config.sample_rate);
        assert_eq!(spec.bits_per_sample, 16);

        let decoded: Vec<u8> = reader
            .samples::<i16>()
            .map(|s| s.unwrap().to_le_bytes())
            .flat_map(|b| b.into_iter())
            .collect();
        assert_eq!(decoded, pcm);
    }

    #[test]
    fn test_unaligned_pcm_rejected() {
        let config = RecordingConfig::default();
        assert!(matches!(
            encode_wav(&[0u8; 3], &config),
            Err(TranscribeError::AudioFormat(_))
        ));
    }

    #[test]
    fn test_empty_payload_still_valid_container() {
        let config = RecordingConfig::default();
        let wav = encode_wav(&[], &config).unwrap();
        assert_eq!(wav.len(), 44);

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
