use hound::WavReader;
use std::io::Cursor;

/// Duration of an in-memory WAV file. Fails for anything that is not WAV.
pub fn wav_duration_seconds(bytes: &[u8]) -> anyhow::Result<f64> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_generated_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buf, spec).unwrap();
            for _ in 0..8_000 {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        let secs = wav_duration_seconds(buf.get_ref()).unwrap();
        assert!((secs - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_wav() {
        assert!(wav_duration_seconds(b"ID3 not a wav").is_err());
    }
}
