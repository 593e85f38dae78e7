// 16-bit PCM WAV export through hound. Mono and stereo specs get the plain
// PCM fmt chunk, so the header is the canonical 44 bytes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use super::SampleBuffer;
use crate::error::{Error, Result};

pub const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

fn wav_spec(buffer: &SampleBuffer) -> hound::WavSpec {
    hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

pub fn write_wav<W: Write + Seek>(buffer: &SampleBuffer, w: W) -> Result<()> {
    let mut writer = hound::WavWriter::new(w, wav_spec(buffer))?;
    for &s in buffer.samples() {
        writer.write_sample(quantize(s))?;
    }
    writer.finalize()?;
    Ok(())
}

pub fn encode_wav(buffer: &SampleBuffer) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::with_capacity(HEADER_LEN + buffer.len() * 2));
    write_wav(buffer, &mut out)?;
    Ok(out.into_inner())
}

pub fn export_wav(buffer: &SampleBuffer, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_wav(buffer, BufWriter::new(file))?;
    log::info!(
        "Exported {} samples ({}Hz, {} ch) to {}",
        buffer.len(),
        buffer.sample_rate(),
        buffer.channels(),
        path.display()
    );
    Ok(())
}

/// Parse 16-bit PCM WAV bytes. Samples stay interleaved when the file has more
/// than one channel.
pub fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer> {
    read_pcm16(hound::WavReader::new(Cursor::new(bytes))?)
}

pub fn read_wav(path: &Path) -> Result<SampleBuffer> {
    read_pcm16(hound::WavReader::new(BufReader::new(File::open(path)?))?)
}

fn read_pcm16<R: Read>(reader: hound::WavReader<R>) -> Result<SampleBuffer> {
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != BITS_PER_SAMPLE {
        return Err(Error::InvalidWav(format!(
            "unsupported {:?} format with {} bits (16-bit PCM only)",
            spec.sample_format, spec.bits_per_sample
        )));
    }
    let samples = reader
        .into_samples::<i16>()
        .map(|s| s.map(dequantize))
        .collect::<std::result::Result<Vec<f32>, _>>()?;
    SampleBuffer::new(samples, spec.sample_rate, spec.channels)
}

fn quantize(s: f32) -> i16 {
    let s = s.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

fn dequantize(v: i16) -> f32 {
    if v < 0 {
        v as f32 / 32768.0
    } else {
        v as f32 / 32767.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| ((i as f32 / n as f32) * 2.0 - 1.0) * 0.9)
            .collect()
    }

    fn le_u32(bytes: &[u8]) -> u32 {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    #[test]
    fn header_is_44_bytes() {
        let buf = SampleBuffer::mono(vec![0.0; 100], 16000).unwrap();
        let bytes = encode_wav(&buf).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 200);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(le_u32(&bytes[4..8]), 36 + 200);
        assert_eq!(le_u32(&bytes[40..44]), 200);
    }

    #[test]
    fn round_trip_within_quantization() {
        let samples = sweep(4800);
        let buf = SampleBuffer::mono(samples.clone(), 48000).unwrap();
        let back = decode_wav(&encode_wav(&buf).unwrap()).unwrap();
        assert_eq!(back.sample_rate(), 48000);
        assert_eq!(back.channels(), 1);
        assert_eq!(back.len(), samples.len());
        for (a, b) in samples.iter().zip(back.samples()) {
            assert!((a - b).abs() <= 1.0 / 32767.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn clips_out_of_range_samples() {
        assert_eq!(quantize(1.5), i16::MAX);
        assert_eq!(quantize(-1.5), i16::MIN);
    }

    #[test]
    fn stereo_stays_interleaved() {
        let buf = SampleBuffer::new(vec![0.5, -0.5, 0.25, -0.25], 22050, 2).unwrap();
        let back = decode_wav(&encode_wav(&buf).unwrap()).unwrap();
        assert_eq!(back.channels(), 2);
        assert!((back.samples()[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn rejects_non_wav_bytes() {
        let err = decode_wav(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, Error::Wav(_)));
    }

    #[test]
    fn rejects_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut out = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut out, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.finalize().unwrap();
        let err = decode_wav(out.get_ref()).unwrap_err();
        assert!(matches!(err, Error::InvalidWav(_)));
    }

    #[test]
    fn file_round_trip() {
        let mut path = std::env::temp_dir();
        path.push("tonescope_wav_round_trip.wav");
        let _ = std::fs::remove_file(&path);
        let buf = SampleBuffer::mono(sweep(1000), 44100).unwrap();
        export_wav(&buf, &path).unwrap();
        let back = read_wav(&path).unwrap();
        assert_eq!(back.len(), 1000);
        let _ = std::fs::remove_file(&path);
    }
}
