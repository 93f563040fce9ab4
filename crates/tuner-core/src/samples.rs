use tuner_ports::types::SampleFormat;

/// Decodes native-endian PCM bytes into samples scaled to about [-1, 1].
///
/// Trailing bytes that do not fill a whole sample are ignored. `Unknown`
/// decodes to nothing.
pub fn decode_normalized(bytes: &[u8], format: SampleFormat) -> Vec<f32> {
    let max = format.max_value();
    match format {
        SampleFormat::UInt8 => {
            let mid = (max + 1.0) / 2.0;
            bytes
                .iter()
                .map(|&b| ((b as f64 - mid) / mid) as f32)
                .collect()
        }
        SampleFormat::Int16 => bytes
            .chunks_exact(2)
            .map(|c| (i16::from_ne_bytes([c[0], c[1]]) as f64 / max) as f32)
            .collect(),
        SampleFormat::Int32 => bytes
            .chunks_exact(4)
            .map(|c| (i32::from_ne_bytes([c[0], c[1], c[2], c[3]]) as f64 / max) as f32)
            .collect(),
        SampleFormat::Float => bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        SampleFormat::Unknown => Vec::new(),
    }
}

/// Largest absolute sample value, 0 for empty input.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}
