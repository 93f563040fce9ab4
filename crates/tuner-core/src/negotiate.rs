use tracing::warn;
use tuner_ports::audio::AudioError;
use tuner_ports::types::{AudioConfig, SampleFormat};

/// Formats the PCM consumers can handle when the backend forces its own.
pub fn is_fallback_format(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::Float | SampleFormat::Int16)
}

/// Picks the config to open a stream with.
///
/// The backend's preferred config is tried exactly once when `requested` is
/// rejected; there is no further search.
pub fn negotiate_config(
    requested: AudioConfig,
    is_supported: impl Fn(&AudioConfig) -> bool,
    preferred: Option<AudioConfig>,
) -> Result<AudioConfig, AudioError> {
    if is_supported(&requested) {
        return Ok(requested);
    }

    warn!(
        sample_rate = requested.sample_rate_hz,
        channels = requested.channels,
        format = %requested.sample_format,
        "raw audio format not supported by backend, falling back to nearest supported"
    );

    let fallback = match preferred {
        Some(config) if is_supported(&config) => config,
        _ => {
            warn!("fallback failed, probably there is no device available");
            return Err(AudioError::DeviceUnavailable(
                "no supported audio format".to_string(),
            ));
        }
    };

    if !is_fallback_format(fallback.sample_format) {
        warn!(format = %fallback.sample_format, "sample format not supported");
        return Err(AudioError::UnsupportedConfig(format!(
            "sample format {}",
            fallback.sample_format
        )));
    }

    Ok(fallback)
}
