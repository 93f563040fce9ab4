use crate::types::*;
use std::sync::{Arc, Weak};

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("unsupported config: {0}")]
    UnsupportedConfig(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Provider of the negotiated stream parameters. Read-only from the PCM side.
pub trait AudioInterface: Send + Sync {
    fn sample_rate(&self) -> u32;
    fn channel_count(&self) -> u16;
    fn sample_format(&self) -> SampleFormat;
}

/// PCM reader/writer bound to an endpoint through the device slot.
///
/// Implementations must not block: `read` returns what is available right now
/// (possibly fewer bytes than asked for) and `write` returns how much it took.
pub trait PcmDevice: Send {
    /// Panics if `interface` no longer points at a live interface.
    fn open(&mut self, interface: Weak<dyn AudioInterface>);
    fn close(&mut self);
    fn read(&mut self, buf: &mut [u8]) -> usize;
    fn write(&mut self, buf: &[u8]) -> usize;

    fn sample_rate(&self) -> u32;
    fn channel_count(&self) -> u16;
    fn sample_format(&self) -> SampleFormat;

    fn sample_size(&self) -> usize {
        self.sample_format().byte_width()
    }

    fn max_sample_value(&self) -> f64 {
        self.sample_format().max_value()
    }
}

/// Byte-level I/O handed to a backend stream. Called from the audio callback thread.
pub trait PcmStreamIo: Send + Sync + 'static {
    /// Output direction: fill `buf` with bytes to play.
    fn read(&self, buf: &mut [u8]) -> usize;
    /// Input direction: consume captured bytes.
    fn write(&self, buf: &[u8]) -> usize;
}

pub trait AudioStreamHandle: Send {
    fn close(self: Box<Self>);
}

pub trait AudioHostPort: Send + Sync {
    fn list_devices(&self, mode: AudioMode) -> Result<Vec<AudioDeviceInfo>, AudioError>;

    fn default_device(&self, mode: AudioMode) -> Result<Option<AudioDeviceInfo>, AudioError>;

    fn is_config_supported(
        &self,
        mode: AudioMode,
        device_id: &DeviceId,
        config: &AudioConfig,
    ) -> Result<bool, AudioError>;

    fn preferred_config(
        &self,
        mode: AudioMode,
        device_id: &DeviceId,
    ) -> Result<AudioConfig, AudioError>;

    fn open_stream(
        &self,
        mode: AudioMode,
        device_id: &DeviceId,
        config: AudioConfig,
        buffer_size_ms: u32,
        io: Arc<dyn PcmStreamIo>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError>;
}
