use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

/// Encoding of a single PCM sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleFormat {
    UInt8,
    Int16,
    Int32,
    Float,
    #[default]
    Unknown,
}

impl SampleFormat {
    /// Bytes per sample. `Unknown` is 0: no format was negotiated.
    pub fn byte_width(self) -> usize {
        match self {
            SampleFormat::UInt8 => std::mem::size_of::<u8>(),
            SampleFormat::Int16 => std::mem::size_of::<i16>(),
            SampleFormat::Int32 => std::mem::size_of::<i32>(),
            SampleFormat::Float => std::mem::size_of::<f32>(),
            SampleFormat::Unknown => 0,
        }
    }

    /// Largest representable magnitude. `Unknown` is 0.
    pub fn max_value(self) -> f64 {
        match self {
            SampleFormat::UInt8 => u8::MAX as f64,
            SampleFormat::Int16 => i16::MAX as f64,
            SampleFormat::Int32 => i32::MAX as f64,
            SampleFormat::Float => 1.0,
            SampleFormat::Unknown => 0.0,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, SampleFormat::Unknown)
    }
}

/// Direction of an audio endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioMode {
    Input,
    Output,
}

impl AudioMode {
    pub fn default_sample_rate(self) -> u32 {
        match self {
            AudioMode::Input => 44_100,
            AudioMode::Output => 22_050,
        }
    }

    pub fn default_channels(self) -> u16 {
        match self {
            AudioMode::Input => 1,
            AudioMode::Output => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioConfig {
    /// Bytes needed for one second of audio in this config.
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate_hz as usize * self.channels as usize * self.sample_format.byte_width()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub default_config: Option<AudioConfig>,
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::UInt8 => "u8",
            SampleFormat::Int16 => "i16",
            SampleFormat::Int32 => "i32",
            SampleFormat::Float => "f32",
            SampleFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioMode::Input => f.write_str("input"),
            AudioMode::Output => f.write_str("output"),
        }
    }
}
