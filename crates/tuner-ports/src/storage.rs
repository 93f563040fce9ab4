use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// Persisted selection for one direction. Missing fields fall back to the
/// endpoint defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioDirectionSettings {
    pub sample_rate_hz: Option<u32>,
    pub channels: Option<u16>,
    pub device_name: Option<String>,
    pub buffer_size_ms: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub audio_input: AudioDirectionSettings,
    pub audio_output: AudioDirectionSettings,
}

impl SettingsDto {
    pub fn audio(&self, mode: AudioMode) -> &AudioDirectionSettings {
        match mode {
            AudioMode::Input => &self.audio_input,
            AudioMode::Output => &self.audio_output,
        }
    }

    pub fn audio_mut(&mut self, mode: AudioMode) -> &mut AudioDirectionSettings {
        match mode {
            AudioMode::Input => &mut self.audio_input,
            AudioMode::Output => &mut self.audio_output,
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}
