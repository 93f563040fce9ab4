use crate::device_slot::{
    DeviceChangedCallback, OpenMode, PcmDeviceSlot, SharedDeviceSlot, SharedPcmDevice,
};
use crate::negotiate::negotiate_config;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};
use tuner_ports::audio::{
    AudioError, AudioHostPort, AudioInterface, AudioStreamHandle, PcmStreamIo,
};
use tuner_ports::storage::{SettingsDto, StoragePort};
use tuner_ports::types::{AudioConfig, AudioDeviceInfo, AudioMode, SampleFormat};

pub const DEFAULT_BUFFER_SIZE_MS: u32 = 100;

/// Format published to PCM devices. Written by the endpoint, read from the
/// audio callback thread.
#[derive(Debug)]
pub struct NegotiatedFormat {
    sample_rate: AtomicU32,
    channels: AtomicU16,
    sample_format: AtomicU8,
}

impl NegotiatedFormat {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            sample_rate: AtomicU32::new(config.sample_rate_hz),
            channels: AtomicU16::new(config.channels),
            sample_format: AtomicU8::new(format_to_bits(config.sample_format)),
        }
    }

    pub fn store(&self, config: AudioConfig) {
        self.sample_rate.store(config.sample_rate_hz, Ordering::Relaxed);
        self.channels.store(config.channels, Ordering::Relaxed);
        self.sample_format
            .store(format_to_bits(config.sample_format), Ordering::Relaxed);
    }

    pub fn load(&self) -> AudioConfig {
        AudioConfig {
            sample_rate_hz: self.sample_rate.load(Ordering::Relaxed),
            channels: self.channels.load(Ordering::Relaxed),
            sample_format: format_from_bits(self.sample_format.load(Ordering::Relaxed)),
        }
    }
}

impl AudioInterface for NegotiatedFormat {
    fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    fn channel_count(&self) -> u16 {
        self.channels.load(Ordering::Relaxed)
    }

    fn sample_format(&self) -> SampleFormat {
        format_from_bits(self.sample_format.load(Ordering::Relaxed))
    }
}

fn format_to_bits(format: SampleFormat) -> u8 {
    match format {
        SampleFormat::Unknown => 0,
        SampleFormat::UInt8 => 1,
        SampleFormat::Int16 => 2,
        SampleFormat::Int32 => 3,
        SampleFormat::Float => 4,
    }
}

fn format_from_bits(bits: u8) -> SampleFormat {
    match bits {
        1 => SampleFormat::UInt8,
        2 => SampleFormat::Int16,
        3 => SampleFormat::Int32,
        4 => SampleFormat::Float,
        _ => SampleFormat::Unknown,
    }
}

/// One direction of audio I/O: device selection, format negotiation, the
/// backend stream, and the slot the application binds its PCM device to.
pub struct AudioEndpoint {
    mode: AudioMode,
    host: Arc<dyn AudioHostPort>,
    storage: Option<Arc<dyn StoragePort>>,
    format: Arc<NegotiatedFormat>,
    slot: Arc<SharedDeviceSlot>,
    device: Option<AudioDeviceInfo>,
    buffer_size_ms: u32,
    stream: Option<Box<dyn AudioStreamHandle>>,
}

impl AudioEndpoint {
    pub fn new(
        mode: AudioMode,
        host: Arc<dyn AudioHostPort>,
        storage: Option<Arc<dyn StoragePort>>,
    ) -> Self {
        let format = Arc::new(NegotiatedFormat::new(AudioConfig {
            sample_rate_hz: mode.default_sample_rate(),
            channels: mode.default_channels(),
            sample_format: SampleFormat::Float,
        }));
        let weak: Weak<NegotiatedFormat> = Arc::downgrade(&format);
        let interface: Weak<dyn AudioInterface> = weak;
        let slot = Arc::new(SharedDeviceSlot::new(PcmDeviceSlot::new(interface)));

        Self {
            mode,
            host,
            storage,
            format,
            slot,
            device: None,
            buffer_size_ms: DEFAULT_BUFFER_SIZE_MS,
            stream: None,
        }
    }

    /// Restores the saved selection for this direction and opens the stream.
    pub fn init(&mut self) -> Result<(), AudioError> {
        let saved = self.load_settings().audio(self.mode).clone();
        let device = self.resolve_device(saved.device_name.as_deref())?;

        let current = self.format.load();
        let sample_rate = saved.sample_rate_hz.unwrap_or(current.sample_rate_hz);
        let channels = match self.mode {
            AudioMode::Input => 1,
            AudioMode::Output => saved.channels.unwrap_or(current.channels),
        };
        let buffer_size_ms = saved.buffer_size_ms.unwrap_or(DEFAULT_BUFFER_SIZE_MS);

        self.reinitialize(sample_rate, channels, device, buffer_size_ms)
    }

    pub fn reinitialize(
        &mut self,
        sample_rate_hz: u32,
        channels: u16,
        device: AudioDeviceInfo,
        buffer_size_ms: u32,
    ) -> Result<(), AudioError> {
        self.exit();

        let requested = AudioConfig {
            sample_rate_hz,
            channels,
            sample_format: SampleFormat::Float,
        };
        self.format.store(requested);
        self.device = Some(device.clone());
        self.buffer_size_ms = buffer_size_ms;

        let mode = self.mode;
        let host = &self.host;
        let preferred = host
            .preferred_config(mode, &device.id)
            .map_err(|err| debug!(%err, "no preferred config"))
            .ok();
        let config = negotiate_config(
            requested,
            |config| {
                host.is_config_supported(mode, &device.id, config)
                    .unwrap_or_else(|err| {
                        warn!(%err, "format query failed");
                        false
                    })
            },
            preferred,
        )?;
        self.format.store(config);

        if !self.slot.lock().open(OpenMode::for_mode(mode)) {
            return Err(AudioError::Backend("pcm slot could not be opened".to_string()));
        }

        let io: Arc<dyn PcmStreamIo> = self.slot.clone();
        let stream = match self
            .host
            .open_stream(mode, &device.id, config, buffer_size_ms, io)
        {
            Ok(stream) => stream,
            Err(err) => {
                error!(%err, "error creating audio device");
                self.slot.lock().close();
                return Err(err);
            }
        };
        self.stream = Some(stream);

        info!(
            mode = %mode,
            device = %device.name,
            sample_rate = config.sample_rate_hz,
            channels = config.channels,
            format = %config.sample_format,
            "initialized audio"
        );

        self.persist(config, &device.name, buffer_size_ms);
        Ok(())
    }

    /// Stops the backend stream and closes the bound device.
    pub fn exit(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
            self.slot.lock().close();
            debug!(mode = %self.mode, "audio stream closed");
        }
    }

    fn resolve_device(&self, saved_name: Option<&str>) -> Result<AudioDeviceInfo, AudioError> {
        if let Some(name) = saved_name.filter(|name| !name.is_empty()) {
            match self.host.list_devices(self.mode) {
                Ok(devices) => {
                    if let Some(device) = devices.into_iter().find(|d| d.name == name) {
                        return Ok(device);
                    }
                    warn!(device = name, "saved audio device not found, using default");
                }
                Err(err) => warn!(%err, "listing audio devices failed, using default"),
            }
        }

        self.host
            .default_device(self.mode)?
            .ok_or_else(|| AudioError::DeviceUnavailable(format!("no default {} device", self.mode)))
    }

    fn load_settings(&self) -> SettingsDto {
        match self.storage.as_ref() {
            Some(storage) => storage.load_settings().unwrap_or_else(|err| {
                warn!(%err, "failed to load settings, using defaults");
                SettingsDto::default()
            }),
            None => SettingsDto::default(),
        }
    }

    fn persist(&self, config: AudioConfig, device_name: &str, buffer_size_ms: u32) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };

        let mut settings = self.load_settings();
        let entry = settings.audio_mut(self.mode);
        entry.sample_rate_hz = Some(config.sample_rate_hz);
        entry.channels = Some(config.channels);
        entry.device_name = Some(device_name.to_string());
        entry.buffer_size_ms = Some(buffer_size_ms);

        if let Err(err) = storage.save_settings(&settings) {
            warn!(%err, "failed to save audio settings");
        }
    }

    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    pub fn device_info(&self) -> Option<&AudioDeviceInfo> {
        self.device.as_ref()
    }

    pub fn device_name(&self) -> &str {
        self.device.as_ref().map(|d| d.name.as_str()).unwrap_or("")
    }

    pub fn buffer_size_ms(&self) -> u32 {
        self.buffer_size_ms
    }

    pub fn config(&self) -> AudioConfig {
        self.format.load()
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate()
    }

    pub fn channel_count(&self) -> u16 {
        self.format.channel_count()
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.format.sample_format()
    }

    pub fn device(&self) -> Option<SharedPcmDevice> {
        self.slot.lock().device()
    }

    pub fn set_device(&self, device: Option<&SharedPcmDevice>) {
        self.slot.lock().set_device(device);
    }

    pub fn on_device_changed(&self, cb: DeviceChangedCallback) {
        self.slot.lock().on_device_changed(cb);
    }

    pub fn bytes_available(&self) -> usize {
        self.slot.lock().bytes_available()
    }
}

impl Drop for AudioEndpoint {
    fn drop(&mut self) {
        self.exit();
    }
}
