use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tuner_core::{AudioEndpoint, RecordingDevice, SharedPcmDevice, DEFAULT_BUFFER_SIZE_MS};
use tuner_ports::{
    AudioConfig, AudioDeviceInfo, AudioDirectionSettings, AudioError, AudioHostPort, AudioMode,
    AudioStreamHandle, DeviceId, PcmDevice, PcmStreamIo, SampleFormat, SettingsDto, StorageError,
    StoragePort,
};

#[derive(Default)]
struct MemoryStorage {
    settings: Mutex<SettingsDto>,
    saves: Mutex<usize>,
}

impl StoragePort for MemoryStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        Ok(self.settings.lock().clone())
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        *self.settings.lock() = s.clone();
        *self.saves.lock() += 1;
        Ok(())
    }
}

struct FakeStream {
    closed: Arc<Mutex<usize>>,
}

impl AudioStreamHandle for FakeStream {
    fn close(self: Box<Self>) {
        *self.closed.lock() += 1;
    }
}

/// Two devices; accepts any float config and prefers 48 kHz stereo int16.
struct FakeHost {
    devices: Vec<AudioDeviceInfo>,
    accept_float: bool,
    preferred: Option<AudioConfig>,
    opened: Mutex<Vec<(DeviceId, AudioConfig, u32)>>,
    io: Mutex<Option<Arc<dyn PcmStreamIo>>>,
    closed: Arc<Mutex<usize>>,
}

impl FakeHost {
    fn new() -> Self {
        let device = |id: &str, name: &str| AudioDeviceInfo {
            id: DeviceId(id.to_string()),
            name: name.to_string(),
            default_config: None,
        };
        Self {
            devices: vec![device("dev:0", "Built-in"), device("dev:1", "USB Mic")],
            accept_float: true,
            preferred: Some(AudioConfig {
                sample_rate_hz: 48_000,
                channels: 2,
                sample_format: SampleFormat::Int16,
            }),
            opened: Mutex::new(Vec::new()),
            io: Mutex::new(None),
            closed: Arc::new(Mutex::new(0)),
        }
    }

    fn io(&self) -> Arc<dyn PcmStreamIo> {
        self.io.lock().clone().expect("stream opened")
    }
}

impl AudioHostPort for FakeHost {
    fn list_devices(&self, _mode: AudioMode) -> Result<Vec<AudioDeviceInfo>, AudioError> {
        Ok(self.devices.clone())
    }

    fn default_device(&self, _mode: AudioMode) -> Result<Option<AudioDeviceInfo>, AudioError> {
        Ok(self.devices.first().cloned())
    }

    fn is_config_supported(
        &self,
        _mode: AudioMode,
        _device_id: &DeviceId,
        config: &AudioConfig,
    ) -> Result<bool, AudioError> {
        let is_preferred = Some(*config) == self.preferred;
        Ok(is_preferred || (self.accept_float && config.sample_format == SampleFormat::Float))
    }

    fn preferred_config(
        &self,
        _mode: AudioMode,
        device_id: &DeviceId,
    ) -> Result<AudioConfig, AudioError> {
        self.preferred
            .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string()))
    }

    fn open_stream(
        &self,
        _mode: AudioMode,
        device_id: &DeviceId,
        config: AudioConfig,
        buffer_size_ms: u32,
        io: Arc<dyn PcmStreamIo>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        self.opened
            .lock()
            .push((device_id.clone(), config, buffer_size_ms));
        *self.io.lock() = Some(io);
        Ok(Box::new(FakeStream {
            closed: self.closed.clone(),
        }))
    }
}

fn endpoint(
    mode: AudioMode,
    host: &Arc<FakeHost>,
    storage: &Arc<MemoryStorage>,
) -> AudioEndpoint {
    let host: Arc<dyn AudioHostPort> = host.clone();
    let storage: Arc<dyn StoragePort> = storage.clone();
    AudioEndpoint::new(mode, host, Some(storage))
}

#[test]
fn defaults_before_init() {
    let host = Arc::new(FakeHost::new());
    let storage = Arc::new(MemoryStorage::default());
    let input = endpoint(AudioMode::Input, &host, &storage);
    let output = endpoint(AudioMode::Output, &host, &storage);

    assert_eq!(input.sample_rate(), 44_100);
    assert_eq!(input.channel_count(), 1);
    assert_eq!(output.sample_rate(), 22_050);
    assert_eq!(output.channel_count(), 2);
    assert_eq!(output.sample_format(), SampleFormat::Float);
    assert_eq!(input.device_name(), "");
    assert!(!input.is_running());
}

#[test]
fn init_uses_default_device_and_persists_selection() {
    let host = Arc::new(FakeHost::new());
    let storage = Arc::new(MemoryStorage::default());
    let mut output = endpoint(AudioMode::Output, &host, &storage);

    output.init().expect("init");

    assert!(output.is_running());
    assert_eq!(output.device_name(), "Built-in");
    assert_eq!(output.buffer_size_ms(), DEFAULT_BUFFER_SIZE_MS);
    assert_eq!(
        storage.settings.lock().audio(AudioMode::Output),
        &AudioDirectionSettings {
            sample_rate_hz: Some(22_050),
            channels: Some(2),
            device_name: Some("Built-in".to_string()),
            buffer_size_ms: Some(100),
        }
    );
    assert_eq!(
        storage.settings.lock().audio(AudioMode::Input),
        &AudioDirectionSettings::default()
    );
}

#[test]
fn init_restores_saved_device_and_forces_mono_input() {
    let host = Arc::new(FakeHost::new());
    let storage = Arc::new(MemoryStorage::default());
    *storage.settings.lock().audio_mut(AudioMode::Input) = AudioDirectionSettings {
        sample_rate_hz: Some(48_000),
        channels: Some(2),
        device_name: Some("USB Mic".to_string()),
        buffer_size_ms: Some(40),
    };
    let mut input = endpoint(AudioMode::Input, &host, &storage);

    input.init().expect("init");

    let opened = host.opened.lock().clone();
    assert_eq!(
        opened,
        vec![(
            DeviceId("dev:1".to_string()),
            AudioConfig {
                sample_rate_hz: 48_000,
                channels: 1,
                sample_format: SampleFormat::Float,
            },
            40,
        )]
    );
    assert_eq!(input.channel_count(), 1);
    assert_eq!(input.buffer_size_ms(), 40);
}

#[test]
fn unknown_saved_device_falls_back_to_default() {
    let host = Arc::new(FakeHost::new());
    let storage = Arc::new(MemoryStorage::default());
    storage.settings.lock().audio_mut(AudioMode::Output).device_name =
        Some("Unplugged".to_string());
    let mut output = endpoint(AudioMode::Output, &host, &storage);

    output.init().expect("init");
    assert_eq!(output.device_name(), "Built-in");
}

#[test]
fn reinitialize_falls_back_to_preferred_format() {
    let mut host = FakeHost::new();
    host.accept_float = false;
    let host = Arc::new(host);
    let storage = Arc::new(MemoryStorage::default());
    let mut output = endpoint(AudioMode::Output, &host, &storage);
    let device = host.devices[1].clone();

    output
        .reinitialize(44_100, 2, device, 80)
        .expect("reinitialize");

    assert_eq!(output.sample_rate(), 48_000);
    assert_eq!(output.sample_format(), SampleFormat::Int16);
    assert_eq!(output.device_name(), "USB Mic");
    assert_eq!(
        storage.settings.lock().audio(AudioMode::Output).sample_rate_hz,
        Some(48_000)
    );
}

#[test]
fn failed_negotiation_leaves_endpoint_stopped() {
    let mut host = FakeHost::new();
    host.accept_float = false;
    host.preferred = None;
    let host = Arc::new(host);
    let storage = Arc::new(MemoryStorage::default());
    let mut output = endpoint(AudioMode::Output, &host, &storage);
    let device = host.devices[0].clone();

    let err = output.reinitialize(44_100, 2, device, 80).unwrap_err();

    assert!(matches!(err, AudioError::DeviceUnavailable(_)));
    assert!(!output.is_running());
    assert!(host.opened.lock().is_empty());
    assert_eq!(*storage.saves.lock(), 0);
}

#[test]
fn captured_bytes_reach_bound_recorder() {
    let host = Arc::new(FakeHost::new());
    let storage = Arc::new(MemoryStorage::default());
    let mut input = endpoint(AudioMode::Input, &host, &storage);
    input.init().expect("init");

    let recorder = Arc::new(Mutex::new(RecordingDevice::new(1024)));
    let shared: SharedPcmDevice = recorder.clone();
    input.set_device(Some(&shared));

    assert_eq!(recorder.lock().sample_rate(), 44_100);
    assert_eq!(input.bytes_available(), 44_100 * 4);

    let io = host.io();
    assert_eq!(io.write(&[1, 2, 3, 4]), 4);
    assert_eq!(recorder.lock().take_recorded(), vec![1, 2, 3, 4]);

    input.exit();
    assert_eq!(*host.closed.lock(), 1);
    assert_eq!(recorder.lock().sample_rate(), 0);
}

#[test]
fn output_without_device_plays_silence() {
    let host = Arc::new(FakeHost::new());
    let storage = Arc::new(MemoryStorage::default());
    let mut output = endpoint(AudioMode::Output, &host, &storage);
    output.init().expect("init");

    let mut buf = [5u8; 32];
    assert_eq!(host.io().read(&mut buf), 32);
    assert_eq!(buf, [0u8; 32]);
}

#[test]
fn reinitialize_closes_previous_stream() {
    let host = Arc::new(FakeHost::new());
    let storage = Arc::new(MemoryStorage::default());
    let mut output = endpoint(AudioMode::Output, &host, &storage);
    output.init().expect("init");
    let device = host.devices[1].clone();

    output
        .reinitialize(22_050, 2, device, 100)
        .expect("reinitialize");

    assert_eq!(*host.closed.lock(), 1);
    assert_eq!(host.opened.lock().len(), 2);
    drop(output);
    assert_eq!(*host.closed.lock(), 2);
}

#[test]
fn device_change_notification_reaches_observer() {
    let host = Arc::new(FakeHost::new());
    let output = endpoint(AudioMode::Output, &host, &Arc::new(MemoryStorage::default()));
    let seen = Arc::new(Mutex::new(0usize));
    let sink = seen.clone();
    output.on_device_changed(Box::new(move |_device: Option<&SharedPcmDevice>| {
        *sink.lock() += 1;
    }));

    let recorder: SharedPcmDevice = Arc::new(Mutex::new(RecordingDevice::new(8)));
    output.set_device(Some(&recorder));
    output.set_device(Some(&recorder));

    assert_eq!(*seen.lock(), 1);
    assert!(output.device().is_some());
}
