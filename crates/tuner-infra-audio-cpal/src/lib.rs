use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, SampleRate, SizedSample, StreamConfig, SupportedBufferSize,
    SupportedStreamConfigRange,
};
use std::sync::{mpsc, Arc};
use std::thread;
use tracing::{error, trace};
use tuner_ports::audio::{AudioError, AudioHostPort, AudioStreamHandle, PcmStreamIo};
use tuner_ports::types::{AudioConfig, AudioDeviceInfo, AudioMode, DeviceId, SampleFormat};

pub struct CpalAudioHost {
    host: cpal::Host,
}

impl CpalAudioHost {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn with_host(host: cpal::Host) -> Self {
        Self { host }
    }

    fn device_id(host: &cpal::Host, mode: AudioMode, index: usize, name: &str) -> DeviceId {
        DeviceId(format!("cpal:{:?}:{}:{}:{}", host.id(), mode, index, name))
    }

    fn list_devices_from_host(
        host: &cpal::Host,
        mode: AudioMode,
    ) -> Result<Vec<(DeviceId, String, cpal::Device)>, AudioError> {
        let devices: Vec<cpal::Device> = match mode {
            AudioMode::Input => host
                .input_devices()
                .map_err(|e| AudioError::Backend(e.to_string()))?
                .collect(),
            AudioMode::Output => host
                .output_devices()
                .map_err(|e| AudioError::Backend(e.to_string()))?
                .collect(),
        };

        let mut list = Vec::new();
        for (index, device) in devices.into_iter().enumerate() {
            let name = device_name(&device, mode);
            let id = Self::device_id(host, mode, index, &name);
            list.push((id, name, device));
        }

        Ok(list)
    }

    fn find_device(
        host: &cpal::Host,
        mode: AudioMode,
        device_id: &DeviceId,
    ) -> Result<cpal::Device, AudioError> {
        Self::list_devices_from_host(host, mode)?
            .into_iter()
            .find(|(id, _, _)| id == device_id)
            .map(|(_, _, device)| device)
            .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string()))
    }
}

impl Default for CpalAudioHost {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CpalAudioStreamHandle {
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl AudioStreamHandle for CpalAudioStreamHandle {
    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl AudioHostPort for CpalAudioHost {
    fn list_devices(&self, mode: AudioMode) -> Result<Vec<AudioDeviceInfo>, AudioError> {
        let devices = Self::list_devices_from_host(&self.host, mode)?;
        Ok(devices
            .into_iter()
            .map(|(id, name, device)| AudioDeviceInfo {
                id,
                name,
                default_config: default_config(&device, mode).ok(),
            })
            .collect())
    }

    fn default_device(&self, mode: AudioMode) -> Result<Option<AudioDeviceInfo>, AudioError> {
        let default = match mode {
            AudioMode::Input => self.host.default_input_device(),
            AudioMode::Output => self.host.default_output_device(),
        };
        let Some(default) = default else {
            return Ok(None);
        };

        let default_name = device_name(&default, mode);
        let listed = self.list_devices(mode)?;
        let found = listed
            .iter()
            .find(|d| d.name == default_name)
            .or_else(|| listed.first())
            .cloned();
        Ok(found)
    }

    fn is_config_supported(
        &self,
        mode: AudioMode,
        device_id: &DeviceId,
        config: &AudioConfig,
    ) -> Result<bool, AudioError> {
        let device = Self::find_device(&self.host, mode, device_id)?;
        let ranges = supported_configs(&device, mode)?;
        Ok(find_matching_range(&ranges, config).is_some())
    }

    fn preferred_config(
        &self,
        mode: AudioMode,
        device_id: &DeviceId,
    ) -> Result<AudioConfig, AudioError> {
        let device = Self::find_device(&self.host, mode, device_id)?;
        default_config(&device, mode)
    }

    fn open_stream(
        &self,
        mode: AudioMode,
        device_id: &DeviceId,
        config: AudioConfig,
        buffer_size_ms: u32,
        io: Arc<dyn PcmStreamIo>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let host_id = self.host.id();
        let device_id = device_id.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel();

        // Streams are not Send on every platform, so each one lives on its own thread.
        let join_handle = thread::spawn(move || {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(err) => {
                    let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                    return;
                }
            };

            let device = match Self::find_device(&host, mode, &device_id) {
                Ok(device) => device,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            let ranges = match supported_configs(&device, mode) {
                Ok(ranges) => ranges,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            let Some((sample_format, range)) = to_cpal_format(config.sample_format)
                .and_then(|format| Some((format, find_matching_range(&ranges, &config)?)))
            else {
                let _ = ready_tx.send(Err(AudioError::UnsupportedConfig(format!(
                    "{} Hz, {} ch, {}",
                    config.sample_rate_hz, config.channels, config.sample_format
                ))));
                return;
            };

            let stream_config = StreamConfig {
                channels: config.channels,
                sample_rate: SampleRate(config.sample_rate_hz),
                buffer_size: buffer_size_frames(
                    config.sample_rate_hz,
                    buffer_size_ms,
                    range.buffer_size(),
                ),
            };

            let stream = match build_stream(&device, mode, sample_format, &stream_config, io) {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))?
        {
            Ok(()) => Ok(Box::new(CpalAudioStreamHandle {
                stop_tx,
                join_handle: Some(join_handle),
            })),
            Err(err) => Err(err),
        }
    }
}

fn device_name(device: &cpal::Device, mode: AudioMode) -> String {
    device.name().unwrap_or_else(|_| match mode {
        AudioMode::Input => "Unknown Input".to_string(),
        AudioMode::Output => "Unknown Output".to_string(),
    })
}

fn supported_configs(
    device: &cpal::Device,
    mode: AudioMode,
) -> Result<Vec<SupportedStreamConfigRange>, AudioError> {
    let ranges = match mode {
        AudioMode::Input => device
            .supported_input_configs()
            .map_err(|e| AudioError::Backend(e.to_string()))?
            .collect(),
        AudioMode::Output => device
            .supported_output_configs()
            .map_err(|e| AudioError::Backend(e.to_string()))?
            .collect(),
    };
    Ok(ranges)
}

fn default_config(device: &cpal::Device, mode: AudioMode) -> Result<AudioConfig, AudioError> {
    let config = match mode {
        AudioMode::Input => device.default_input_config(),
        AudioMode::Output => device.default_output_config(),
    }
    .map_err(|e| AudioError::Backend(e.to_string()))?;

    Ok(AudioConfig {
        sample_rate_hz: config.sample_rate().0,
        channels: config.channels(),
        sample_format: from_cpal_format(config.sample_format()),
    })
}

fn find_matching_range<'a>(
    ranges: &'a [SupportedStreamConfigRange],
    config: &AudioConfig,
) -> Option<&'a SupportedStreamConfigRange> {
    let format = to_cpal_format(config.sample_format)?;
    ranges.iter().find(|range| {
        range.channels() == config.channels
            && range.sample_format() == format
            && range.min_sample_rate().0 <= config.sample_rate_hz
            && config.sample_rate_hz <= range.max_sample_rate().0
    })
}

pub fn to_cpal_format(format: SampleFormat) -> Option<cpal::SampleFormat> {
    match format {
        SampleFormat::UInt8 => Some(cpal::SampleFormat::U8),
        SampleFormat::Int16 => Some(cpal::SampleFormat::I16),
        SampleFormat::Int32 => Some(cpal::SampleFormat::I32),
        SampleFormat::Float => Some(cpal::SampleFormat::F32),
        SampleFormat::Unknown => None,
    }
}

pub fn from_cpal_format(format: cpal::SampleFormat) -> SampleFormat {
    match format {
        cpal::SampleFormat::U8 => SampleFormat::UInt8,
        cpal::SampleFormat::I16 => SampleFormat::Int16,
        cpal::SampleFormat::I32 => SampleFormat::Int32,
        cpal::SampleFormat::F32 => SampleFormat::Float,
        _ => SampleFormat::Unknown,
    }
}

/// Converts the requested latency into a fixed frame count the device accepts.
pub fn buffer_size_frames(
    sample_rate_hz: u32,
    buffer_size_ms: u32,
    supported: &SupportedBufferSize,
) -> BufferSize {
    if buffer_size_ms == 0 {
        return BufferSize::Default;
    }

    let frames = (sample_rate_hz as u64 * buffer_size_ms as u64 / 1000) as u32;
    match supported {
        SupportedBufferSize::Range { min, max } => BufferSize::Fixed(frames.clamp(*min, *max)),
        SupportedBufferSize::Unknown => BufferSize::Default,
    }
}

fn build_stream(
    device: &cpal::Device,
    mode: AudioMode,
    format: cpal::SampleFormat,
    config: &StreamConfig,
    io: Arc<dyn PcmStreamIo>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    match (mode, format) {
        (AudioMode::Input, cpal::SampleFormat::U8) => build_input::<u8>(device, config, io),
        (AudioMode::Input, cpal::SampleFormat::I16) => build_input::<i16>(device, config, io),
        (AudioMode::Input, cpal::SampleFormat::I32) => build_input::<i32>(device, config, io),
        (AudioMode::Input, cpal::SampleFormat::F32) => build_input::<f32>(device, config, io),
        (AudioMode::Output, cpal::SampleFormat::U8) => build_output::<u8>(device, config, io),
        (AudioMode::Output, cpal::SampleFormat::I16) => build_output::<i16>(device, config, io),
        (AudioMode::Output, cpal::SampleFormat::I32) => build_output::<i32>(device, config, io),
        (AudioMode::Output, cpal::SampleFormat::F32) => build_output::<f32>(device, config, io),
        _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    io: Arc<dyn PcmStreamIo>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + bytemuck::Pod,
{
    device.build_input_stream(
        config,
        move |data: &[T], _info: &cpal::InputCallbackInfo| {
            let bytes: &[u8] = bytemuck::cast_slice(data);
            let taken = io.write(bytes);
            if taken < bytes.len() {
                trace!(dropped = bytes.len() - taken, "captured bytes not consumed");
            }
        },
        stream_error,
        None,
    )
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    io: Arc<dyn PcmStreamIo>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + bytemuck::Pod,
{
    device.build_output_stream(
        config,
        move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(data);
            let filled = io.read(bytes).min(bytes.len());
            bytes[filled..].fill(0);
        },
        stream_error,
        None,
    )
}

fn stream_error(err: cpal::StreamError) {
    error!(%err, "cpal stream error");
}
