use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tuner_core::{
    decode_normalized, peak_level, AudioEndpoint, PlaybackDevice, RecordingDevice,
    SharedPcmDevice,
};
use tuner_infra_audio_cpal::CpalAudioHost;
use tuner_infra_storage_fs::FsStorage;
use tuner_ports::{AudioHostPort, AudioMode, StoragePort};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(name = "tuner", about = "Capture and play raw PCM through the system audio devices")]
struct Cli {
    /// Directory holding settings.json. Defaults to the platform config dir.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List input and output devices.
    Devices,
    /// Print the persisted audio settings.
    Settings,
    /// Record raw PCM from the saved (or default) input device.
    Record {
        #[arg(long, default_value_t = 3.0)]
        seconds: f32,
        #[arg(long)]
        out: PathBuf,
    },
    /// Play a raw PCM file, assumed to be in the output's negotiated format.
    Play { input: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let storage: Arc<dyn StoragePort> = Arc::new(match cli.config_dir {
        Some(dir) => FsStorage::new(dir),
        None => FsStorage::default(),
    });
    let host: Arc<dyn AudioHostPort> = Arc::new(CpalAudioHost::new());

    match cli.command {
        Command::Devices => list_devices(host.as_ref()),
        Command::Settings => show_settings(storage.as_ref()),
        Command::Record { seconds, out } => record(host, storage, seconds, out),
        Command::Play { input } => play(host, storage, input),
    }
}

fn list_devices(host: &dyn AudioHostPort) -> Result<()> {
    for mode in [AudioMode::Input, AudioMode::Output] {
        let default = host.default_device(mode)?.map(|d| d.id);
        println!("{mode} devices:");
        for device in host.list_devices(mode)? {
            let marker = if Some(&device.id) == default.as_ref() { "*" } else { " " };
            match device.default_config {
                Some(config) => println!(
                    " {marker} {} ({} Hz, {} ch, {})",
                    device.name, config.sample_rate_hz, config.channels, config.sample_format
                ),
                None => println!(" {marker} {}", device.name),
            }
        }
    }
    Ok(())
}

fn show_settings(storage: &dyn StoragePort) -> Result<()> {
    let settings = storage.load_settings()?;
    for mode in [AudioMode::Input, AudioMode::Output] {
        let entry = settings.audio(mode);
        println!(
            "{mode}: device={} rate={} channels={} buffer={}ms",
            entry.device_name.as_deref().unwrap_or("<default>"),
            entry.sample_rate_hz.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            entry.channels.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            entry.buffer_size_ms.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}

fn record(
    host: Arc<dyn AudioHostPort>,
    storage: Arc<dyn StoragePort>,
    seconds: f32,
    out: PathBuf,
) -> Result<()> {
    if seconds.is_nan() || seconds <= 0.0 {
        bail!("recording length must be positive");
    }

    let mut input = AudioEndpoint::new(AudioMode::Input, host, Some(storage));
    input.init().context("opening input device")?;

    let capacity = (input.config().bytes_per_second() as f32 * seconds) as usize;
    let recorder = Arc::new(Mutex::new(RecordingDevice::new(capacity)));
    let shared: SharedPcmDevice = recorder.clone();
    input.set_device(Some(&shared));
    info!(device = input.device_name(), seconds, "recording");

    let deadline = Instant::now() + Duration::from_secs_f32(seconds) * 2;
    while !recorder.lock().is_full() && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
    }

    input.set_device(None);
    let format = input.sample_format();
    input.exit();

    let bytes = recorder.lock().take_recorded();
    let peak = peak_level(&decode_normalized(&bytes, format));
    fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;
    info!(
        path = %out.display(),
        bytes = bytes.len(),
        format = %format,
        peak,
        "recording saved"
    );
    Ok(())
}

fn play(host: Arc<dyn AudioHostPort>, storage: Arc<dyn StoragePort>, input: PathBuf) -> Result<()> {
    let bytes = fs::read(&input).with_context(|| format!("reading {}", input.display()))?;

    let mut output = AudioEndpoint::new(AudioMode::Output, host, Some(storage));
    output.init().context("opening output device")?;

    let player = Arc::new(Mutex::new(PlaybackDevice::new()));
    player.lock().enqueue(&bytes);
    let shared: SharedPcmDevice = player.clone();
    output.set_device(Some(&shared));
    info!(device = output.device_name(), bytes = bytes.len(), "playing");

    while player.lock().queued_len() > 0 {
        thread::sleep(POLL_INTERVAL);
    }
    thread::sleep(Duration::from_millis(output.buffer_size_ms() as u64));

    output.exit();
    Ok(())
}
