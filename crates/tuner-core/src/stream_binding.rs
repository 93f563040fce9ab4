use std::sync::{Arc, Weak};
use tracing::error;
use tuner_ports::audio::AudioInterface;
use tuner_ports::types::SampleFormat;

/// Open/closed state of a PCM stream and the interface it reads its format from.
///
/// The binding never owns the interface. Queries made while closed (or after the
/// interface went away) return fallbacks: rate 0, one channel, `Unknown`.
#[derive(Default)]
pub struct StreamBinding {
    interface: Option<Weak<dyn AudioInterface>>,
}

impl StreamBinding {
    pub fn new() -> Self {
        Self { interface: None }
    }

    /// Panics if `interface` is dangling.
    pub fn open(&mut self, interface: Weak<dyn AudioInterface>) {
        assert!(
            interface.strong_count() > 0,
            "audio interface is gone, cannot open stream binding"
        );
        self.interface = Some(interface);
    }

    pub fn close(&mut self) {
        self.interface = None;
    }

    pub fn is_open(&self) -> bool {
        self.interface.is_some()
    }

    fn interface(&self) -> Option<Arc<dyn AudioInterface>> {
        self.interface.as_ref().and_then(Weak::upgrade)
    }

    pub fn sample_rate(&self) -> u32 {
        if let Some(interface) = self.interface() {
            return interface.sample_rate();
        }

        error!("requested sample rate though device is not open");
        0
    }

    pub fn channel_count(&self) -> u16 {
        if let Some(interface) = self.interface() {
            return interface.channel_count();
        }

        error!("requested channel count though device is not open");
        1
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.interface()
            .map(|interface| interface.sample_format())
            .unwrap_or(SampleFormat::Unknown)
    }

    pub fn sample_size(&self) -> usize {
        self.sample_format().byte_width()
    }

    pub fn max_sample_value(&self) -> f64 {
        self.sample_format().max_value()
    }
}

impl std::fmt::Debug for StreamBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBinding")
            .field("open", &self.is_open())
            .finish()
    }
}
