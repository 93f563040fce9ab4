use std::sync::{Arc, Weak};
use tuner_core::StreamBinding;
use tuner_ports::{AudioInterface, SampleFormat};

struct FixedInterface {
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
}

impl AudioInterface for FixedInterface {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_format(&self) -> SampleFormat {
        self.format
    }
}

fn interface(format: SampleFormat) -> Arc<FixedInterface> {
    Arc::new(FixedInterface {
        sample_rate: 48_000,
        channels: 2,
        format,
    })
}

fn weak(interface: &Arc<FixedInterface>) -> Weak<dyn AudioInterface> {
    let weak: Weak<FixedInterface> = Arc::downgrade(interface);
    weak
}

#[test]
fn starts_closed_with_fallbacks() {
    let binding = StreamBinding::new();
    assert!(!binding.is_open());
    assert_eq!(binding.sample_rate(), 0);
    assert_eq!(binding.channel_count(), 1);
    assert_eq!(binding.sample_format(), SampleFormat::Unknown);
    assert_eq!(binding.sample_size(), 0);
    assert_eq!(binding.max_sample_value(), 0.0);
}

#[test]
fn open_delegates_queries_to_interface() {
    let iface = interface(SampleFormat::Int16);
    let mut binding = StreamBinding::new();
    binding.open(weak(&iface));

    assert!(binding.is_open());
    assert_eq!(binding.sample_rate(), 48_000);
    assert_eq!(binding.channel_count(), 2);
    assert_eq!(binding.sample_format(), SampleFormat::Int16);
    assert_eq!(binding.sample_size(), 2);
    assert_eq!(binding.max_sample_value(), 32767.0);
}

#[test]
fn close_restores_fallbacks() {
    let iface = interface(SampleFormat::Float);
    let mut binding = StreamBinding::new();
    binding.open(weak(&iface));
    binding.close();

    assert!(!binding.is_open());
    assert_eq!(binding.sample_rate(), 0);
    assert_eq!(binding.channel_count(), 1);
    assert_eq!(binding.sample_format(), SampleFormat::Unknown);
}

#[test]
fn close_is_idempotent() {
    let mut binding = StreamBinding::new();
    binding.close();
    binding.close();
    assert!(!binding.is_open());
    assert_eq!(binding.sample_rate(), 0);
}

#[test]
#[should_panic(expected = "audio interface is gone")]
fn open_with_dangling_interface_panics() {
    let dangling: Weak<FixedInterface> = Weak::new();
    let dangling: Weak<dyn AudioInterface> = dangling;
    let mut binding = StreamBinding::new();
    binding.open(dangling);
}

#[test]
fn dropped_interface_reads_as_closed() {
    let iface = interface(SampleFormat::Int32);
    let mut binding = StreamBinding::new();
    binding.open(weak(&iface));
    drop(iface);

    assert_eq!(binding.sample_rate(), 0);
    assert_eq!(binding.channel_count(), 1);
    assert_eq!(binding.sample_format(), SampleFormat::Unknown);
}
