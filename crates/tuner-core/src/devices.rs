use crate::stream_binding::StreamBinding;
use std::collections::VecDeque;
use std::sync::Weak;
use tuner_ports::audio::{AudioInterface, PcmDevice};
use tuner_ports::types::SampleFormat;

/// Bounded sink for captured bytes.
#[derive(Debug)]
pub struct RecordingDevice {
    binding: StreamBinding,
    data: Vec<u8>,
    capacity: usize,
}

impl RecordingDevice {
    pub fn new(capacity: usize) -> Self {
        Self {
            binding: StreamBinding::new(),
            data: Vec::new(),
            capacity,
        }
    }

    pub fn recorded_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    pub fn take_recorded(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl PcmDevice for RecordingDevice {
    fn open(&mut self, interface: Weak<dyn AudioInterface>) {
        self.binding.open(interface);
    }

    fn close(&mut self) {
        self.binding.close();
    }

    fn read(&mut self, _buf: &mut [u8]) -> usize {
        0
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let take = buf.len().min(self.capacity.saturating_sub(self.data.len()));
        self.data.extend_from_slice(&buf[..take]);
        take
    }

    fn sample_rate(&self) -> u32 {
        self.binding.sample_rate()
    }

    fn channel_count(&self) -> u16 {
        self.binding.channel_count()
    }

    fn sample_format(&self) -> SampleFormat {
        self.binding.sample_format()
    }
}

/// FIFO source of bytes to play. Reads come back short once the queue runs dry.
#[derive(Debug, Default)]
pub struct PlaybackDevice {
    binding: StreamBinding,
    queue: VecDeque<u8>,
}

impl PlaybackDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, bytes: &[u8]) {
        self.queue.extend(bytes.iter().copied());
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }
}

impl PcmDevice for PlaybackDevice {
    fn open(&mut self, interface: Weak<dyn AudioInterface>) {
        self.binding.open(interface);
    }

    fn close(&mut self) {
        self.binding.close();
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.queue.len());
        for (dst, src) in buf.iter_mut().zip(self.queue.drain(..n)) {
            *dst = src;
        }
        n
    }

    fn write(&mut self, _buf: &[u8]) -> usize {
        0
    }

    fn sample_rate(&self) -> u32 {
        self.binding.sample_rate()
    }

    fn channel_count(&self) -> u16 {
        self.binding.channel_count()
    }

    fn sample_format(&self) -> SampleFormat {
        self.binding.sample_format()
    }
}
