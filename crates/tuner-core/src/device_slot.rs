use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};
use tuner_ports::audio::{AudioInterface, PcmDevice, PcmStreamIo};
use tuner_ports::types::AudioMode;

pub type SharedPcmDevice = Arc<Mutex<dyn PcmDevice>>;

/// Fired with the new device whenever the slot switches to a different one.
pub type DeviceChangedCallback = Box<dyn FnMut(Option<&SharedPcmDevice>) + Send>;

/// Reported by `bytes_available` when no device is bound.
pub const FALLBACK_BYTES_AVAILABLE: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenMode {
    /// Capture streams push bytes into the slot, playback streams pull them out.
    pub fn for_mode(mode: AudioMode) -> Self {
        match mode {
            AudioMode::Input => OpenMode::WriteOnly,
            AudioMode::Output => OpenMode::ReadOnly,
        }
    }
}

/// Byte pipe between a backend stream and whatever PCM device is currently bound.
///
/// The slot holds the device weakly: the caller keeps it alive and may swap it
/// at any time with [`PcmDeviceSlot::set_device`]. With nothing bound, reads
/// produce silence and writes are dropped so the backend never stalls.
pub struct PcmDeviceSlot {
    interface: Weak<dyn AudioInterface>,
    device: Option<Weak<Mutex<dyn PcmDevice>>>,
    open_mode: Option<OpenMode>,
    on_device_changed: Option<DeviceChangedCallback>,
}

impl PcmDeviceSlot {
    /// Panics if `interface` is dangling.
    pub fn new(interface: Weak<dyn AudioInterface>) -> Self {
        assert!(
            interface.strong_count() > 0,
            "a live audio interface is required"
        );
        Self {
            interface,
            device: None,
            open_mode: None,
            on_device_changed: None,
        }
    }

    pub fn on_device_changed(&mut self, cb: DeviceChangedCallback) {
        self.on_device_changed = Some(cb);
    }

    pub fn is_open(&self) -> bool {
        self.open_mode.is_some()
    }

    pub fn open_mode(&self) -> Option<OpenMode> {
        self.open_mode
    }

    pub fn device(&self) -> Option<SharedPcmDevice> {
        self.device.as_ref().and_then(Weak::upgrade)
    }

    fn holds(&self, device: Option<&SharedPcmDevice>) -> bool {
        match (&self.device, device) {
            (None, None) => true,
            (Some(held), Some(new)) => std::ptr::addr_eq(held.as_ptr(), Arc::as_ptr(new)),
            _ => false,
        }
    }

    pub fn set_device(&mut self, device: Option<&SharedPcmDevice>) {
        if self.holds(device) {
            return;
        }

        if self.is_open() {
            if let Some(old) = self.device() {
                old.lock().close();
            }
        }

        self.device = device.map(Arc::downgrade);

        if self.is_open() {
            if let Some(new) = device {
                new.lock().open(self.interface.clone());
            }
        }

        debug!(bound = device.is_some(), "pcm device changed");
        if let Some(cb) = self.on_device_changed.as_mut() {
            cb(device);
        }
    }

    /// Returns false if the audio interface went away; the device is left untouched then.
    pub fn open(&mut self, mode: OpenMode) -> bool {
        if self.interface.strong_count() == 0 {
            warn!("cannot open pcm slot, audio interface is gone");
            return false;
        }

        if let Some(device) = self.device() {
            device.lock().open(self.interface.clone());
        }

        self.open_mode = Some(mode);
        true
    }

    pub fn close(&mut self) {
        if let Some(device) = self.device() {
            device.lock().close();
        }

        self.open_mode = None;
    }

    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if let Some(device) = self.device() {
            return device.lock().read(buf);
        }

        buf.fill(0);
        buf.len()
    }

    pub fn write(&mut self, buf: &[u8]) -> usize {
        if let Some(device) = self.device() {
            return device.lock().write(buf);
        }

        0
    }

    /// Roughly one second of audio for the bound device. Not an exact count:
    /// it only tells the backend to keep calling `read`.
    pub fn bytes_available(&self) -> usize {
        if let Some(device) = self.device() {
            let device = device.lock();
            return device.sample_rate() as usize
                * device.channel_count() as usize
                * device.sample_size();
        }

        FALLBACK_BYTES_AVAILABLE
    }
}

/// Mutex-guarded slot shared between the control side and a backend callback.
///
/// The change callback runs with the lock held and must not touch the slot.
pub struct SharedDeviceSlot(Mutex<PcmDeviceSlot>);

impl SharedDeviceSlot {
    pub fn new(slot: PcmDeviceSlot) -> Self {
        Self(Mutex::new(slot))
    }

    pub fn lock(&self) -> MutexGuard<'_, PcmDeviceSlot> {
        self.0.lock()
    }
}

impl PcmStreamIo for SharedDeviceSlot {
    fn read(&self, buf: &mut [u8]) -> usize {
        self.0.lock().read(buf)
    }

    fn write(&self, buf: &[u8]) -> usize {
        self.0.lock().write(buf)
    }
}
