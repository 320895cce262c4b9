//! Raw-sample tap for the preview branch.
//!
//! The tap node passes samples through untouched and buffers nothing. When
//! armed, the next delivered frame is copied into a single reused scratch
//! buffer and the armed callback fires once; further frames are silently
//! dropped until the tap is re-armed. This is an at-most-one-outstanding-
//! frame policy, not a queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Fired on the pipeline delivery thread with the copied frame bytes and
/// its dimensions. Keep the work minimal and never call back into the
/// control surface from here.
pub type FrameCallback = Arc<dyn Fn(&[u8], u32, u32) + Send + Sync>;

struct TapInner {
    scratch: Vec<u8>,
    callback: Option<FrameCallback>,
}

struct TapShared {
    /// true = previous frame consumed (or nothing armed); the delivery
    /// callback only copies while this is false.
    frame_captured: AtomicBool,
    inner: Mutex<TapInner>,
}

/// Delivery-side handle handed to the driver. Clone-cheap.
#[derive(Clone)]
pub struct TapSink {
    shared: Arc<TapShared>,
}

impl TapSink {
    /// Called by the driver on its delivery thread for every frame flowing
    /// through the tap node. No-op unless the tap is armed.
    pub fn deliver(&self, data: &[u8], width: u32, height: u32) {
        // swap(true) wins the race for exactly one frame per arm
        if self.shared.frame_captured.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut inner = self.shared.inner.lock();
        let wanted = inner.scratch.len().min(data.len());
        let len = inner.scratch.len();
        inner.scratch[..wanted].copy_from_slice(&data[..wanted]);
        inner.scratch[wanted..len].fill(0);
        if let Some(cb) = inner.callback.clone() {
            cb(&inner.scratch, width, height);
        }
    }
}

/// Control-side of the tap, owned by the graph controller.
pub struct SampleTap {
    shared: Arc<TapShared>,
}

impl SampleTap {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TapShared {
                frame_captured: AtomicBool::new(true),
                inner: Mutex::new(TapInner {
                    scratch: Vec::new(),
                    callback: None,
                }),
            }),
        }
    }

    pub fn sink(&self) -> TapSink {
        TapSink {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Arm the tap: size the scratch buffer for the connected format and
    /// let the next delivered frame through to `callback`.
    pub fn arm(&self, callback: FrameCallback, frame_size: usize) {
        {
            let mut inner = self.shared.inner.lock();
            inner.scratch.resize(frame_size, 0);
            inner.callback = Some(callback);
        }
        self.shared.frame_captured.store(false, Ordering::Release);
    }

    /// Let one more frame through to the already-armed callback.
    pub fn rearm(&self) {
        if self.shared.inner.lock().callback.is_some() {
            self.shared.frame_captured.store(false, Ordering::Release);
        }
    }

    /// Drop the callback and close the gate.
    pub fn disarm(&self) {
        self.shared.frame_captured.store(true, Ordering::Release);
        self.shared.inner.lock().callback = None;
    }

    pub fn is_armed(&self) -> bool {
        !self.shared.frame_captured.load(Ordering::Acquire)
    }
}

impl Default for SampleTap {
    fn default() -> Self {
        Self::new()
    }
}
