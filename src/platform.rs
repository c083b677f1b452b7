//! Platform capability boundary.
//!
//! Everything the controller needs from the host environment goes through
//! the [`Platform`] trait: raw input delivery, the engraver byte stream,
//! camera frame acquisition, diagnostic dumps, the clock and the SD-card
//! state stream. The frame scheduler and the hardware sessions consume this
//! trait only; production wiring and the test harness each implement it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::input::RawEvent;

/// Errors raised while establishing a platform capability.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("input device unavailable: {0}")]
    Input(String),
    #[error("engraver connection failed: {0}")]
    Engraver(String),
    #[error("camera connection failed: {0}")]
    Camera(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One luma frame from the camera. Frames are pooled: after the consumer is
/// done with a frame it must be handed back through the return channel so
/// the acquisition worker can reuse the buffer.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: usize,
    pub height: usize,
    pub luma: Vec<u8>,
}

/// Message on the camera frame channel: a frame, or a terminal acquisition
/// error.
pub type FrameMessage = Result<CameraFrame, PlatformError>;

/// Handle that stops camera acquisition when invoked.
pub struct CameraStop(Box<dyn FnOnce() + Send>);

impl CameraStop {
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        CameraStop(Box::new(stop))
    }

    pub fn stop(self) {
        (self.0)()
    }
}

/// Duplex byte stream to the engraving mechanism.
///
/// The handle is shared between the owning session and the streaming
/// worker; [`EngraverPort::close`] must be idempotent so that forced
/// teardown after an unacknowledged cancellation cannot double-close the
/// underlying device. A closed port fails all subsequent I/O.
pub trait EngraverPort: Send + Sync {
    fn send(&self, frame: &[u8]) -> io::Result<()>;
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn close(&self);
    fn is_closed(&self) -> bool;
}

/// Close-once guard shared by [`EngraverPort`] implementations.
#[derive(Debug, Default)]
pub struct CloseFlag(AtomicBool);

impl CloseFlag {
    /// Returns true the first time only; later calls are no-ops.
    pub fn close(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Host environment capabilities consumed by the controller core.
pub trait Platform: Send + Sync {
    /// Start delivering raw input events into `events`. Failure here is
    /// fatal and permanently displayed by the main screen.
    fn input(&self, events: Sender<RawEvent>) -> Result<(), PlatformError>;

    /// Open the engraver device.
    fn engraver(&self) -> Result<Arc<dyn EngraverPort>, PlatformError>;

    /// Start camera acquisition at roughly `dims` resolution. Frames arrive
    /// on `frames`; consumed frames must be returned through `handback`.
    fn camera(
        &self,
        dims: (usize, usize),
        frames: Sender<FrameMessage>,
        handback: Receiver<CameraFrame>,
    ) -> Result<CameraStop, PlatformError>;

    /// Decode barcodes in a camera frame, returning zero or more payloads.
    fn scan_codes(&self, frame: &CameraFrame) -> Vec<Vec<u8>>;

    /// Persist a diagnostic artifact. Failure is logged, never fatal.
    fn dump(&self, name: &str, bytes: &[u8]) -> io::Result<()>;

    /// Current instant. Indirected so tests can offset time.
    fn now(&self) -> Instant;

    /// SD-card state changes; `true` means a card is inserted.
    fn sdcard(&self) -> Receiver<bool>;
}
