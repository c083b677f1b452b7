//! Camera scan session.
//!
//! A session owns one camera acquisition worker and the multi-part payload
//! accumulator. The worker forwards frames from the platform into the
//! session channel and pokes the wakeup after each delivery, so the frame
//! loop only ever polls non-blockingly. Consumed frames are handed back to
//! the platform for buffer reuse.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use crate::context::Context;
use crate::multipart::{self, MultiPartDecoder, MultiPartError, Payload};
use crate::platform::{CameraFrame, FrameMessage, PlatformError};

/// How long [`ScanSession::close`] waits for the worker to stop the camera.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Terminal session failure; acquisition has stopped.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("camera unavailable: {0}")]
    Camera(#[from] PlatformError),
}

/// One decoded result from the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scanned {
    /// A plain single-frame payload; interpretation is up to the caller.
    Bytes(Vec<u8>),
    /// A completed multi-part payload, already typed and parsed.
    Payload(Payload),
}

/// Downscaled luma image of the latest frame, for on-screen preview.
#[derive(Debug, Clone)]
pub struct Feed {
    pub width: usize,
    pub height: usize,
    pub luma: Arc<Vec<u8>>,
}

pub struct ScanSession {
    frames: Receiver<FrameMessage>,
    handback: Sender<CameraFrame>,
    stop: Option<Sender<()>>,
    done: Receiver<()>,
    decoder: MultiPartDecoder,
    feed_dims: (usize, usize),
    feed: Option<Feed>,
    error: Option<ScanError>,
}

impl ScanSession {
    /// Start camera acquisition. `feed_dims` is the preview size; the
    /// camera itself is asked for double that so small codes stay
    /// decodable.
    pub fn new(ctx: &Context, feed_dims: (usize, usize)) -> ScanSession {
        let (frames_tx, frames_rx) = bounded::<FrameMessage>(1);
        // Sized above the worst case of frames in flight so a handback
        // never stalls on a full channel.
        let (handback_tx, handback_rx) = bounded::<CameraFrame>(4);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);

        let platform = ctx.platform.clone();
        let wakeup = ctx.wakeup();
        let cam_dims = (feed_dims.0 * 2, feed_dims.1 * 2);
        std::thread::spawn(move || {
            // Dropped on exit; close() waits on the paired receiver.
            let _done = done_tx;
            let (cam_tx, cam_rx) = bounded::<FrameMessage>(1);
            let stop_handle = match platform.camera(cam_dims, cam_tx, handback_rx) {
                Ok(handle) => handle,
                Err(err) => {
                    tracing::error!("scan: camera start failed: {err}");
                    let _ = frames_tx.send(Err(err));
                    wakeup.poke();
                    let _ = stop_rx.recv();
                    return;
                }
            };
            loop {
                select! {
                    recv(cam_rx) -> msg => {
                        let Ok(msg) = msg else { break };
                        if frames_tx.send(msg).is_err() {
                            break;
                        }
                        wakeup.poke();
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
            stop_handle.stop();
        });

        ScanSession {
            frames: frames_rx,
            handback: handback_tx,
            stop: Some(stop_tx),
            done: done_rx,
            decoder: MultiPartDecoder::new(),
            feed_dims,
            feed: None,
            error: None,
        }
    }

    /// Process at most one pending frame. Returns a decoded payload when a
    /// code (or the final fragment of one) was read.
    pub fn poll(&mut self, ctx: &Context) -> Option<Scanned> {
        if self.error.is_some() {
            return None;
        }
        let msg = self.frames.try_recv().ok()?;
        let frame = match msg {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!("scan: camera failed: {err}");
                self.error = Some(err.into());
                // Stop acquisition; the session stays up to show the error.
                self.stop = None;
                return None;
            }
        };
        self.feed = Some(downscale(&frame, self.feed_dims));
        let codes = ctx.platform.scan_codes(&frame);
        if self.handback.try_send(frame).is_err() {
            // Losing a pooled buffer degrades acquisition; make it visible.
            tracing::warn!("scan: frame handback channel full, dropping a pooled buffer");
        }
        for code in codes {
            if let Some(scanned) = self.ingest(&code) {
                return Some(scanned);
            }
        }
        None
    }

    /// Feed one decoded barcode into the accumulator.
    fn ingest(&mut self, code: &[u8]) -> Option<Scanned> {
        let Ok(text) = std::str::from_utf8(code) else {
            return Some(Scanned::Bytes(code.to_vec()));
        };
        if !text.starts_with(multipart::PREFIX) {
            return Some(Scanned::Bytes(code.to_vec()));
        }
        match self.decoder.add(text) {
            Ok(()) => {}
            Err(MultiPartError::Incompatible) => {
                // The user pointed the camera at a different animated code;
                // start over with the new message.
                self.decoder.reset();
                if self.decoder.add(text).is_err() {
                    return None;
                }
            }
            Err(err) => {
                tracing::debug!("scan: dropping fragment: {err}");
                return None;
            }
        }
        if let Some((kind, body)) = self.decoder.result() {
            match multipart::parse_payload(kind, &body) {
                Ok(payload) => return Some(Scanned::Payload(payload)),
                Err(err) => {
                    tracing::warn!("scan: assembled payload failed to parse: {err}");
                    self.decoder.reset();
                }
            }
        }
        None
    }

    /// Fraction of the current multi-part payload received.
    pub fn progress(&self) -> f32 {
        self.decoder.progress()
    }

    /// True once a multi-part transfer is underway.
    pub fn receiving(&self) -> bool {
        self.decoder.started()
    }

    /// True once the first frame has arrived.
    pub fn streaming(&self) -> bool {
        self.feed.is_some()
    }

    pub fn feed(&self) -> Option<&Feed> {
        self.feed.as_ref()
    }

    /// Terminal acquisition error, if any.
    pub fn error(&self) -> Option<&ScanError> {
        self.error.as_ref()
    }

    /// Stop acquisition and wait briefly for the worker to let go of the
    /// camera, so a follow-up session can reopen it.
    pub fn close(mut self) {
        self.stop = None;
        if !worker_stopped(&self.done, CLOSE_GRACE) {
            tracing::warn!("scan: worker did not stop within grace period");
        }
    }
}

/// The worker never sends on `done`; it signals exit by dropping its end.
/// Only an actual timeout means it is still holding the camera.
fn worker_stopped(done: &Receiver<()>, grace: Duration) -> bool {
    !matches!(done.recv_timeout(grace), Err(RecvTimeoutError::Timeout))
}

/// Nearest-neighbor downscale with the quarter-turn the display mounting
/// requires.
fn downscale(frame: &CameraFrame, dims: (usize, usize)) -> Feed {
    let (w, h) = dims;
    let mut luma = vec![0u8; w * h];
    if frame.width > 0 && frame.height > 0 {
        for y in 0..h {
            for x in 0..w {
                // Rotate 90 degrees: output (x, y) samples input (y, x).
                let sx = y * frame.width / h.max(1);
                let sy = (w - 1 - x) * frame.height / w.max(1);
                let sx = sx.min(frame.width - 1);
                let sy = sy.min(frame.height - 1);
                luma[y * w + x] = frame.luma[sy * frame.width + sx];
            }
        }
    }
    Feed {
        width: w,
        height: h,
        luma: Arc::new(luma),
    }
}
