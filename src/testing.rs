//! Scripted [`Platform`] implementation backing the frame tests.
//!
//! Time is a manual offset over a base instant, the engraver is the
//! protocol [`Simulator`] behind a connection switch, and camera frames and
//! decoded barcodes are injected by the test. Kept out of `#[cfg(test)]`
//! because the integration tests in `tests/` drive the whole controller
//! through it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::input::RawEvent;
use crate::platform::{
    CameraFrame, CameraStop, EngraverPort, FrameMessage, Platform, PlatformError,
};
use crate::protocol::Simulator;

#[derive(Default)]
struct Script {
    engraver_error: Option<String>,
    camera_error: Option<String>,
    input_error: Option<String>,
    scans: Vec<Vec<Vec<u8>>>,
    dumps: Vec<(String, Vec<u8>)>,
    camera: Option<CameraHooks>,
    input: Option<Sender<RawEvent>>,
}

struct CameraHooks {
    frames: Sender<FrameMessage>,
    handback: Receiver<CameraFrame>,
    stopped: Arc<AtomicBool>,
}

pub struct TestPlatform {
    base: Instant,
    offset: Mutex<Duration>,
    script: Mutex<Script>,
    engraver: Arc<Simulator>,
    sdcard_tx: Sender<bool>,
    sdcard_rx: Receiver<bool>,
}

impl TestPlatform {
    pub fn new() -> Self {
        let (sdcard_tx, sdcard_rx) = unbounded();
        TestPlatform {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            script: Mutex::new(Script::default()),
            engraver: Arc::new(Simulator::new()),
            sdcard_tx,
            sdcard_rx,
        }
    }

    /// Move the scripted clock forward.
    pub fn advance(&self, d: Duration) {
        *self.offset.lock().unwrap() += d;
    }

    /// The simulator every successful [`Platform::engraver`] call returns.
    pub fn engraver_sim(&self) -> Arc<Simulator> {
        self.engraver.clone()
    }

    /// Make the next engraver connection attempts fail.
    pub fn set_engraver_error(&self, msg: &str) {
        self.script.lock().unwrap().engraver_error = Some(msg.to_string());
    }

    pub fn clear_engraver_error(&self) {
        self.script.lock().unwrap().engraver_error = None;
    }

    /// Make camera acquisition fail to start.
    pub fn set_camera_error(&self, msg: &str) {
        self.script.lock().unwrap().camera_error = Some(msg.to_string());
    }

    /// Make raw input delivery fail to start.
    pub fn set_input_error(&self, msg: &str) {
        self.script.lock().unwrap().input_error = Some(msg.to_string());
    }

    /// True once a camera session has been opened.
    pub fn camera_running(&self) -> bool {
        let script = self.script.lock().unwrap();
        script
            .camera
            .as_ref()
            .map(|c| !c.stopped.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Deliver one camera frame to the active session.
    pub fn deliver_frame(&self, frame: CameraFrame) {
        let script = self.script.lock().unwrap();
        if let Some(cam) = &script.camera {
            let _ = cam.frames.send(Ok(frame));
        }
    }

    /// Deliver a terminal camera error to the active session.
    pub fn deliver_camera_error(&self, msg: &str) {
        let script = self.script.lock().unwrap();
        if let Some(cam) = &script.camera {
            let _ = cam.frames.send(Err(PlatformError::Camera(msg.to_string())));
        }
    }

    /// Collect frames the consumer handed back for reuse.
    pub fn reclaim_frames(&self) -> usize {
        let script = self.script.lock().unwrap();
        let Some(cam) = &script.camera else { return 0 };
        let mut n = 0;
        while cam.handback.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    /// Queue the decode result for the next scanned frame.
    pub fn push_scan(&self, codes: Vec<Vec<u8>>) {
        self.script.lock().unwrap().scans.push(codes);
    }

    /// Diagnostic dumps recorded so far.
    pub fn dumps(&self) -> Vec<(String, Vec<u8>)> {
        self.script.lock().unwrap().dumps.clone()
    }

    /// Sender for scripted SD-card insertions and removals.
    pub fn sdcard_sender(&self) -> Sender<bool> {
        self.sdcard_tx.clone()
    }

    /// Raw input sender captured from [`Platform::input`], if wired.
    pub fn input_sender(&self) -> Option<Sender<RawEvent>> {
        self.script.lock().unwrap().input.clone()
    }

    /// A gray test frame of the given size.
    pub fn frame(width: usize, height: usize) -> CameraFrame {
        CameraFrame {
            width,
            height,
            luma: vec![0x80; width * height],
        }
    }
}

impl Default for TestPlatform {
    fn default() -> Self {
        TestPlatform::new()
    }
}

impl Platform for TestPlatform {
    fn input(&self, events: Sender<RawEvent>) -> Result<(), PlatformError> {
        let mut script = self.script.lock().unwrap();
        if let Some(msg) = &script.input_error {
            return Err(PlatformError::Input(msg.clone()));
        }
        script.input = Some(events);
        Ok(())
    }

    fn engraver(&self) -> Result<Arc<dyn EngraverPort>, PlatformError> {
        if let Some(msg) = &self.script.lock().unwrap().engraver_error {
            return Err(PlatformError::Engraver(msg.clone()));
        }
        Ok(self.engraver.clone())
    }

    fn camera(
        &self,
        _dims: (usize, usize),
        frames: Sender<FrameMessage>,
        handback: Receiver<CameraFrame>,
    ) -> Result<CameraStop, PlatformError> {
        let mut script = self.script.lock().unwrap();
        if let Some(msg) = &script.camera_error {
            return Err(PlatformError::Camera(msg.clone()));
        }
        let stopped = Arc::new(AtomicBool::new(false));
        script.camera = Some(CameraHooks {
            frames,
            handback,
            stopped: stopped.clone(),
        });
        Ok(CameraStop::new(move || {
            stopped.store(true, Ordering::SeqCst);
        }))
    }

    fn scan_codes(&self, _frame: &CameraFrame) -> Vec<Vec<u8>> {
        let mut script = self.script.lock().unwrap();
        if script.scans.is_empty() {
            Vec::new()
        } else {
            script.scans.remove(0)
        }
    }

    fn dump(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.script
            .lock()
            .unwrap()
            .dumps
            .push((name.to_string(), bytes.to_vec()));
        Ok(())
    }

    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    fn sdcard(&self) -> Receiver<bool> {
        self.sdcard_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_moves_when_advanced() {
        let p = TestPlatform::new();
        let a = p.now();
        let b = p.now();
        assert_eq!(a, b);
        p.advance(Duration::from_secs(3));
        assert_eq!(p.now() - a, Duration::from_secs(3));
    }

    #[test]
    fn engraver_error_is_scripted() {
        let p = TestPlatform::new();
        p.set_engraver_error("no usb device");
        assert!(p.engraver().is_err());
        p.clear_engraver_error();
        assert!(p.engraver().is_ok());
    }

    #[test]
    fn camera_stop_marks_session_stopped() {
        let p = TestPlatform::new();
        let (ftx, _frx) = unbounded();
        let (_htx, hrx) = unbounded();
        let stop = p.camera((100, 100), ftx, hrx).unwrap();
        assert!(p.camera_running());
        stop.stop();
        assert!(!p.camera_running());
    }

    #[test]
    fn scan_results_pop_in_order() {
        let p = TestPlatform::new();
        p.push_scan(vec![b"one".to_vec()]);
        p.push_scan(vec![]);
        let f = TestPlatform::frame(4, 4);
        assert_eq!(p.scan_codes(&f), vec![b"one".to_vec()]);
        assert!(p.scan_codes(&f).is_empty());
        assert!(p.scan_codes(&f).is_empty());
    }
}
