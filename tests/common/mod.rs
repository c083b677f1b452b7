//! Shared harness: the whole controller on a scripted platform, driven one
//! frame at a time.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use platesmith::app::App;
use platesmith::config::Config;
use platesmith::input::{Button, RawEvent};
use platesmith::render::{Display, Region, Scene};
use platesmith::testing::TestPlatform;

/// Display that records the last drawn scene.
struct RecordingDisplay {
    last: Arc<Mutex<Scene>>,
}

impl Display for RecordingDisplay {
    fn dims(&self) -> (usize, usize) {
        (240, 240)
    }

    fn draw(&mut self, scene: &Scene) -> io::Result<Region> {
        *self.last.lock().unwrap() = scene.clone();
        Ok(Region::default())
    }
}

pub struct Harness {
    pub app: App,
    pub platform: Arc<TestPlatform>,
    scene: Arc<Mutex<Scene>>,
}

pub fn harness(config: &Config) -> Harness {
    let platform = Arc::new(TestPlatform::new());
    let scene = Arc::new(Mutex::new(Scene::new()));
    let display = Box::new(RecordingDisplay {
        last: scene.clone(),
    });
    let app = App::new(platform.clone(), display, config);
    Harness {
        app,
        platform,
        scene,
    }
}

impl Harness {
    pub fn frame(&mut self) {
        self.app.frame().unwrap();
    }

    pub fn shows(&self, needle: &str) -> bool {
        self.scene.lock().unwrap().contains_text(needle)
    }

    fn send(&self, raw: RawEvent) {
        self.platform
            .input_sender()
            .expect("input not wired")
            .send(raw)
            .unwrap();
    }

    /// Press and release in one frame.
    pub fn click(&mut self, b: Button) {
        self.send(RawEvent::press(b));
        self.send(RawEvent::release(b));
        self.frame();
    }

    /// Hold a button past the confirm duration.
    pub fn hold(&mut self, b: Button, d: Duration) {
        self.send(RawEvent::press(b));
        self.frame();
        self.platform.advance(d + Duration::from_millis(50));
        self.frame();
        self.send(RawEvent::release(b));
        self.frame();
    }

    /// Type one word on the seed keyboard and accept it.
    pub fn type_word(&mut self, word: &str) {
        for ch in word.chars() {
            self.send(RawEvent::rune(ch));
        }
        self.send(RawEvent::rune(' '));
        self.frame();
    }

    /// Run frames until `needle` appears on screen.
    pub fn wait_shows(&mut self, needle: &str, max_frames: usize) {
        for _ in 0..max_frames {
            if self.shows(needle) {
                return;
            }
            self.frame();
        }
        assert!(self.shows(needle), "never saw {needle:?} on screen");
    }

    /// Busy-wait for the camera worker to open the device.
    pub fn wait_camera(&self) {
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while !self.platform.camera_running() && std::time::Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert!(self.platform.camera_running());
    }
}
