//! Development harness binary.
//!
//! Runs the controller against a simulated engraver and a line-oriented
//! stdin input driver so flows can be exercised off-device. Hardware
//! drivers live in the board support package and wire up the same
//! [`platesmith::platform::Platform`] trait.

use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use color_eyre::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing_subscriber::EnvFilter;

use platesmith::app::App;
use platesmith::config::{self, Config};
use platesmith::input::{Button, RawEvent};
use platesmith::platform::{
    CameraFrame, CameraStop, EngraverPort, FrameMessage, Platform, PlatformError,
};
use platesmith::protocol::Simulator;
use platesmith::render::{Display, DrawOp, Region, Scene};

/// Platform backed by the protocol simulator and stdin commands.
struct DevPlatform {
    engraver: Arc<Simulator>,
    sdcard_rx: Receiver<bool>,
    // Keeps the sdcard channel open; the dev harness never inserts a card.
    _sdcard_tx: Sender<bool>,
}

impl DevPlatform {
    fn new() -> Self {
        let (_sdcard_tx, sdcard_rx) = unbounded();
        DevPlatform {
            engraver: Arc::new(Simulator::new()),
            sdcard_rx,
            _sdcard_tx,
        }
    }
}

/// Translate one stdin line into raw events.
fn parse_line(line: &str) -> Vec<RawEvent> {
    let line = line.trim();
    let click = |b| vec![RawEvent::press(b), RawEvent::release(b)];
    match line {
        "up" => click(Button::Up),
        "down" => click(Button::Down),
        "left" => click(Button::Left),
        "right" => click(Button::Right),
        "ok" | "center" => click(Button::Center),
        "b1" => click(Button::Button1),
        "b2" => click(Button::Button2),
        "b3" => click(Button::Button3),
        "shot" => vec![RawEvent::press(Button::Screenshot)],
        word if !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic()) => {
            // Type a word on the seed keyboard and accept it.
            let mut events: Vec<RawEvent> =
                word.chars().map(|c| RawEvent::rune(c.to_ascii_lowercase())).collect();
            events.push(RawEvent::rune(' '));
            events
        }
        _ => {
            tracing::warn!("unrecognized command: {line:?}");
            Vec::new()
        }
    }
}

impl Platform for DevPlatform {
    fn input(&self, events: Sender<RawEvent>) -> Result<(), PlatformError> {
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                for event in parse_line(&line) {
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
        });
        Ok(())
    }

    fn engraver(&self) -> Result<Arc<dyn EngraverPort>, PlatformError> {
        Ok(self.engraver.clone())
    }

    fn camera(
        &self,
        _dims: (usize, usize),
        _frames: Sender<FrameMessage>,
        _handback: Receiver<CameraFrame>,
    ) -> Result<CameraStop, PlatformError> {
        Err(PlatformError::Camera(
            "no camera in the dev harness".to_string(),
        ))
    }

    fn scan_codes(&self, _frame: &CameraFrame) -> Vec<Vec<u8>> {
        Vec::new()
    }

    fn dump(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(name, bytes)
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sdcard(&self) -> Receiver<bool> {
        self.sdcard_rx.clone()
    }
}

/// Display that logs the textual content of each frame.
#[derive(Default)]
struct ConsoleDisplay {
    last: String,
}

impl Display for ConsoleDisplay {
    fn dims(&self) -> (usize, usize) {
        (240, 240)
    }

    fn draw(&mut self, scene: &Scene) -> io::Result<Region> {
        let text: Vec<&str> = scene
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let rendered = text.join(" | ");
        if rendered != self.last {
            tracing::info!("screen: {rendered}");
            self.last = rendered;
        }
        Ok(Region::default())
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load(Path::new(config::DEFAULT_PATH));
    let platform = Arc::new(DevPlatform::new());
    let display = Box::new(ConsoleDisplay::default());
    let mut app = App::new(platform, display, &config);
    app.run()?;
    Ok(())
}
