//! Frame scheduler.
//!
//! One [`App::frame`] call blocks until something needs a new frame (raw
//! input, a worker wakeup, an SD-card transition or the idle deadline),
//! applies every pending event, lays out the active screen tree and hands
//! the scene to the display. Screens never block; anything slow runs on a
//! worker thread that pokes the wakeup channel.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{never, select, unbounded, Receiver};

use crate::config::Config;
use crate::context::{Context, Wakeup};
use crate::input::{Button, RawEvent};
use crate::platform::Platform;
use crate::render::{Display, Scene};
use crate::saver::Saver;
use crate::screens::main_screen::MainScreen;

pub struct App {
    ctx: Context,
    display: Box<dyn Display>,
    buttons: Receiver<RawEvent>,
    wakeup_rx: Receiver<()>,
    sdcard: Receiver<bool>,
    main: MainScreen,
    saver: Option<Saver>,
    last_activity: Instant,
    idle_timeout: std::time::Duration,
    /// Button whose release is still owed to a dismissed screensaver.
    eat_button: Option<Button>,
    debug: bool,
    screenshots: usize,
}

impl App {
    pub fn new(platform: Arc<dyn Platform>, display: Box<dyn Display>, config: &Config) -> Self {
        let (wakeup, wakeup_rx) = Wakeup::channel();
        let (input_tx, input_rx) = unbounded();
        let mut main = MainScreen::new();
        let buttons = match platform.input(input_tx) {
            Ok(()) => input_rx,
            Err(err) => {
                tracing::error!("input delivery unavailable: {err}");
                main.set_input_error(err.to_string());
                // The dropped sender would leave a disconnected receiver
                // whose select arm is always ready; park the arm so the
                // scheduler keeps blocking between frames.
                never()
            }
        };
        let sdcard = platform.sdcard();
        let ctx = Context::new(platform, config, wakeup);
        let last_activity = ctx.now();
        App {
            ctx,
            display,
            buttons,
            wakeup_rx,
            sdcard,
            main,
            saver: None,
            last_activity,
            idle_timeout: config.idle_timeout(),
            eat_button: None,
            debug: config.debug,
            screenshots: 0,
        }
    }

    /// Run frames until the display fails.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.frame()?;
        }
    }

    /// Block for the next trigger, then process and draw one frame.
    pub fn frame(&mut self) -> io::Result<()> {
        let idle = if self.saver.is_none() && !self.ctx.any_pressed() {
            let deadline = self.last_activity + self.idle_timeout;
            crossbeam_channel::after(deadline.saturating_duration_since(self.ctx.now()))
        } else {
            never()
        };
        select! {
            recv(self.buttons) -> msg => {
                if let Ok(raw) = msg {
                    self.handle_raw(raw);
                }
            }
            recv(self.wakeup_rx) -> _ => {}
            recv(self.sdcard) -> msg => {
                if let Ok(inserted) = msg {
                    self.main.set_sdcard(inserted);
                }
            }
            recv(idle) -> _ => {
                tracing::debug!("idle timeout, starting screensaver");
                self.saver = Some(Saver::new(&self.ctx));
            }
        }
        // Apply everything already queued before laying out.
        while let Ok(raw) = self.buttons.try_recv() {
            self.handle_raw(raw);
        }
        while let Ok(inserted) = self.sdcard.try_recv() {
            self.main.set_sdcard(inserted);
        }
        let _ = self.wakeup_rx.try_recv();
        self.ctx.tick_repeats();

        let started = Instant::now();
        let mut scene = Scene::new();
        match &self.saver {
            Some(saver) => saver.layout(&self.ctx, &mut scene),
            None => self.main.layout(&mut self.ctx, &mut scene),
        }
        let region = self.display.draw(&scene)?;
        if self.debug {
            tracing::debug!(
                elapsed = ?started.elapsed(),
                damaged = ?region,
                "frame",
            );
        }
        Ok(())
    }

    fn handle_raw(&mut self, raw: RawEvent) {
        self.last_activity = self.ctx.now();
        if raw.button == Button::Screenshot {
            if raw.pressed && self.debug {
                self.take_screenshot();
            }
            return;
        }
        if self.saver.take().is_some() {
            // The waking gesture belongs to the saver, not the screen
            // underneath; swallow it and its release.
            if raw.pressed && raw.button.index().is_some() {
                self.eat_button = Some(raw.button);
            }
            return;
        }
        if self.eat_button == Some(raw.button) {
            if !raw.pressed {
                self.eat_button = None;
            }
            return;
        }
        self.ctx.submit(raw);
    }

    fn take_screenshot(&mut self) {
        let Some((width, height, rgb)) = self.display.snapshot() else {
            tracing::warn!("screenshot: display keeps no framebuffer");
            return;
        };
        let Some(img) = image::RgbImage::from_raw(width as u32, height as u32, rgb) else {
            tracing::warn!("screenshot: framebuffer size mismatch");
            return;
        };
        let mut png = Vec::new();
        if let Err(err) = img.write_to(&mut io::Cursor::new(&mut png), image::ImageFormat::Png) {
            tracing::warn!("screenshot: png encoding failed: {err}");
            return;
        }
        let name = format!("screenshot{}.png", self.screenshots);
        match self.ctx.platform.dump(&name, &png) {
            Ok(()) => {
                tracing::info!("wrote {name}");
                self.screenshots += 1;
            }
            Err(err) => tracing::warn!("screenshot: dump failed: {err}"),
        }
    }
}
