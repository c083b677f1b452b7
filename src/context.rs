//! Shared frame context: the event model and the wakeup channel.
//!
//! The [`Context`] owns the pressed-state array and the pending event queue.
//! Raw events go in through [`Context::submit`]; screens take normalized
//! events out through [`Context::next`] in strict arrival order. Click
//! derivation and key-repeat synthesis both live here so no screen has to
//! track gesture state of its own.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::Config;
use crate::input::{Button, Event, RawEvent, BUTTON_COUNT, PHYSICAL};
use crate::platform::Platform;
use crate::render::Styles;

/// Producer side of the "a new frame is due" signal.
///
/// The channel has capacity one: a full channel means a wakeup is already
/// pending, which is all a producer needs to guarantee. Every off-thread
/// producer clones this handle and pokes it after delivering into its own
/// channel, so the frame scheduler never has to poll.
#[derive(Clone)]
pub struct Wakeup {
    tx: Sender<()>,
}

impl Wakeup {
    pub fn channel() -> (Wakeup, Receiver<()>) {
        let (tx, rx) = bounded(1);
        (Wakeup { tx }, rx)
    }

    /// Non-blocking send; a pending wakeup is sufficient.
    pub fn poke(&self) {
        let _ = self.tx.try_send(());
    }

    /// Poke after `d`. Zero pokes immediately on the calling thread.
    pub fn poke_after(&self, d: Duration) {
        if d.is_zero() {
            self.poke();
            return;
        }
        let tx = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(d);
            tx.poke();
        });
    }
}

/// Frame-wide state threaded through every screen.
pub struct Context {
    pub platform: Arc<dyn Platform>,
    pub styles: Styles,
    /// Set after the first successful engrave run; selects the shorter
    /// instruction sequence for later sessions.
    pub calibrated: bool,
    pub enable_seed_scan: bool,
    pub version: String,
    pub confirm_hold: Duration,

    repeat_start_delay: Duration,
    repeat_delay: Duration,
    buttons: [bool; BUTTON_COUNT],
    repeats: [Option<Instant>; BUTTON_COUNT],
    events: VecDeque<Event>,
    wakeup: Wakeup,
}

impl Context {
    pub fn new(platform: Arc<dyn Platform>, config: &Config, wakeup: Wakeup) -> Self {
        // Wake up initially so the first frame renders without input.
        wakeup.poke();
        Context {
            platform,
            styles: Styles::default(),
            calibrated: false,
            enable_seed_scan: config.enable_seed_scan,
            version: env!("CARGO_PKG_VERSION").to_string(),
            confirm_hold: config.confirm_hold(),
            repeat_start_delay: config.repeat_start_delay(),
            repeat_delay: config.repeat_delay(),
            buttons: [false; BUTTON_COUNT],
            repeats: [None; BUTTON_COUNT],
            events: VecDeque::new(),
            wakeup,
        }
    }

    /// Handle to hand to worker threads.
    pub fn wakeup(&self) -> Wakeup {
        self.wakeup.clone()
    }

    /// Arrange a future wakeup at `now + d`.
    pub fn wakeup_after(&self, d: Duration) {
        self.wakeup.poke_after(d);
    }

    pub fn now(&self) -> Instant {
        self.platform.now()
    }

    /// Normalize one raw event and append it to the pending queue.
    ///
    /// A release is a click when the button's pressed flag was set at event
    /// time, i.e. press and release belong to the same gesture. Pressing a
    /// repeatable button arms its repeat deadline; releasing disarms it.
    pub fn submit(&mut self, raw: RawEvent) {
        let mut event = Event {
            button: raw.button,
            pressed: raw.pressed,
            rune: raw.rune,
            click: false,
        };
        if let Some(idx) = raw.button.index() {
            event.click = !raw.pressed && self.buttons[idx];
            self.buttons[idx] = raw.pressed;
            if raw.pressed && raw.button.repeats() {
                self.repeats[idx] = Some(self.now() + self.repeat_start_delay);
                self.wakeup_after(self.repeat_start_delay);
            }
            if !raw.pressed {
                self.repeats[idx] = None;
            }
        }
        self.events.push_back(event);
    }

    /// Pop the next pending event, FIFO.
    pub fn next(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Synthesize press events for held repeatable buttons whose deadline
    /// has passed, rearming each at the shorter repeat interval.
    pub fn tick_repeats(&mut self) {
        let now = self.now();
        for idx in 0..BUTTON_COUNT {
            let button = PHYSICAL[idx];
            if !self.buttons[idx] || !button.repeats() {
                continue;
            }
            let Some(deadline) = self.repeats[idx] else {
                continue;
            };
            if now < deadline {
                continue;
            }
            self.events.push_back(Event {
                button,
                pressed: true,
                rune: None,
                click: false,
            });
            self.repeats[idx] = Some(now + self.repeat_delay);
            self.wakeup_after(self.repeat_delay);
        }
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        button.index().map(|idx| self.buttons[idx]).unwrap_or(false)
    }

    pub fn any_pressed(&self) -> bool {
        self.buttons.iter().any(|b| *b)
    }

    /// Forget the current press of `button` so its upcoming release does
    /// not register as a click. Screens call this when a press starts a
    /// hold-to-confirm gesture.
    pub fn suppress_click(&mut self, button: Button) {
        if let Some(idx) = button.index() {
            self.buttons[idx] = false;
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_events(&self) -> usize {
        self.events.len()
    }
}
