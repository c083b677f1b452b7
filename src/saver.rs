//! Idle screensaver. A dark frame with the product mark drifting between
//! fixed anchor slots, stepped once a second to avoid burn-in on the OLED
//! panel. Input handling stays in the frame loop; the saver only draws.

use std::time::Instant;

use crate::context::Context;
use crate::render::{Anchor, Rgb, Scene, TextRole};

const STEP_SECS: u64 = 1;

/// Anchor slots the mark cycles through.
const SLOTS: [Anchor; 6] = [
    Anchor::Top,
    Anchor::Right,
    Anchor::BottomRight,
    Anchor::Bottom,
    Anchor::BottomLeft,
    Anchor::Left,
];

pub struct Saver {
    started: Instant,
}

impl Saver {
    pub fn new(ctx: &Context) -> Self {
        Saver {
            started: ctx.now(),
        }
    }

    pub fn layout(&self, ctx: &Context, scene: &mut Scene) {
        let elapsed = ctx.now().duration_since(self.started).as_secs();
        let slot = SLOTS[(elapsed / STEP_SECS) as usize % SLOTS.len()];
        scene.clear_color(Rgb(0, 0, 0));
        scene.text("PlateSmith", TextRole::Subtitle, Rgb(0x60, 0x60, 0x60), slot);
        ctx.wakeup_after(std::time::Duration::from_secs(STEP_SECS));
    }
}
