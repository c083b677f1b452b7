//! Modal dialogs: informational errors and hold-to-confirm warnings.
//!
//! A dialog is layered over its owning screen. The owner skips its own
//! event handling while a dialog is up and calls the dialog's `layout`
//! after drawing its own content, so the dialog both consumes the frame's
//! events and paints on top.

use crate::confirm::ConfirmHold;
use crate::context::Context;
use crate::input::Button;
use crate::render::{Anchor, Asset, ButtonStyle, DrawOp, Scene, TextRole};
use crate::validate::ValidationError;

/// Informational dialog dismissed with a click.
#[derive(Debug, Clone)]
pub struct ErrorScreen {
    pub title: String,
    pub body: String,
}

impl ErrorScreen {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        ErrorScreen {
            title: title.into(),
            body: body.into(),
        }
    }

    /// User-facing wording for each descriptor rejection.
    pub fn from_validation(err: &ValidationError) -> Self {
        match err {
            ValidationError::DuplicateKey { fingerprint } => ErrorScreen::new(
                "Invalid Wallet",
                format!("The wallet lists cosigner {fingerprint:08x} more than once."),
            ),
            ValidationError::NonstandardDerivation { fingerprint, path } => ErrorScreen::new(
                "Unsupported Wallet",
                format!("Cosigner {fingerprint:08x} uses the non-standard derivation path {path}."),
            ),
            ValidationError::Plan(_) => ErrorScreen::new(
                "Wallet Too Large",
                "The wallet does not fit any plate size.\n\nReduce the number of cosigners.",
            ),
            ValidationError::KeyNotInDescriptor => ErrorScreen::new(
                "Unknown Seed",
                "The entered seed is not part of this wallet.\n\nCheck the seed and the wallet export.",
            ),
            ValidationError::NotRecoverable => ErrorScreen::new(
                "Internal Error",
                "The planned plates would not recover this wallet.\n\nThis is a defect in the appliance; please report it.",
            ),
        }
    }

    /// Returns true when dismissed.
    pub fn layout(&self, ctx: &mut Context, scene: &mut Scene) -> bool {
        let mut dismissed = false;
        while let Some(e) = ctx.next() {
            if e.click && matches!(e.button, Button::Button3 | Button::Center) {
                dismissed = true;
            }
        }
        if dismissed {
            // The owner repaints underneath on the next frame.
            ctx.wakeup().poke();
        }
        let th = ctx.styles.engrave;
        scene.push(DrawOp::Overlay);
        scene.text(&self.title, TextRole::Warning, th.text, Anchor::Top);
        scene.text(&self.body, TextRole::Body, th.text, Anchor::Center);
        scene.nav(
            Button::Button3,
            ButtonStyle::Primary,
            Asset::IconCheckmark,
            ctx.is_pressed(Button::Button3),
            None,
        );
        dismissed
    }
}

/// Outcome of a [`ConfirmWarningScreen`] frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmResult {
    None,
    /// Backed out without confirming.
    Dismissed,
    /// Hold completed.
    Confirmed,
}

/// Destructive-action prompt requiring a sustained hold.
#[derive(Debug)]
pub struct ConfirmWarningScreen {
    pub title: String,
    pub body: String,
    hold: ConfirmHold,
}

impl ConfirmWarningScreen {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        ConfirmWarningScreen {
            title: title.into(),
            body: body.into(),
            hold: ConfirmHold::default(),
        }
    }

    pub fn layout(&mut self, ctx: &mut Context, scene: &mut Scene) -> ConfirmResult {
        let mut result = ConfirmResult::None;
        while let Some(e) = ctx.next() {
            match e.button {
                Button::Button1 if e.click => result = ConfirmResult::Dismissed,
                Button::Button3 => {
                    if e.pressed && !self.hold.running() {
                        self.hold.start(ctx, ctx.confirm_hold);
                        // The completing hold must not double as a click.
                        ctx.suppress_click(Button::Button3);
                    } else if !e.pressed {
                        self.hold.clear();
                    }
                }
                _ => {}
            }
        }
        let progress = self.hold.progress(ctx);
        if progress >= 1.0 {
            self.hold.clear();
            result = ConfirmResult::Confirmed;
        }
        if result != ConfirmResult::None {
            ctx.wakeup().poke();
        }

        let th = ctx.styles.engrave;
        scene.push(DrawOp::Overlay);
        scene.text(&self.title, TextRole::Warning, th.text, Anchor::Top);
        scene.text(&self.body, TextRole::Body, th.text, Anchor::Center);
        scene.nav(
            Button::Button1,
            ButtonStyle::Secondary,
            Asset::IconBack,
            ctx.is_pressed(Button::Button1),
            None,
        );
        scene.nav(
            Button::Button3,
            ButtonStyle::Primary,
            Asset::IconCheckmark,
            ctx.is_pressed(Button::Button3),
            self.hold.running().then_some(progress),
        );
        result
    }
}
