//! Engraving flow screen: step instructions, hold-to-engrave and the
//! cancellation dialogs over an [`EngraveSession`].

use crate::confirm::ConfirmHold;
use crate::context::Context;
use crate::engrave::{EngraveSession, StepKind};
use crate::input::Button;
use crate::render::{Anchor, Asset, ButtonStyle, DrawOp, Scene, TextRole};
use crate::screens::dialog::{ConfirmResult, ConfirmWarningScreen, ErrorScreen};
use crate::validate::ValidationError;
use crate::wallet::mnemonic::Mnemonic;
use crate::wallet::Descriptor;

/// How long the hidden dry-run toggle must be held.
const DRY_RUN_HOLD: std::time::Duration = std::time::Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngraveResult {
    None,
    /// Aborted or failed; the session is closed.
    Cancelled,
    /// The plate is complete.
    Done,
}

enum Dialog {
    Error { screen: ErrorScreen, fatal: bool },
    CancelConfirm(ConfirmWarningScreen),
}

pub struct EngraveScreen {
    session: Option<EngraveSession>,
    hold: ConfirmHold,
    dryrun_hold: ConfirmHold,
    dialog: Option<Dialog>,
}

impl EngraveScreen {
    pub fn new(ctx: &Context, desc: &Descriptor, m: &Mnemonic) -> Result<Self, ValidationError> {
        Ok(EngraveScreen {
            session: Some(EngraveSession::new(ctx, desc, m)?),
            hold: ConfirmHold::default(),
            dryrun_hold: ConfirmHold::default(),
            dialog: None,
        })
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }

    pub fn layout(&mut self, ctx: &mut Context, scene: &mut Scene) -> EngraveResult {
        let th = ctx.styles.engrave;

        if let Some(dialog) = &mut self.dialog {
            scene.clear_color(th.background);
            match dialog {
                Dialog::Error { screen, fatal } => {
                    let fatal = *fatal;
                    if screen.layout(ctx, scene) {
                        self.dialog = None;
                        if fatal {
                            self.close();
                            return EngraveResult::Cancelled;
                        }
                    }
                }
                Dialog::CancelConfirm(confirm) => match confirm.layout(ctx, scene) {
                    ConfirmResult::None => {}
                    ConfirmResult::Dismissed => self.dialog = None,
                    ConfirmResult::Confirmed => {
                        self.dialog = None;
                        self.close();
                        return EngraveResult::Cancelled;
                    }
                },
            }
            return EngraveResult::None;
        }

        let Some(session) = self.session.as_mut() else {
            return EngraveResult::Cancelled;
        };
        session.poll(ctx);
        if let Some(warning) = session.take_warning() {
            self.dialog = Some(Dialog::Error {
                screen: ErrorScreen::new(warning.title, warning.body),
                fatal: warning.fatal,
            });
            ctx.wakeup().poke();
            return EngraveResult::None;
        }

        let kind = session.instruction().kind;
        let mut advance = false;
        let mut finish = false;
        while let Some(e) = ctx.next() {
            match e.button {
                Button::Button1 if e.click => {
                    if session.engraving() {
                        self.dialog = Some(Dialog::CancelConfirm(ConfirmWarningScreen::new(
                            "Abort engraving?",
                            "The plate will be incomplete and must be discarded.",
                        )));
                    } else if session.can_back() {
                        session.back();
                    } else if session.step() == 0 {
                        self.close();
                        return EngraveResult::Cancelled;
                    } else {
                        self.dialog = Some(Dialog::CancelConfirm(ConfirmWarningScreen::new(
                            "Abandon plate?",
                            "Progress on this plate will be lost.",
                        )));
                    }
                }
                Button::Button3 => match kind {
                    StepKind::Prepare if e.click => advance = true,
                    StepKind::Done if e.click => finish = true,
                    StepKind::Connect => {
                        if e.pressed && !self.hold.running() {
                            self.hold.start(ctx, ctx.confirm_hold);
                            ctx.suppress_click(Button::Button3);
                        } else if !e.pressed {
                            self.hold.clear();
                        }
                    }
                    _ => {}
                },
                Button::Button2 => {
                    if e.pressed && !self.dryrun_hold.running() {
                        self.dryrun_hold.start(ctx, DRY_RUN_HOLD);
                        ctx.suppress_click(Button::Button2);
                    } else if !e.pressed {
                        self.dryrun_hold.clear();
                    }
                }
                _ => {}
            }
            if self.dialog.is_some() {
                ctx.wakeup().poke();
                break;
            }
        }
        if self.dialog.is_some() {
            scene.clear_color(th.background);
            return EngraveResult::None;
        }

        let hold_progress = self.hold.progress(ctx);
        if hold_progress >= 1.0 {
            self.hold.clear();
            advance = true;
        }
        if self.dryrun_hold.progress(ctx) >= 1.0 {
            self.dryrun_hold.clear();
            session.toggle_dry_run();
        }
        if advance || finish {
            if session.advance(ctx) {
                self.close();
                return EngraveResult::Done;
            }
            // A connection failure surfaces as a warning next frame.
            ctx.wakeup().poke();
            return EngraveResult::None;
        }

        let session = self.session.as_ref().unwrap();
        scene.clear_color(th.background);
        if session.shares > 1 {
            scene.title(
                format!("Share {} of {}", session.share + 1, session.shares),
                th.text,
            );
        } else {
            scene.title("Backup", th.text);
        }
        scene.push(DrawOp::ProgressBar {
            fraction: session.step_fraction(),
            color: th.primary,
        });
        let instruction = session.instruction();
        scene.text(&instruction.body, TextRole::Body, th.text, Anchor::Center);
        if let Some(image) = instruction.image {
            scene.image(image, Anchor::Bottom);
        }
        if session.engraving() {
            scene.push(DrawOp::ProgressArc {
                fraction: session.progress(),
                anchor: Anchor::Center,
            });
            scene.text(
                format!("{}%", (session.progress() * 100.0) as u32),
                TextRole::Progress,
                th.primary,
                Anchor::Bottom,
            );
        }
        if session.dry_run() {
            scene.text("dry run", TextRole::Debug, th.primary, Anchor::BottomLeft);
        }

        scene.nav(
            Button::Button1,
            ButtonStyle::Secondary,
            Asset::IconBack,
            ctx.is_pressed(Button::Button1),
            None,
        );
        match instruction.kind {
            StepKind::Prepare | StepKind::Done => {
                scene.nav(
                    Button::Button3,
                    ButtonStyle::Primary,
                    Asset::IconRight,
                    ctx.is_pressed(Button::Button3),
                    None,
                );
            }
            StepKind::Connect => {
                scene.nav(
                    Button::Button3,
                    ButtonStyle::Primary,
                    Asset::IconHammer,
                    ctx.is_pressed(Button::Button3),
                    self.hold.running().then_some(hold_progress),
                );
            }
            StepKind::Engrave => {}
        }
        EngraveResult::None
    }
}
