//! Seed collection: input method choice, word keyboard entry, camera scan
//! and the review grid.
//!
//! The screen is a child state machine plus an optional dialog layer. The
//! dialog always wins the frame's events; child transitions restart the
//! frame's rendering so the scene never mixes two children.

use crate::context::Context;
use crate::input::Button;
use crate::render::{Anchor, Asset, ButtonStyle, Scene, TextRole};
use crate::scan::Scanned;
use crate::screens::choice::{ChoiceResult, ChoiceScreen};
use crate::screens::dialog::{ConfirmResult, ConfirmWarningScreen, ErrorScreen};
use crate::screens::keyboard::{WordKeyboardScreen, WordResult};
use crate::screens::scan::{ScanResult, ScanScreen};
use crate::wallet::mnemonic::{label_for, Mnemonic};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedResult {
    None,
    Back,
    Seed(Mnemonic),
}

enum Child {
    Method(ChoiceScreen),
    Length(ChoiceScreen),
    Input(WordKeyboardScreen),
    Scanner(ScanScreen),
    Review,
}

enum Dialog {
    Error(ErrorScreen),
    Discard(ConfirmWarningScreen),
}

pub struct SeedScreen {
    mnemonic: Mnemonic,
    child: Child,
    dialog: Option<Dialog>,
    /// Review cursor.
    selected: usize,
    /// Sequential first-pass entry; cleared once every slot was visited.
    filling: bool,
}

fn method_choice() -> ChoiceScreen {
    ChoiceScreen::new("Input seed", ["Word keyboard", "Scan code"])
}

fn length_choice() -> ChoiceScreen {
    ChoiceScreen::new("Seed length", ["12 words", "24 words"])
}

impl SeedScreen {
    pub fn new(ctx: &Context) -> Self {
        let child = if ctx.enable_seed_scan {
            Child::Method(method_choice())
        } else {
            Child::Length(length_choice())
        };
        SeedScreen {
            mnemonic: Mnemonic::empty(0),
            child,
            dialog: None,
            selected: 0,
            filling: false,
        }
    }

    fn accept_scanned(&mut self, scanned: Scanned) {
        let parsed = match scanned {
            Scanned::Payload(crate::multipart::Payload::Seed(m)) => Some(m),
            Scanned::Payload(_) => None,
            Scanned::Bytes(bytes) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|text| {
                    Mnemonic::from_digits(text.trim()).or_else(|| Mnemonic::parse(text).ok())
                }),
        };
        match parsed {
            Some(m) if m.valid() => {
                self.mnemonic = m;
                self.selected = 0;
                self.child = Child::Review;
            }
            Some(_) => {
                self.dialog = Some(Dialog::Error(ErrorScreen::new(
                    "Invalid Seed",
                    "The scanned seed fails its checksum.",
                )));
                self.child = Child::Method(method_choice());
            }
            None => {
                self.dialog = Some(Dialog::Error(ErrorScreen::new(
                    "Invalid Code",
                    "The scanned code does not contain a seed.",
                )));
                self.child = Child::Method(method_choice());
            }
        }
    }

    fn render_review(&self, ctx: &Context, scene: &mut Scene) {
        let th = ctx.styles.single;
        scene.clear_color(th.background);
        scene.title("Recovery phrase", th.text);
        for i in 0..self.mnemonic.len() {
            let label = match self.mnemonic.get(i) {
                Some(word) => format!("{:2}. {}", i + 1, label_for(word)),
                None => format!("{:2}. ____", i + 1),
            };
            if i == self.selected {
                scene.text_highlighted(label, TextRole::Word, th.primary, Anchor::Row(i));
            } else {
                scene.text(label, TextRole::Word, th.text, Anchor::Row(i));
            }
        }
        if self.mnemonic.complete() && !self.mnemonic.valid() {
            scene.text(
                "Checksum mismatch",
                TextRole::Warning,
                th.primary,
                Anchor::Bottom,
            );
        }
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
            None,
        );
    }

    pub fn layout(&mut self, ctx: &mut Context, scene: &mut Scene) -> SeedResult {
        let th = ctx.styles.single;

        if let Some(dialog) = &mut self.dialog {
            *scene = Scene::new();
            scene.clear_color(th.background);
            match dialog {
                Dialog::Error(err) => {
                    if err.layout(ctx, scene) {
                        self.dialog = None;
                    }
                }
                Dialog::Discard(confirm) => match confirm.layout(ctx, scene) {
                    ConfirmResult::None => {}
                    ConfirmResult::Dismissed => self.dialog = None,
                    ConfirmResult::Confirmed => {
                        self.dialog = None;
                        return SeedResult::Back;
                    }
                },
            }
            return SeedResult::None;
        }

        loop {
            *scene = Scene::new();
            match &mut self.child {
                Child::Method(choice) => match choice.layout(ctx, scene, th) {
                    ChoiceResult::None => {}
                    ChoiceResult::Back => return SeedResult::Back,
                    ChoiceResult::Chosen(0) => {
                        self.child = Child::Length(length_choice());
                        continue;
                    }
                    ChoiceResult::Chosen(_) => {
                        self.child = Child::Scanner(ScanScreen::new(ctx, "Scan seed"));
                        continue;
                    }
                },
                Child::Length(choice) => match choice.layout(ctx, scene, th) {
                    ChoiceResult::None => {}
                    ChoiceResult::Back => {
                        if ctx.enable_seed_scan {
                            self.child = Child::Method(method_choice());
                            continue;
                        }
                        return SeedResult::Back;
                    }
                    ChoiceResult::Chosen(i) => {
                        let len = if i == 0 { 12 } else { 24 };
                        self.mnemonic = Mnemonic::empty(len);
                        self.filling = true;
                        self.child = Child::Input(WordKeyboardScreen::new(0, len));
                        continue;
                    }
                },
                Child::Input(kb) => match kb.layout(ctx, scene, th) {
                    WordResult::None => {}
                    WordResult::Back => {
                        if self.filling && kb.index == 0 {
                            self.child = Child::Length(length_choice());
                        } else {
                            self.selected = kb.index;
                            self.child = Child::Review;
                        }
                        continue;
                    }
                    WordResult::Word(word) => {
                        let index = kb.index;
                        self.mnemonic.set(index, word);
                        let next = index + 1;
                        if self.filling && next < self.mnemonic.len() {
                            self.child =
                                Child::Input(WordKeyboardScreen::new(next, self.mnemonic.len()));
                        } else {
                            self.filling = false;
                            self.selected = index;
                            self.child = Child::Review;
                        }
                        continue;
                    }
                },
                Child::Scanner(scan) => match scan.layout(ctx, scene) {
                    ScanResult::None => {}
                    ScanResult::Back => {
                        self.child = Child::Method(method_choice());
                        continue;
                    }
                    ScanResult::Scanned(scanned) => {
                        self.accept_scanned(scanned);
                        continue;
                    }
                },
                Child::Review => {
                    let mut result = SeedResult::None;
                    while let Some(e) = ctx.next() {
                        match e.button {
                            Button::Up if e.pressed => {
                                self.selected = self.selected.saturating_sub(1);
                            }
                            Button::Down if e.pressed => {
                                self.selected =
                                    (self.selected + 1).min(self.mnemonic.len() - 1);
                            }
                            Button::Center if e.click => {
                                self.child = match self.mnemonic.get(self.selected) {
                                    Some(word) => Child::Input(WordKeyboardScreen::with_word(
                                        self.selected,
                                        self.mnemonic.len(),
                                        word,
                                    )),
                                    None => Child::Input(WordKeyboardScreen::new(
                                        self.selected,
                                        self.mnemonic.len(),
                                    )),
                                };
                            }
                            Button::Button1 if e.click => {
                                if self.mnemonic.is_blank() {
                                    return SeedResult::Back;
                                }
                                self.dialog = Some(Dialog::Discard(ConfirmWarningScreen::new(
                                    "Discard seed?",
                                    "The entered words will be lost.",
                                )));
                            }
                            Button::Button3 if e.click => {
                                if self.mnemonic.valid() {
                                    result = SeedResult::Seed(self.mnemonic.clone());
                                } else {
                                    self.dialog = Some(Dialog::Error(ErrorScreen::new(
                                        "Invalid Seed",
                                        "The phrase is incomplete or fails its checksum.\n\nCheck every word.",
                                    )));
                                }
                            }
                            _ => {}
                        }
                        if result != SeedResult::None || self.dialog.is_some() {
                            break;
                        }
                        if matches!(self.child, Child::Input(_)) {
                            break;
                        }
                    }
                    if result != SeedResult::None {
                        return result;
                    }
                    if self.dialog.is_some() || matches!(self.child, Child::Input(_)) {
                        // Render the new state next pass or next frame.
                        if self.dialog.is_some() {
                            ctx.wakeup().poke();
                            self.render_review(ctx, scene);
                            return SeedResult::None;
                        }
                        continue;
                    }
                    self.render_review(ctx, scene);
                }
            }
            break;
        }
        SeedResult::None
    }
}
