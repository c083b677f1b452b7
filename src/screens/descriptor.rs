//! Scanned wallet overview: policy summary, cosigner pages and the
//! hand-off into seed entry and engraving.

use crate::context::Context;
use crate::input::Button;
use crate::render::{Anchor, Asset, ButtonStyle, Scene, TextRole};
use crate::screens::dialog::ErrorScreen;
use crate::screens::engrave::{EngraveResult, EngraveScreen};
use crate::screens::seed::{SeedResult, SeedScreen};
use crate::wallet::Descriptor;

/// Rows of key material visible at once on the cosigner page.
const BODY_ROWS: usize = 3;

/// Pager over the descriptor's cosigners.
struct CosignersScreen {
    page: usize,
    scroll: usize,
}

impl CosignersScreen {
    fn new() -> Self {
        CosignersScreen { page: 0, scroll: 0 }
    }

    /// Returns true when the user backs out.
    fn layout(
        &mut self,
        ctx: &mut Context,
        scene: &mut Scene,
        desc: &Descriptor,
    ) -> bool {
        let n = desc.keys.len();
        let mut back = false;
        while let Some(e) = ctx.next() {
            match e.button {
                Button::Left if e.pressed => {
                    self.page = self.page.saturating_sub(1);
                    self.scroll = 0;
                }
                Button::Right if e.pressed => {
                    self.page = (self.page + 1).min(n - 1);
                    self.scroll = 0;
                }
                Button::Up if e.pressed => self.scroll = self.scroll.saturating_sub(1),
                Button::Down if e.pressed => self.scroll += 1,
                Button::Button1 if e.click => back = true,
                _ => {}
            }
        }

        let th = ctx.styles.descriptor;
        scene.clear_color(th.background);
        scene.title(format!("Cosigner {} of {}", self.page + 1, n), th.text);
        let key = &desc.keys[self.page];
        scene.text(
            key.fingerprint_label(),
            TextRole::Subtitle,
            th.primary,
            Anchor::Top,
        );
        // Key material, wrapped for the narrow display and scrolled with
        // up/down.
        let canonical = key.xpub.canonical();
        let rows: Vec<String> = canonical
            .as_bytes()
            .chunks(26)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect();
        self.scroll = self.scroll.min(rows.len().saturating_sub(BODY_ROWS));
        for (row, text) in rows.iter().skip(self.scroll).take(BODY_ROWS).enumerate() {
            scene.text(text.clone(), TextRole::Keyboard, th.text, Anchor::Row(row));
        }
        if self.scroll > 0 {
            scene.image(Asset::ArrowUp, Anchor::Top);
        }
        if self.scroll + BODY_ROWS < rows.len() {
            scene.image(Asset::ArrowDown, Anchor::Bottom);
        }
        for i in 0..n {
            scene.image(
                if i == self.page {
                    Asset::PagerDotFilled
                } else {
                    Asset::PagerDot
                },
                Anchor::Bottom,
            );
        }
        if self.page > 0 {
            scene.image(Asset::ArrowLeft, Anchor::Left);
        }
        if self.page + 1 < n {
            scene.image(Asset::ArrowRight, Anchor::Right);
        }
        scene.nav(
            Button::Button1,
            ButtonStyle::Secondary,
            Asset::IconBack,
            ctx.is_pressed(Button::Button1),
            None,
        );
        back
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResult {
    None,
    Back,
    /// A share plate was completed.
    Done,
}

enum Child {
    Overview,
    Cosigners(CosignersScreen),
    Seed(SeedScreen),
    Engrave(EngraveScreen),
}

/// The multisig flow after a wallet has been scanned and validated.
pub struct DescriptorScreen {
    desc: Descriptor,
    child: Child,
    dialog: Option<ErrorScreen>,
}

impl DescriptorScreen {
    /// `desc` must already have passed descriptor validation.
    pub fn new(desc: Descriptor) -> Self {
        DescriptorScreen {
            desc,
            child: Child::Overview,
            dialog: None,
        }
    }

    fn render_overview(&self, ctx: &Context, scene: &mut Scene) {
        let th = ctx.styles.descriptor;
        scene.clear_color(th.background);
        let title = if self.desc.title.is_empty() {
            "Wallet".to_string()
        } else {
            self.desc.title.clone()
        };
        scene.title(title, th.text);
        scene.text(
            format!(
                "{}-of-{} {}",
                self.desc.threshold,
                self.desc.keys.len(),
                self.desc.script
            ),
            TextRole::Lead,
            th.primary,
            Anchor::Center,
        );
        scene.text(
            "Each cosigner seed gets its own plate.",
            TextRole::Body,
            th.text,
            Anchor::Bottom,
        );
        scene.nav(
            Button::Button1,
            ButtonStyle::Secondary,
            Asset::IconBack,
            ctx.is_pressed(Button::Button1),
            None,
        );
        scene.nav(
            Button::Button2,
            ButtonStyle::Secondary,
            Asset::IconInfo,
            ctx.is_pressed(Button::Button2),
            None,
        );
        scene.nav(
            Button::Button3,
            ButtonStyle::Primary,
            Asset::IconRight,
            ctx.is_pressed(Button::Button3),
            None,
        );
    }

    pub fn layout(&mut self, ctx: &mut Context, scene: &mut Scene) -> DescriptorResult {
        if let Some(dialog) = &self.dialog {
            scene.clear_color(ctx.styles.descriptor.background);
            if dialog.layout(ctx, scene) {
                self.dialog = None;
            }
            return DescriptorResult::None;
        }

        loop {
            *scene = Scene::new();
            match &mut self.child {
                Child::Overview => {
                    while let Some(e) = ctx.next() {
                        match e.button {
                            Button::Button1 if e.click => return DescriptorResult::Back,
                            Button::Button2 if e.click => {
                                self.child = Child::Cosigners(CosignersScreen::new());
                            }
                            Button::Button3 | Button::Center if e.click => {
                                self.child = Child::Seed(SeedScreen::new(ctx));
                            }
                            _ => {}
                        }
                        if !matches!(self.child, Child::Overview) {
                            break;
                        }
                    }
                    if !matches!(self.child, Child::Overview) {
                        continue;
                    }
                    self.render_overview(ctx, scene);
                }
                Child::Cosigners(pager) => {
                    if pager.layout(ctx, scene, &self.desc) {
                        self.child = Child::Overview;
                        continue;
                    }
                }
                Child::Seed(seed) => match seed.layout(ctx, scene) {
                    SeedResult::None => {}
                    SeedResult::Back => {
                        self.child = Child::Overview;
                        continue;
                    }
                    SeedResult::Seed(m) => {
                        match EngraveScreen::new(ctx, &self.desc, &m) {
                            Ok(engrave) => self.child = Child::Engrave(engrave),
                            Err(err) => {
                                tracing::warn!("descriptor: seed rejected: {err}");
                                self.dialog = Some(ErrorScreen::from_validation(&err));
                                self.child = Child::Overview;
                                ctx.wakeup().poke();
                            }
                        }
                        continue;
                    }
                },
                Child::Engrave(engrave) => match engrave.layout(ctx, scene) {
                    EngraveResult::None => {}
                    EngraveResult::Cancelled => {
                        self.child = Child::Overview;
                        continue;
                    }
                    EngraveResult::Done => return DescriptorResult::Done,
                },
            }
            break;
        }
        DescriptorResult::None
    }
}
