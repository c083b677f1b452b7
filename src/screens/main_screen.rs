//! Top-level screen: flow selection pager, SD-card warning and the fatal
//! input-error notice.

use crate::context::Context;
use crate::input::Button;
use crate::render::{Anchor, Asset, ButtonStyle, Scene, TextRole};
use crate::scan::Scanned;
use crate::screens::dialog::{ConfirmResult, ConfirmWarningScreen, ErrorScreen};
use crate::screens::descriptor::{DescriptorResult, DescriptorScreen};
use crate::screens::engrave::{EngraveResult, EngraveScreen};
use crate::screens::scan::{ScanResult, ScanScreen};
use crate::screens::seed::{SeedResult, SeedScreen};
use crate::validate::validate_descriptor;
use crate::wallet::Descriptor;

const PAGES: [&str; 2] = ["Backup Singlesig", "Backup Multisig"];

enum Child {
    Home,
    /// Singlesig: seed entry straight into engraving.
    Seed(SeedScreen),
    Engrave(EngraveScreen),
    /// Multisig: scan the wallet first.
    Scan(ScanScreen),
    Descriptor(DescriptorScreen),
}

enum Dialog {
    Error(ErrorScreen),
    /// A card was present when entering a flow; holding proceeds anyway.
    SdCard(ConfirmWarningScreen),
}

pub struct MainScreen {
    page: usize,
    child: Child,
    dialog: Option<Dialog>,
    /// Permanent notice when raw input delivery could not be started.
    input_error: Option<String>,
    sdcard_present: bool,
    sdcard_warned: bool,
}

impl MainScreen {
    pub fn new() -> Self {
        MainScreen {
            page: 0,
            child: Child::Home,
            dialog: None,
            input_error: None,
            sdcard_present: false,
            sdcard_warned: false,
        }
    }

    pub fn set_input_error(&mut self, msg: String) {
        self.input_error = Some(msg);
    }

    /// SD-card state change from the platform. The warning itself is only
    /// raised when a flow is entered with a card present; removing the card
    /// takes a raised warning down again.
    pub fn set_sdcard(&mut self, inserted: bool) {
        self.sdcard_present = inserted;
        if !inserted && matches!(self.dialog, Some(Dialog::SdCard(_))) {
            self.dialog = None;
        }
    }

    fn start_flow(&mut self, ctx: &Context) {
        self.child = if self.page == 0 {
            Child::Seed(SeedScreen::new(ctx))
        } else {
            Child::Scan(ScanScreen::new(ctx, "Scan wallet"))
        };
    }

    fn accept_wallet_scan(&mut self, ctx: &Context, scanned: Scanned) {
        let desc = match scanned {
            Scanned::Payload(crate::multipart::Payload::Descriptor(desc)) => Ok(desc),
            Scanned::Payload(_) => Err("the code contains a seed, not a wallet".to_string()),
            Scanned::Bytes(bytes) => std::str::from_utf8(&bytes)
                .map_err(|_| "not a wallet export".to_string())
                .and_then(|text| {
                    Descriptor::decode(text).map_err(|err| err.to_string())
                }),
        };
        match desc {
            Err(reason) => {
                tracing::warn!("main: rejected scan: {reason}");
                self.dialog = Some(Dialog::Error(ErrorScreen::new(
                    "Invalid Code",
                    format!("The scanned code is not usable: {reason}."),
                )));
                self.child = Child::Home;
            }
            Ok(desc) => match validate_descriptor(&desc) {
                Ok(()) => self.child = Child::Descriptor(DescriptorScreen::new(desc)),
                Err(err) => {
                    tracing::warn!("main: rejected wallet: {err}");
                    self.dialog = Some(Dialog::Error(ErrorScreen::from_validation(&err)));
                    self.child = Child::Home;
                }
            },
        }
        if self.dialog.is_some() {
            // The dialog layer renders at the top of the next frame.
            ctx.wakeup().poke();
        }
    }

    fn render_home(&self, ctx: &Context, scene: &mut Scene) {
        let th = if self.page == 0 {
            ctx.styles.single
        } else {
            ctx.styles.descriptor
        };
        scene.clear_color(th.background);
        scene.title("PlateSmith", th.text);
        scene.text(&ctx.version, TextRole::Debug, th.text, Anchor::BottomRight);
        if let Some(err) = &self.input_error {
            scene.text(
                format!("Input failure: {err}\n\nThe buttons are unresponsive; power cycle the appliance."),
                TextRole::Warning,
                th.primary,
                Anchor::Center,
            );
            return;
        }
        scene.text_highlighted(PAGES[self.page], TextRole::Lead, th.primary, Anchor::Center);
        for i in 0..PAGES.len() {
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
        if self.page + 1 < PAGES.len() {
            scene.image(Asset::ArrowRight, Anchor::Right);
        }
        scene.nav(
            Button::Button3,
            ButtonStyle::Primary,
            Asset::IconRight,
            ctx.is_pressed(Button::Button3),
            None,
        );
    }

    pub fn layout(&mut self, ctx: &mut Context, scene: &mut Scene) {
        if let Some(mut dialog) = self.dialog.take() {
            *scene = Scene::new();
            scene.clear_color(ctx.styles.engrave.background);
            let keep = match &mut dialog {
                Dialog::Error(err) => !err.layout(ctx, scene),
                Dialog::SdCard(confirm) => match confirm.layout(ctx, scene) {
                    ConfirmResult::None => true,
                    ConfirmResult::Dismissed => false,
                    ConfirmResult::Confirmed => {
                        self.start_flow(ctx);
                        false
                    }
                },
            };
            if keep {
                self.dialog = Some(dialog);
            }
            return;
        }

        loop {
            *scene = Scene::new();
            match &mut self.child {
                Child::Home => {
                    if self.input_error.is_none() {
                        while let Some(e) = ctx.next() {
                            match e.button {
                                Button::Left if e.pressed => {
                                    self.page = self.page.saturating_sub(1);
                                }
                                Button::Right if e.pressed => {
                                    self.page = (self.page + 1).min(PAGES.len() - 1);
                                }
                                Button::Button3 | Button::Center if e.click => {
                                    if self.sdcard_present && !self.sdcard_warned {
                                        self.sdcard_warned = true;
                                        self.dialog = Some(Dialog::SdCard(
                                            ConfirmWarningScreen::new(
                                                "Remove SD Card",
                                                "An SD card is inserted. Remove it before entering a seed.\n\nHold to continue with the card in place.",
                                            ),
                                        ));
                                        ctx.wakeup().poke();
                                        break;
                                    }
                                    self.start_flow(ctx);
                                }
                                _ => {}
                            }
                            if !matches!(self.child, Child::Home) {
                                break;
                            }
                        }
                    } else {
                        while ctx.next().is_some() {}
                    }
                    if !matches!(self.child, Child::Home) {
                        continue;
                    }
                    self.render_home(ctx, scene);
                }
                Child::Seed(seed) => match seed.layout(ctx, scene) {
                    SeedResult::None => {}
                    SeedResult::Back => {
                        self.child = Child::Home;
                        continue;
                    }
                    SeedResult::Seed(m) => {
                        let desc = Descriptor::singlesig(&m);
                        match EngraveScreen::new(ctx, &desc, &m) {
                            Ok(engrave) => self.child = Child::Engrave(engrave),
                            Err(err) => {
                                // Singlesig plates always fit; treat this
                                // as the defect it is.
                                tracing::error!("main: singlesig plan failed: {err}");
                                self.dialog =
                                    Some(Dialog::Error(ErrorScreen::from_validation(&err)));
                                self.child = Child::Home;
                                ctx.wakeup().poke();
                            }
                        }
                        continue;
                    }
                },
                Child::Engrave(engrave) => match engrave.layout(ctx, scene) {
                    EngraveResult::None => {}
                    EngraveResult::Cancelled | EngraveResult::Done => {
                        self.child = Child::Home;
                        continue;
                    }
                },
                Child::Scan(scan) => match scan.layout(ctx, scene) {
                    ScanResult::None => {}
                    ScanResult::Back => {
                        self.child = Child::Home;
                        continue;
                    }
                    ScanResult::Scanned(scanned) => {
                        self.accept_wallet_scan(ctx, scanned);
                        continue;
                    }
                },
                Child::Descriptor(desc) => match desc.layout(ctx, scene) {
                    DescriptorResult::None => {}
                    DescriptorResult::Back | DescriptorResult::Done => {
                        self.child = Child::Home;
                        continue;
                    }
                },
            }
            break;
        }
    }
}

impl Default for MainScreen {
    fn default() -> Self {
        MainScreen::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::Wakeup;
    use crate::input::RawEvent;
    use crate::multipart::{self, Payload, PayloadKind};
    use crate::testing::TestPlatform;
    use crate::wallet::testdata;
    use std::sync::Arc;

    fn ctx() -> (Context, Arc<TestPlatform>) {
        let platform = Arc::new(TestPlatform::new());
        let (wakeup, _rx) = Wakeup::channel();
        let ctx = Context::new(platform.clone(), &Config::default(), wakeup);
        (ctx, platform)
    }

    fn click(ctx: &mut Context, b: Button) {
        ctx.submit(RawEvent::press(b));
        ctx.submit(RawEvent::release(b));
    }

    fn step(screen: &mut MainScreen, ctx: &mut Context) -> Scene {
        let mut scene = Scene::new();
        screen.layout(ctx, &mut scene);
        scene
    }

    #[test]
    fn pager_switches_between_flows() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Backup Singlesig"));

        ctx.submit(RawEvent::press(Button::Right));
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Backup Multisig"));

        ctx.submit(RawEvent::press(Button::Right));
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Backup Multisig"));
    }

    #[test]
    fn singlesig_flow_starts_with_seed_entry() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        click(&mut ctx, Button::Button3);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Input seed"));
    }

    #[test]
    fn valid_wallet_scan_opens_the_descriptor_screen() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        screen.accept_wallet_scan(&ctx, Scanned::Payload(Payload::Descriptor(
            testdata::multisig(2, 3),
        )));
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("2-of-3"));
    }

    #[test]
    fn oversized_wallet_scan_is_rejected() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        screen.accept_wallet_scan(&ctx, Scanned::Payload(Payload::Descriptor(
            testdata::multisig(2, 9),
        )));
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Wallet Too Large"));
        // Dismiss lands back home.
        click(&mut ctx, Button::Button3);
        step(&mut screen, &mut ctx);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Backup Singlesig"));
    }

    #[test]
    fn garbage_scan_is_rejected() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        screen.accept_wallet_scan(&ctx, Scanned::Bytes(b"gibberish".to_vec()));
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Invalid Code"));
    }

    #[test]
    fn seed_payload_is_not_a_wallet() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        let digits = "000001002003004005006007008009010011";
        let payload = multipart::parse_payload(PayloadKind::Seed, digits).unwrap();
        screen.accept_wallet_scan(&ctx, Scanned::Payload(payload));
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Invalid Code"));
    }

    #[test]
    fn sdcard_warning_gates_flow_entry_once() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        screen.set_sdcard(true);

        // The card alone does not warn; entering a flow does.
        let scene = step(&mut screen, &mut ctx);
        assert!(!scene.contains_text("SD Card"));
        click(&mut ctx, Button::Button3);
        step(&mut screen, &mut ctx);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Remove SD Card"));

        // Backing out stays home; the warning fired for this boot.
        click(&mut ctx, Button::Button1);
        step(&mut screen, &mut ctx);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Backup Singlesig"));
        click(&mut ctx, Button::Button3);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Input seed"));
    }

    #[test]
    fn sdcard_warning_hold_proceeds_into_the_flow() {
        let (mut ctx, platform) = ctx();
        let mut screen = MainScreen::new();
        screen.set_sdcard(true);
        click(&mut ctx, Button::Button3);
        step(&mut screen, &mut ctx);

        ctx.submit(RawEvent::press(Button::Button3));
        step(&mut screen, &mut ctx);
        platform.advance(std::time::Duration::from_millis(1000));
        step(&mut screen, &mut ctx);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Input seed"));
    }

    #[test]
    fn sdcard_removal_dismisses_the_warning() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        screen.set_sdcard(true);
        click(&mut ctx, Button::Button3);
        step(&mut screen, &mut ctx);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Remove SD Card"));

        screen.set_sdcard(false);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Backup Singlesig"));
    }

    #[test]
    fn input_error_is_permanent_and_blocks_flows() {
        let (mut ctx, _) = ctx();
        let mut screen = MainScreen::new();
        screen.set_input_error("evdev unavailable".to_string());
        click(&mut ctx, Button::Button3);
        let scene = step(&mut screen, &mut ctx);
        assert!(scene.contains_text("Input failure"));
        assert!(scene.contains_text("evdev unavailable"));
    }
}
