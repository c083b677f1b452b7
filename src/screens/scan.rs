//! Camera scan screen: preview, multi-part progress and terminal errors.

use crate::context::Context;
use crate::input::Button;
use crate::render::{Anchor, Asset, ButtonStyle, DrawOp, Scene, TextRole};
use crate::scan::{ScanSession, Scanned};

/// Preview feed size in display pixels.
const FEED_DIMS: (usize, usize) = (192, 192);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    None,
    Back,
    Scanned(Scanned),
}

pub struct ScanScreen {
    pub title: String,
    session: Option<ScanSession>,
}

impl ScanScreen {
    pub fn new(ctx: &Context, title: impl Into<String>) -> Self {
        ScanScreen {
            title: title.into(),
            session: Some(ScanSession::new(ctx, FEED_DIMS)),
        }
    }

    /// Stop the camera. Must be called before the screen is dropped so a
    /// follow-up scan can reopen the device.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }

    pub fn layout(&mut self, ctx: &mut Context, scene: &mut Scene) -> ScanResult {
        let mut result = ScanResult::None;
        while let Some(e) = ctx.next() {
            if e.click && e.button == Button::Button1 {
                result = ScanResult::Back;
            }
        }
        if result == ScanResult::Back {
            self.close();
            return ScanResult::Back;
        }

        let scanned = match &mut self.session {
            Some(session) => session.poll(ctx),
            None => None,
        };
        if let Some(scanned) = scanned {
            self.close();
            return ScanResult::Scanned(scanned);
        }

        let th = ctx.styles.camera;
        scene.clear_color(th.background);
        scene.title(&self.title, th.text);
        match &self.session {
            Some(session) if session.error().is_some() => {
                scene.text(
                    "Camera unavailable.\n\nGo back and try again.",
                    TextRole::Warning,
                    th.text,
                    Anchor::Center,
                );
            }
            Some(session) => {
                match session.feed() {
                    Some(feed) => {
                        scene.push(DrawOp::CameraFeed {
                            width: feed.width,
                            height: feed.height,
                            luma: feed.luma.clone(),
                        });
                        scene.image(Asset::CameraCorners, Anchor::Center);
                    }
                    None => {
                        scene.text("Connecting...", TextRole::Lead, th.text, Anchor::Center);
                    }
                }
                if session.receiving() {
                    scene.push(DrawOp::ProgressArc {
                        fraction: session.progress(),
                        anchor: Anchor::Bottom,
                    });
                }
            }
            None => {}
        }
        scene.nav(
            Button::Button1,
            ButtonStyle::Secondary,
            Asset::IconBack,
            ctx.is_pressed(Button::Button1),
            None,
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::Wakeup;
    use crate::input::RawEvent;
    use crate::testing::TestPlatform;
    use crossbeam_channel::Receiver;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn setup() -> (Context, Arc<TestPlatform>, ScanScreen, Receiver<()>) {
        let platform = Arc::new(TestPlatform::new());
        let (wakeup, wakeup_rx) = Wakeup::channel();
        let ctx = Context::new(platform.clone(), &Config::default(), wakeup);
        let _ = wakeup_rx.try_recv();
        let screen = ScanScreen::new(&ctx, "Scan wallet");
        let deadline = Instant::now() + Duration::from_secs(1);
        while !platform.camera_running() && Instant::now() < deadline {
            std::thread::yield_now();
        }
        (ctx, platform, screen, wakeup_rx)
    }

    #[test]
    fn scanned_code_is_surfaced_and_camera_stopped() {
        let (mut ctx, platform, mut screen, wakeup_rx) = setup();
        platform.push_scan(vec![b"payload".to_vec()]);
        platform.deliver_frame(TestPlatform::frame(240, 240));

        let deadline = Instant::now() + Duration::from_secs(1);
        let mut result = ScanResult::None;
        while result == ScanResult::None && Instant::now() < deadline {
            let _ = wakeup_rx.recv_timeout(Duration::from_millis(50));
            result = screen.layout(&mut ctx, &mut Scene::new());
        }
        assert_eq!(result, ScanResult::Scanned(Scanned::Bytes(b"payload".to_vec())));
        assert!(!platform.camera_running());
    }

    #[test]
    fn back_stops_the_camera() {
        let (mut ctx, platform, mut screen, _wakeup_rx) = setup();
        ctx.submit(RawEvent::press(Button::Button1));
        ctx.submit(RawEvent::release(Button::Button1));
        assert_eq!(screen.layout(&mut ctx, &mut Scene::new()), ScanResult::Back);
        assert!(!platform.camera_running());
    }

    #[test]
    fn connecting_then_feed_is_rendered() {
        let (mut ctx, platform, mut screen, wakeup_rx) = setup();
        let mut scene = Scene::new();
        screen.layout(&mut ctx, &mut scene);
        assert!(scene.contains_text("Connecting"));

        platform.deliver_frame(TestPlatform::frame(240, 240));
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut has_feed = false;
        while !has_feed && Instant::now() < deadline {
            let _ = wakeup_rx.recv_timeout(Duration::from_millis(50));
            let mut scene = Scene::new();
            screen.layout(&mut ctx, &mut scene);
            has_feed = scene
                .ops()
                .iter()
                .any(|op| matches!(op, DrawOp::CameraFeed { .. }));
        }
        assert!(has_feed);
        screen.close();
    }
}
