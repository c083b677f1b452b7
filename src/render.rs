//! Per-tick render description.
//!
//! Screens do not composite pixels. Each tick they emit a [`Scene`], a flat
//! list of drawing operations referencing text, asset identifiers and theme
//! colors; the display driver behind the [`Display`] trait rasterizes it and
//! reports which region actually changed. Keeping the description this light
//! makes every screen a pure function of its state, which is what the frame
//! tests rely on.

use std::io;
use std::sync::Arc;

/// 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Palette for one flow.
#[derive(Debug, Clone, Copy)]
pub struct Colors {
    pub background: Rgb,
    pub text: Rgb,
    pub primary: Rgb,
}

/// Per-flow palettes, created once at startup and carried on the context.
#[derive(Debug, Clone, Copy)]
pub struct Styles {
    pub single: Colors,
    pub descriptor: Colors,
    pub engrave: Colors,
    pub camera: Colors,
}

impl Default for Styles {
    fn default() -> Self {
        Styles {
            single: Colors {
                background: Rgb(0x1d, 0x32, 0x2b),
                text: Rgb(0xf0, 0xf0, 0xe8),
                primary: Rgb(0x3c, 0xb0, 0x6d),
            },
            descriptor: Colors {
                background: Rgb(0x1b, 0x27, 0x3a),
                text: Rgb(0xf0, 0xf0, 0xe8),
                primary: Rgb(0x3f, 0x8c, 0xd6),
            },
            engrave: Colors {
                background: Rgb(0x33, 0x24, 0x1a),
                text: Rgb(0xf0, 0xf0, 0xe8),
                primary: Rgb(0xd6, 0x8a, 0x3f),
            },
            camera: Colors {
                background: Rgb(0x00, 0x00, 0x00),
                text: Rgb(0xff, 0xff, 0xff),
                primary: Rgb(0x3c, 0xb0, 0x6d),
            },
        }
    }
}

/// Bitmap assets baked into the display driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    PlateSmall,
    PlateSquare,
    PlateLarge,
    IconBack,
    IconLeft,
    IconRight,
    IconCheckmark,
    IconInfo,
    IconEdit,
    IconDiscard,
    IconHammer,
    IconProgress,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    CameraCorners,
    PagerDot,
    PagerDotFilled,
}

/// Text roles stand in for the concrete faces the driver ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Title,
    Subtitle,
    Body,
    Lead,
    Word,
    Button,
    Warning,
    Progress,
    Keyboard,
    Debug,
}

/// Coarse placement hint; exact layout belongs to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Top,
    Center,
    Bottom,
    Left,
    Right,
    BottomLeft,
    BottomRight,
    /// nth row of a scrolling list.
    Row(usize),
}

/// Visual weight of a navigation button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Secondary,
    Primary,
}

#[derive(Debug, Clone)]
pub enum DrawOp {
    Clear(Rgb),
    Text {
        text: String,
        role: TextRole,
        color: Rgb,
        anchor: Anchor,
        highlighted: bool,
    },
    Image {
        asset: Asset,
        anchor: Anchor,
    },
    /// Scaled camera feed backing the scan screen.
    CameraFeed {
        width: usize,
        height: usize,
        luma: Arc<Vec<u8>>,
    },
    /// Circular progress indicator, `fraction` in 0..=1.
    ProgressArc {
        fraction: f32,
        anchor: Anchor,
    },
    /// Thin step-progress bar along the top edge.
    ProgressBar {
        fraction: f32,
        color: Rgb,
    },
    /// One key of the word keyboard.
    Key {
        ch: char,
        active: bool,
        enabled: bool,
    },
    /// Side navigation button with an optional hold-progress overlay.
    NavButton {
        button: crate::input::Button,
        style: ButtonStyle,
        icon: Asset,
        pressed: bool,
        hold_progress: Option<f32>,
    },
    /// Dimming layer under a dialog.
    Overlay,
}

/// One frame's worth of drawing operations.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    ops: Vec<DrawOp>,
}

impl Scene {
    pub fn new() -> Self {
        Scene::default()
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn clear_color(&mut self, color: Rgb) {
        self.push(DrawOp::Clear(color));
    }

    pub fn title(&mut self, text: impl Into<String>, color: Rgb) {
        self.push(DrawOp::Text {
            text: text.into(),
            role: TextRole::Title,
            color,
            anchor: Anchor::Top,
            highlighted: false,
        });
    }

    pub fn text(&mut self, text: impl Into<String>, role: TextRole, color: Rgb, anchor: Anchor) {
        self.push(DrawOp::Text {
            text: text.into(),
            role,
            color,
            anchor,
            highlighted: false,
        });
    }

    pub fn text_highlighted(
        &mut self,
        text: impl Into<String>,
        role: TextRole,
        color: Rgb,
        anchor: Anchor,
    ) {
        self.push(DrawOp::Text {
            text: text.into(),
            role,
            color,
            anchor,
            highlighted: true,
        });
    }

    pub fn image(&mut self, asset: Asset, anchor: Anchor) {
        self.push(DrawOp::Image { asset, anchor });
    }

    pub fn nav(
        &mut self,
        button: crate::input::Button,
        style: ButtonStyle,
        icon: Asset,
        pressed: bool,
        hold_progress: Option<f32>,
    ) {
        self.push(DrawOp::NavButton {
            button,
            style,
            icon,
            pressed,
            hold_progress,
        });
    }

    /// True when any op references the given text, useful in tests.
    pub fn contains_text(&self, needle: &str) -> bool {
        self.ops.iter().any(|op| match op {
            DrawOp::Text { text, .. } => text.contains(needle),
            _ => false,
        })
    }
}

/// Changed display region, reported by the driver after a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Render/display boundary: fixed-size canvas plus damage reporting.
pub trait Display: Send {
    fn dims(&self) -> (usize, usize);
    fn draw(&mut self, scene: &Scene) -> io::Result<Region>;
    /// RGB8 snapshot of the last drawn frame, if the driver keeps one.
    fn snapshot(&self) -> Option<(usize, usize, Vec<u8>)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_collects_ops_in_order() {
        let styles = Styles::default();
        let mut scene = Scene::new();
        scene.clear_color(styles.single.background);
        scene.title("Backup Singlesig", styles.single.text);
        assert_eq!(scene.ops().len(), 2);
        assert!(matches!(scene.ops()[0], DrawOp::Clear(_)));
        assert!(scene.contains_text("Singlesig"));
    }

    #[test]
    fn contains_text_matches_substrings_only_in_text_ops() {
        let mut scene = Scene::new();
        scene.image(Asset::PlateSquare, Anchor::Center);
        assert!(!scene.contains_text("Plate"));
        scene.text("Share 1 of 3", TextRole::Body, Rgb(0, 0, 0), Anchor::Center);
        assert!(scene.contains_text("1 of 3"));
    }
}
