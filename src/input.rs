//! Raw button and text input shared by the platform boundary and the
//! event model.

/// Physical controls on the appliance, plus two virtual sources: `Rune`
/// carries text input (used by the word keyboard and by test drivers) and
/// `Screenshot` requests a diagnostic frame dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Center,
    Button1,
    Button2,
    Button3,
    Rune,
    Screenshot,
}

/// Number of physical buttons tracked in the pressed-state array.
pub const BUTTON_COUNT: usize = 8;

/// Physical buttons by pressed-state slot, inverse of [`Button::index`].
pub const PHYSICAL: [Button; BUTTON_COUNT] = [
    Button::Up,
    Button::Down,
    Button::Left,
    Button::Right,
    Button::Center,
    Button::Button1,
    Button::Button2,
    Button::Button3,
];

impl Button {
    /// Slot in the pressed-state array, or `None` for virtual sources.
    pub fn index(self) -> Option<usize> {
        match self {
            Button::Up => Some(0),
            Button::Down => Some(1),
            Button::Left => Some(2),
            Button::Right => Some(3),
            Button::Center => Some(4),
            Button::Button1 => Some(5),
            Button::Button2 => Some(6),
            Button::Button3 => Some(7),
            Button::Rune | Button::Screenshot => None,
        }
    }

    /// Directional buttons synthesize repeats while held.
    pub fn repeats(self) -> bool {
        matches!(
            self,
            Button::Up | Button::Down | Button::Left | Button::Right
        )
    }
}

/// One raw input event as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub button: Button,
    pub pressed: bool,
    pub rune: Option<char>,
}

impl RawEvent {
    pub fn press(button: Button) -> Self {
        RawEvent {
            button,
            pressed: true,
            rune: None,
        }
    }

    pub fn release(button: Button) -> Self {
        RawEvent {
            button,
            pressed: false,
            rune: None,
        }
    }

    pub fn rune(c: char) -> Self {
        RawEvent {
            button: Button::Rune,
            pressed: true,
            rune: Some(c),
        }
    }
}

/// A normalized event as consumed by screens. `click` is derived by the
/// event model: true on a release that matches a prior press of the same
/// button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub button: Button,
    pub pressed: bool,
    pub rune: Option<char>,
    pub click: bool,
}
