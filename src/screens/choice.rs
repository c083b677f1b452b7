//! Vertical option picker.

use crate::context::Context;
use crate::input::Button;
use crate::render::{Anchor, Asset, ButtonStyle, Colors, Scene, TextRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceResult {
    None,
    Back,
    Chosen(usize),
}

#[derive(Debug)]
pub struct ChoiceScreen {
    pub title: String,
    options: Vec<String>,
    selected: usize,
}

impl ChoiceScreen {
    pub fn new(title: impl Into<String>, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        debug_assert!(!options.is_empty());
        ChoiceScreen {
            title: title.into(),
            options,
            selected: 0,
        }
    }

    pub fn layout(&mut self, ctx: &mut Context, scene: &mut Scene, th: Colors) -> ChoiceResult {
        let mut result = ChoiceResult::None;
        while let Some(e) = ctx.next() {
            match e.button {
                Button::Up if e.pressed => {
                    self.selected = self.selected.saturating_sub(1);
                }
                Button::Down if e.pressed => {
                    self.selected = (self.selected + 1).min(self.options.len() - 1);
                }
                Button::Button1 if e.click => result = ChoiceResult::Back,
                Button::Button3 | Button::Center if e.click => {
                    result = ChoiceResult::Chosen(self.selected);
                }
                _ => {}
            }
        }

        scene.clear_color(th.background);
        scene.title(&self.title, th.text);
        for (i, option) in self.options.iter().enumerate() {
            if i == self.selected {
                scene.text_highlighted(option, TextRole::Body, th.primary, Anchor::Row(i));
            } else {
                scene.text(option, TextRole::Body, th.text, Anchor::Row(i));
            }
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
        result
    }
}
