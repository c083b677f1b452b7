//! On-device word keyboard.
//!
//! Three rows of letter keys driven by the directional buttons. Keys that
//! cannot extend the current prefix into any wordlist entry are disabled,
//! and the cursor snaps to the nearest enabled key so navigation never
//! strands on a dead letter. Text input events (from an attached debug
//! keyboard or the test driver) feed the same prefix.

use crate::context::Context;
use crate::input::Button;
use crate::render::{Anchor, Asset, ButtonStyle, Colors, DrawOp, Scene, TextRole};
use crate::wallet::mnemonic::{closest_word, label_for, Word};

const ROWS: [&str; 3] = ["qwertyuiop", "asdfghjkl", "zxcvbnm"];

/// Cursor over the key grid.
#[derive(Debug, Clone, Copy)]
struct Keyboard {
    row: usize,
    col: usize,
}

impl Keyboard {
    fn new() -> Self {
        Keyboard { row: 0, col: 0 }
    }

    fn key(row: usize, col: usize) -> char {
        ROWS[row].as_bytes()[col] as char
    }

    fn enabled(prefix: &str, ch: char) -> bool {
        let mut candidate = prefix.to_string();
        candidate.push(ch);
        closest_word(&candidate).is_some()
    }

    fn active(&self) -> char {
        Keyboard::key(self.row, self.col)
    }

    fn active_enabled(&self, prefix: &str) -> bool {
        Keyboard::enabled(prefix, self.active())
    }

    /// Nearest enabled column in the current row, preferring the current
    /// position. Stays put when the whole row is disabled.
    fn snap(&mut self, prefix: &str) {
        let len = ROWS[self.row].len();
        self.col = self.col.min(len - 1);
        for offset in 0..len {
            for col in [
                self.col.checked_sub(offset),
                Some(self.col + offset).filter(|c| *c < len),
            ]
            .into_iter()
            .flatten()
            {
                if Keyboard::enabled(prefix, Keyboard::key(self.row, col)) {
                    self.col = col;
                    return;
                }
            }
        }
    }

    fn step(&mut self, button: Button, prefix: &str) {
        match button {
            Button::Up if self.row > 0 => {
                self.row -= 1;
                self.snap(prefix);
            }
            Button::Down if self.row < ROWS.len() - 1 => {
                self.row += 1;
                self.snap(prefix);
            }
            Button::Left | Button::Right => {
                let len = ROWS[self.row].len();
                let dir: isize = if button == Button::Left { -1 } else { 1 };
                let mut col = self.col as isize;
                loop {
                    col += dir;
                    if col < 0 || col as usize >= len {
                        return;
                    }
                    if Keyboard::enabled(prefix, Keyboard::key(self.row, col as usize)) {
                        self.col = col as usize;
                        return;
                    }
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordResult {
    None,
    Back,
    Word(Word),
}

/// One word slot's entry screen.
#[derive(Debug)]
pub struct WordKeyboardScreen {
    /// Slot being edited, for the title only.
    pub index: usize,
    total: usize,
    prefix: String,
    kb: Keyboard,
}

impl WordKeyboardScreen {
    pub fn new(index: usize, total: usize) -> Self {
        let mut screen = WordKeyboardScreen {
            index,
            total,
            prefix: String::new(),
            kb: Keyboard::new(),
        };
        screen.kb.snap("");
        screen
    }

    /// Prefill with an existing word, for editing.
    pub fn with_word(index: usize, total: usize, word: Word) -> Self {
        let mut screen = WordKeyboardScreen::new(index, total);
        screen.prefix = label_for(word).to_string();
        screen.kb.snap(&screen.prefix);
        screen
    }

    /// The wordlist entry the current prefix selects.
    pub fn candidate(&self) -> Option<Word> {
        closest_word(&self.prefix)
    }

    fn push(&mut self, ch: char) {
        if Keyboard::enabled(&self.prefix, ch) {
            self.prefix.push(ch);
            self.kb.snap(&self.prefix);
        }
    }

    fn backspace(&mut self) {
        self.prefix.pop();
        self.kb.snap(&self.prefix);
    }

    pub fn layout(&mut self, ctx: &mut Context, scene: &mut Scene, th: Colors) -> WordResult {
        let mut result = WordResult::None;
        while let Some(e) = ctx.next() {
            match e.button {
                Button::Up | Button::Down | Button::Left | Button::Right if e.pressed => {
                    self.kb.step(e.button, &self.prefix);
                }
                Button::Center if e.click => {
                    if self.kb.active_enabled(&self.prefix) {
                        let ch = self.kb.active();
                        self.push(ch);
                    }
                }
                Button::Button1 if e.click => {
                    if self.prefix.is_empty() {
                        result = WordResult::Back;
                    } else {
                        self.backspace();
                    }
                }
                Button::Button2 if e.click => self.backspace(),
                Button::Button3 if e.click => {
                    if let Some(word) = self.candidate() {
                        result = WordResult::Word(word);
                    }
                }
                Button::Rune => {
                    if let Some(ch) = e.rune {
                        match ch {
                            ' ' | '\n' => {
                                if let Some(word) = self.candidate() {
                                    result = WordResult::Word(word);
                                }
                            }
                            '\u{8}' => self.backspace(),
                            _ if ch.is_ascii_alphabetic() => {
                                self.push(ch.to_ascii_lowercase());
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        scene.clear_color(th.background);
        scene.title(format!("Word {} of {}", self.index + 1, self.total), th.text);
        let shown = match self.candidate() {
            Some(word) => label_for(word).to_string(),
            None => self.prefix.clone(),
        };
        scene.text_highlighted(shown, TextRole::Word, th.primary, Anchor::Center);
        for (row, keys) in ROWS.iter().enumerate() {
            for (col, ch) in keys.chars().enumerate() {
                scene.push(DrawOp::Key {
                    ch,
                    active: row == self.kb.row && col == self.kb.col,
                    enabled: Keyboard::enabled(&self.prefix, ch),
                });
            }
        }
        scene.nav(
            Button::Button1,
            ButtonStyle::Secondary,
            Asset::IconBack,
            ctx.is_pressed(Button::Button1),
            None,
        );
        if self.candidate().is_some() {
            scene.nav(
                Button::Button3,
                ButtonStyle::Primary,
                Asset::IconCheckmark,
                ctx.is_pressed(Button::Button3),
                None,
            );
        }
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
    use crate::wallet::mnemonic::WORDLIST;
    use std::sync::Arc;

    fn ctx() -> Context {
        let platform = Arc::new(TestPlatform::new());
        let (wakeup, _rx) = Wakeup::channel();
        Context::new(platform, &Config::default(), wakeup)
    }

    fn type_str(ctx: &mut Context, screen: &mut WordKeyboardScreen, s: &str, th: Colors) -> WordResult {
        let mut result = WordResult::None;
        for ch in s.chars() {
            ctx.submit(RawEvent::rune(ch));
            let r = screen.layout(ctx, &mut Scene::new(), th);
            if r != WordResult::None {
                result = r;
            }
        }
        result
    }

    #[test]
    fn every_wordlist_entry_can_be_typed() {
        let mut ctx = ctx();
        let th = ctx.styles.single;
        for (idx, word) in WORDLIST.iter().enumerate() {
            let mut screen = WordKeyboardScreen::new(0, 12);
            let mut input = word.to_string();
            input.push(' ');
            let result = type_str(&mut ctx, &mut screen, &input, th);
            assert_eq!(result, WordResult::Word(idx as Word), "word {word}");
        }
    }

    #[test]
    fn impossible_letters_are_ignored() {
        let mut ctx = ctx();
        let th = ctx.styles.single;
        let mut screen = WordKeyboardScreen::new(0, 12);
        type_str(&mut ctx, &mut screen, "zq", th);
        // 'q' extends no z-word; prefix stays "z".
        assert_eq!(screen.prefix, "z");
    }

    #[test]
    fn prefix_selects_the_first_matching_word() {
        let mut ctx = ctx();
        let th = ctx.styles.single;
        let mut screen = WordKeyboardScreen::new(0, 12);
        let result = type_str(&mut ctx, &mut screen, "zeb ", th);
        let expect = WORDLIST.iter().position(|w| *w == "zebra").unwrap();
        assert_eq!(result, WordResult::Word(expect as Word));
    }

    #[test]
    fn back_clears_prefix_before_leaving() {
        let mut ctx = ctx();
        let th = ctx.styles.single;
        let mut screen = WordKeyboardScreen::new(0, 12);
        type_str(&mut ctx, &mut screen, "ab", th);
        assert!(!screen.prefix.is_empty());

        ctx.submit(RawEvent::press(Button::Button1));
        ctx.submit(RawEvent::release(Button::Button1));
        assert_eq!(screen.layout(&mut ctx, &mut Scene::new(), th), WordResult::None);

        for _ in 0..screen.prefix.len() {
            ctx.submit(RawEvent::press(Button::Button1));
            ctx.submit(RawEvent::release(Button::Button1));
            screen.layout(&mut ctx, &mut Scene::new(), th);
        }
        ctx.submit(RawEvent::press(Button::Button1));
        ctx.submit(RawEvent::release(Button::Button1));
        assert_eq!(screen.layout(&mut ctx, &mut Scene::new(), th), WordResult::Back);
    }

    #[test]
    fn cursor_navigation_presses_keys() {
        let mut ctx = ctx();
        let th = ctx.styles.single;
        let mut screen = WordKeyboardScreen::new(0, 12);
        // Navigate to a key and press it; the prefix grows by an enabled
        // letter whichever key that is.
        ctx.submit(RawEvent::press(Button::Right));
        ctx.submit(RawEvent::press(Button::Down));
        screen.layout(&mut ctx, &mut Scene::new(), th);
        assert!(screen.kb.active_enabled(""));
        ctx.submit(RawEvent::press(Button::Center));
        ctx.submit(RawEvent::release(Button::Center));
        screen.layout(&mut ctx, &mut Scene::new(), th);
        assert_eq!(screen.prefix.len(), 1);
    }

    #[test]
    fn editing_prefills_the_existing_word() {
        let screen = WordKeyboardScreen::with_word(3, 12, 0);
        assert_eq!(screen.prefix, WORDLIST[0]);
        assert_eq!(screen.candidate(), Some(0));
    }
}
