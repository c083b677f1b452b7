//! Mnemonic word sequences.
//!
//! The appliance uses a compact 128-entry wordlist; a mnemonic is a list of
//! word slots that fill up one at a time during keyboard entry, so a slot is
//! `Option<Word>` until the user has chosen every word. The final word is a
//! checksum over the preceding indices.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Index into [`WORDLIST`].
pub type Word = u16;

/// The appliance wordlist, sorted and prefix-searchable.
pub const WORDLIST: [&str; 128] = [
    "acid", "actor", "adapt", "admit", "agent", "bacon", "badge", "bamboo", "basket", "beach",
    "cabin", "cactus", "camera", "canyon", "carbon", "daisy", "damage", "dance", "danger", "dawn",
    "eagle", "early", "earth", "east", "echo", "fabric", "falcon", "family", "farm", "feather",
    "gadget", "galaxy", "garden", "garlic", "gather", "habit", "hammer", "harbor", "harvest",
    "hawk", "ice", "idea", "igloo", "impact", "index", "jacket", "jaguar", "jelly", "jewel",
    "journey", "kangaroo", "kettle", "kidney", "kingdom", "kite", "ladder", "lagoon", "lantern",
    "laptop", "lava", "magnet", "mango", "maple", "marble", "meadow", "napkin", "nature",
    "nectar", "needle", "nest", "oak", "ocean", "octopus", "olive", "onion", "paddle", "palace",
    "panda", "paper", "parrot", "quarry", "quartz", "queen", "quest", "quiet", "rabbit", "radar",
    "rain", "random", "raven", "saddle", "salmon", "sand", "scale", "signal", "stone", "storm",
    "table", "talent", "target", "temple", "tiger", "trust", "umbrella", "uncle", "unicorn",
    "unit", "urban", "valley", "vapor", "velvet", "vessel", "violet", "wagon", "walnut", "water",
    "whale", "willow", "yard", "yarn", "yellow", "yogurt", "young", "zebra", "zephyr", "zero",
    "zinc", "zone",
];

/// Label for a word index. Panics on out-of-range indices, which cannot be
/// produced by parsing or keyboard entry.
pub fn label_for(word: Word) -> &'static str {
    WORDLIST[word as usize]
}

/// First wordlist entry starting with `prefix`, if any.
pub fn closest_word(prefix: &str) -> Option<Word> {
    if prefix.is_empty() {
        return None;
    }
    let idx = WORDLIST.partition_point(|w| *w < prefix);
    if idx < WORDLIST.len() && WORDLIST[idx].starts_with(prefix) {
        Some(idx as Word)
    } else {
        None
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MnemonicError {
    #[error("unknown word: {0}")]
    UnknownWord(String),
    #[error("unsupported length: {0} words")]
    BadLength(usize),
    #[error("checksum mismatch")]
    Checksum,
}

/// Supported mnemonic lengths.
pub const LENGTHS: [usize; 2] = [12, 24];

/// A mnemonic under construction or complete. Slots are filled in any
/// order by the word keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mnemonic {
    words: Vec<Option<Word>>,
}

impl Mnemonic {
    pub fn empty(len: usize) -> Self {
        Mnemonic {
            words: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// True when no slot has been filled yet.
    pub fn is_blank(&self) -> bool {
        self.words.iter().all(|w| w.is_none())
    }

    /// True when every slot is filled.
    pub fn complete(&self) -> bool {
        !self.words.is_empty() && self.words.iter().all(|w| w.is_some())
    }

    pub fn get(&self, idx: usize) -> Option<Word> {
        self.words.get(idx).copied().flatten()
    }

    pub fn set(&mut self, idx: usize, word: Word) {
        self.words[idx] = Some(word);
    }

    /// Complete words in order; empty slots are skipped.
    pub fn words(&self) -> impl Iterator<Item = Word> + '_ {
        self.words.iter().filter_map(|w| *w)
    }

    /// Checksum validity. Only a complete mnemonic of a supported length
    /// can be valid.
    pub fn valid(&self) -> bool {
        if !self.complete() || !LENGTHS.contains(&self.len()) {
            return false;
        }
        let last = self.words[self.len() - 1].unwrap_or(0);
        last == self.checksum_word()
    }

    /// Set the final word to the checksum of the preceding ones.
    pub fn fix_checksum(&mut self) {
        let last = self.len() - 1;
        self.words[last] = Some(self.checksum_word());
    }

    fn checksum_word(&self) -> Word {
        let sum: u32 = self.words[..self.len() - 1]
            .iter()
            .map(|w| w.unwrap_or(0) as u32)
            .sum();
        (sum % WORDLIST.len() as u32) as Word
    }

    /// Parse a space-separated phrase of wordlist entries.
    pub fn parse(phrase: &str) -> Result<Mnemonic, MnemonicError> {
        let mut words = Vec::new();
        for label in phrase.split_whitespace() {
            let label = label.to_lowercase();
            match WORDLIST.binary_search(&label.as_str()) {
                Ok(idx) => words.push(Some(idx as Word)),
                Err(_) => return Err(MnemonicError::UnknownWord(label)),
            }
        }
        if !LENGTHS.contains(&words.len()) {
            return Err(MnemonicError::BadLength(words.len()));
        }
        Ok(Mnemonic { words })
    }

    /// Parse the compact digit form scanned from a QR code: three decimal
    /// digits per word index, no separators.
    pub fn from_digits(s: &str) -> Option<Mnemonic> {
        if s.is_empty() || s.len() % 3 != 0 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut words = Vec::with_capacity(s.len() / 3);
        for chunk in s.as_bytes().chunks(3) {
            let idx: u16 = std::str::from_utf8(chunk).ok()?.parse().ok()?;
            if idx as usize >= WORDLIST.len() {
                return None;
            }
            words.push(Some(idx));
        }
        let m = Mnemonic { words };
        if !LENGTHS.contains(&m.len()) {
            return None;
        }
        Some(m)
    }

    /// Space-separated phrase of the complete words.
    pub fn phrase(&self) -> String {
        self.words()
            .map(label_for)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Binary seed for key derivation.
    pub fn seed(&self, passphrase: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"platesmith/seed/v1");
        hasher.update(self.phrase().as_bytes());
        hasher.update([0]);
        hasher.update(passphrase.as_bytes());
        hasher.finalize().into()
    }
}
