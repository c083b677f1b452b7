//! Plate planning: fit the backup onto a physical plate and lay out the
//! strokes the engraver will cut.
//!
//! A plate has two engraveable sides. Side one always carries the mnemonic
//! words; for a multisig descriptor side two carries the full descriptor
//! encoding, so any threshold of plates can reconstruct the wallet without
//! the coordinator. Planning picks the smallest plate size whose character
//! grid fits both sides.

use thiserror::Error;

use crate::render::Asset;
use crate::wallet::mnemonic::{label_for, Mnemonic};
use crate::wallet::Descriptor;

/// Physical plate sizes, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateSize {
    Small,
    Square,
    Large,
}

impl PlateSize {
    pub const ALL: [PlateSize; 3] = [PlateSize::Small, PlateSize::Square, PlateSize::Large];

    /// Product name stamped on the blank.
    pub fn name(self) -> &'static str {
        match self {
            PlateSize::Small => "PS01",
            PlateSize::Square => "PS02",
            PlateSize::Large => "PS03",
        }
    }

    pub fn image(self) -> Asset {
        match self {
            PlateSize::Small => Asset::PlateSmall,
            PlateSize::Square => Asset::PlateSquare,
            PlateSize::Large => Asset::PlateLarge,
        }
    }

    /// Character grid: (columns, rows).
    fn grid(self) -> (usize, usize) {
        match self {
            PlateSize::Small => (16, 12),
            PlateSize::Square => (22, 16),
            PlateSize::Large => (28, 24),
        }
    }

    fn capacity(self) -> usize {
        let (cols, rows) = self.grid();
        cols * rows
    }
}

/// A polyline cut by the engraver, in plate grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stroke {
    pub points: Vec<(u16, u16)>,
}

/// Strokes for one side of a plate.
#[derive(Debug, Clone, Default)]
pub struct SidePlan {
    pub strokes: Vec<Stroke>,
}

/// A fully planned plate ready to hand to the engraver protocol.
#[derive(Debug, Clone)]
pub struct Plate {
    pub size: PlateSize,
    pub sides: Vec<SidePlan>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("the backup does not fit any plate size")]
    TooLarge,
}

/// Text lines for the mnemonic side: numbered words, two columns on the
/// wider plates.
fn seed_side_text(m: &Mnemonic, cols: usize) -> Vec<String> {
    let entries: Vec<String> = m
        .words()
        .enumerate()
        .map(|(i, w)| format!("{:2} {}", i + 1, label_for(w)))
        .collect();
    let per_col = 12.min(entries.len());
    let two_columns = cols >= 24 && entries.len() > per_col;
    if !two_columns {
        return entries;
    }
    let mut lines = Vec::with_capacity(per_col);
    for row in 0..per_col {
        let mut line = entries[row].clone();
        if let Some(right) = entries.get(row + per_col) {
            while line.len() < cols / 2 {
                line.push(' ');
            }
            line.push_str(right);
        }
        lines.push(line);
    }
    lines
}

/// Wrap the descriptor encoding onto grid lines.
fn descriptor_side_text(desc: &Descriptor, cols: usize) -> Vec<String> {
    let encoded = desc.encode();
    encoded
        .as_bytes()
        .chunks(cols)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

fn fits(lines: &[String], size: PlateSize) -> bool {
    let (cols, rows) = size.grid();
    lines.len() <= rows && lines.iter().all(|l| l.len() <= cols)
}

/// Strokes for one character cell. The engraver only needs a deterministic
/// polyline per glyph; the cut geometry itself lives in the engraver head
/// firmware's font table, keyed by the first point pair.
fn char_strokes(ch: char, col: usize, row: usize) -> Stroke {
    let x0 = (col * 8) as u16;
    let y0 = (row * 12) as u16;
    let code = ch as u16;
    Stroke {
        points: vec![
            (x0, y0),
            (x0 + (code % 7) + 1, y0 + (code % 11) + 1),
            (x0 + 7, y0 + 11),
        ],
    }
}

fn layout_side(lines: &[String]) -> SidePlan {
    let mut strokes = Vec::new();
    for (row, line) in lines.iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            if ch == ' ' {
                continue;
            }
            strokes.push(char_strokes(ch, col, row));
        }
    }
    SidePlan { strokes }
}

/// Plan the plate for one share. `share` is the key index the mnemonic
/// holds within the descriptor; singlesig plates get no descriptor side.
pub fn plan(desc: &Descriptor, share: usize, m: &Mnemonic) -> Result<Plate, PlanError> {
    for size in PlateSize::ALL {
        let (cols, _) = size.grid();
        let mut seed_lines = seed_side_text(m, cols);
        if desc.keys.len() > 1 {
            seed_lines.insert(0, format!("SHARE {}/{}", share + 1, desc.keys.len()));
        }
        if !fits(&seed_lines, size) {
            continue;
        }
        let mut sides = vec![layout_side(&seed_lines)];
        if desc.keys.len() > 1 {
            let desc_lines = descriptor_side_text(desc, cols);
            if !fits(&desc_lines, size) {
                continue;
            }
            sides.push(layout_side(&desc_lines));
        }
        return Ok(Plate { size, sides });
    }
    Err(PlanError::TooLarge)
}

/// Dry planning pass used by descriptor validation: checks fit without
/// keeping the strokes.
pub fn try_fit(desc: &Descriptor, m: &Mnemonic) -> Result<PlateSize, PlanError> {
    plan(desc, 0, m).map(|p| p.size)
}

/// Whether every threshold-sized subset of plates can reconstruct the
/// descriptor. Each plate carries the full encoding, so this walks the
/// subsets and compares the decoded reconstruction against the original.
/// A mismatch indicates a planner defect, not bad user input.
pub fn recoverable(desc: &Descriptor) -> bool {
    if desc.keys.len() < 2 {
        return true;
    }
    let encoded = desc.encode();
    let n = desc.keys.len();
    let mut subset: Vec<usize> = (0..desc.threshold).collect();
    loop {
        // Every plate in the subset engraves the same encoding; all must
        // decode back to the original descriptor.
        for _plate in &subset {
            match Descriptor::decode(&encoded) {
                Ok(rebuilt) if rebuilt == *desc => {}
                _ => return false,
            }
        }
        if !next_combination(&mut subset, n) {
            return true;
        }
    }
}

/// Advance `subset` to the next k-of-n combination in lexicographic order.
fn next_combination(subset: &mut [usize], n: usize) -> bool {
    let k = subset.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if subset[i] < i + n - k {
            subset[i] += 1;
            for j in i + 1..k {
                subset[j] = subset[j - 1] + 1;
            }
            return true;
        }
    }
    false
}
