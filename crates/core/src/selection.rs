use serde::{Deserialize, Serialize};

/// Rows per sheet.
pub const MAX_ROWS: u32 = 1_048_576;
/// Columns per sheet (`A` to `XFD`).
pub const MAX_COLS: u32 = 16_384;

/// A 0-based cell coordinate within a sheet.
///
/// Ordering is row-major (row first, then column), which is the order cells
/// are exported in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPosition {
    pub row: u32,
    pub col: u32,
}

impl CellPosition {
    /// Column first, matching how selections are expressed (`select(col, row)`).
    #[inline]
    pub const fn new(col: u32, row: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style reference ("A1", "AB12"). Case-insensitive.
    pub fn from_a1(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        let split = reference.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = reference.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        let col = letters_to_col(letters)?;
        Some(Self { row: row - 1, col })
    }

    pub fn to_a1(&self) -> String {
        format!("{}{}", col_to_letters(self.col), u64::from(self.row) + 1)
    }

    /// Whether the position lies within `MAX_COLS` x `MAX_ROWS`.
    pub fn is_in_grid(&self) -> bool {
        self.row < MAX_ROWS && self.col < MAX_COLS
    }
}

impl std::fmt::Display for CellPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Convert 0-based column index to Excel-style letter(s).
pub fn col_to_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

fn letters_to_col(letters: &str) -> Option<u32> {
    let mut col: u32 = 0;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col - 1)
}

/// Scroll offsets of a grid viewport, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: u32,
    pub y: u32,
}

impl ScrollOffset {
    pub const ZERO: ScrollOffset = ScrollOffset { x: 0, y: 0 };

    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Clamp both axes to the given maximum offsets.
    pub fn clamp_to(self, max: ScrollOffset) -> Self {
        Self {
            x: self.x.min(max.x),
            y: self.y.min(max.y),
        }
    }
}

/// Size of the visible grid area, known only once the host has laid it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
