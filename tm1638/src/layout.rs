//! Lay a string of text out over the row of 7 segment displays.

use crate::command::DISPLAY_COUNT;
use crate::font::{char_to_segment, SEG_DP};

/// What one display shows: a character, and whether its `.` is lit
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cell {
    pub ch: char,
    pub dot: bool,
}

impl Cell {
    pub const BLANK: Self = Self { ch: ' ', dot: false };

    pub fn new(ch: char, dot: bool) -> Self {
        Self { ch, dot }
    }

    /// The segment mask for this cell, see [`crate::font::char_to_segment`]
    pub fn segments(self) -> u8 {
        let mask = char_to_segment(self.ch);
        if self.dot {
            mask | SEG_DP
        } else {
            mask
        }
    }
}

/// Right-align `text` over the displays, index 0 being the left-most display.
///
/// The text is read from its last character backwards.  Every character other than `.` takes
/// the next free display to the left.  A `.` doesn't take a display of its own; it lights the dot
/// of the display just to the right of the next free one, which is the character that follows
/// the `.` in `text`.  So `"12.34"` lights the dot on the `3`, and a trailing `.` (nothing placed
/// yet) is dropped.  Once all displays are taken the rest of `text` is ignored, so long strings
/// are truncated on the left.
pub fn layout_text(text: &str) -> [Cell; DISPLAY_COUNT] {
    let mut cells = [Cell::BLANK; DISPLAY_COUNT];

    // Number of displays still free; the next character goes to `cells[free - 1]`
    let mut free = DISPLAY_COUNT;

    for ch in text.chars().rev() {
        if free == 0 {
            break;
        }

        if ch == '.' {
            if free < DISPLAY_COUNT {
                cells[free].dot = true;
            }
        } else {
            free -= 1;
            cells[free].ch = ch;
        }
    }

    cells
}
