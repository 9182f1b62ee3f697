//! Define a primitive font that works by setting the 7 segments in the 7 seg display to display
//! a limited set of ASCII chars

/// Segment A - top
pub const SEG_A: u8 = 0b0000_0001;
/// Segment B - top right
pub const SEG_B: u8 = 0b0000_0010;
/// Segment C - bottom right
pub const SEG_C: u8 = 0b0000_0100;
/// Segment D - bottom
pub const SEG_D: u8 = 0b0000_1000;
/// Segment E - bottom left
pub const SEG_E: u8 = 0b0001_0000;
/// Segment F - top left
pub const SEG_F: u8 = 0b0010_0000;
/// Segment G - middle
pub const SEG_G: u8 = 0b0100_0000;
/// The `.` in the bottom right of the display
pub const SEG_DP: u8 = 0b1000_0000;

/// Segment mask for `c`, with the decimal point never set.
///
/// Supports the digits, the upper case letters `A`-`J`, `L`, `O`, `P`, `S`, `U`, the lower case
/// letters `a`-`d`, `f`-`i`, `n`, `o`, `r`, `t`, `u`, `y`, and space, `_` and `-`.  Anything else
/// renders blank.  Some letters deliberately share the glyph of the digit they look like (`B`
/// and `8`, `D`/`O` and `0`, `I` and `1`, `S` and `5`).
pub fn char_to_segment(c: char) -> u8 {
    match c {
        '0' => 0x3F,
        '1' => 0x06,
        '2' => 0x5B,
        '3' => 0x4F,
        '4' => 0x66,
        '5' => 0x6D,
        '6' => 0x7D,
        '7' => 0x07,
        '8' => 0x7F,
        '9' => 0x6F,

        'A' => 0x77,
        'B' => 0x7F,
        'C' => 0x39,
        'D' => 0x3F,
        'E' => 0x79,
        'F' => 0x71,
        'G' => 0x7D,
        'H' => 0x76,
        'I' => 0x06,
        'J' => 0x0E,
        'L' => 0x38,
        'O' => 0x3F,
        'P' => 0x73,
        'S' => 0x6D,
        'U' => 0x3E,

        'a' => 0x5F,
        'b' => 0x7C,
        'c' => 0x58,
        'd' => 0x5E,
        'f' => 0x71,
        'g' => 0x6F,
        'h' => 0x74,
        'i' => 0x04,
        'n' => 0x54,
        'o' => 0x5C,
        'r' => 0x50,
        't' => 0x78,
        'u' => 0x1C,
        'y' => 0x6E,

        '_' => SEG_D,
        '-' => SEG_G,
        _ => 0x00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits() {
        let expected = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];
        for (c, mask) in ('0'..='9').zip(expected) {
            assert_eq!(char_to_segment(c), mask, "digit {c}");
        }
    }

    #[test]
    fn individual_segments() {
        assert_eq!(char_to_segment('8'), SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F | SEG_G);
        assert_eq!(char_to_segment('1'), SEG_B | SEG_C);
        assert_eq!(char_to_segment('_'), 0x08);
        assert_eq!(char_to_segment('-'), 0x40);
        assert_eq!(char_to_segment(' '), 0x00);
    }

    #[test]
    fn lookalike_letters_share_digit_glyphs() {
        assert_eq!(char_to_segment('A'), 0x77);
        assert_eq!(char_to_segment('B'), char_to_segment('8'));
        assert_eq!(char_to_segment('D'), char_to_segment('0'));
        assert_eq!(char_to_segment('O'), char_to_segment('0'));
        assert_eq!(char_to_segment('I'), char_to_segment('1'));
        assert_eq!(char_to_segment('S'), char_to_segment('5'));
    }

    #[test]
    fn unsupported_chars_are_blank() {
        for c in "kmqvwxzKMNQRTVWXYZ.!?é".chars() {
            assert_eq!(char_to_segment(c), 0x00, "{c:?} should be blank");
        }
    }

    #[test]
    fn never_sets_the_dot() {
        for c in (0u8..=0x7f).map(char::from) {
            assert_eq!(char_to_segment(c) & SEG_DP, 0, "{c:?}");
        }
    }
}
