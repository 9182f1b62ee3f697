//! The TM1638 command set and its register map.
//!
//! The controller has 16 one-byte display registers.  The even registers hold the segment masks
//! of the 8 displays, left to right; the odd registers hold the LED next to each display.

use crate::keys::KEY_BYTES;

/// Number of 7 segment displays (and LEDs) on the board
pub const DISPLAY_COUNT: usize = 8;

/// Number of display registers in the controller
pub const REGISTER_COUNT: usize = 16;

/// Brightness can be 0x00 to 0x07, 0x00 is least bright
pub const MAX_BRIGHTNESS: u8 = 0x07;

/// Write data to the display registers, incrementing the address after each byte
const DATA_WRITE_AUTO_INCREMENT: u8 = 0b0100_0000;
/// Read the key scan data
const DATA_READ_KEYS: u8 = 0b0100_0010;
/// Display control; bit 3 turns the display on, bits 0-2 are the brightness
const DISPLAY_CONTROL: u8 = 0b1000_0000;
const DISPLAY_ON: u8 = 0b0000_1000;
/// Set the register address; the low nibble is the address
const ADDRESS_SET: u8 = 0b1100_0000;

/// Register holding the segment mask of the display at 1-based `position` (1 is the left-most),
/// or `None` if there is no such display.
pub fn segment_address(position: u8) -> Option<u8> {
    is_valid_position(position).then(|| 2 * (position - 1))
}

/// Register holding the state of the LED at 1-based `position`, or `None` if there is no such
/// LED.
pub fn led_address(position: u8) -> Option<u8> {
    is_valid_position(position).then(|| 2 * position - 1)
}

fn is_valid_position(position: u8) -> bool {
    (1..=DISPLAY_COUNT as u8).contains(&position)
}

/// Represents possible write-only commands sent to the TM1638 as Rust enums for greater readability.
pub(crate) enum WriteCommand<'a> {
    /// Turn the display on or off.  The register contents survive while it is off.
    DisplayControl {
        on: bool,
        /// Brightness, in a range from 0 to 7.  Ignored when turning the display off.
        brightness: u8,
    },

    /// Make each data byte written after an address go to the next register.
    AutoIncrementAddressing,

    /// Select the register at `address` and write `data` starting there.
    WriteRegisters {
        /// Register address, 0 to 15
        address: u8,

        data: &'a [u8],
    },
}

impl<'a> WriteCommand<'a> {
    /// Convert this command into the appropriate byte sequence to send to the controller.
    ///
    /// Return value is a tuple consisting of the following:
    ///
    /// - Command byte to send to controller
    /// - (Optional) slice of data bytes to send along with command byte
    ///
    /// The command byte and data bytes (if any) are sent together, during a single interval in which the strobe pin is pulled low.
    pub(crate) fn encode<'me>(&'me self) -> (u8, Option<&'me [u8]>)
    where
        'a: 'me,
    {
        match self {
            WriteCommand::DisplayControl { on: true, brightness } => {
                #[cfg(feature = "defmt")]
                defmt::debug_assert!(*brightness <= MAX_BRIGHTNESS);
                (
                    DISPLAY_CONTROL | DISPLAY_ON | (brightness & MAX_BRIGHTNESS),
                    None,
                )
            }
            WriteCommand::DisplayControl { on: false, .. } => (DISPLAY_CONTROL, None),
            WriteCommand::AutoIncrementAddressing => (DATA_WRITE_AUTO_INCREMENT, None),
            WriteCommand::WriteRegisters { address, data } => {
                #[cfg(feature = "defmt")]
                defmt::debug_assert!(*address as usize + data.len() <= REGISTER_COUNT);
                (ADDRESS_SET | (address & 0b0000_1111), Some(*data))
            }
        }
    }
}

/// Represents possible read commands sent to the TM1638 which read data from the controller
pub(crate) enum ReadCommand {
    /// Request the controller to send four bytes of key scanning data reflecting current state of
    /// keys
    ReadKeys,
}

impl ReadCommand {
    /// Command byte, and the number of bytes to read from the controller after it, within the
    /// same transaction.
    pub(crate) fn encode(&self) -> (u8, usize) {
        match self {
            ReadCommand::ReadKeys => (DATA_READ_KEYS, KEY_BYTES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_interleave_displays_and_leds() {
        let mut seen = [false; REGISTER_COUNT];

        for position in 1..=DISPLAY_COUNT as u8 {
            let segment = segment_address(position).unwrap();
            let led = led_address(position).unwrap();

            assert_eq!(segment, 2 * (position - 1));
            assert_eq!(led, 2 * position - 1);

            for address in [segment, led] {
                assert!((address as usize) < REGISTER_COUNT);
                assert!(!seen[address as usize], "address {address} used twice");
                seen[address as usize] = true;
            }
        }

        assert_eq!(seen, [true; REGISTER_COUNT]);
    }

    #[test]
    fn positions_out_of_range() {
        for position in [0, 9, 16, 255] {
            assert_eq!(segment_address(position), None);
            assert_eq!(led_address(position), None);
        }
    }

    #[test]
    fn encode_write_commands() {
        let on = WriteCommand::DisplayControl {
            on: true,
            brightness: 2,
        };
        assert_eq!(on.encode(), (0x8A, None));

        let off = WriteCommand::DisplayControl {
            on: false,
            brightness: 7,
        };
        assert_eq!(off.encode(), (0x80, None));

        assert_eq!(WriteCommand::AutoIncrementAddressing.encode(), (0x40, None));

        let data = [0x3F];
        let write = WriteCommand::WriteRegisters {
            address: 0x0E,
            data: &data,
        };
        assert_eq!(write.encode(), (0xCE, Some(&data[..])));
    }

    #[test]
    fn encode_read_keys() {
        assert_eq!(ReadCommand::ReadKeys.encode(), (0x42, 4));
    }
}
