use strum::VariantArray;

/// The number of bytes used to represent the state of the keys on the board
pub const KEY_BYTES: usize = 4;

/// The raw key scan returned by the controller in response to a call to
/// [`crate::Tm1638::read_keys`].
///
/// The four bytes the controller sends are packed LSB first, so byte `b` of the response occupies
/// bits `8*b..8*b+8`.  According to the datasheet, the controller scans a keypad arranged in a
/// 3x8 matrix of columns K1..K3 and rows KS1..KS8; every row gets a nibble, two rows per byte.
///
/// Most boards only wire 8 switches.  Use [`Self::buttons`] to get those as a [`ButtonMask`], or
/// [`Self::is_pressed`] to look at any position in the matrix.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyScan(u32);

impl KeyScan {
    pub(crate) fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// All 32 bits as sampled from DIO, first sampled bit in bit 0
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Quickly check if *any* bit of the scan is set
    pub fn any_pressed(&self) -> bool {
        self.0 != 0
    }

    /// Test if the given key (identified by its column and row) is pressed
    pub fn is_pressed(&self, col: KeyColumn, row: KeyRow) -> bool {
        self.0 & (1 << matrix_bit(col, row)) != 0
    }

    /// The 8 board switches, see [`Button`]
    pub fn buttons(&self) -> ButtonMask {
        ButtonMask::from_scan(*self)
    }
}

/// Index of the bit in the 32-bit scan that holds the key at `col` and `row`.
///
/// See section 8 (VIII) of the data sheet: row KSn lives in byte `(n-1)/2`, odd rows in the low
/// nibble and even rows in the high nibble.
fn matrix_bit(col: KeyColumn, row: KeyRow) -> u32 {
    let row = u32::from(row.to_row_number() - 1);
    let byte_index = row / 2;
    let nibble_offset = (row % 2) * 4;

    byte_index * 8 + nibble_offset + col.nibble_bit()
}

/// The columns in the keyboard matrix that the TM1638 scans
#[derive(Copy, Clone, Debug, PartialEq, Eq, VariantArray)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyColumn {
    K1,
    K2,
    K3,
}

impl KeyColumn {
    pub fn to_column_number(self) -> u8 {
        match self {
            Self::K1 => 1,
            Self::K2 => 2,
            Self::K3 => 3,
        }
    }

    fn nibble_bit(self) -> u32 {
        // The representation of column bits in each nibble is a bit...odd.
        // Column K3 is in bit 0, K2 in bit 1, K1 in bit 2, and bit 3 is unused
        match self {
            Self::K1 => 2,
            Self::K2 => 1,
            Self::K3 => 0,
        }
    }
}

/// The rows in the keyboard matrix that the TM1638 scans
#[derive(Copy, Clone, Debug, PartialEq, Eq, VariantArray)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyRow {
    KS1,
    KS2,
    KS3,
    KS4,
    KS5,
    KS6,
    KS7,
    KS8,
}

impl KeyRow {
    pub fn to_row_number(self) -> u8 {
        match self {
            Self::KS1 => 1,
            Self::KS2 => 2,
            Self::KS3 => 3,
            Self::KS4 => 4,
            Self::KS5 => 5,
            Self::KS6 => 6,
            Self::KS7 => 7,
            Self::KS8 => 8,
        }
    }
}

/// One of the 8 push buttons on the common "LED & KEY" style boards, labelled S1..S8 left to
/// right.
///
/// The switches are all wired into column K2, but not to the rows in order:
///
/// S1 -> KS1
/// S2 -> KS3
/// S3 -> KS5
/// S4 -> KS7
/// S5 -> KS2
/// S6 -> KS4
/// S7 -> KS6
/// S8 -> KS8
///
/// so scanning the raw bits 1, 5, 9, ... 29 yields S1, S5, S2, S6, S3, S7, S4, S8.
#[derive(Copy, Clone, Debug, PartialEq, Eq, VariantArray)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    S8,
}

impl Button {
    /// The number printed on the board, 1 to 8
    pub fn number(self) -> u8 {
        match self {
            Self::S1 => 1,
            Self::S2 => 2,
            Self::S3 => 3,
            Self::S4 => 4,
            Self::S5 => 5,
            Self::S6 => 6,
            Self::S7 => 7,
            Self::S8 => 8,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::VARIANTS.get(usize::from(number).checked_sub(1)?).copied()
    }

    /// The row of the key matrix this switch is wired to
    pub fn row(self) -> KeyRow {
        match self {
            Self::S1 => KeyRow::KS1,
            Self::S2 => KeyRow::KS3,
            Self::S3 => KeyRow::KS5,
            Self::S4 => KeyRow::KS7,
            Self::S5 => KeyRow::KS2,
            Self::S6 => KeyRow::KS4,
            Self::S7 => KeyRow::KS6,
            Self::S8 => KeyRow::KS8,
        }
    }

    /// Index of the bit in the raw [`KeyScan`] that reports this switch
    pub fn scan_bit(self) -> u32 {
        matrix_bit(KeyColumn::K2, self.row())
    }

    /// This switch's bit in a [`ButtonMask`]
    fn mask(self) -> u8 {
        1 << (self.number() - 1)
    }
}

/// Pressed state of the 8 board switches: bit 0 is S1, bit 1 is S2, etc.
///
/// This has the nice property that if you take this value and use it to set or clear the LEDs
/// bit by bit, you'll light up the LED above each pressed switch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonMask(u8);

impl ButtonMask {
    pub const NONE: Self = Self(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Pick the 8 switch bits out of a raw scan, ignoring every other bit of the matrix
    pub fn from_scan(scan: KeyScan) -> Self {
        let bits = Button::VARIANTS
            .iter()
            .filter(|button| scan.raw() & (1 << button.scan_bit()) != 0)
            .fold(0u8, |bits, button| bits | button.mask());

        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_pressed(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    /// The lowest numbered pressed switch, if any
    pub fn lowest(self) -> Option<Button> {
        if self.is_empty() {
            None
        } else {
            Button::from_number(self.0.trailing_zeros() as u8 + 1)
        }
    }

    /// Iterate over the pressed switches, lowest numbered first
    pub fn iter(self) -> impl Iterator<Item = Button> {
        Button::VARIANTS
            .iter()
            .copied()
            .filter(move |button| self.is_pressed(*button))
    }
}

impl From<ButtonMask> for u8 {
    fn from(mask: ButtonMask) -> Self {
        mask.0
    }
}

/// Press-then-release detection over successive [`ButtonMask`] readings.
///
/// This is the state machine behind [`crate::Tm1638::read_key_blocking`].  Feed it every scan
/// with [`Self::update`]; once a non-empty scan has been followed by an empty one,
/// [`Self::pressed`] returns the lowest numbered switch that was down in the first non-empty scan.
/// Code that needs to give up waiting (a timeout, another event) can drive it directly instead.
///
/// When several switches are first seen together, the lowest numbered one wins; there is no
/// "multiple keys" result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyPoll {
    /// No switch seen yet
    #[default]
    AwaitPress,
    /// A switch went down; waiting for every switch to be released
    AwaitRelease(Button),
    Done(Button),
}

impl KeyPoll {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance with the latest scan.  Returns `true` if the state changed.
    pub fn update(&mut self, mask: ButtonMask) -> bool {
        let next = match *self {
            Self::AwaitPress => match mask.lowest() {
                Some(button) => Self::AwaitRelease(button),
                None => return false,
            },
            Self::AwaitRelease(button) if mask.is_empty() => Self::Done(button),
            Self::AwaitRelease(_) | Self::Done(_) => return false,
        };

        *self = next;
        true
    }

    /// The switch that was pressed and released, once that has happened
    pub fn pressed(&self) -> Option<Button> {
        match self {
            Self::Done(button) => Some(*button),
            _ => None,
        }
    }
}
