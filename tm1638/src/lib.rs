#![no_std]

#[cfg(test)]
extern crate std;

mod bus;
mod command;
mod font;
mod keys;
mod layout;
#[cfg(test)]
mod sim;

use core::marker::PhantomData;

pub use bus::*;
pub use command::{led_address, segment_address, DISPLAY_COUNT, MAX_BRIGHTNESS, REGISTER_COUNT};
pub use font::*;
pub use keys::*;
pub use layout::*;

use command::{ReadCommand, WriteCommand};

const BLANK_REGISTERS: &[u8; REGISTER_COUNT] = &[0x00; REGISTER_COUNT];

/// Brightness a [`Tm1638`] reports until [`Tm1638::init`] or [`Tm1638::set_brightness`] is called
const DEFAULT_BRIGHTNESS: u8 = 0x02;

pub struct Tm1638Builder;

impl Tm1638Builder {
    /// Use an arbitrary [`BusDriver`] implementation; nothing more needs to be specified!
    pub fn with_bus_driver<D: BusDriver>(self, driver: D) -> Tm1638Builder3<D> {
        Tm1638Builder3 { driver }
    }

    /// Use an arbitrary [`Timer`] implementation with this bus driver.
    pub fn with_timer<T: Timer>(self) -> Tm1638Builder1<T> {
        Tm1638Builder1 {
            _timer: Default::default(),
        }
    }

    #[cfg(feature = "embassy-time")]
    /// Use the [`Timer`] implementation built using `embassy-time`
    pub fn with_embassy_timer(self) -> Tm1638Builder1<EmbassyTimeTimer> {
        self.with_timer::<EmbassyTimeTimer>()
    }
}

pub struct Tm1638Builder1<T: Timer> {
    _timer: PhantomData<T>,
}

impl<T: Timer> Tm1638Builder1<T> {
    /// Use the bit-banging driver, with an arbitrary implementation of [`Pins`] specific to your
    /// target platform
    pub fn with_bit_banging_driver<P: Pins>(self, pins: P) -> Tm1638Builder2<P, T> {
        Tm1638Builder2 {
            _timer: self._timer,
            pins,
        }
    }

    /// Use the bit-banging driver over `embedded-hal` pins, see [`OpenDrainPins`]
    pub fn with_open_drain_pins<Stb, Clk, Dio>(
        self,
        strobe: Stb,
        clock: Clk,
        dio: Dio,
    ) -> Tm1638Builder2<OpenDrainPins<Stb, Clk, Dio>, T>
    where
        OpenDrainPins<Stb, Clk, Dio>: Pins,
    {
        self.with_bit_banging_driver(OpenDrainPins::new(strobe, clock, dio))
    }

    /// Use a bit-banging driver talking to the specified Embassy RP HAL pins
    #[cfg(feature = "embassy-rp")]
    pub fn with_embassy_rp_pins<
        'a,
        StrobePin: embassy_rp::gpio::Pin,
        ClockPin: embassy_rp::gpio::Pin,
        DioPin: embassy_rp::gpio::Pin,
    >(
        self,
        strobe: StrobePin,
        clock: ClockPin,
        dio: DioPin,
    ) -> Tm1638Builder2<EmbassyRpPins<'a, StrobePin, ClockPin, DioPin>, T> {
        self.with_bit_banging_driver(EmbassyRpPins::new(strobe, clock, dio))
    }
}

pub struct Tm1638Builder2<P: Pins, T: Timer> {
    pins: P,
    _timer: PhantomData<T>,
}

impl<P: Pins, T: Timer> Tm1638Builder2<P, T> {
    /// Construct the [`Tm1638`] instance using the bit-banging driver.
    ///
    /// This is fallible if the underling I/O implementation is.
    pub fn build(self) -> Result<Tm1638<BitBangingBusDriver<P, T>>, P::Error> {
        let driver = BitBangingBusDriver::new(self.pins)?;
        Ok(Tm1638::new(driver))
    }
}

pub struct Tm1638Builder3<D: BusDriver> {
    driver: D,
}

impl<D: BusDriver> Tm1638Builder3<D> {
    /// Construct the [`Tm1638`] instance using the selected driver.
    pub fn build(self) -> Tm1638<D> {
        Tm1638::new(self.driver)
    }
}

/// Driver for TM1638 display and switch controllers, as found on the common boards with 8 seven
/// segment displays, 8 LEDs and 8 push buttons.
///
/// The implementation is generalized over the implementation of the underling bus protocol driver,
/// behind the [`BusDriver`] trait.  This allows most of the code to remain the same, while
/// supporting multiple hardware HALs and timer implementations.
///
/// The most straightforward way to instantiate this driver is using [`Self::builder`] which
/// returns a builder type with which you can get easy access to the built-in implementations.
///
/// For example, to use the `embassy-time` timer implementation and the `embassy-rp` HAL for
/// RP2040:
///
/// ```
/// # #[cfg(all(feature = "embassy-time", feature = "embassy-rp"))]
/// # async fn demo() {
/// let p = embassy_rp::init(Default::default());
/// let mut driver = tm1638::Tm1638::builder()
///     .with_embassy_timer()
///     .with_embassy_rp_pins(p.PIN_6, p.PIN_7, p.PIN_8)
///     .build()
///     .unwrap();
///
/// driver.init(2).await.unwrap();
/// driver.display_text("12.34").await.unwrap();
///
/// let button = driver.read_key_blocking().await.unwrap();
/// driver.set_led(button.number(), true).await.unwrap();
/// # }
/// ```
///
/// Displays and LEDs are addressed by 1-based position, 1 being the left-most.  Positions outside
/// 1 to 8 are silently ignored and nothing is sent to the controller.  The only errors are the
/// ones of the bus driver's pins.
///
/// Every operation takes `&mut self` and completes its transactions before returning, so
/// operations on one driver can never interleave on the bus.
pub struct Tm1638<Driver> {
    driver: Driver,
    brightness: u8,
}

impl Tm1638<()> {
    /// Return a builder pattern implementation to ease some of the type parameter complexity
    /// around creating the bus driver and timer.
    ///
    /// This is not required; you can always instantiate the driver without a builder, but you
    /// might have to type more angle brackets to do so.
    pub fn builder() -> Tm1638Builder {
        Tm1638Builder
    }
}

impl<Driver: BusDriver> Tm1638<Driver> {
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }

    /// Give the bus driver back
    pub fn release(self) -> Driver {
        self.driver
    }

    /// Reset the TM1638 state, blanking all of the displays and LEDs, and turn the display on at
    /// `brightness`.
    ///
    /// `brightness` is clamped like in [`Self::set_brightness`], so `init(9)` gives full
    /// brightness (`0x8F`).  It is not masked to its low 3 bits, which would turn 9 into 1.
    pub async fn init(&mut self, brightness: u8) -> Result<(), Driver::Error> {
        self.display_clear().await?;
        self.set_brightness(brightness).await
    }

    /// The last brightness applied
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Turn the display on at `level`, from 0 (dimmest) to 7 (brightest).  Anything above 7 is
    /// treated as 7.
    pub async fn set_brightness(&mut self, level: u8) -> Result<(), Driver::Error> {
        let level = level.min(MAX_BRIGHTNESS);
        self.brightness = level;

        self.apply_write_command(WriteCommand::DisplayControl {
            on: true,
            brightness: level,
        })
        .await
    }

    /// Turn the display back on at the current brightness
    pub async fn display_on(&mut self) -> Result<(), Driver::Error> {
        self.set_brightness(self.brightness).await
    }

    /// Turn all displays and LEDs off.  The controller keeps their contents, which reappear with
    /// [`Self::display_on`].
    pub async fn display_off(&mut self) -> Result<(), Driver::Error> {
        self.apply_write_command(WriteCommand::DisplayControl {
            on: false,
            brightness: self.brightness,
        })
        .await
    }

    /// Blank the display state, including all 7 seg displays and LEDs
    pub async fn display_clear(&mut self) -> Result<(), Driver::Error> {
        // Put the controller in incremental addressing mode so all 16 registers are written in
        // one go
        self.apply_write_command(WriteCommand::AutoIncrementAddressing)
            .await?;

        self.apply_write_command(WriteCommand::WriteRegisters {
            address: 0,
            data: BLANK_REGISTERS,
        })
        .await
    }

    /// Set the display at `position` to the raw segment `mask`.
    ///
    /// `mask` is a bitmask in which the least significant 7 bits correspond to segments A to G of
    /// the display, and the most significant bit corresponds to the `.` in the bottom right of
    /// the display.  See the `SEG_*` constants.
    ///
    /// There is no way to read the mask back from the controller.
    pub async fn set_segment(&mut self, position: u8, mask: u8) -> Result<(), Driver::Error> {
        let Some(address) = segment_address(position) else {
            #[cfg(feature = "defmt")]
            defmt::debug!("ignoring segment write to display {=u8}", position);
            return Ok(());
        };

        self.apply_write_command(WriteCommand::WriteRegisters {
            address,
            data: core::slice::from_ref(&mask),
        })
        .await
    }

    /// Turn the LED at `position` on or off
    pub async fn set_led(&mut self, position: u8, on: bool) -> Result<(), Driver::Error> {
        let Some(address) = led_address(position) else {
            #[cfg(feature = "defmt")]
            defmt::debug!("ignoring write to LED {=u8}", position);
            return Ok(());
        };

        self.apply_write_command(WriteCommand::WriteRegisters {
            address,
            data: &[u8::from(on)],
        })
        .await
    }

    /// Show `ch` on the display at `position`, with its `.` lit if `dot` is set.  Characters the
    /// font doesn't know show blank, see [`char_to_segment`].
    pub async fn display_char(
        &mut self,
        position: u8,
        ch: char,
        dot: bool,
    ) -> Result<(), Driver::Error> {
        self.set_segment(position, Cell::new(ch, dot).segments())
            .await
    }

    /// Show `text` right-aligned across all 8 displays, blanking the ones it doesn't cover.
    ///
    /// See [`layout_text`] for how `.` and overlong text are handled.
    pub async fn display_text(&mut self, text: &str) -> Result<(), Driver::Error> {
        for (position, cell) in (1..).zip(layout_text(text)) {
            self.display_char(position, cell.ch, cell.dot).await?;
        }

        Ok(())
    }

    /// Read the raw key bitmask from the controller
    pub async fn read_keys(&mut self) -> Result<KeyScan, Driver::Error> {
        let mut buffer = [0u8; KEY_BYTES];

        self.apply_read_command(ReadCommand::ReadKeys, &mut buffer)
            .await?;

        #[cfg(feature = "defmt")]
        defmt::trace!("keys = {:?}", buffer);

        Ok(KeyScan::from_bytes(buffer))
    }

    /// Read which of the 8 board switches are currently pressed
    pub async fn scan_buttons(&mut self) -> Result<ButtonMask, Driver::Error> {
        let buttons = self.read_keys().await?.buttons();

        #[cfg(feature = "defmt")]
        if !buttons.is_empty() {
            defmt::debug!("buttons = {=u8:b}", buttons.bits());
        }

        Ok(buttons)
    }

    /// Wait for a switch to be pressed and released again, and return it.
    ///
    /// The switches are scanned every poll interval of the bus driver's [`Timer`] until one is
    /// down, then until all of them are up.  If several switches are down at the first
    /// non-empty scan, the lowest numbered one is returned.  There is no timeout; drive a
    /// [`KeyPoll`] with [`Self::scan_buttons`] to be able to give up.
    pub async fn read_key_blocking(&mut self) -> Result<Button, Driver::Error> {
        let mut poll = KeyPoll::new();

        loop {
            let buttons = self.scan_buttons().await?;
            let advanced = poll.update(buttons);

            if let Some(button) = poll.pressed() {
                return Ok(button);
            }

            if !advanced {
                <Driver::Timer as Timer>::wait_key_poll().await;
            }
        }
    }

    /// Apply the command to the controller
    async fn apply_write_command<'c>(
        &mut self,
        command: WriteCommand<'c>,
    ) -> Result<(), Driver::Error> {
        let (command_byte, data_bytes) = command.encode();

        #[cfg(feature = "defmt")]
        defmt::trace!("command byte = {=u8:x}", command_byte);

        if let Some(data_bytes) = data_bytes {
            self.driver
                .send_command_write_data(command_byte, data_bytes)
                .await
        } else {
            self.driver.send_command(command_byte).await
        }
    }

    async fn apply_read_command(
        &mut self,
        command: ReadCommand,
        read_buffer: &mut [u8],
    ) -> Result<(), Driver::Error> {
        let (command_byte, read_bytes) = command.encode();

        #[cfg(feature = "defmt")]
        defmt::trace!("command byte = {=u8:x}", command_byte);

        #[cfg(feature = "defmt")]
        defmt::debug_assert!(read_bytes <= read_buffer.len());

        // Limit the read buffer to just the range needed to store these results
        let read_buffer = &mut read_buffer[0..read_bytes];

        self.driver
            .send_command_read_data(command_byte, read_buffer)
            .await
    }
}
