//! Module describing the [`BusDriver`] trait, the [`Pins`] and [`Timer`] capabilities a bus
//! driver is built from, and the bit-banging implementation of the TM1638 bus protocol.

// This module defines traits w/ async methods.  That triggers a warning due to the very...limited
// support for this in the current Rust version (1.76 as of this writing).  However this pertains
// only to the use of futures returned by async methods in multi-threaded executors.  As this crate
// is meant for use on embedded microcontrollers without any concept of threads, this does not
// concern us at all
#![allow(async_fn_in_trait)]

use core::marker::PhantomData;

/// This trait represents some low-level implementation of the TM1638 bus interface, likely in
/// terms of some platform-specific HAL.
///
/// The TM1638 uses a three-wire bus similar to SPI, but not so similar that we can just use an SPI
/// implementation instead.  This trait exposes a byte-level interface that must be implemented by
/// a bus driver in terms of bit-level I/O, either using bit-banging, PIO, or maybe some hacked
/// version of an SPI implementation.
///
/// Every method is one complete transaction: strobe goes low before the command byte and back
/// high once the last data byte has been written or read.  Transactions never overlap.
pub trait BusDriver {
    type Error;

    /// Timer used by [`crate::Tm1638::read_key_blocking`] to pace its polling of the keys.
    type Timer: Timer;

    /// Send a single command, with no payload, and no response expected
    async fn send_command(&mut self, b: u8) -> Result<(), Self::Error>;

    /// Send a command with a data payload, but no response expected.
    async fn send_command_write_data(&mut self, b: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Send a command which is expected to generate a response.
    ///
    /// The expected size of the response (in bytes) is determined by the size of the `data` slice.
    /// This operation will return once enough bytes are received to fill `data`.
    async fn send_command_read_data(&mut self, b: u8, data: &mut [u8]) -> Result<(), Self::Error>;
}

/// The three signal lines of the TM1638 bus
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    /// CLK; the controller latches DIO on the rising edge
    Clock,
    /// DIO, the only line that is ever read
    Data,
    /// STB; low for the duration of a transaction
    Strobe,
}

/// Direction of the DIO line.
///
/// DIO is an output for everything except the response phase of a key scan, when the controller
/// drives it and we sample it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DioMode {
    /// Push-pull output, no pull resistor
    #[default]
    Output,
    /// Input with the pull-up enabled, so the line sits high when no key bridges it
    Input,
}

/// Pin-level capabilities of the host that the bit-banging driver is written against.
///
/// Sadly, due to [this issue](https://github.com/rust-embedded/embedded-hal/issues/397), it's not
/// possible to express a pin that switches between input and output purely in terms of Embedded
/// HAL traits, so this small trait is the seam instead.  See [`OpenDrainPins`] for an
/// implementation over plain `embedded-hal` pins, and `EmbassyRpPins` (feature `embassy-rp`) for
/// the RP2040.
pub trait Pins {
    type Error;

    /// Drive `line` high or low.  Only called for [`Line::Data`] while it is in
    /// [`DioMode::Output`].
    fn set_line(&mut self, line: Line, high: bool) -> Result<(), Self::Error>;

    /// Sample DIO.  Only called while it is in [`DioMode::Input`].
    fn read_dio(&mut self) -> Result<bool, Self::Error>;

    /// Reconfigure DIO
    fn set_dio_mode(&mut self, mode: DioMode) -> Result<(), Self::Error>;
}

impl<P: Pins + ?Sized> Pins for &mut P {
    type Error = P::Error;

    fn set_line(&mut self, line: Line, high: bool) -> Result<(), Self::Error> {
        (**self).set_line(line, high)
    }

    fn read_dio(&mut self) -> Result<bool, Self::Error> {
        (**self).read_dio()
    }

    fn set_dio_mode(&mut self, mode: DioMode) -> Result<(), Self::Error> {
        (**self).set_dio_mode(mode)
    }
}

/// Abstraction on platform-specific timers to provide a generic way to pause the bus driver
/// execution in order to implement the TM1638 bus protocol correctly.
///
/// The timer situation on embedded Rust is still quite unstable, with competing timer
/// implementations, including `embasssy_time`, `embedded-time`, `fugit`, and probably others.  To
/// avoid picking a side, this very simple timer trait needs to be implemented in terms of whatever
/// your preferred timer implementation is.
pub trait Timer {
    /// Wait between edges of the clock line.
    ///
    /// At nominal speeds the controller keeps up without any delay, which is the default.  Slow
    /// or noisy links should wait at least 1us here.
    async fn wait_clock_tick() {}

    /// Wait for the tWAIT interval defined in section 12 of the datasheet, Timing Characteristics,
    /// between sending the key read command and sampling the first bit.  By default it is
    /// implemented in terms of `wait_clock_tick`
    async fn wait_twait() {
        Self::wait_clock_tick().await
    }

    /// Wait between two key scans while blocking on a key press.  Nominally 20ms.
    async fn wait_key_poll();
}

#[cfg(feature = "embassy-time")]
mod embassy_time_timer {
    use embassy_time::{Duration, Timer as EmbassyTimer};

    /// Use a 1uS clock tick to ensure the TM1638 picks up the value
    const CLOCK_TICK: Duration = Duration::from_micros(1);

    /// The interval to wait after sending the button read command, before reading data
    /// Corresponds to tWAIT in section 12 of the datasheet, under Timing Characteristics.
    const TWAIT: Duration = Duration::from_micros(1);

    /// Interval between key scans in [`crate::Tm1638::read_key_blocking`]
    const KEY_POLL: Duration = Duration::from_millis(20);

    pub struct EmbassyTimeTimer;

    impl super::Timer for EmbassyTimeTimer {
        async fn wait_clock_tick() {
            EmbassyTimer::after(CLOCK_TICK).await
        }

        async fn wait_twait() {
            EmbassyTimer::after(TWAIT).await
        }

        async fn wait_key_poll() {
            EmbassyTimer::after(KEY_POLL).await
        }
    }
}

#[cfg(feature = "embassy-time")]
pub use embassy_time_timer::EmbassyTimeTimer;

/// Implementation of [`BusDriver`] that bit-bangs the protocol on any [`Pins`], pausing with any
/// [`Timer`].
///
/// The driver owns the DIO direction: it is an output at all times except between the key read
/// command and the end of that transaction.  [`Self::dio_mode`] exposes the current state.
pub struct BitBangingBusDriver<P: Pins, T: Timer> {
    pins: P,
    dio_mode: DioMode,
    _timer: PhantomData<T>,
}

impl<P: Pins, T: Timer> BitBangingBusDriver<P, T> {
    /// Take ownership of the pins and put them in the idle state: strobe and clock high, DIO an
    /// output driven low.
    pub fn new(mut pins: P) -> Result<Self, P::Error> {
        pins.set_dio_mode(DioMode::Output)?;
        pins.set_line(Line::Data, false)?;
        pins.set_line(Line::Clock, true)?;
        pins.set_line(Line::Strobe, true)?;

        Ok(Self {
            pins,
            dio_mode: DioMode::Output,
            _timer: PhantomData,
        })
    }

    /// Current direction of the DIO line
    pub fn dio_mode(&self) -> DioMode {
        self.dio_mode
    }

    /// Give the pins back
    pub fn release(self) -> P {
        self.pins
    }

    fn begin_transaction(&mut self) -> Result<(), P::Error> {
        self.pins.set_line(Line::Strobe, false)
    }

    fn end_transaction(&mut self) -> Result<(), P::Error> {
        self.pins.set_line(Line::Strobe, true)
    }

    fn set_dio_mode(&mut self, mode: DioMode) -> Result<(), P::Error> {
        self.pins.set_dio_mode(mode)?;
        self.dio_mode = mode;

        Ok(())
    }

    /// Shift the byte value out on the DIO pin, LSB first.  Each bit is put on DIO while the clock
    /// is low; the controller latches it on the rising edge.
    ///
    /// Assumes the DIO pin has already been set up as output
    async fn send_byte(&mut self, b: u8) -> Result<(), P::Error> {
        #[cfg(feature = "defmt")]
        defmt::debug_assert!(self.dio_mode == DioMode::Output);

        for bit in 0..8 {
            self.pins.set_line(Line::Clock, false)?;
            self.pins.set_line(Line::Data, (b >> bit) & 1 != 0)?;
            T::wait_clock_tick().await;

            self.pins.set_line(Line::Clock, true)?;
            T::wait_clock_tick().await;
        }

        Ok(())
    }

    /// Shift a byte value in from the DIO pin, LSB first, using the CLK pin to drive the
    /// controller to send data.
    ///
    /// Assumes the DIO pin is already set up as input
    async fn read_byte(&mut self) -> Result<u8, P::Error> {
        #[cfg(feature = "defmt")]
        defmt::debug_assert!(self.dio_mode == DioMode::Input);

        let mut value = 0;

        for bit in 0..8 {
            self.pins.set_line(Line::Clock, false)?;
            T::wait_clock_tick().await;

            if self.pins.read_dio()? {
                value |= 1 << bit;
            }

            self.pins.set_line(Line::Clock, true)?;
            T::wait_clock_tick().await;
        }

        Ok(value)
    }

    async fn read_bytes(&mut self, data: &mut [u8]) -> Result<(), P::Error> {
        for byte in data.iter_mut() {
            *byte = self.read_byte().await?;
        }

        Ok(())
    }

    /// Shift out the command byte followed by `data`, within the current transaction
    async fn write_bytes(&mut self, b: u8, data: &[u8]) -> Result<(), P::Error> {
        self.send_byte(b).await?;
        for b in data {
            #[cfg(feature = "defmt")]
            defmt::trace!("data byte = {=u8:x}", *b);
            self.send_byte(*b).await?;
        }

        Ok(())
    }

    /// Shift out the read command, release DIO to the controller and read its response, within
    /// the current transaction
    async fn command_then_read(&mut self, b: u8, data: &mut [u8]) -> Result<(), P::Error> {
        self.send_byte(b).await?;

        // We will be reading from DIO
        self.set_dio_mode(DioMode::Input)?;

        // Wait Twait interval before reading response
        T::wait_twait().await;

        #[cfg(feature = "defmt")]
        defmt::trace!("Expecting {0} bytes from controller", data.len());

        self.read_bytes(data).await
    }
}

// Once strobe has gone low, every transaction raises it again even when a pin operation fails
// part way, so the next command starts a fresh transaction.  The first error wins.
impl<P: Pins, T: Timer> BusDriver for BitBangingBusDriver<P, T> {
    type Error = P::Error;
    type Timer = T;

    async fn send_command(&mut self, b: u8) -> Result<(), Self::Error> {
        self.begin_transaction()?;
        let sent = self.write_bytes(b, &[]).await;
        let end = self.end_transaction();

        sent.and(end)
    }

    async fn send_command_write_data(&mut self, b: u8, data: &[u8]) -> Result<(), Self::Error> {
        #[cfg(feature = "defmt")]
        defmt::debug_assert!(!data.is_empty());
        self.begin_transaction()?;
        let sent = self.write_bytes(b, data).await;
        let end = self.end_transaction();

        sent.and(end)
    }

    async fn send_command_read_data(&mut self, b: u8, data: &mut [u8]) -> Result<(), Self::Error> {
        self.begin_transaction()?;
        let read = self.command_then_read(b, data).await;

        // DIO goes back to output only after strobe is high
        let end = self.end_transaction();
        let restore = self.set_dio_mode(DioMode::Output);

        read.and(end).and(restore)
    }
}

/// [`Pins`] over plain `embedded-hal` 1.0 digital pins.
///
/// `dio` must be configured by the HAL as an open-drain output with a pull-up (internal or on
/// the board), which can also be read back.  "Input mode" then simply releases the line by
/// driving it high, after which the controller is free to pull it low.
pub struct OpenDrainPins<Stb, Clk, Dio> {
    strobe: Stb,
    clock: Clk,
    dio: Dio,
}

impl<Stb, Clk, Dio> OpenDrainPins<Stb, Clk, Dio> {
    pub fn new(strobe: Stb, clock: Clk, dio: Dio) -> Self {
        Self { strobe, clock, dio }
    }

    pub fn release(self) -> (Stb, Clk, Dio) {
        (self.strobe, self.clock, self.dio)
    }
}

impl<Stb, Clk, Dio, E> Pins for OpenDrainPins<Stb, Clk, Dio>
where
    Stb: embedded_hal_1::digital::OutputPin<Error = E>,
    Clk: embedded_hal_1::digital::OutputPin<Error = E>,
    Dio: embedded_hal_1::digital::OutputPin<Error = E> + embedded_hal_1::digital::InputPin,
{
    type Error = E;

    fn set_line(&mut self, line: Line, high: bool) -> Result<(), Self::Error> {
        match line {
            Line::Clock => self.clock.set_state(high.into()),
            Line::Data => self.dio.set_state(high.into()),
            Line::Strobe => self.strobe.set_state(high.into()),
        }
    }

    fn read_dio(&mut self) -> Result<bool, Self::Error> {
        self.dio.is_high()
    }

    fn set_dio_mode(&mut self, mode: DioMode) -> Result<(), Self::Error> {
        match mode {
            DioMode::Input => self.dio.set_high(),
            // Nothing to reconfigure; the next bit sent drives the line again
            DioMode::Output => Ok(()),
        }
    }
}

#[cfg(feature = "embassy-rp")]
mod embassy_rp_pins {
    use super::{DioMode, Line};
    use core::convert::Infallible;
    use embassy_rp::gpio;

    /// Implementation of [`super::Pins`] that uses the Embassy RP HAL for the RP2040
    /// microcontroller.
    ///
    /// Combine with any [`super::Timer`] implementation in a [`super::BitBangingBusDriver`],
    /// although the implementation activated by the `embassy-time` feature is the most obvious
    /// choice.
    pub struct EmbassyRpPins<'a, StrobePin: gpio::Pin, ClockPin: gpio::Pin, DioPin: gpio::Pin> {
        strobe: gpio::Output<'a, StrobePin>,
        clock: gpio::Output<'a, ClockPin>,
        dio: gpio::Flex<'a, DioPin>,
    }

    impl<'a, StrobePin: gpio::Pin, ClockPin: gpio::Pin, DioPin: gpio::Pin>
        EmbassyRpPins<'a, StrobePin, ClockPin, DioPin>
    {
        pub fn new(strobe: StrobePin, clock: ClockPin, dio: DioPin) -> Self {
            let mut me = Self {
                strobe: gpio::Output::new(strobe, gpio::Level::High),
                clock: gpio::Output::new(clock, gpio::Level::High),
                dio: gpio::Flex::new(dio),
            };

            // Initially the DIO pin is for output, except when scanning for key presses
            me.dio.set_as_output();
            me.dio.set_low();

            me
        }
    }

    impl<'a, StrobePin: gpio::Pin, ClockPin: gpio::Pin, DioPin: gpio::Pin> super::Pins
        for EmbassyRpPins<'a, StrobePin, ClockPin, DioPin>
    {
        type Error = Infallible;

        fn set_line(&mut self, line: Line, high: bool) -> Result<(), Self::Error> {
            let level = gpio::Level::from(high);
            match line {
                Line::Clock => self.clock.set_level(level),
                Line::Data => self.dio.set_level(level),
                Line::Strobe => self.strobe.set_level(level),
            }

            Ok(())
        }

        fn read_dio(&mut self) -> Result<bool, Self::Error> {
            Ok(self.dio.is_high())
        }

        fn set_dio_mode(&mut self, mode: DioMode) -> Result<(), Self::Error> {
            match mode {
                DioMode::Input => {
                    self.dio.set_pull(gpio::Pull::Up);
                    self.dio.set_as_input();
                }
                DioMode::Output => {
                    self.dio.set_pull(gpio::Pull::None);
                    self.dio.set_as_output();
                }
            }

            Ok(())
        }
    }
}

#[cfg(feature = "embassy-rp")]
pub use embassy_rp_pins::EmbassyRpPins;
