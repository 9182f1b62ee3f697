//! A simulated TM1638 on the other end of [`Pins`], for the unit tests.
//!
//! It watches the lines the way the controller does: bytes are shifted in LSB first on rising
//! clock edges while strobe is low, the first byte of each transaction is a command, and data
//! bytes land in a model of the 16 display registers.  Key read commands are answered from a
//! queue of scripted 32-bit scans.
//!
//! [`SimTimer`] never waits, but its clock tick and tWAIT waits show up in the controller's event
//! log, in order with the pin events around them.

use crate::bus::{DioMode, Line, Pins, Timer};
use crate::{BitBangingBusDriver, Tm1638};
use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::vec::Vec;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Line(Line, bool),
    Mode(DioMode),
    ReadDio,
    Wait(Wait),
}

/// A bus-level wait of [`SimTimer`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Wait {
    ClockTick,
    Twait,
}

/// Everything that happened between one strobe low and the following strobe high
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Transaction {
    pub bytes: Vec<u8>,
    pub read_bits: u32,
    /// Bits of an incomplete byte still in the shift register when strobe went high; the
    /// controller drops them
    pub dropped_bits: u8,
}

pub(crate) struct SimController {
    strobe: bool,
    clock: bool,
    dio: bool,
    mode: DioMode,
    shift: u8,
    shift_bits: u8,
    current: Option<Transaction>,
    address: Option<u8>,
    auto_increment: bool,
    scan: u32,

    pub events: Vec<Event>,
    pub transactions: Vec<Transaction>,
    pub registers: [u8; 16],
    pub display_control: Option<u8>,
    /// Answers to the next key read commands; once empty, no key is pressed
    pub key_scans: VecDeque<u32>,
    pub scans_served: usize,
}

impl SimController {
    pub fn new() -> Self {
        WAITS.with(|waits| waits.borrow_mut().clear());

        Self {
            strobe: true,
            clock: false,
            dio: false,
            mode: DioMode::Output,
            shift: 0,
            shift_bits: 0,
            current: None,
            address: None,
            auto_increment: false,
            scan: 0,
            events: Vec::new(),
            transactions: Vec::new(),
            registers: [0xAA; 16],
            display_control: None,
            key_scans: VecDeque::new(),
            scans_served: 0,
        }
    }

    /// Scripted scans, one per key read command
    pub fn with_key_scans(scans: &[u32]) -> Self {
        let mut sim = Self::new();
        sim.key_scans.extend(scans);
        sim
    }

    /// Segment register of the display at 1-based `position`
    pub fn segment(&self, position: usize) -> u8 {
        self.registers[2 * (position - 1)]
    }

    pub fn transaction_bytes(&self) -> Vec<Vec<u8>> {
        self.transactions.iter().map(|t| t.bytes.clone()).collect()
    }

    /// Number of `wait` events logged so far
    pub fn waits(&self, wait: Wait) -> usize {
        self.events
            .iter()
            .filter(|event| **event == Event::Wait(wait))
            .count()
    }

    /// Log `event`, after any timer waits since the previous pin operation
    fn record(&mut self, event: Event) {
        WAITS.with(|waits| {
            self.events
                .extend(waits.borrow_mut().drain(..).map(Event::Wait))
        });
        self.events.push(event);
    }

    fn strobe_edge(&mut self, high: bool) {
        if high {
            let mut transaction = self.current.take().expect("strobe raised outside a transaction");
            transaction.dropped_bits = self.shift_bits;
            self.shift = 0;
            self.shift_bits = 0;
            self.transactions.push(transaction);
        } else {
            self.current = Some(Transaction::default());
            self.address = None;
            self.shift = 0;
            self.shift_bits = 0;
        }
    }

    fn clock_rising(&mut self) {
        let Some(current) = self.current.as_mut() else {
            return;
        };

        match self.mode {
            DioMode::Input => current.read_bits += 1,
            DioMode::Output => {
                self.shift |= u8::from(self.dio) << self.shift_bits;
                self.shift_bits += 1;
                if self.shift_bits == 8 {
                    let byte = self.shift;
                    self.shift = 0;
                    self.shift_bits = 0;
                    self.receive(byte);
                }
            }
        }
    }

    fn receive(&mut self, byte: u8) {
        let current = self.current.as_mut().expect("byte outside a transaction");
        let is_command = current.bytes.is_empty();
        current.bytes.push(byte);

        if is_command {
            match byte {
                0x40 => self.auto_increment = true,
                0x44 => self.auto_increment = false,
                0x42 => {
                    self.scan = self.key_scans.pop_front().unwrap_or(0);
                    self.scans_served += 1;
                }
                0x80..=0x8F => self.display_control = Some(byte),
                0xC0..=0xCF => self.address = Some(byte & 0x0F),
                _ => panic!("unknown command {byte:#04x}"),
            }
        } else {
            let address = self.address.expect("data byte without an address");
            self.registers[address as usize] = byte;
            if self.auto_increment {
                self.address = Some((address + 1) & 0x0F);
            }
        }
    }
}

impl Pins for SimController {
    type Error = Infallible;

    fn set_line(&mut self, line: Line, high: bool) -> Result<(), Self::Error> {
        self.record(Event::Line(line, high));

        match line {
            Line::Strobe => {
                if self.strobe != high {
                    self.strobe_edge(high);
                }
                self.strobe = high;
            }
            Line::Clock => {
                if high && !self.clock {
                    self.clock_rising();
                }
                self.clock = high;
            }
            Line::Data => {
                assert_eq!(self.mode, DioMode::Output, "DIO driven while an input");
                self.dio = high;
            }
        }

        Ok(())
    }

    fn read_dio(&mut self) -> Result<bool, Self::Error> {
        self.record(Event::ReadDio);
        assert_eq!(self.mode, DioMode::Input, "DIO read while an output");
        assert!(!self.clock, "DIO sampled with the clock high");

        let bit = self.current.as_ref().map_or(0, |t| t.read_bits);
        // The pull-up holds the line high once the controller has nothing more to send
        Ok(self.scan.checked_shr(bit).map_or(true, |v| v & 1 != 0))
    }

    fn set_dio_mode(&mut self, mode: DioMode) -> Result<(), Self::Error> {
        self.record(Event::Mode(mode));
        self.mode = mode;

        Ok(())
    }
}

std::thread_local! {
    static KEY_POLLS: Cell<usize> = const { Cell::new(0) };
    static WAITS: RefCell<Vec<Wait>> = const { RefCell::new(Vec::new()) };
}

/// Timer that never waits.  It counts the key poll waits on the current thread, and logs the
/// bus-level waits for the next [`SimController`] pin operation to pick up.
pub(crate) struct SimTimer;

impl SimTimer {
    pub fn key_polls() -> usize {
        KEY_POLLS.with(|polls| polls.get())
    }
}

impl Timer for SimTimer {
    async fn wait_clock_tick() {
        WAITS.with(|waits| waits.borrow_mut().push(Wait::ClockTick));
    }

    async fn wait_twait() {
        WAITS.with(|waits| waits.borrow_mut().push(Wait::Twait));
    }

    async fn wait_key_poll() {
        KEY_POLLS.with(|polls| polls.set(polls.get() + 1));
    }
}

pub(crate) fn tm1638(
    sim: &mut SimController,
) -> Tm1638<BitBangingBusDriver<&mut SimController, SimTimer>> {
    Tm1638::builder()
        .with_timer::<SimTimer>()
        .with_bit_banging_driver(sim)
        .build()
        .unwrap()
}
