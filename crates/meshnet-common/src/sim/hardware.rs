use crate::{Hardware, PinMode};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
struct PinBank {
    digital: HashMap<u8, bool>,
    analog_in: HashMap<u8, u16>,
    analog_out: HashMap<u8, u8>,
    modes: HashMap<u8, PinMode>,
}

/// A simulated pin bank.
///
/// Digital pins behave like a microcontroller port: a level written to an
/// output reads back. Analog inputs and PWM outputs are kept separately.
#[derive(Debug, Clone, Default)]
pub struct SimHardware {
    pins: Rc<RefCell<PinBank>>,
}

impl SimHardware {
    /// Create a pin bank with every pin low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a digital level as if driven externally.
    pub fn set_digital(&self, pin: u8, high: bool) {
        self.pins.borrow_mut().digital.insert(pin, high);
    }

    /// Current digital level of a pin.
    pub fn digital(&self, pin: u8) -> bool {
        self.pins.borrow().digital.get(&pin).copied().unwrap_or(false)
    }

    /// Set the value an analog read of `pin` returns.
    pub fn set_analog(&self, pin: u8, value: u16) {
        self.pins.borrow_mut().analog_in.insert(pin, value);
    }

    /// Last PWM value written to `pin`.
    pub fn analog_output(&self, pin: u8) -> Option<u8> {
        self.pins.borrow().analog_out.get(&pin).copied()
    }

    /// Direction last configured for `pin`.
    pub fn pin_mode(&self, pin: u8) -> Option<PinMode> {
        self.pins.borrow().modes.get(&pin).copied()
    }
}

impl Hardware for SimHardware {
    fn configure_pin(&mut self, pin: u8, mode: PinMode) {
        self.pins.borrow_mut().modes.insert(pin, mode);
    }

    fn read_digital(&mut self, pin: u8) -> bool {
        self.digital(pin)
    }

    fn write_digital(&mut self, pin: u8, high: bool) {
        self.set_digital(pin, high);
    }

    fn read_analog(&mut self, pin: u8) -> u16 {
        self.pins.borrow().analog_in.get(&pin).copied().unwrap_or(0)
    }

    fn write_analog(&mut self, pin: u8, value: u8) {
        self.pins.borrow_mut().analog_out.insert(pin, value);
    }
}
