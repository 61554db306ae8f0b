//! Peripheral pin access.

/// Direction of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Pin is read.
    Input,
    /// Pin is driven.
    Output,
}

/// Low-level peripheral access used by device items.
pub trait Hardware {
    /// Set a pin's direction.
    fn configure_pin(&mut self, _pin: u8, _mode: PinMode) {}

    /// Read a digital level; `true` is high.
    fn read_digital(&mut self, pin: u8) -> bool;

    /// Drive a digital level.
    fn write_digital(&mut self, pin: u8, high: bool);

    /// Read a raw analog value.
    fn read_analog(&mut self, pin: u8) -> u16;

    /// Write a PWM duty value.
    fn write_analog(&mut self, pin: u8, value: u8);
}
