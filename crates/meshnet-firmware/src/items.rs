//! Device items.
//!
//! Each configured peripheral is an [`Item`]. Items are created from a
//! configuration record and then translate between wire state and hardware.
//!
//! # Configuration records
//!
//! ```text
//! +---------+----------------------------+------------------------+
//! | variant | variant fields             | name (rest of record)  |
//! +---------+----------------------------+------------------------+
//! ```
//!
//! | Variant        | Tag | Fields                                  | State bytes |
//! |----------------|-----|-----------------------------------------|-------------|
//! | binary switch  | 0   | pin                                     | 1 (bool)    |
//! | binary sensor  | 1   | pin                                     | 1 (bool)    |
//! | analog sensor  | 3   | pin, delta (u16)                        | 2 (u16)     |
//! | one-wire       | 4   | pin                                     | none        |
//! | RGB lamp       | 5   | red pin, green pin, blue pin            | 3           |
//! | dimmer         | 6   | pin                                     | 1           |
//! | DHT sensor     | 7   | pin, temp delta (u16), humidity delta   | none        |
//!
//! One-wire and DHT sensors are accepted and named but have no state yet.

use crate::RegistryError;
use meshnet_common::{Hardware, PinMode};
use meshnet_packet::{Envelope, PacketError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of devices on one node.
pub const MAX_ITEMS: usize = 16;
/// Maximum length of a device name in bytes.
pub const MAX_ID_LEN: usize = 16;

// ============================================================================
// Variant Tags
// ============================================================================

/// Wire tag of a device variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ItemKind {
    /// Digital output.
    BinarySwitch = 0,
    /// Digital input.
    BinarySensor = 1,
    /// Analog input with hysteresis.
    AnalogSensor = 3,
    /// One-wire bus device.
    OneWire = 4,
    /// Three-channel PWM lamp.
    RgbLamp = 5,
    /// Single-channel PWM output.
    Dimmer = 6,
    /// DHT temperature/humidity sensor.
    DhtSensor = 7,
}

impl ItemKind {
    /// Wire value of this variant.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ItemKind::BinarySwitch => "binary_switch",
            ItemKind::BinarySensor => "binary_sensor",
            ItemKind::AnalogSensor => "analog_sensor",
            ItemKind::OneWire => "one_wire",
            ItemKind::RgbLamp => "rgb_lamp",
            ItemKind::Dimmer => "dimmer",
            ItemKind::DhtSensor => "dht_sensor",
        }
    }
}

impl TryFrom<u8> for ItemKind {
    type Error = RegistryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ItemKind::BinarySwitch),
            1 => Ok(ItemKind::BinarySensor),
            3 => Ok(ItemKind::AnalogSensor),
            4 => Ok(ItemKind::OneWire),
            5 => Ok(ItemKind::RgbLamp),
            6 => Ok(ItemKind::Dimmer),
            7 => Ok(ItemKind::DhtSensor),
            other => Err(RegistryError::UnknownVariant(other)),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Device Capability
// ============================================================================

/// What every device variant can do.
pub trait Device: Sized {
    /// Decode the variant fields and name of a configuration record.
    ///
    /// All fields are read before any pin is touched, so a truncated record
    /// leaves the hardware untouched.
    fn decode_config<H: Hardware>(cfg: &mut Envelope, hw: &mut H) -> Result<Self, PacketError>;

    /// Drive hardware from wire state.
    fn apply_state<H: Hardware>(
        &mut self,
        state: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError>;

    /// Append the current state and remember it as last reported.
    fn read_state<H: Hardware>(
        &mut self,
        out: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError>;

    /// Whether the hardware has moved away from the last reported state.
    fn has_changed<H: Hardware>(&self, _hw: &mut H) -> bool {
        false
    }

    /// Device name.
    fn name(&self) -> &str;
}

/// Read the rest of a record as a device name.
///
/// Stops at the first NUL and keeps at most [`MAX_ID_LEN`] bytes, cut on a
/// character boundary.
fn decode_name(cfg: &mut Envelope) -> Result<String, PacketError> {
    let raw = cfg.get_bytes(cfg.remain())?;
    let raw = raw.split(|&b| b == 0).next().unwrap_or_default();
    let mut name = String::from_utf8_lossy(raw).into_owned();
    if name.len() > MAX_ID_LEN {
        let mut cut = MAX_ID_LEN;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    Ok(name)
}

// ============================================================================
// Variants
// ============================================================================

/// A digital output that reports its pin level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySwitch {
    pin: u8,
    value: bool,
    name: String,
}

impl BinarySwitch {
    /// Last commanded or reported level.
    pub fn value(&self) -> bool {
        self.value
    }
}

impl Device for BinarySwitch {
    fn decode_config<H: Hardware>(cfg: &mut Envelope, hw: &mut H) -> Result<Self, PacketError> {
        let pin = cfg.get_byte()?;
        let name = decode_name(cfg)?;
        hw.configure_pin(pin, PinMode::Output);
        Ok(BinarySwitch {
            pin,
            value: false,
            name,
        })
    }

    fn apply_state<H: Hardware>(
        &mut self,
        state: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError> {
        self.value = state.get_bool()?;
        hw.write_digital(self.pin, self.value);
        Ok(())
    }

    fn read_state<H: Hardware>(
        &mut self,
        out: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError> {
        let level = hw.read_digital(self.pin);
        out.set_bool(level)?;
        self.value = level;
        Ok(())
    }

    fn has_changed<H: Hardware>(&self, hw: &mut H) -> bool {
        self.value != hw.read_digital(self.pin)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A digital input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySensor {
    pin: u8,
    last: bool,
    name: String,
}

impl Device for BinarySensor {
    fn decode_config<H: Hardware>(cfg: &mut Envelope, hw: &mut H) -> Result<Self, PacketError> {
        let pin = cfg.get_byte()?;
        let name = decode_name(cfg)?;
        hw.configure_pin(pin, PinMode::Input);
        Ok(BinarySensor {
            pin,
            last: false,
            name,
        })
    }

    fn apply_state<H: Hardware>(
        &mut self,
        _state: &mut Envelope,
        _hw: &mut H,
    ) -> Result<(), PacketError> {
        Ok(())
    }

    fn read_state<H: Hardware>(
        &mut self,
        out: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError> {
        let level = hw.read_digital(self.pin);
        out.set_bool(level)?;
        self.last = level;
        Ok(())
    }

    fn has_changed<H: Hardware>(&self, hw: &mut H) -> bool {
        hw.read_digital(self.pin) != self.last
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An analog input reported once it moves more than `delta` from the last report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalogSensor {
    pin: u8,
    delta: u16,
    last: u16,
    name: String,
}

impl AnalogSensor {
    /// Hysteresis threshold.
    pub fn delta(&self) -> u16 {
        self.delta
    }
}

impl Device for AnalogSensor {
    fn decode_config<H: Hardware>(cfg: &mut Envelope, _hw: &mut H) -> Result<Self, PacketError> {
        let pin = cfg.get_byte()?;
        let delta = cfg.get_short()?;
        let name = decode_name(cfg)?;
        Ok(AnalogSensor {
            pin,
            delta,
            last: 0,
            name,
        })
    }

    fn apply_state<H: Hardware>(
        &mut self,
        _state: &mut Envelope,
        _hw: &mut H,
    ) -> Result<(), PacketError> {
        Ok(())
    }

    fn read_state<H: Hardware>(
        &mut self,
        out: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError> {
        let reading = hw.read_analog(self.pin);
        out.set_short(reading)?;
        self.last = reading;
        Ok(())
    }

    fn has_changed<H: Hardware>(&self, hw: &mut H) -> bool {
        self.last.abs_diff(hw.read_analog(self.pin)) > self.delta
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One-wire bus device. Not implemented beyond configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneWire {
    pin: u8,
    name: String,
}

impl Device for OneWire {
    fn decode_config<H: Hardware>(cfg: &mut Envelope, _hw: &mut H) -> Result<Self, PacketError> {
        let pin = cfg.get_byte()?;
        let name = decode_name(cfg)?;
        Ok(OneWire { pin, name })
    }

    fn apply_state<H: Hardware>(
        &mut self,
        _state: &mut Envelope,
        _hw: &mut H,
    ) -> Result<(), PacketError> {
        Ok(())
    }

    fn read_state<H: Hardware>(
        &mut self,
        _out: &mut Envelope,
        _hw: &mut H,
    ) -> Result<(), PacketError> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Three-channel PWM lamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbLamp {
    pins: [u8; 3],
    value: [u8; 3],
    name: String,
}

impl RgbLamp {
    /// Current red, green, blue duty values.
    pub fn value(&self) -> [u8; 3] {
        self.value
    }
}

impl Device for RgbLamp {
    fn decode_config<H: Hardware>(cfg: &mut Envelope, hw: &mut H) -> Result<Self, PacketError> {
        let pins = [cfg.get_byte()?, cfg.get_byte()?, cfg.get_byte()?];
        let name = decode_name(cfg)?;
        for pin in pins {
            hw.configure_pin(pin, PinMode::Output);
        }
        Ok(RgbLamp {
            pins,
            value: [0; 3],
            name,
        })
    }

    fn apply_state<H: Hardware>(
        &mut self,
        state: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError> {
        let value = [state.get_byte()?, state.get_byte()?, state.get_byte()?];
        self.value = value;
        for (pin, duty) in self.pins.iter().zip(value) {
            hw.write_analog(*pin, duty);
        }
        Ok(())
    }

    fn read_state<H: Hardware>(
        &mut self,
        out: &mut Envelope,
        _hw: &mut H,
    ) -> Result<(), PacketError> {
        out.set_bytes(&self.value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Single-channel PWM output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimmer {
    pin: u8,
    value: u8,
    name: String,
}

impl Dimmer {
    /// Current duty value.
    pub fn value(&self) -> u8 {
        self.value
    }
}

impl Device for Dimmer {
    fn decode_config<H: Hardware>(cfg: &mut Envelope, hw: &mut H) -> Result<Self, PacketError> {
        let pin = cfg.get_byte()?;
        let name = decode_name(cfg)?;
        hw.configure_pin(pin, PinMode::Output);
        Ok(Dimmer {
            pin,
            value: 0,
            name,
        })
    }

    fn apply_state<H: Hardware>(
        &mut self,
        state: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError> {
        self.value = state.get_byte()?;
        hw.write_analog(self.pin, self.value);
        Ok(())
    }

    fn read_state<H: Hardware>(
        &mut self,
        out: &mut Envelope,
        _hw: &mut H,
    ) -> Result<(), PacketError> {
        out.set_byte(self.value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// DHT temperature/humidity sensor. Not implemented beyond configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtSensor {
    pin: u8,
    temp_delta: u16,
    humidity_delta: u16,
    name: String,
}

impl Device for DhtSensor {
    fn decode_config<H: Hardware>(cfg: &mut Envelope, _hw: &mut H) -> Result<Self, PacketError> {
        let pin = cfg.get_byte()?;
        let temp_delta = cfg.get_short()?;
        let humidity_delta = cfg.get_short()?;
        let name = decode_name(cfg)?;
        Ok(DhtSensor {
            pin,
            temp_delta,
            humidity_delta,
            name,
        })
    }

    fn apply_state<H: Hardware>(
        &mut self,
        _state: &mut Envelope,
        _hw: &mut H,
    ) -> Result<(), PacketError> {
        Ok(())
    }

    fn read_state<H: Hardware>(
        &mut self,
        _out: &mut Envelope,
        _hw: &mut H,
    ) -> Result<(), PacketError> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Item
// ============================================================================

/// A configured device of any variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    BinarySwitch(BinarySwitch),
    BinarySensor(BinarySensor),
    AnalogSensor(AnalogSensor),
    OneWire(OneWire),
    RgbLamp(RgbLamp),
    Dimmer(Dimmer),
    DhtSensor(DhtSensor),
}

macro_rules! dispatch {
    ($item:expr, $device:ident => $body:expr) => {
        match $item {
            Item::BinarySwitch($device) => $body,
            Item::BinarySensor($device) => $body,
            Item::AnalogSensor($device) => $body,
            Item::OneWire($device) => $body,
            Item::RgbLamp($device) => $body,
            Item::Dimmer($device) => $body,
            Item::DhtSensor($device) => $body,
        }
    };
}

impl Item {
    /// Decode a configuration record for `kind`.
    pub fn decode<H: Hardware>(
        kind: ItemKind,
        cfg: &mut Envelope,
        hw: &mut H,
    ) -> Result<Item, PacketError> {
        Ok(match kind {
            ItemKind::BinarySwitch => Item::BinarySwitch(BinarySwitch::decode_config(cfg, hw)?),
            ItemKind::BinarySensor => Item::BinarySensor(BinarySensor::decode_config(cfg, hw)?),
            ItemKind::AnalogSensor => Item::AnalogSensor(AnalogSensor::decode_config(cfg, hw)?),
            ItemKind::OneWire => Item::OneWire(OneWire::decode_config(cfg, hw)?),
            ItemKind::RgbLamp => Item::RgbLamp(RgbLamp::decode_config(cfg, hw)?),
            ItemKind::Dimmer => Item::Dimmer(Dimmer::decode_config(cfg, hw)?),
            ItemKind::DhtSensor => Item::DhtSensor(DhtSensor::decode_config(cfg, hw)?),
        })
    }

    /// The variant tag.
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::BinarySwitch(_) => ItemKind::BinarySwitch,
            Item::BinarySensor(_) => ItemKind::BinarySensor,
            Item::AnalogSensor(_) => ItemKind::AnalogSensor,
            Item::OneWire(_) => ItemKind::OneWire,
            Item::RgbLamp(_) => ItemKind::RgbLamp,
            Item::Dimmer(_) => ItemKind::Dimmer,
            Item::DhtSensor(_) => ItemKind::DhtSensor,
        }
    }

    /// Device name.
    pub fn name(&self) -> &str {
        dispatch!(self, d => d.name())
    }

    /// Drive hardware from wire state.
    pub fn apply_state<H: Hardware>(
        &mut self,
        state: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError> {
        dispatch!(self, d => d.apply_state(state, hw))
    }

    /// Append the current state to `out`.
    pub fn read_state<H: Hardware>(
        &mut self,
        out: &mut Envelope,
        hw: &mut H,
    ) -> Result<(), PacketError> {
        dispatch!(self, d => d.read_state(out, hw))
    }

    /// Whether the hardware moved since the last report.
    pub fn has_changed<H: Hardware>(&self, hw: &mut H) -> bool {
        dispatch!(self, d => d.has_changed(hw))
    }
}
