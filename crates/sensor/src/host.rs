//! Capability interface of the smart-home host.
//!
//! The host owns the real service/characteristic objects; the sensor only
//! pushes values into them through this trait.

use common::QualityCategory;
use std::fmt;

/// Characteristics the accessory publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Name,
    Manufacturer,
    Model,
    SerialNumber,
    AirQuality,
    StatusFault,
    Pm25Density,
    Pm10Density,
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Characteristic::Name => "Name",
            Characteristic::Manufacturer => "Manufacturer",
            Characteristic::Model => "Model",
            Characteristic::SerialNumber => "SerialNumber",
            Characteristic::AirQuality => "AirQuality",
            Characteristic::StatusFault => "StatusFault",
            Characteristic::Pm25Density => "PM2_5Density",
            Characteristic::Pm10Density => "PM10Density",
        };
        f.write_str(label)
    }
}

/// StatusFault characteristic values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusFault {
    NoFault = 0,
    GeneralFault = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CharacteristicValue {
    Text(String),
    Float(f64),
    UInt(u8),
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacteristicValue::Text(s) => f.write_str(s),
            CharacteristicValue::Float(v) => write!(f, "{v:.2}"),
            CharacteristicValue::UInt(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for CharacteristicValue {
    fn from(value: &str) -> Self {
        CharacteristicValue::Text(value.to_string())
    }
}

impl From<f64> for CharacteristicValue {
    fn from(value: f64) -> Self {
        CharacteristicValue::Float(value)
    }
}

impl From<QualityCategory> for CharacteristicValue {
    fn from(value: QualityCategory) -> Self {
        CharacteristicValue::UInt(value.as_u8())
    }
}

impl From<StatusFault> for CharacteristicValue {
    fn from(value: StatusFault) -> Self {
        CharacteristicValue::UInt(value as u8)
    }
}

/// Operations the host exposes to the accessory.
pub trait SensorHost: Send + Sync {
    fn set_characteristic(&self, kind: Characteristic, value: CharacteristicValue);

    /// Ask the host to physically identify the accessory (blink, beep...).
    fn identify(&self) {}
}
