//! Air-quality sensor accessory: cache gate, read controller, and the
//! capability interface used to talk to the smart-home host.

pub mod accessory;
pub mod cache;
pub mod controller;
pub mod host;

pub use accessory::{AirAccessory, Service, ServiceKind, ACCESSORY_NAME, PLUGIN_NAME};
pub use cache::CacheState;
pub use controller::{ReadOrigin, SensorController};
pub use host::{Characteristic, CharacteristicValue, SensorHost, StatusFault};
