//! The accessory as the host sees it: identity, service list, and the
//! get handler wired to the AirQuality characteristic.

use airly_client::{AirlyClient, MeasurementSource};
use common::{AccessoryConfig, Error, QualityCategory};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::controller::SensorController;
use crate::host::{Characteristic, SensorHost};

/// Plugin identifier the accessory is registered under.
pub const PLUGIN_NAME: &str = "homebridge-airly";
/// Accessory type name within the plugin.
pub const ACCESSORY_NAME: &str = common::config::ACCESSORY_TYPE;

const MANUFACTURER: &str = "Airly";
const MODEL: &str = "API";
const SERIAL_NUMBER: &str = "123-456";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    AccessoryInformation,
    AirQualitySensor,
}

/// Description of a service the host should create.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub kind: ServiceKind,
    pub name: Option<String>,
    pub characteristics: Vec<Characteristic>,
}

pub struct AirAccessory {
    name: String,
    host: Arc<dyn SensorHost>,
    controller: SensorController,
}

impl AirAccessory {
    /// Build the accessory against the real Airly API.
    pub fn from_config(config: &AccessoryConfig, host: Arc<dyn SensorHost>) -> Result<Self, Error> {
        let client = AirlyClient::new(
            config.apikey.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Self::new(config, Arc::new(client), host)
    }

    /// Build the accessory with an explicit measurement source.
    pub fn new(
        config: &AccessoryConfig,
        source: Arc<dyn MeasurementSource>,
        host: Arc<dyn SensorHost>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let controller = SensorController::new(
            source,
            host.clone(),
            config.latitude.clone(),
            config.longitude.clone(),
            config.cache_ttl_secs,
        );

        info!("Airly is working");

        Ok(Self {
            name: config.name.clone(),
            host,
            controller,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controller(&self) -> &SensorController {
        &self.controller
    }

    pub fn identify(&self) {
        info!("Identify requested!");
        self.host.identify();
    }

    /// Publish the static characteristics and describe both services.
    pub fn services(&self) -> Vec<Service> {
        self.host
            .set_characteristic(Characteristic::Manufacturer, MANUFACTURER.into());
        self.host
            .set_characteristic(Characteristic::Model, MODEL.into());
        self.host
            .set_characteristic(Characteristic::SerialNumber, SERIAL_NUMBER.into());
        self.host
            .set_characteristic(Characteristic::Name, self.name.as_str().into());

        vec![
            Service {
                kind: ServiceKind::AccessoryInformation,
                name: None,
                characteristics: vec![
                    Characteristic::Manufacturer,
                    Characteristic::Model,
                    Characteristic::SerialNumber,
                ],
            },
            Service {
                kind: ServiceKind::AirQualitySensor,
                name: Some(self.name.clone()),
                characteristics: vec![
                    Characteristic::AirQuality,
                    Characteristic::StatusFault,
                    Characteristic::Pm25Density,
                    Characteristic::Pm10Density,
                ],
            },
        ]
    }

    /// Handler for reads of the AirQuality characteristic.
    pub async fn get_air_quality(&self) -> Result<QualityCategory, Error> {
        self.controller.read().await
    }

    /// Callback-style adapter for hosts that deliver `get` events.
    pub async fn handle_get<F>(&self, callback: F)
    where
        F: FnOnce(Result<u8, Error>),
    {
        callback(self.get_air_quality().await.map(u8::from));
    }
}
