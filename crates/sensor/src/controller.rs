//! Fetch-or-cache read path behind the AirQuality characteristic.

use airly_client::MeasurementSource;
use chrono::Utc;
use common::{AirReading, Error, QualityCategory};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::cache::CacheState;
use crate::host::{Characteristic, SensorHost, StatusFault};

/// Where a read got its measurement from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    Fetch,
    Cache,
}

impl fmt::Display for ReadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadOrigin::Fetch => f.write_str("Fetch"),
            ReadOrigin::Cache => f.write_str("Cache"),
        }
    }
}

/// Owns the measurement cache and publishes readings to the host.
///
/// The cache lock is held across the fetch, so reads that overlap an
/// in-flight request wait for it and are then served from the cache.
pub struct SensorController {
    source: Arc<dyn MeasurementSource>,
    host: Arc<dyn SensorHost>,
    latitude: String,
    longitude: String,
    ttl_secs: u64,
    cache: Mutex<CacheState>,
}

impl SensorController {
    pub fn new(
        source: Arc<dyn MeasurementSource>,
        host: Arc<dyn SensorHost>,
        latitude: String,
        longitude: String,
        ttl_secs: u64,
    ) -> Self {
        Self {
            source,
            host,
            latitude,
            longitude,
            ttl_secs,
            cache: Mutex::new(CacheState::new()),
        }
    }

    /// Read the current air quality using the wall clock.
    pub async fn read(&self) -> Result<QualityCategory, Error> {
        self.read_at(Utc::now().timestamp()).await
    }

    /// Read the current air quality as of `now` (unix seconds).
    pub async fn read_at(&self, now: i64) -> Result<QualityCategory, Error> {
        let mut cache = self.cache.lock().await;

        let cached = cache.fresh(now, self.ttl_secs).map(|r| r.reading());
        let (reading, origin) = match cached {
            Some(reading) => (reading, ReadOrigin::Cache),
            None => {
                let response = match self.source.fetch(&self.latitude, &self.longitude).await {
                    Ok(response) => response,
                    Err(e) => {
                        self.host.set_characteristic(
                            Characteristic::StatusFault,
                            StatusFault::GeneralFault.into(),
                        );
                        error!("Airly network or unknown error: {}", e);
                        return Err(e);
                    }
                };
                let reading = response.reading();
                cache.store(response, now);
                (reading, ReadOrigin::Fetch)
            }
        };
        drop(cache);

        self.publish(&reading);

        match reading.index {
            Some(index) => info!("[{}] Airly air quality is: {}.", origin, index),
            None => info!("[{}] Airly air quality is: unknown.", origin),
        }

        Ok(reading.category)
    }

    /// Snapshot of the cache, mainly for diagnostics.
    pub async fn cache_state(&self) -> CacheState {
        self.cache.lock().await.clone()
    }

    fn publish(&self, reading: &AirReading) {
        self.host
            .set_characteristic(Characteristic::StatusFault, StatusFault::NoFault.into());
        if let Some(pm25) = reading.pm25 {
            self.host
                .set_characteristic(Characteristic::Pm25Density, pm25.into());
        }
        if let Some(pm10) = reading.pm10 {
            self.host
                .set_characteristic(Characteristic::Pm10Density, pm10.into());
        }
        self.host
            .set_characteristic(Characteristic::AirQuality, reading.category.into());
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::host::CharacteristicValue;
    use async_trait::async_trait;
    use common::MeasurementResponse;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted measurement source; each fetch pops the next result.
    #[derive(Default)]
    pub struct ScriptedSource {
        results: std::sync::Mutex<VecDeque<Result<MeasurementResponse, Error>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        pub fn new(results: Vec<Result<MeasurementResponse, Error>>) -> Self {
            Self {
                results: std::sync::Mutex::new(results.into()),
                ..Self::default()
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MeasurementSource for ScriptedSource {
        async fn fetch(&self, _lat: &str, _lng: &str) -> Result<MeasurementResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Network("no scripted response left".into())))
        }
    }

    /// Host that records every characteristic write in order.
    #[derive(Default)]
    pub struct RecordingHost {
        pub writes: std::sync::Mutex<Vec<(Characteristic, CharacteristicValue)>>,
        pub identified: AtomicUsize,
    }

    impl RecordingHost {
        pub fn last(&self, kind: Characteristic) -> Option<CharacteristicValue> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(k, _)| *k == kind)
                .map(|(_, v)| v.clone())
        }

        pub fn count(&self, kind: Characteristic) -> usize {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| *k == kind)
                .count()
        }
    }

    impl SensorHost for RecordingHost {
        fn set_characteristic(&self, kind: Characteristic, value: CharacteristicValue) {
            self.writes.lock().unwrap().push((kind, value));
        }

        fn identify(&self) {
            self.identified.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn response(pm25: f64, pm10: f64, index: f64) -> MeasurementResponse {
        serde_json::from_value(serde_json::json!({
            "current": {
                "values": [
                    {"name": "PM25", "value": pm25},
                    {"name": "PM10", "value": pm10}
                ],
                "indexes": [{"value": index}]
            }
        }))
        .expect("valid response")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::host::CharacteristicValue;
    use std::time::Duration;

    const T: i64 = 1_760_000_000;

    fn controller(source: Arc<ScriptedSource>, host: Arc<RecordingHost>) -> SensorController {
        SensorController::new(source, host, "50.06".into(), "19.94".into(), 600)
    }

    fn malformed() -> Error {
        serde_json::from_str::<common::MeasurementResponse>("{\"current\": [")
            .expect_err("malformed JSON")
            .into()
    }

    #[tokio::test]
    async fn test_fetch_publishes_values() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(response(10.0, 20.0, 30.0))]));
        let host = Arc::new(RecordingHost::default());
        let ctrl = controller(source.clone(), host.clone());

        let category = ctrl.read_at(T).await.expect("read should succeed");

        assert_eq!(category, QualityCategory::Good);
        assert_eq!(host.last(Characteristic::Pm25Density), Some(CharacteristicValue::Float(10.0)));
        assert_eq!(host.last(Characteristic::Pm10Density), Some(CharacteristicValue::Float(20.0)));
        assert_eq!(host.last(Characteristic::AirQuality), Some(CharacteristicValue::UInt(2)));
        assert_eq!(host.last(Characteristic::StatusFault), Some(CharacteristicValue::UInt(0)));
        assert_eq!(source.calls(), 1);
        assert_eq!(ctrl.cache_state().await.last_update(), Some(T));
    }

    #[tokio::test]
    async fn test_cache_boundary() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(response(10.0, 20.0, 30.0)),
            Ok(response(60.0, 90.0, 120.0)),
        ]));
        let host = Arc::new(RecordingHost::default());
        let ctrl = controller(source.clone(), host.clone());

        ctrl.read_at(T).await.expect("first read");
        let cached = ctrl.read_at(T + 600).await.expect("cached read");
        assert_eq!(cached, QualityCategory::Good);
        assert_eq!(source.calls(), 1);

        let refreshed = ctrl.read_at(T + 601).await.expect("refetch");
        assert_eq!(refreshed, QualityCategory::Poor);
        assert_eq!(source.calls(), 2);
        assert_eq!(ctrl.cache_state().await.last_update(), Some(T + 601));
    }

    #[tokio::test]
    async fn test_cache_hit_republishes() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(response(10.0, 20.0, 30.0))]));
        let host = Arc::new(RecordingHost::default());
        let ctrl = controller(source.clone(), host.clone());

        ctrl.read_at(T).await.expect("first read");
        ctrl.read_at(T + 10).await.expect("cached read");

        assert_eq!(host.count(Characteristic::AirQuality), 2);
        assert_eq!(host.count(Characteristic::Pm25Density), 2);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_cache() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(response(10.0, 20.0, 30.0)),
            Err(Error::HttpStatus {
                status: 500,
                body: "oops".into(),
            }),
        ]));
        let host = Arc::new(RecordingHost::default());
        let ctrl = controller(source.clone(), host.clone());

        ctrl.read_at(T).await.expect("first read");
        let err = ctrl.read_at(T + 700).await.expect_err("stale read should fail");
        assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
        assert_eq!(host.last(Characteristic::StatusFault), Some(CharacteristicValue::UInt(1)));

        let cache = ctrl.cache_state().await;
        assert_eq!(cache.last_update(), Some(T));
        assert_eq!(cache.response().map(|r| r.reading().category), Some(QualityCategory::Good));

        // Still within the TTL of the original fetch.
        let again = ctrl.read_at(T + 500).await.expect("cached read");
        assert_eq!(again, QualityCategory::Good);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_retries_on_next_read() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(Error::Network("connection reset".into())),
            Ok(response(5.0, 8.0, 12.0)),
        ]));
        let host = Arc::new(RecordingHost::default());
        let ctrl = controller(source.clone(), host.clone());

        assert!(ctrl.read_at(T).await.is_err());
        assert!(ctrl.cache_state().await.response().is_none());

        let category = ctrl.read_at(T + 1).await.expect("retry should succeed");
        assert_eq!(category, QualityCategory::Excellent);
        assert_eq!(host.last(Characteristic::StatusFault), Some(CharacteristicValue::UInt(0)));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_json_sets_fault() {
        let source = Arc::new(ScriptedSource::new(vec![Err(malformed())]));
        let host = Arc::new(RecordingHost::default());
        let ctrl = controller(source, host.clone());

        let err = ctrl.read_at(T).await.expect_err("parse error expected");

        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(host.last(Characteristic::StatusFault), Some(CharacteristicValue::UInt(1)));
        assert_eq!(host.last(Characteristic::AirQuality), None);
    }

    #[tokio::test]
    async fn test_missing_pollutants_are_skipped() {
        let partial: common::MeasurementResponse = serde_json::from_value(serde_json::json!({
            "current": {"values": [{"name": "PM1", "value": 3}], "indexes": [{"value": 80}]}
        }))
        .expect("valid response");
        let source = Arc::new(ScriptedSource::new(vec![Ok(partial)]));
        let host = Arc::new(RecordingHost::default());
        let ctrl = controller(source, host.clone());

        let category = ctrl.read_at(T).await.expect("read should succeed");

        assert_eq!(category, QualityCategory::Inferior);
        assert_eq!(host.count(Characteristic::Pm25Density), 0);
        assert_eq!(host.count(Characteristic::Pm10Density), 0);
    }

    #[tokio::test]
    async fn test_overlapping_reads_share_one_fetch() {
        let source = Arc::new(
            ScriptedSource::new(vec![Ok(response(10.0, 20.0, 30.0))])
                .with_delay(Duration::from_millis(50)),
        );
        let host = Arc::new(RecordingHost::default());
        let ctrl = Arc::new(controller(source.clone(), host));

        let (a, b) = tokio::join!(ctrl.read_at(T), ctrl.read_at(T));

        assert_eq!(a.expect("first read"), QualityCategory::Good);
        assert_eq!(b.expect("second read"), QualityCategory::Good);
        assert_eq!(source.calls(), 1);
    }
}
