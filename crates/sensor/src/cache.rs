//! Last-response cache for the Airly measurement.

use common::MeasurementResponse;

/// The most recent successful measurement and when it was fetched.
///
/// `response` is `None` until the first successful fetch. Only
/// [`CacheState::store`] mutates it; failed fetches and cache hits leave it
/// alone.
#[derive(Debug, Clone, Default)]
pub struct CacheState {
    last_update: Option<i64>,
    response: Option<MeasurementResponse>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unix seconds of the last successful fetch.
    pub fn last_update(&self) -> Option<i64> {
        self.last_update
    }

    pub fn response(&self) -> Option<&MeasurementResponse> {
        self.response.as_ref()
    }

    /// Stale once strictly more than `ttl_secs` have passed since the last
    /// fetch, or when nothing has been fetched yet.
    pub fn is_stale(&self, now: i64, ttl_secs: u64) -> bool {
        match (self.last_update, &self.response) {
            (Some(last), Some(_)) => {
                let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
                last.saturating_add(ttl) < now
            }
            _ => true,
        }
    }

    /// The cached response if it is still fresh at `now`.
    pub fn fresh(&self, now: i64, ttl_secs: u64) -> Option<&MeasurementResponse> {
        if self.is_stale(now, ttl_secs) {
            None
        } else {
            self.response.as_ref()
        }
    }

    /// Replace the cached response after a successful fetch.
    pub fn store(&mut self, response: MeasurementResponse, now: i64) {
        self.response = Some(response);
        self.last_update = Some(now);
    }
}
