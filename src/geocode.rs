//! Address search and reverse geocoding against a Nominatim-compatible
//! service. Lookups are best-effort: provider failures are logged and turn
//! into "no suggestions", never into request errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const MIN_QUERY_LEN: usize = 3;
const SEARCH_LIMIT: &str = "5";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSuggestion {
    pub display_address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseAddress {
    pub display_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_number: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(&self, query: &str) -> AppResult<Vec<AddressSuggestion>>;

    async fn reverse(&self, lat: f64, lng: f64) -> AppResult<Option<ReverseAddress>>;
}

#[derive(Debug, Deserialize)]
struct Place {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    lat: Option<String>,
    #[serde(default)]
    lon: Option<String>,
    #[serde(default)]
    address: Option<PlaceAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceAddress {
    #[serde(default)]
    house_number: Option<String>,
}

impl Place {
    fn plot_number(&self) -> Option<String> {
        self.address
            .as_ref()
            .and_then(|address| address.house_number.clone())
            .filter(|value| !value.trim().is_empty())
    }

    fn into_suggestion(self) -> Option<AddressSuggestion> {
        let plot_number = self.plot_number();
        Some(AddressSuggestion {
            lat: self.lat?.parse().ok()?,
            lng: self.lon?.parse().ok()?,
            display_address: self.display_name?,
            plot_number,
        })
    }

    fn into_reverse(self) -> Option<ReverseAddress> {
        if self.error.is_some() {
            return None;
        }
        let plot_number = self.plot_number();
        Some(ReverseAddress {
            display_address: self.display_name?,
            plot_number,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build geocoder client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(params)
            .send()
            .await
            .map_err(|error| AppError::Upstream(format!("geocoder request failed: {error}")))?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|error| {
                    AppError::Upstream(format!("geocoder returned bad JSON: {error}"))
                }),
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::QuotaExceeded(
                "geocoder rate limit reached".to_string(),
            )),
            status => Err(AppError::Upstream(format!(
                "geocoder returned status {status}"
            ))),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str) -> AppResult<Vec<AddressSuggestion>> {
        let places: Vec<Place> = self
            .fetch(
                "/search",
                &[
                    ("format", "jsonv2".to_string()),
                    ("addressdetails", "1".to_string()),
                    ("limit", SEARCH_LIMIT.to_string()),
                    ("q", query.to_string()),
                ],
            )
            .await?;

        Ok(places.into_iter().filter_map(Place::into_suggestion).collect())
    }

    async fn reverse(&self, lat: f64, lng: f64) -> AppResult<Option<ReverseAddress>> {
        let place: Place = self
            .fetch(
                "/reverse",
                &[
                    ("format", "jsonv2".to_string()),
                    ("lat", lat.to_string()),
                    ("lon", lng.to_string()),
                ],
            )
            .await?;

        Ok(place.into_reverse())
    }
}

/// Collapses bursts of calls sharing a key: each call waits out the window
/// and only the last one of the burst is allowed through.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

/// A key is tracked only while some call for it is waiting.
#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    waiting: usize,
}

struct Waiting<'a> {
    slots: &'a Mutex<HashMap<String, Slot>>,
    key: &'a str,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        let mut slots = lock_or_recover(self.slots);
        if let Some(slot) = slots.get_mut(self.key) {
            slot.waiting = slot.waiting.saturating_sub(1);
            if slot.waiting == 0 {
                slots.remove(self.key);
            }
        }
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Invalidates whatever call for `key` is currently waiting.
    pub fn cancel(&self, key: &str) {
        if let Some(slot) = lock_or_recover(&self.slots).get_mut(key) {
            slot.generation += 1;
        }
    }

    /// True when no newer call for `key` arrived during the window.
    pub async fn settle(&self, key: &str) -> bool {
        let ticket = {
            let mut slots = lock_or_recover(&self.slots);
            let slot = slots.entry(key.to_string()).or_default();
            slot.generation += 1;
            slot.waiting += 1;
            slot.generation
        };
        let _waiting = Waiting {
            slots: &self.slots,
            key,
        };

        tokio::time::sleep(self.window).await;

        let slots = lock_or_recover(&self.slots);
        let latest = slots.get(key).is_some_and(|slot| slot.generation == ticket);
        drop(slots);
        latest
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        lock_or_recover(&self.slots).len()
    }
}

pub struct AddressLookup {
    geocoder: Arc<dyn Geocoder>,
    debouncer: Debouncer,
}

impl AddressLookup {
    pub fn new(geocoder: Arc<dyn Geocoder>, debouncer: Debouncer) -> Self {
        Self {
            geocoder,
            debouncer,
        }
    }

    /// `None` means a newer search from the same session replaced this one.
    pub async fn suggest(&self, session: &str, query: &str) -> Option<Vec<AddressSuggestion>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            self.debouncer.cancel(session);
            return Some(Vec::new());
        }

        if !self.debouncer.settle(session).await {
            tracing::debug!(session, "address search superseded");
            return None;
        }

        match self.geocoder.search(query).await {
            Ok(suggestions) => Some(suggestions),
            Err(error) => {
                tracing::warn!(error = %error, "address search failed");
                Some(Vec::new())
            }
        }
    }

    pub async fn reverse(&self, lat: f64, lng: f64) -> Option<ReverseAddress> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }

        match self.geocoder.reverse(lat, lng).await {
            Ok(address) => address,
            Err(error) => {
                tracing::warn!(error = %error, lat, lng, "reverse geocoding failed");
                None
            }
        }
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
