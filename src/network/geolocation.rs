//! Device geolocation and reverse geocoding.
//!
//! A terminal has no location permission prompt, so the device position is
//! either supplied explicitly (`--latitude/--longitude`) or unavailable.

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;

use crate::errors::SpeedTestError;
use crate::network::client::Client;
use crate::network::requests::reverse_geocode::ReverseGeocodeRequest;
use crate::network::GeoLookup;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Provider of the device's current position.
pub trait GeolocationSource: Send + Sync {
    fn current_position(
        &self,
    ) -> BoxFuture<'_, Result<Coordinates, SpeedTestError>>;
}

/// Always refuses, as a denied permission would.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedGeolocation;

impl GeolocationSource for DeniedGeolocation {
    fn current_position(
        &self,
    ) -> BoxFuture<'_, Result<Coordinates, SpeedTestError>> {
        futures::future::ready(Err(SpeedTestError::permission(
            "device geolocation is not available",
        )))
        .boxed()
    }
}

/// Reports a fixed position.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocation {
    coordinates: Coordinates,
}

impl FixedGeolocation {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

impl GeolocationSource for FixedGeolocation {
    fn current_position(
        &self,
    ) -> BoxFuture<'_, Result<Coordinates, SpeedTestError>> {
        futures::future::ready(Ok(self.coordinates)).boxed()
    }
}

/// Pick a source from optional CLI coordinates.
pub fn source_from(coordinates: Option<Coordinates>) -> Box<dyn GeolocationSource> {
    match coordinates {
        Some(coordinates) => Box::new(FixedGeolocation::new(coordinates)),
        None => Box::new(DeniedGeolocation),
    }
}

/// Turns coordinates into a place name.
pub trait ReverseGeocoder: Send + Sync {
    fn reverse(
        &self,
        coordinates: Coordinates,
    ) -> BoxFuture<'_, Result<GeoLookup, SpeedTestError>>;
}

/// [`ReverseGeocoder`] backed by the BigDataCloud HTTP service.
#[derive(Debug, Clone)]
pub struct HttpReverseGeocoder {
    client: Client,
    base_url: String,
}

impl HttpReverseGeocoder {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

impl ReverseGeocoder for HttpReverseGeocoder {
    fn reverse(
        &self,
        coordinates: Coordinates,
    ) -> BoxFuture<'_, Result<GeoLookup, SpeedTestError>> {
        async move {
            let request =
                ReverseGeocodeRequest::new(self.base_url.as_str(), coordinates);
            let response = self.client.send(request).await?;
            Ok(GeoLookup::from(response))
        }
        .boxed()
    }
}
