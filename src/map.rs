//! Map view of the user's position and the test server markers.
//!
//! The map needs an access token. Without one the view asks for it instead
//! of failing; with one it places the user (or a fixed fallback when the
//! device position is unavailable) among the global server markers.

use log::{debug, info};
use serde::Serialize;

use crate::errors::SpeedTestError;
use crate::network::geolocation::{Coordinates, GeolocationSource};
use crate::storage::CredentialStore;

/// Used when the device position cannot be read (New York).
pub const FALLBACK_LOCATION: Coordinates = Coordinates::new(40.7128, -74.0060);

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A test server shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerMarker {
    pub id: &'static str,
    pub name: &'static str,
    pub coordinates: Coordinates,
    /// Nominal ping in milliseconds
    pub ping_ms: u32,
}

impl ServerMarker {
    const fn new(
        id: &'static str,
        name: &'static str,
        latitude: f64,
        longitude: f64,
        ping_ms: u32,
    ) -> Self {
        Self {
            id,
            name,
            coordinates: Coordinates::new(latitude, longitude),
            ping_ms,
        }
    }
}

pub const GLOBAL_SERVERS: [ServerMarker; 8] = [
    ServerMarker::new("ny", "New York", 40.7128, -74.0060, 12),
    ServerMarker::new("london", "London", 51.5074, -0.1278, 45),
    ServerMarker::new("tokyo", "Tokyo", 35.6762, 139.6503, 89),
    ServerMarker::new("sydney", "Sydney", -33.8688, 151.2093, 156),
    ServerMarker::new("singapore", "Singapore", 1.3521, 103.8198, 67),
    ServerMarker::new("frankfurt", "Frankfurt", 50.1109, 8.6821, 34),
    ServerMarker::new("saopaulo", "São Paulo", -23.5505, -46.6333, 78),
    ServerMarker::new("mumbai", "Mumbai", 19.0760, 72.8777, 95),
];

/// Great-circle distance in kilometres.
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// A line from the user to one server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerRoute {
    pub server: ServerMarker,
    pub distance_km: f64,
}

/// Whether the user's position came from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationOrigin {
    Device,
    Fallback,
}

/// State of the map panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MapView {
    /// No token stored; the user must supply one
    SetupRequired,
    Ready {
        user_location: Coordinates,
        origin: LocationOrigin,
        /// Every server, nearest first
        routes: Vec<ServerRoute>,
    },
}

impl MapView {
    /// Build the view from the stored token and the device position.
    ///
    /// A missing token is not an error. Storage failures are.
    pub async fn prepare(
        store: &dyn CredentialStore,
        geolocation: &dyn GeolocationSource,
    ) -> Result<MapView, SpeedTestError> {
        if store.load()?.is_none() {
            debug!("No map token stored in {}", store.describe());
            return Ok(MapView::SetupRequired);
        }

        let (user_location, origin) = match geolocation.current_position().await
        {
            Ok(coordinates) if coordinates.is_valid() => {
                (coordinates, LocationOrigin::Device)
            }
            Ok(coordinates) => {
                debug!("Ignoring invalid device position {:?}", coordinates);
                (FALLBACK_LOCATION, LocationOrigin::Fallback)
            }
            Err(e) => {
                debug!("Map falls back to the default location: {}", e);
                (FALLBACK_LOCATION, LocationOrigin::Fallback)
            }
        };

        Ok(MapView::Ready {
            user_location,
            origin,
            routes: routes_from(user_location),
        })
    }

    pub fn nearest(&self) -> Option<&ServerRoute> {
        match self {
            MapView::Ready { routes, .. } => routes.first(),
            MapView::SetupRequired => None,
        }
    }
}

/// Every server with its distance from `user_location`, nearest first.
pub fn routes_from(user_location: Coordinates) -> Vec<ServerRoute> {
    let mut routes: Vec<ServerRoute> = GLOBAL_SERVERS
        .iter()
        .map(|server| ServerRoute {
            server: server.clone(),
            distance_km: distance_km(user_location, server.coordinates),
        })
        .collect();

    routes.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    routes
}

/// Validate and persist a token entered during setup.
///
/// The caller re-prepares the view afterwards.
pub fn save_token(
    store: &dyn CredentialStore,
    token: &str,
) -> Result<(), SpeedTestError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SpeedTestError::config("map token must not be empty")
            .with_suggestion(
                "Create a public token at mapbox.com under Account → Tokens.",
            ));
    }

    store.save(token)?;
    info!("Map token saved to {}", store.describe());
    Ok(())
}

/// Remove the stored token; the next prepare asks for setup again.
pub fn forget_token(store: &dyn CredentialStore) -> Result<(), SpeedTestError> {
    store.clear()?;
    info!("Map token removed from {}", store.describe());
    Ok(())
}
