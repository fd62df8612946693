use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius used by the haversine formula, in metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Error)]
pub enum GeofenceError {
    #[error("You are {distance:.0}m away from the office. Allowed radius is {radius:.0}m.")]
    OutsideRadius { distance: f64, radius: f64 },
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Geolocation is not supported on this device. Pass --lat/--lon or set [location] in the config.")]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Great-circle distance between two points in metres.
pub fn haversine_distance(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Circular area around the office
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub center: Coordinates,
    pub radius_meters: f64,
}

impl Geofence {
    /// Returns the distance to the office when inside the fence.
    pub fn check(&self, position: Coordinates) -> Result<f64, GeofenceError> {
        let distance = haversine_distance(self.center, position);
        if distance <= self.radius_meters {
            log::debug!(
                "Inside geofence: {:.1}m (radius {:.0}m)",
                distance,
                self.radius_meters
            );
            Ok(distance)
        } else {
            Err(GeofenceError::OutsideRadius {
                distance: distance.round(),
                radius: self.radius_meters,
            })
        }
    }
}

/// Source of the device's current position.
pub trait Locator {
    fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// A position known up front (config file or command-line flags).
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator(pub Coordinates);

impl Locator for FixedLocator {
    fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// Used when nothing can report a position.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLocator;

impl Locator for UnavailableLocator {
    fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unsupported)
    }
}

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Geofence(#[from] GeofenceError),
}

/// Query the locator once and check the result against the fence.
/// Locator failures are not retried.
pub fn verify_presence<L: Locator + ?Sized>(
    locator: &L,
    fence: &Geofence,
) -> Result<f64, PresenceError> {
    let position = locator.current_position()?;
    Ok(fence.check(position)?)
}
