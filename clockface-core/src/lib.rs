pub mod api;
pub mod app;
pub mod capture;
pub mod clock;
pub mod config;
pub mod geo;
pub mod route;
pub mod session;
pub mod status;
pub mod views;

pub use app::App;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Api(#[from] api::ApiError),
    #[error(transparent)]
    Capture(#[from] capture::CaptureError),
    #[error("Session storage error: {0}")]
    Session(#[from] session::SessionError),
    #[error(transparent)]
    Geofence(#[from] geo::GeofenceError),
    #[error(transparent)]
    Location(#[from] geo::LocationError),
    #[error(transparent)]
    Validation(#[from] views::ValidationError),
    #[error("Login failed: {0}")]
    LoginFailed(String),
    #[error("Not logged in. Run `clockface login` first.")]
    NotAuthenticated,
    #[error("Session expired or unauthorized. Please login again.")]
    SessionExpired,
    #[error("{0} is only available to administrators")]
    Forbidden(route::Route),
}

impl From<geo::PresenceError> for Error {
    fn from(err: geo::PresenceError) -> Self {
        match err {
            geo::PresenceError::Location(e) => Error::Location(e),
            geo::PresenceError::Geofence(e) => Error::Geofence(e),
        }
    }
}
