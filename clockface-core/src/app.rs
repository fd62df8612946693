//! Ties the API client, the session store and the configuration together
//! the way each screen uses them.

use crate::api::models::{Credentials, HistoryRange, MessageResponse};
use crate::api::{ApiClient, ApiError, AttendanceKind, HttpTransport, Transport};
use crate::capture::CapturedImage;
use crate::config::Config;
use crate::geo::{verify_presence, Geofence, Locator};
use crate::route::{guard, Access, Route};
use crate::session::{FileSessionStore, Session, SessionStore};
use crate::views::home::HomeSummary;
use crate::views::records::{map_history, AttendanceRecord};
use crate::views::settings::office_geofence;
use crate::Error;
use chrono::{DateTime, FixedOffset, Utc};

pub struct App<T: Transport, S: SessionStore> {
    config: Config,
    client: ApiClient<T>,
    store: S,
}

impl App<HttpTransport, FileSessionStore> {
    pub fn from_config(config: Config) -> Result<Self, Error> {
        let client = ApiClient::from_config(&config.api)?;
        let store = FileSessionStore::new(&config.storage.session_dir);
        Ok(Self::new(config, client, store))
    }
}

impl<T: Transport, S: SessionStore> App<T, S> {
    pub fn new(config: Config, client: ApiClient<T>, store: S) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn office_offset(&self) -> Result<FixedOffset, Error> {
        Ok(self.config.attendance.office_offset()?)
    }

    /// Current time on the office clock
    pub fn office_now(&self) -> Result<DateTime<FixedOffset>, Error> {
        Ok(Utc::now().with_timezone(&self.office_offset()?))
    }

    pub fn session(&self) -> Result<Option<Session>, Error> {
        Ok(self.store.load()?)
    }

    /// Log in and remember the token. A response without a token is a
    /// failure even when the status is 2xx.
    pub fn login(&self, email: &str, password: &str) -> Result<Session, Error> {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = self.client.login(&credentials)?;

        let is_admin = response.admin();
        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::LoginFailed(
                    response
                        .error
                        .or(response.message)
                        .unwrap_or_else(|| "no token in response".to_string()),
                )
            })?;

        let session = Session { token, is_admin };
        self.store.save(&session)?;
        log::info!(
            "Logged in as {}{}",
            credentials.email,
            if is_admin { " (admin)" } else { "" }
        );
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), Error> {
        self.store.clear()?;
        log::info!("Session cleared");
        Ok(())
    }

    /// Run the route guard against the stored session.
    pub fn enter(&self, route: Route) -> Result<Session, Error> {
        let session = self.store.load()?;
        match guard(route, session.as_ref()) {
            Access::Allow => session.ok_or(Error::NotAuthenticated),
            Access::Redirect(Route::Login) => Err(Error::NotAuthenticated),
            Access::Redirect(_) => Err(Error::Forbidden(route)),
        }
    }

    /// Call the backend on behalf of `route`. A 401 from any call ends the
    /// session.
    pub fn authorized<R, F>(&self, route: Route, call: F) -> Result<R, Error>
    where
        F: FnOnce(&ApiClient<T>, &str) -> Result<R, ApiError>,
    {
        let session = self.enter(route)?;
        match call(&self.client, &session.token) {
            Ok(value) => Ok(value),
            Err(e) if e.is_unauthorized() => {
                log::warn!("Backend rejected the token, clearing session");
                self.store.clear()?;
                Err(Error::SessionExpired)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn home_summary(&self, range: HistoryRange) -> Result<HomeSummary, Error> {
        let history = self.authorized(Route::Home, |client, token| {
            client.attendance_history(token, range)
        })?;
        Ok(HomeSummary::derive(
            &history,
            &self.config.attendance.home_rule,
            self.office_now()?,
        ))
    }

    pub fn records(&self, range: HistoryRange) -> Result<Vec<AttendanceRecord>, Error> {
        let history = self.authorized(Route::Records, |client, token| {
            client.attendance_history(token, range)
        })?;
        Ok(map_history(
            &history,
            &self.config.attendance.records_rule,
            self.office_offset()?,
        ))
    }

    /// The office geofence: pinned in the config, or else read from the
    /// backend settings. `None` when neither has a complete location or the
    /// backend refuses to share its settings (403). Any other failure is
    /// returned so the check is never skipped silently.
    pub fn office_geofence(&self) -> Result<Option<Geofence>, Error> {
        if let Some(fence) = self.config.office.geofence() {
            return Ok(Some(fence));
        }

        match self.authorized(Route::Scanner, |client, token| client.settings(token)) {
            Ok(settings) => Ok(office_geofence(&settings)),
            Err(Error::Api(e)) if e.status() == Some(403) => {
                log::warn!("Office location is not readable for this account: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Optionally check the device is inside the fence, then send the face.
    pub fn mark_attendance(
        &self,
        kind: AttendanceKind,
        image: &CapturedImage,
        presence: Option<(&dyn Locator, &Geofence)>,
    ) -> Result<MessageResponse, Error> {
        self.enter(Route::Scanner)?;

        if let Some((locator, fence)) = presence {
            let distance = verify_presence(locator, fence)?;
            log::info!("Within office radius ({:.0}m away)", distance);
        }

        self.authorized(Route::Scanner, |client, token| {
            client.submit_attendance(token, kind, image)
        })
    }
}

/// "Check-In Successful: ..." line shown after a scan
pub fn attendance_message(kind: AttendanceKind, response: &MessageResponse) -> String {
    format!(
        "{} Successful: {}",
        kind.label(),
        response.message.as_deref().unwrap_or("Attendance recorded")
    )
}
