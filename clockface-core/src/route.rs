//! Route table and the client-side guard.
//!
//! The guard only decides what to show. The backend still authorises every
//! request on its own.

use crate::session::Session;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Home,
    Scanner,
    Records,
    Dashboard,
    Register,
    Employees,
    TopPerformers,
    Attendance,
    Settings,
}

impl Route {
    pub const ALL: [Route; 10] = [
        Route::Login,
        Route::Home,
        Route::Scanner,
        Route::Records,
        Route::Dashboard,
        Route::Register,
        Route::Employees,
        Route::TopPerformers,
        Route::Attendance,
        Route::Settings,
    ];

    /// Resolve a path. Anything unknown lands on the login route.
    pub fn from_path(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        match path {
            "/" | "/login" => Route::Login,
            "/home" => Route::Home,
            "/AttendanceScanner" => Route::Scanner,
            "/records" => Route::Records,
            "/dashboard" => Route::Dashboard,
            "/register" => Route::Register,
            "/employees" => Route::Employees,
            "/top" => Route::TopPerformers,
            "/attendance" => Route::Attendance,
            "/settings" => Route::Settings,
            _ => Route::Login,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/",
            Route::Home => "/home",
            Route::Scanner => "/AttendanceScanner",
            Route::Records => "/records",
            Route::Dashboard => "/dashboard",
            Route::Register => "/register",
            Route::Employees => "/employees",
            Route::TopPerformers => "/top",
            Route::Attendance => "/attendance",
            Route::Settings => "/settings",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Route::Dashboard
                | Route::Register
                | Route::Employees
                | Route::TopPerformers
                | Route::Attendance
                | Route::Settings
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(Route),
}

/// Decide whether `route` may be shown for the given session.
pub fn guard(route: Route, session: Option<&Session>) -> Access {
    if route.is_public() {
        return Access::Allow;
    }
    match session {
        None => Access::Redirect(Route::Login),
        Some(s) if route.requires_admin() && !s.is_admin => Access::Redirect(Route::Home),
        Some(_) => Access::Allow,
    }
}
