//! REST client for the attendance backend.
//!
//! Every call is independent: the caller passes the bearer token, the
//! client sends JSON and normalises failures into [`ApiError`]. There is no
//! retry, backoff or request deduplication.

pub mod models;

use crate::capture::CapturedImage;
use crate::config::ApiConfig;
use models::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unable to connect to server: {0}")]
    Network(String),
    /// Non-2xx answer. `message` comes from the body when it has one.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Server Error: {status} {status_text}")]
    InvalidResponse { status: u16, status_text: String },
    #[error("Unexpected response: {0}")]
    Unexpected(String),
    #[error("Invalid request: {0}")]
    Request(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::InvalidResponse { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, with query string
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Moves a request over the wire.
pub trait Transport {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError>;
}

/// Blocking HTTP transport
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        }
        .header(reqwest::header::CONTENT_TYPE, "application/json");

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(|e| {
            log::warn!("{} {} failed: {}", request.method, url, e);
            ApiError::Network(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        log::debug!("{} {} -> {}", request.method, request.path, status.as_u16());

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// Turn a raw response into `R`, or into the backend's error message.
pub fn decode_response<R: DeserializeOwned>(response: RawResponse) -> Result<R, ApiError> {
    let parsed = if response.body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(&response.body)
    };

    if !response.is_success() {
        let message = parsed
            .ok()
            .and_then(|body| error_message(&body))
            .or_else(|| Some(response.status_text.clone()).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| format!("HTTP error! Status: {}", response.status));
        return Err(ApiError::Status {
            status: response.status,
            message,
        });
    }

    let body = parsed.map_err(|_| ApiError::InvalidResponse {
        status: response.status,
        status_text: response.status_text.clone(),
    })?;

    serde_json::from_value(body).map_err(|e| ApiError::Unexpected(e.to_string()))
}

fn error_message(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|key| body.get(*key))
        .filter_map(|v| v.as_str())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Check-in or check-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceKind {
    CheckIn,
    CheckOut,
}

impl AttendanceKind {
    fn endpoint(&self) -> &'static str {
        match self {
            AttendanceKind::CheckIn => "/employee/checkin",
            AttendanceKind::CheckOut => "/employee/checkout",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttendanceKind::CheckIn => "Check-In",
            AttendanceKind::CheckOut => "Check-Out",
        }
    }
}

pub struct ApiClient<T: Transport> {
    transport: T,
    login_path: String,
}

impl ApiClient<HttpTransport> {
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self::new(HttpTransport::new(config)?, &config.login_path))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, login_path: &str) -> Self {
        Self {
            transport,
            login_path: login_path.to_string(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<R, ApiError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            bearer: token.map(str::to_string),
            body,
        };
        let response = self.transport.execute(&request)?;
        decode_response(response)
    }

    fn to_body<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body).map_err(|e| ApiError::Request(e.to_string()))
    }

    pub fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let body = Self::to_body(credentials)?;
        self.call(Method::Post, &self.login_path, None, Some(body))
    }

    pub fn attendance_history(
        &self,
        token: &str,
        range: HistoryRange,
    ) -> Result<HistoryResponse, ApiError> {
        let path = format!("/employee/attendance-history?range={}", range);
        self.call(Method::Get, &path, Some(token), None)
    }

    /// POST a captured face for check-in or check-out
    pub fn submit_attendance(
        &self,
        token: &str,
        kind: AttendanceKind,
        image: &CapturedImage,
    ) -> Result<MessageResponse, ApiError> {
        let payload = image
            .base64_payload()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        log::info!(
            "Sending {} request. Image size: {}",
            kind.label(),
            image.len()
        );
        let body = Self::to_body(&AttendanceSubmission { image: payload })?;
        self.call(Method::Post, kind.endpoint(), Some(token), Some(body))
    }

    pub fn check_in(&self, token: &str, image: &CapturedImage) -> Result<MessageResponse, ApiError> {
        self.submit_attendance(token, AttendanceKind::CheckIn, image)
    }

    pub fn check_out(&self, token: &str, image: &CapturedImage) -> Result<MessageResponse, ApiError> {
        self.submit_attendance(token, AttendanceKind::CheckOut, image)
    }

    pub fn all_employees(&self, token: &str) -> Result<Vec<Employee>, ApiError> {
        let list: EmployeeList =
            self.call(Method::Get, "/employee/all-employees", Some(token), None)?;
        Ok(list.into_vec())
    }

    pub fn admin_employees(&self, token: &str) -> Result<Vec<Employee>, ApiError> {
        let list: EmployeeList = self.call(Method::Get, "/admin/employees", Some(token), None)?;
        Ok(list.into_vec())
    }

    /// Create an employee with their face image. The backend must echo the
    /// new employee's id.
    pub fn create_employee(
        &self,
        token: &str,
        employee: &NewEmployee,
    ) -> Result<Employee, ApiError> {
        let body = Self::to_body(employee)?;
        let response: CreateEmployeeResponse =
            self.call(Method::Post, "/admin/employees", Some(token), Some(body))?;

        response
            .employee
            .filter(|e| e.id.is_some())
            .ok_or_else(|| ApiError::Unexpected("Employee created but ID is missing".to_string()))
    }

    pub fn delete_employee(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let path = format!("/admin/employees/{}", id);
        let _: Value = self.call(Method::Delete, &path, Some(token), None)?;
        Ok(())
    }

    pub fn settings(&self, token: &str) -> Result<OfficeSettings, ApiError> {
        let envelope: SettingsEnvelope =
            self.call(Method::Get, "/admin/settings", Some(token), None)?;
        Ok(envelope.into_settings())
    }

    /// PUT the whole settings object back
    pub fn update_settings(
        &self,
        token: &str,
        settings: &OfficeSettings,
    ) -> Result<(), ApiError> {
        let body = Self::to_body(settings)?;
        let _: Value = self.call(Method::Put, "/admin/settings", Some(token), Some(body))?;
        Ok(())
    }

    pub fn top_performers(&self, token: &str) -> Result<TopPerformers, ApiError> {
        self.call(Method::Get, "/admin/top-performers", Some(token), None)
    }

    pub fn admin_attendance_history(
        &self,
        token: &str,
    ) -> Result<AdminAttendanceResponse, ApiError> {
        self.call(Method::Get, "/admin/attendance-history", Some(token), None)
    }

    pub fn telegram_updates(
        &self,
        token: &str,
        bot_token: &str,
    ) -> Result<TelegramUpdates, ApiError> {
        let body = Self::to_body(&TelegramUpdatesRequest { token: bot_token })?;
        self.call(
            Method::Post,
            "/admin/get-telegram-updates",
            Some(token),
            Some(body),
        )
    }
}

/// Scripted transport for tests: answers in order and records requests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct FakeTransport {
        pub requests: RefCell<Vec<ApiRequest>>,
        responses: RefCell<VecDeque<Result<RawResponse, ApiError>>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, status: u16, body: &str) -> Self {
            let status_text = match status {
                200 => "OK",
                201 => "Created",
                400 => "Bad Request",
                401 => "Unauthorized",
                403 => "Forbidden",
                404 => "Not Found",
                500 => "Internal Server Error",
                _ => "",
            };
            self.responses.borrow_mut().push_back(Ok(RawResponse {
                status,
                status_text: status_text.to_string(),
                body: body.to_string(),
            }));
            self
        }

        pub fn fail(self, message: &str) -> Self {
            self.responses
                .borrow_mut()
                .push_back(Err(ApiError::Network(message.to_string())));
            self
        }

        pub fn last_request(&self) -> ApiRequest {
            self.requests
                .borrow()
                .last()
                .cloned()
                .expect("no request was sent")
        }
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
            self.requests.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Network("no scripted response".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeTransport;
    use super::*;
    use serde_json::json;

    fn client(transport: FakeTransport) -> ApiClient<FakeTransport> {
        ApiClient::new(transport, "/auth/login")
    }

    #[test]
    fn test_error_message_from_body() {
        let api = client(FakeTransport::new().respond(400, r#"{"error":"Face not recognized"}"#));
        let err = api.all_employees("tok").unwrap_err();
        assert_eq!(err.to_string(), "Face not recognized");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_error_falls_back_to_message_then_status_text() {
        let api = client(
            FakeTransport::new()
                .respond(403, r#"{"message":"Admins only"}"#)
                .respond(500, "<html>oops</html>")
                .respond(401, ""),
        );
        assert_eq!(api.admin_employees("t").unwrap_err().to_string(), "Admins only");
        assert_eq!(
            api.admin_employees("t").unwrap_err().to_string(),
            "Internal Server Error"
        );
        let err = api.admin_employees("t").unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn test_non_json_success_is_invalid_response() {
        let api = client(FakeTransport::new().respond(200, "<html></html>"));
        let err = api.top_performers("t").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse { status: 200, .. }));
        assert_eq!(err.to_string(), "Server Error: 200 OK");
    }

    #[test]
    fn test_bearer_and_path() {
        let api = client(FakeTransport::new().respond(200, r#"{"data":[]}"#));
        api.attendance_history("secret", HistoryRange::Month).unwrap();

        let request = api.transport().last_request();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/employee/attendance-history?range=month");
        assert_eq!(request.bearer.as_deref(), Some("secret"));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_login_sends_no_bearer() {
        let api = client(FakeTransport::new().respond(200, r#"{"token":"abc","is_admin":false}"#));
        let response = api
            .login(&Credentials {
                email: "dara@example.com".to_string(),
                password: "pw".to_string(),
            })
            .unwrap();
        assert_eq!(response.token.as_deref(), Some("abc"));

        let request = api.transport().last_request();
        assert_eq!(request.path, "/auth/login");
        assert!(request.bearer.is_none());
        assert_eq!(
            request.body,
            Some(json!({ "email": "dara@example.com", "password": "pw" }))
        );
    }

    #[test]
    fn test_check_out_strips_data_url_prefix() {
        let api = client(FakeTransport::new().respond(200, r#"{"message":"Goodbye"}"#));
        let image = CapturedImage::from_data_url("data:image/jpeg;base64,/9j/4AAQ");
        let ack = api.check_out("t", &image).unwrap();
        assert_eq!(ack.message.as_deref(), Some("Goodbye"));

        let request = api.transport().last_request();
        assert_eq!(request.path, "/employee/checkout");
        assert_eq!(request.body, Some(json!({ "image": "/9j/4AAQ" })));
    }

    #[test]
    fn test_create_employee_requires_id() {
        let api = client(
            FakeTransport::new()
                .respond(201, r#"{"employee":{"first_name":"Dara"}}"#)
                .respond(201, r#"{"employee":{"id":42,"first_name":"Dara"}}"#),
        );
        let employee = NewEmployee {
            first_name: "Dara".to_string(),
            last_name: "Sok".to_string(),
            email: "dara@example.com".to_string(),
            employee_id: "EMP001".to_string(),
            password: "pw".to_string(),
            is_admin: false,
            image: "QUJD".to_string(),
        };
        let err = api.create_employee("t", &employee).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected response: Employee created but ID is missing");

        let created = api.create_employee("t", &employee).unwrap();
        assert_eq!(created.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_delete_accepts_empty_body() {
        let api = client(FakeTransport::new().respond(200, ""));
        api.delete_employee("t", "42").unwrap();
        let request = api.transport().last_request();
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "/admin/employees/42");
    }

    #[test]
    fn test_update_settings_sends_full_object() {
        let api = client(FakeTransport::new().respond(200, r#"{"message":"Settings updated"}"#));
        let settings = OfficeSettings {
            office_latitude: Some(13.3749),
            office_longitude: Some(103.8424),
            office_radius_meters: Some(100.0),
            ..Default::default()
        };
        api.update_settings("t", &settings).unwrap();

        let request = api.transport().last_request();
        assert_eq!(request.method, Method::Put);
        assert_eq!(
            request.body,
            Some(json!({
                "office_latitude": 13.3749,
                "office_longitude": 103.8424,
                "office_radius_meters": 100.0,
                "telegram_bot_token": null,
                "telegram_group_id": null
            }))
        );
    }

    #[test]
    fn test_network_failure_passes_through() {
        let api = client(FakeTransport::new().fail("connection refused"));
        let err = api.settings("t").unwrap_err();
        assert_eq!(err.to_string(), "Unable to connect to server: connection refused");
        assert_eq!(err.status(), None);
    }
}
