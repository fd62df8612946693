use crate::geo::{Coordinates, Geofence};
use crate::status::StatusRule;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub camera: CameraConfig,
    #[serde(default)]
    pub attendance: AttendanceConfig,
    #[serde(default)]
    pub office: OfficeConfig,
    #[serde(default)]
    pub location: LocationConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub device: String,
    /// Resolution requested from the device
    pub width: u32,
    pub height: u32,

    /// Size of the downsampled frame that gets sent to the backend
    #[serde(default = "default_capture_width")]
    pub capture_width: u32,
    #[serde(default = "default_capture_height")]
    pub capture_height: u32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    // Uploaded images are scaled down to this width, never up
    #[serde(default = "default_upload_max_width")]
    pub upload_max_width: u32,
}

fn default_capture_width() -> u32 {
    320
}

fn default_capture_height() -> u32 {
    240
}

fn default_jpeg_quality() -> u8 {
    70
}

fn default_upload_max_width() -> u32 {
    400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Office timezone as a fixed UTC offset (Asia/Phnom_Penh has no DST)
    pub utc_offset_hours: i32,
    /// Rule used by the home summary
    pub home_rule: StatusRule,
    /// Rule used by the records table
    pub records_rule: StatusRule,
}

impl AttendanceConfig {
    pub fn office_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "UTC offset out of range: {} hours",
                    self.utc_offset_hours
                ))
            })
    }
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 7,
            home_rule: StatusRule::home(),
            records_rule: StatusRule::records(),
        }
    }
}

/// Office geofence, when pinned locally instead of read from the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfficeConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<f64>,
}

impl OfficeConfig {
    pub fn geofence(&self) -> Option<Geofence> {
        match (self.latitude, self.longitude, self.radius_meters) {
            (Some(latitude), Some(longitude), Some(radius_meters)) => Some(Geofence {
                center: Coordinates { latitude, longitude },
                radius_meters,
            }),
            _ => None,
        }
    }
}

/// Fixed position of this device, used in place of a geolocation service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationConfig {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: self.latitude?,
            longitude: self.longitude?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub session_dir: PathBuf,
}

impl Config {
    /// Load configuration with fallback chain:
    /// 1. /etc/clockface/clockface.toml (system-wide)
    /// 2. ~/.config/clockface/clockface.toml (user)
    /// 3. Compiled defaults
    ///
    /// `CLOCKFACE_API_URL` and `CLOCKFACE_SESSION_DIR` override whichever
    /// file was picked.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_path("/etc/clockface/clockface.toml")
            .ok()
            .or_else(|| {
                let home = std::env::var_os("HOME")?;
                let user_config = PathBuf::from(home)
                    .join(".config")
                    .join("clockface")
                    .join("clockface.toml");
                Self::load_from_path(&user_config).ok()
            })
            .unwrap_or_default();

        config.apply_env();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.normalize();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CLOCKFACE_API_URL") {
            if !url.is_empty() {
                self.api.base_url = url;
            }
        }
        if let Ok(dir) = std::env::var("CLOCKFACE_SESSION_DIR") {
            if !dir.is_empty() {
                self.storage.session_dir = PathBuf::from(dir);
            }
        }
    }

    fn normalize(&mut self) {
        let trimmed = self.api.base_url.trim_end_matches('/').len();
        self.api.base_url.truncate(trimmed);

        if !self.api.login_path.starts_with('/') {
            self.api.login_path.insert(0, '/');
        }

        // Expand ~ to home directory if needed
        if self.storage.session_dir.starts_with("~") {
            if let Some(home) = std::env::var_os("HOME") {
                if let Ok(rest) = self.storage.session_dir.strip_prefix("~") {
                    self.storage.session_dir = PathBuf::from(home).join(rest);
                }
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "API base URL cannot be empty".to_string(),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "API timeout must be greater than 0".to_string(),
            ));
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Validation(
                "Camera dimensions must be non-zero".to_string(),
            ));
        }

        if self.camera.capture_width == 0 || self.camera.capture_height == 0 {
            return Err(ConfigError::Validation(
                "Capture dimensions must be non-zero".to_string(),
            ));
        }

        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(ConfigError::Validation(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if self.camera.upload_max_width == 0 {
            return Err(ConfigError::Validation(
                "Upload max width must be greater than 0".to_string(),
            ));
        }

        self.attendance.office_offset()?;
        for (name, rule) in [
            ("home_rule", &self.attendance.home_rule),
            ("records_rule", &self.attendance.records_rule),
        ] {
            rule.validate()
                .map_err(|e| ConfigError::Validation(format!("attendance.{}: {}", name, e)))?;
        }

        if let Some(radius) = self.office.radius_meters {
            if !(radius > 0.0) {
                return Err(ConfigError::Validation(
                    "Office radius must be greater than 0".to_string(),
                ));
            }
        }

        if self.storage.session_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "Session directory cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let session_dir = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share/clockface"))
            .unwrap_or_else(|| PathBuf::from("/tmp/clockface"));

        Self {
            api: ApiConfig {
                base_url: "https://express-api-eight-brown.vercel.app".to_string(),
                login_path: default_login_path(),
                timeout_secs: default_timeout_secs(),
            },
            camera: CameraConfig {
                device: "/dev/video0".to_string(),
                width: 640,
                height: 480,
                capture_width: default_capture_width(),
                capture_height: default_capture_height(),
                jpeg_quality: default_jpeg_quality(),
                upload_max_width: default_upload_max_width(),
            },
            attendance: AttendanceConfig::default(),
            office: OfficeConfig::default(),
            location: LocationConfig::default(),
            storage: StorageConfig { session_dir },
        }
    }
}
