use super::ValidationError;
use crate::api::models::{OfficeSettings, TelegramUpdates};
use crate::geo::{Coordinates, Geofence};
use serde_json::Value;

/// Fields the admin changed. `None` leaves the current value alone; an
/// empty string clears a text field.
#[derive(Debug, Clone, Default)]
pub struct SettingsEdit {
    pub office_latitude: Option<f64>,
    pub office_longitude: Option<f64>,
    pub office_radius_meters: Option<f64>,
    pub telegram_bot_token: Option<String>,
    pub telegram_group_id: Option<String>,
}

impl SettingsEdit {
    pub fn is_empty(&self) -> bool {
        self.office_latitude.is_none()
            && self.office_longitude.is_none()
            && self.office_radius_meters.is_none()
            && self.telegram_bot_token.is_none()
            && self.telegram_group_id.is_none()
    }

    pub fn apply(self, settings: &mut OfficeSettings) {
        if let Some(lat) = self.office_latitude {
            settings.office_latitude = Some(lat);
        }
        if let Some(lon) = self.office_longitude {
            settings.office_longitude = Some(lon);
        }
        if let Some(radius) = self.office_radius_meters {
            settings.office_radius_meters = Some(radius);
        }
        if let Some(token) = self.telegram_bot_token {
            settings.telegram_bot_token = blank_to_none(token);
        }
        if let Some(group) = self.telegram_group_id {
            settings.telegram_group_id = blank_to_none(group);
        }
    }
}

fn blank_to_none(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The office geofence, once latitude, longitude and radius are all set
pub fn office_geofence(settings: &OfficeSettings) -> Option<Geofence> {
    match (
        settings.office_latitude,
        settings.office_longitude,
        settings.office_radius_meters,
    ) {
        (Some(latitude), Some(longitude), Some(radius_meters)) => Some(Geofence {
            center: Coordinates { latitude, longitude },
            radius_meters,
        }),
        _ => None,
    }
}

/// Use the device's current position as the office location
pub fn apply_location(settings: &mut OfficeSettings, position: Coordinates) {
    settings.office_latitude = Some(position.latitude);
    settings.office_longitude = Some(position.longitude);
}

pub fn require_bot_token(settings: &OfficeSettings) -> Result<&str, ValidationError> {
    settings
        .telegram_bot_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or(ValidationError::MissingBotToken)
}

fn chat_id(update: &Value, key: &str) -> Option<String> {
    match update.get(key)?.get("chat")?.get("id")? {
        Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Group id of the chat behind the most recent bot update
pub fn find_group_id(updates: &TelegramUpdates) -> Result<String, ValidationError> {
    if !updates.ok {
        return Err(ValidationError::NoTelegramUpdates);
    }
    let last = updates
        .result
        .last()
        .ok_or(ValidationError::NoTelegramUpdates)?;

    ["message", "my_chat_member", "channel_post"]
        .iter()
        .find_map(|key| chat_id(last, key))
        .ok_or(ValidationError::GroupIdNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn updates(result: Vec<Value>) -> TelegramUpdates {
        TelegramUpdates { ok: true, result }
    }

    #[test]
    fn test_apply_edit() {
        let mut settings = OfficeSettings {
            office_latitude: Some(1.0),
            telegram_bot_token: Some("old".to_string()),
            ..Default::default()
        };
        SettingsEdit {
            office_radius_meters: Some(150.0),
            telegram_bot_token: Some(" ".to_string()),
            telegram_group_id: Some("-100".to_string()),
            ..Default::default()
        }
        .apply(&mut settings);

        assert_eq!(settings.office_latitude, Some(1.0));
        assert_eq!(settings.office_radius_meters, Some(150.0));
        assert_eq!(settings.telegram_bot_token, None);
        assert_eq!(settings.telegram_group_id.as_deref(), Some("-100"));
    }

    #[test]
    fn test_geofence_needs_all_three() {
        let mut settings = OfficeSettings {
            office_radius_meters: Some(100.0),
            ..Default::default()
        };
        assert!(office_geofence(&settings).is_none());

        apply_location(
            &mut settings,
            Coordinates {
                latitude: 13.37,
                longitude: 103.84,
            },
        );
        let fence = office_geofence(&settings).unwrap();
        assert_eq!(fence.center.latitude, 13.37);
        assert_eq!(fence.radius_meters, 100.0);
    }

    #[test]
    fn test_require_bot_token() {
        let err = require_bot_token(&OfficeSettings::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please enter a Bot Token first to find the Group ID"
        );
    }

    #[test]
    fn test_group_id_from_last_update() {
        let found = find_group_id(&updates(vec![
            json!({ "message": { "chat": { "id": -1001 } } }),
            json!({ "my_chat_member": { "chat": { "id": -1002 } } }),
        ]))
        .unwrap();
        assert_eq!(found, "-1002");

        let channel = find_group_id(&updates(vec![json!({
            "channel_post": { "chat": { "id": -1003 } }
        })]))
        .unwrap();
        assert_eq!(channel, "-1003");
    }

    #[test]
    fn test_group_id_errors() {
        assert_eq!(
            find_group_id(&updates(vec![])).unwrap_err(),
            ValidationError::NoTelegramUpdates
        );
        assert_eq!(
            find_group_id(&TelegramUpdates {
                ok: false,
                result: vec![json!({ "message": { "chat": { "id": 1 } } })],
            })
            .unwrap_err(),
            ValidationError::NoTelegramUpdates
        );
        assert_eq!(
            find_group_id(&updates(vec![json!({ "edited_message": {} })])).unwrap_err(),
            ValidationError::GroupIdNotFound
        );
    }
}
