use super::ValidationError;
use crate::api::models::NewEmployee;
use crate::capture::CapturedImage;

/// Registration form as the admin filled it in
#[derive(Debug, Clone, Default)]
pub struct EmployeeForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub employee_id: String,
    pub password: String,
    pub is_admin: bool,
    pub image: Option<CapturedImage>,
}

impl EmployeeForm {
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("password", &self.password),
            ("employee_id", &self.employee_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Validate and build the `POST /admin/employees` body.
    ///
    /// The face image is checked before the text fields.
    pub fn into_payload(self) -> Result<NewEmployee, ValidationError> {
        let image = self.image.as_ref().ok_or(ValidationError::MissingImage)?;

        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let image = image
            .base64_payload()
            .map_err(|_| ValidationError::InvalidImage)?
            .to_string();

        Ok(NewEmployee {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email.trim().to_string(),
            employee_id: self.employee_id,
            password: self.password,
            is_admin: self.is_admin,
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> EmployeeForm {
        EmployeeForm {
            first_name: "Dara".to_string(),
            last_name: "Sok".to_string(),
            email: "  dara@example.com ".to_string(),
            employee_id: "EMP001".to_string(),
            password: "secret".to_string(),
            is_admin: false,
            image: Some(CapturedImage::from_data_url("data:image/jpeg;base64,/9j/4AAQ")),
        }
    }

    #[test]
    fn test_payload_trims_email_and_strips_prefix() {
        let payload = filled().into_payload().unwrap();
        assert_eq!(payload.email, "dara@example.com");
        assert_eq!(payload.image, "/9j/4AAQ");
        assert_eq!(payload.employee_id, "EMP001");
    }

    #[test]
    fn test_image_checked_first() {
        let form = EmployeeForm {
            image: None,
            first_name: String::new(),
            ..filled()
        };
        assert_eq!(form.into_payload().unwrap_err(), ValidationError::MissingImage);
    }

    #[test]
    fn test_missing_fields_listed() {
        let form = EmployeeForm {
            last_name: "  ".to_string(),
            password: String::new(),
            ..filled()
        };
        let err = form.into_payload().unwrap_err();
        assert_eq!(err, ValidationError::MissingFields(vec!["last_name", "password"]));
        assert_eq!(
            err.to_string(),
            "Please fill in all required fields (missing: last_name, password)"
        );
    }

    #[test]
    fn test_empty_image_payload_rejected() {
        let form = EmployeeForm {
            image: Some(CapturedImage::from_data_url("data:image/jpeg;base64,")),
            ..filled()
        };
        assert_eq!(form.into_payload().unwrap_err(), ValidationError::InvalidImage);
    }
}
