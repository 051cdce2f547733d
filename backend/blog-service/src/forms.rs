/// Form inputs and their validation rules
///
/// Every form derives `validator::Validate`. Failures are collected into
/// `FormErrors`, which templates render next to the offending field.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

/// Field errors keyed by field name, plus errors not tied to one field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
        self.non_field.extend(other.non_field);
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Run the derive rules and collect their messages
    pub fn check<T: Validate>(form: &T) -> Self {
        match form.validate() {
            Ok(()) => Self::default(),
            Err(errors) => Self::from(errors),
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

pub type FormResult<T> = std::result::Result<T, FormErrors>;

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("This field is required.".into());
        return Err(error);
    }
    Ok(())
}

fn username_chars(value: &str) -> Result<(), ValidationError> {
    let valid = value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'));
    if !valid {
        let mut error = ValidationError::new("invalid_username");
        error.message =
            Some("Enter a valid username: letters, digits and @/./+/-/_ only.".into());
        return Err(error);
    }
    Ok(())
}

/// Email may be left blank
fn optional_email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.validate_email() {
        return Ok(());
    }
    let mut error = ValidationError::new("email");
    error.message = Some("Enter a valid email address.".into());
    Err(error)
}

fn required_email(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    optional_email(value.trim())
}

fn not_numeric(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        let mut error = ValidationError::new("password_entirely_numeric");
        error.message = Some("This password is entirely numeric.".into());
        return Err(error);
    }
    Ok(())
}

/// Text fields of the create/edit page; the image arrives separately
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct PostForm {
    #[validate(custom(function = "not_blank"))]
    pub text: String,
    /// Selected group id, `None` for "no group"
    pub group: Option<i64>,
}

impl PostForm {
    /// Parse the raw group selector; an empty choice means no group
    pub fn parse_group(raw: Option<&str>) -> FormResult<Option<i64>> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(value) => value.parse::<i64>().map(Some).map_err(|_| {
                let mut errors = FormErrors::new();
                errors.add("group", "Select a valid choice.");
                errors
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = 150, message = "Required. 150 characters or fewer."),
        custom(function = "username_chars")
    )]
    pub username: String,
    #[serde(default)]
    #[validate(custom(function = "optional_email"))]
    pub email: String,
    #[serde(default, skip_serializing)]
    #[validate(
        length(min = 8, message = "This password is too short. It must contain at least 8 characters."),
        custom(function = "not_numeric")
    )]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl SignupForm {
    pub fn validate_all(&self) -> FormErrors {
        let mut errors = FormErrors::check(self);
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[serde(default, skip_serializing)]
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    /// Where to go after a successful login
    #[serde(default)]
    pub next: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PasswordChangeForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub old_password: String,
    #[serde(default)]
    #[validate(
        length(min = 8, message = "This password is too short. It must contain at least 8 characters."),
        custom(function = "not_numeric")
    )]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub fn validate_all(&self) -> FormErrors {
        let mut errors = FormErrors::check(self);
        if self.new_password1 != self.new_password2 {
            errors.add("new_password2", "The two password fields didn't match.");
        }
        errors
    }
}

/// Request a reset link by email
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct PasswordResetForm {
    #[serde(default)]
    #[validate(custom(function = "required_email"))]
    pub email: String,
}

/// New password chosen from a reset link
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SetPasswordForm {
    #[serde(default)]
    #[validate(
        length(min = 8, message = "This password is too short. It must contain at least 8 characters."),
        custom(function = "not_numeric")
    )]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

impl SetPasswordForm {
    pub fn validate_all(&self) -> FormErrors {
        let mut errors = FormErrors::check(self);
        if self.new_password1 != self.new_password2 {
            errors.add("new_password2", "The two password fields didn't match.");
        }
        errors
    }
}
