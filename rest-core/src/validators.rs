//! String field validators and the raw-field wrapper that turns their
//! failures into Field errors.

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidateEmail;

use crate::error::RestError;

/// A pure predicate over a field value; `Err` carries a human message.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, value: &str) -> Result<(), String>;
}

static PHONE_DIGITS: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"^[+]?[\s\d]+$"));
static SINGLE_LINE_TEXT: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\s]+$"));

#[derive(Debug, Clone, Copy, Default)]
pub struct EmailValidator;

impl FieldValidator for EmailValidator {
    fn validate(&self, value: &str) -> Result<(), String> {
        if value.to_string().validate_email() {
            Ok(())
        } else {
            Err(format!("invalid email address: {}", value))
        }
    }
}

/// Byte-length bounds; a bound of zero or less is not enforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenValidator {
    pub min_len: i64,
    pub max_len: i64,
}

impl FieldValidator for LenValidator {
    fn validate(&self, value: &str) -> Result<(), String> {
        let len = value.len() as i64;
        match (self.min_len > 0, self.max_len > 0) {
            (false, false) => Ok(()),
            (true, false) if len < self.min_len => {
                Err(format!("field must be at least {} characters", self.min_len))
            }
            (false, true) if len > self.max_len => {
                Err(format!("field can't be more than {} characters", self.max_len))
            }
            (true, true) if len < self.min_len || len > self.max_len => Err(format!(
                "field length must be between {} and {} characters",
                self.min_len, self.max_len
            )),
            _ => Ok(()),
        }
    }
}

/// Storage key names: non-empty, and the `__` prefix is reserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyNameValidator;

impl FieldValidator for KeyNameValidator {
    fn validate(&self, value: &str) -> Result<(), String> {
        if value.is_empty() {
            return Err("string is empty".to_string());
        }
        if value.starts_with("__") {
            return Err(format!("{} can't start with '__'", value));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameValidator {
    pub allow_empty: bool,
}

impl FieldValidator for FileNameValidator {
    fn validate(&self, value: &str) -> Result<(), String> {
        if value.len() > 1024 {
            return Err("file name can't be larger than 1024 bytes".to_string());
        }
        if matches!(value, "." | ".." | "...") {
            return Err(format!("invalid file name: {}", value));
        }
        if value.starts_with(".well-known/acme-challenge") {
            return Err("file name can't start with '.well-known/acme-challenge'".to_string());
        }
        if value.contains(['\n', '\r']) {
            return Err("file name can't contain new lines or line feeds".to_string());
        }
        if value.is_empty() && !self.allow_empty {
            return Err("string is empty".to_string());
        }
        if let Some(c) = value.chars().find(|c| matches!(c, '#' | '[' | ']' | '*' | '?')) {
            return Err(format!("file name {:?} contains invalid character {:?}", value, c));
        }
        Ok(())
    }
}

/// International numbers in (roughly) E.164 form: `+` or `00`/`01` prefix,
/// at most 15 digits, spaces allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneNumberValidator;

impl FieldValidator for PhoneNumberValidator {
    fn validate(&self, value: &str) -> Result<(), String> {
        let trimmed = value.trim();
        if trimmed.len() < 8 {
            return Err("phone number too short".to_string());
        }
        if !(trimmed.starts_with('+') || trimmed.starts_with("00") || trimmed.starts_with("01")) {
            return Err("phone number does not start with international prefix".to_string());
        }

        let digits = trimmed.replacen('+', "", 1).replace(' ', "");
        if digits.len() > 15 {
            return Err(
                "phone number does not comply with E.164 international standard specifications"
                    .to_string(),
            );
        }

        let re = PHONE_DIGITS.as_ref().map_err(|e| {
            format!("unable to check phone number for non-numeric characters: {}", e)
        })?;
        if !re.is_match(&digits) {
            return Err("phone number contains non-numeric characters".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SingleLineTextValidator;

impl FieldValidator for SingleLineTextValidator {
    fn validate(&self, value: &str) -> Result<(), String> {
        let re = SINGLE_LINE_TEXT
            .as_ref()
            .map_err(|e| format!("unable to check for non-valid characters: {}", e))?;
        if !re.is_match(value) {
            return Err("text contains non-alphanumeric characters".to_string());
        }
        Ok(())
    }
}

/// A named input value with its validators.
pub struct RawField<'a> {
    name: &'a str,
    required: bool,
    value: &'a str,
    validators: Vec<Box<dyn FieldValidator>>,
}

impl<'a> RawField<'a> {
    pub fn new(name: &'a str, required: bool, value: &'a str) -> Self {
        Self {
            name,
            required,
            value,
            validators: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl FieldValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Runs every validator in order. An empty optional field is accepted
    /// without running them.
    pub fn validate(&self) -> Result<(), RestError> {
        if self.value.is_empty() {
            if self.required {
                return Err(RestError::field(self.name, "field is required"));
            }
            return Ok(());
        }
        for validator in &self.validators {
            validator
                .validate(self.value)
                .map_err(|message| RestError::field(self.name, message))?;
        }
        Ok(())
    }
}
