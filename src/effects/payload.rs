//! Event payloads and their validation.
//!
//! Handlers declare the shape they expect by returning a [`PayloadCheck`].
//! Checks accumulate, so a caller learns about every bad field at once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Optional structured data attached to an event.
pub type Payload = Map<String, Value>;

/// Accumulated result of checking a payload.
pub type PayloadCheck = Validation<(), NonEmptyVec<PayloadViolation>>;

static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// A single offending payload field.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{field}: {message}")]
pub struct PayloadViolation {
    pub field: String,
    pub message: String,
}

impl PayloadViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Whether `email` looks like `local@domain.tld`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(email))
}

/// Combine independent checks, keeping every violation.
pub fn all(checks: Vec<PayloadCheck>) -> PayloadCheck {
    Validation::all_vec(checks).map(|_| ())
}

/// Field must be a non-blank string.
pub fn require_str(payload: &Payload, field: &str) -> PayloadCheck {
    match payload.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Validation::success(()),
        Some(Value::String(_)) => Validation::fail(PayloadViolation::new(field, "must not be blank")),
        Some(_) => Validation::fail(PayloadViolation::new(field, "must be a string")),
        None => Validation::fail(PayloadViolation::new(field, "is required")),
    }
}

/// Field must be an unsigned integer no smaller than `min`.
pub fn require_uint(payload: &Payload, field: &str, min: u64) -> PayloadCheck {
    require_uint_range(payload, field, min, u64::MAX)
}

/// Field must be an unsigned integer within `min..=max`.
pub fn require_uint_range(payload: &Payload, field: &str, min: u64, max: u64) -> PayloadCheck {
    match payload.get(field) {
        Some(value) => match value.as_u64() {
            Some(n) if n < min => {
                Validation::fail(PayloadViolation::new(field, format!("must be at least {min}")))
            }
            Some(n) if n > max => {
                Validation::fail(PayloadViolation::new(field, format!("must be at most {max}")))
            }
            Some(_) => Validation::success(()),
            None => Validation::fail(PayloadViolation::new(field, "must be a non-negative integer")),
        },
        None => Validation::fail(PayloadViolation::new(field, "is required")),
    }
}

/// Field must be a well-formed email address.
pub fn require_email(payload: &Payload, field: &str) -> PayloadCheck {
    match payload.get(field).and_then(Value::as_str) {
        Some(email) if is_valid_email(email) => Validation::success(()),
        Some(_) => Validation::fail(PayloadViolation::new(field, "is not a valid email address")),
        None => Validation::fail(PayloadViolation::new(field, "is required")),
    }
}

/// Field must decode as `T`.
pub fn require_decodable<T: DeserializeOwned>(payload: &Payload, field: &str) -> PayloadCheck {
    match payload.get(field) {
        Some(value) => match T::deserialize(value) {
            Ok(_) => Validation::success(()),
            Err(e) => Validation::fail(PayloadViolation::new(field, e.to_string())),
        },
        None => Validation::fail(PayloadViolation::new(field, "is required")),
    }
}

/// Field is optional but must decode as `T` when present and non-null.
pub fn optional_decodable<T: DeserializeOwned>(payload: &Payload, field: &str) -> PayloadCheck {
    match payload.get(field) {
        None | Some(Value::Null) => Validation::success(()),
        Some(_) => require_decodable::<T>(payload, field),
    }
}

/// Decode the whole payload into a typed request.
pub fn decode<T: DeserializeOwned>(payload: &Payload) -> Result<T, serde_json::Error> {
    T::deserialize(Value::Object(payload.clone()))
}

/// Flatten a failed check into a list.
pub fn violations(check: PayloadCheck) -> Vec<PayloadViolation> {
    match check {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(errs) => errs.iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.io"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn checks_accumulate_every_violation() {
        let p = payload(json!({ "title": " ", "quantity": -1 }));
        let check = all(vec![
            require_str(&p, "title"),
            require_str(&p, "genre"),
            require_uint(&p, "quantity", 1),
        ]);

        let found = violations(check);
        let fields: Vec<&str> = found.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "genre", "quantity"]);
    }

    #[test]
    fn uint_respects_minimum() {
        let p = payload(json!({ "zero": 0, "two": 2 }));

        assert!(require_uint(&p, "zero", 0).is_success());
        assert!(require_uint(&p, "zero", 1).is_failure());
        assert!(require_uint(&p, "two", 1).is_success());
    }

    #[test]
    fn uint_range_respects_maximum() {
        let p = payload(json!({ "small": 5, "huge": 5_000_000_000u64, "neg": -1 }));

        assert!(require_uint_range(&p, "small", 1, 10).is_success());
        assert!(require_uint_range(&p, "small", 1, 4).is_failure());
        assert!(require_uint_range(&p, "huge", 1, u64::from(u32::MAX)).is_failure());
        assert!(require_uint_range(&p, "neg", 0, 10).is_failure());

        let found = violations(require_uint_range(&p, "huge", 1, 10));
        assert_eq!(found[0].message, "must be at most 10");
    }

    #[test]
    fn decodable_reports_serde_message() {
        let p = payload(json!({ "releaseDate": "not a date", "ok": "2024-01-31" }));

        assert!(require_decodable::<NaiveDate>(&p, "ok").is_success());
        let found = violations(require_decodable::<NaiveDate>(&p, "releaseDate"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "releaseDate");
    }

    #[test]
    fn optional_accepts_absent_and_null() {
        let p = payload(json!({ "nothing": null }));

        assert!(optional_decodable::<NaiveDate>(&p, "nothing").is_success());
        assert!(optional_decodable::<NaiveDate>(&p, "absent").is_success());
    }
}
