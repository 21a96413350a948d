//! # Custom Extractors & Validation
//!
//! Request DTOs deserialize loosely (enums and dates as strings) and are
//! converted into domain inputs through [`Validate`], so that an unknown
//! enum value or a malformed date is reported as a validation error naming
//! the allowed values rather than a serde message.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use serde::{Deserialize, Deserializer};

use fwd_core::ValidationError;

use crate::error::AppError;

/// Conversion of a request DTO into its validated domain input.
pub trait Validate {
    /// The domain input.
    type Output;

    /// Check business rules and build the domain input.
    fn validate(self) -> Result<Self::Output, ValidationError>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and convert it with [`Validate`].
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T::Output, AppError> {
    let value = extract_json(result)?;
    Ok(value.validate()?)
}

/// Extract query parameters, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Parse an optional wire string with `FromStr`.
pub fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>, ValidationError>
where
    T: std::str::FromStr<Err = ValidationError>,
{
    raw.map(str::parse).transpose()
}

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwd_state::InvoiceStatus;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        due_date: Option<Option<String>>,
    }

    #[test]
    fn double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.due_date, None);
        let null: Patch = serde_json::from_str(r#"{"due_date":null}"#).unwrap();
        assert_eq!(null.due_date, Some(None));
        let set: Patch = serde_json::from_str(r#"{"due_date":"2026-01-01"}"#).unwrap();
        assert_eq!(set.due_date, Some(Some("2026-01-01".to_string())));
    }

    #[test]
    fn parse_opt_reports_allowed_values() {
        assert_eq!(parse_opt::<InvoiceStatus>(None).unwrap(), None);
        assert_eq!(
            parse_opt::<InvoiceStatus>(Some("sent")).unwrap(),
            Some(InvoiceStatus::Sent)
        );
        let err = parse_opt::<InvoiceStatus>(Some("VOID")).unwrap_err();
        assert!(err.to_string().contains("VOID"));
    }
}
