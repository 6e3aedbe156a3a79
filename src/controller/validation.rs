//! Request body checks applied before any repository call.

use crate::controller::identifier::is_numeric;
use crate::error::AppError;
use crate::store::{Record, CODE_FIELD, ID_FIELD};
use serde_json::Value;

pub struct BodyValidator;

impl BodyValidator {
    /// Body for a new record: a non-empty object without an `id`.
    pub fn new_record(body: Value) -> Result<Record, AppError> {
        let mut record = Self::object(body)?;
        if record.get(ID_FIELD).map(|v| !v.is_null()).unwrap_or(false) {
            return Err(AppError::Validation(
                "id cannot be supplied when creating a record".into(),
            ));
        }
        record.remove(ID_FIELD);
        Ok(record)
    }

    /// Body for an update of record `id`. An `id` equal to the path id is dropped.
    pub fn patch(body: Value, id: i64) -> Result<Record, AppError> {
        let mut record = Self::object(body)?;
        match record.remove(ID_FIELD) {
            None | Some(Value::Null) => {}
            Some(v) if v.as_i64() == Some(id) => {}
            Some(_) => return Err(AppError::Validation("id cannot be changed".into())),
        }
        if record.is_empty() {
            return Err(AppError::Validation("request body is empty".into()));
        }
        Ok(record)
    }

    /// Client-supplied code, if any. Absent, null and "" mean "none supplied".
    /// Accepted codes are always addressable as a single non-numeric path segment.
    pub fn code(record: &Record) -> Result<Option<String>, AppError> {
        match record.get(CODE_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) if is_numeric(s) => Err(AppError::Validation(
                "code must not be purely numeric".into(),
            )),
            Some(Value::String(s)) if s.contains('/') => Err(AppError::Validation(
                "code must not contain '/'".into(),
            )),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(AppError::Validation("code must be a string".into())),
        }
    }

    fn object(body: Value) -> Result<Record, AppError> {
        match body {
            Value::Null => Err(AppError::Validation("request body is empty".into())),
            Value::Array(items) if items.is_empty() => {
                Err(AppError::Validation("request body is empty".into()))
            }
            Value::Object(m) if m.is_empty() => {
                Err(AppError::Validation("request body is empty".into()))
            }
            Value::Object(m) => Ok(m),
            _ => Err(AppError::Validation("body must be a JSON object".into())),
        }
    }
}
