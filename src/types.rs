use std::collections::HashMap;
use std::io::Error as IoError;

use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Redirect, Responder};
use rocket::serde::json::Json;
use serde::Serialize;
use thiserror::Error;

use crate::utils::json_response;

/// Input validation against the current database state. Implementors reject
/// malformed fields and dangling references before anything is persisted.
pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error>;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("entity not found")]
    NotFound,
    #[error("authentication required")]
    Unauthenticated { next: String },
    #[error("validation failed")]
    Validation(ValidationError),
    #[error("database error: {0}")]
    Database(DieselError),
    #[error("internal error")]
    Internal,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        match err {
            DieselError::NotFound => ApiError::NotFound,
            other => ApiError::Database(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

impl From<IoError> for ApiError {
    fn from(_: IoError) -> ApiError {
        ApiError::Internal
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(_: serde_json::Error) -> ApiError {
        ApiError::Internal
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Field name to messages, serialized into 422 bodies.
#[derive(Debug, Serialize, Default)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            ApiError::NotFound => Err(Status::NotFound),

            ApiError::Validation(error) => {
                let body = serde_json::json!({ "errors": error });
                json_response(req, &body, Status::UnprocessableEntity)
            }

            ApiError::Unauthenticated { next } => {
                let target = format!("/auth/login?next={}", urlencoding::encode(&next));
                Redirect::to(target).respond_to(req)
            }

            ApiError::Database(error) => {
                log::error!("database error: {}", error);
                Err(Status::InternalServerError)
            }

            ApiError::Internal => Err(Status::InternalServerError),
        }
    }
}

impl<T> Validate for Json<T>
where
    T: Validate,
{
    type Error = <T as Validate>::Error;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let inner = self.into_inner();
        let validated = inner.validate(connection)?;
        Ok(Json(validated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_combines_messages_per_field() {
        let mut first = ValidationError::from("text", "empty text");
        let second = ValidationError::from("text", "too short");
        first.merge(second);
        assert_eq!(first.len(), 1);

        first.merge(ValidationError::from("group", "unknown group"));
        assert_eq!(first.len(), 2);
        assert!(!first.is_empty());
    }

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        let err: ApiError = DieselError::NotFound.into();
        assert!(matches!(err, ApiError::NotFound));
    }
}
