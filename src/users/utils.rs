use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{select, sqlite::SqliteConnection};
use lazy_static::lazy_static;
use regex::Regex;

use crate::db::schema::users;
use crate::types::{ApiError, ValidationError};

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).expect("email regex")
    };
}

pub fn validate_email(
    email_to_validate: &str,
    connection: &mut SqliteConnection,
) -> Result<(), ApiError> {
    let mut errors = ValidationError::default();
    if !EMAIL_RE.is_match(email_to_validate) {
        errors.add_error("email", format!("Invalid email: {}", email_to_validate));
    }

    let email_exists = select(exists(
        users::table.filter(users::email.eq(email_to_validate)),
    ))
    .get_result::<bool>(connection)?;
    if email_exists {
        errors.add_error("email", "Email already exists");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

pub fn validate_username(
    username_to_validate: &str,
    connection: &mut SqliteConnection,
) -> Result<(), ApiError> {
    let mut errors = ValidationError::default();
    if username_to_validate.len() < 3 {
        errors.add_error(
            "username",
            format!("Username too short: {}", username_to_validate),
        );
    }

    let username_exists = select(exists(
        users::table.filter(users::username.eq(username_to_validate)),
    ))
    .get_result::<bool>(connection)?;
    if username_exists {
        errors.add_error("username", "Username already exists");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < 5 {
        Err(ValidationError::from("password", "Password too short"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_passwords() {
        assert!(validate_password("abcd").is_err());
        assert!(validate_password("abcde").is_ok());
    }

    #[test]
    fn email_pattern_sanity() {
        assert!(EMAIL_RE.is_match("user@example.com"));
        assert!(!EMAIL_RE.is_match("not-an-email"));
        assert!(!EMAIL_RE.is_match("user@"));
    }
}
