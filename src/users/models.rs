use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use hmac::{Hmac, Mac};
use jwt::{RegisteredClaims, SignWithKey, VerifyWithKey};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use serde::Serialize;
use sha2::Sha256;

use crate::db::schema::users;
use crate::types::ApiError;

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Pbkdf2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| ApiError::Internal)
    }

    pub fn verify_password(&self, password_to_verify: &str) -> bool {
        match PasswordHash::new(&self.password) {
            Ok(parsed) => Pbkdf2
                .verify_password(password_to_verify.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Issues a bearer token carrying this user's id as the subject claim.
    pub fn token(&self, secret: &str) -> Result<String, ApiError> {
        let key =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| ApiError::Internal)?;
        let claims = RegisteredClaims {
            issuer: None,
            subject: Some(self.id.to_string()),
            audience: None,
            expiration: None,
            not_before: None,
            issued_at: Some(Utc::now().timestamp() as u64),
            json_web_token_id: None,
        };
        claims.sign_with_key(&key).map_err(|_| ApiError::Internal)
    }

    pub fn load_from_token(
        token: &str,
        secret: &str,
        connection: &mut SqliteConnection,
    ) -> Result<User, ApiError> {
        let key =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| ApiError::Internal)?;
        let claims: RegisteredClaims = token
            .verify_with_key(&key)
            .map_err(|_| ApiError::NotFound)?;
        let user_id = claims
            .subject
            .as_deref()
            .and_then(|sub| sub.parse::<i32>().ok())
            .ok_or(ApiError::NotFound)?;

        users::table
            .find(user_id)
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_name(name: &str, connection: &mut SqliteConnection) -> Result<User, ApiError> {
        users::table
            .filter(users::username.eq(name))
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = User::make_password("correct horse").unwrap();
        let user = User {
            id: 1,
            username: "leo".into(),
            email: "leo@example.com".into(),
            password: hash,
        };
        assert!(user.verify_password("correct horse"));
        assert!(!user.verify_password("wrong"));
    }

    #[test]
    fn password_hashes_are_salted() {
        let first = User::make_password("same").unwrap();
        let second = User::make_password("same").unwrap();
        assert_ne!(first, second);
    }
}
