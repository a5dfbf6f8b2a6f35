use diesel::insert_into;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::serde::json::Json;
use rocket::{get, post};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::schema::users;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::AppConfig;

pub mod models;
mod utils;

use self::utils::*;

/// The authenticated user, or the error the handler surfaces when the route
/// is auth-gated. Handlers unwrap it with `?`, which turns a missing or bad
/// token into the login redirect.
pub type CurrentUser = Result<models::User, ApiError>;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for models::User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, ApiError> {
        let next = request.uri().to_string();
        let unauthenticated = || ApiError::Unauthenticated { next: next.clone() };

        let Some(header) = request.headers().get_one("Authorization") else {
            return Outcome::Error((Status::SeeOther, unauthenticated()));
        };
        let token = header
            .strip_prefix("Token ")
            .or_else(|| header.strip_prefix("Bearer "))
            .unwrap_or(header);

        let Some(config) = request.rocket().state::<AppConfig>() else {
            return Outcome::Error((Status::InternalServerError, ApiError::Internal));
        };

        match DbConnection::from_request(request).await {
            Outcome::Success(mut connection) => {
                match models::User::load_from_token(token, &config.jwt_secret, &mut connection) {
                    Ok(user) => Outcome::Success(user),
                    Err(_) => Outcome::Error((Status::SeeOther, unauthenticated())),
                }
            }
            _ => Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Signup {
    username: String,
    email: String,
    password: String,
}

impl Validate for Signup {
    type Error = ApiError;

    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::default();

        match validate_email(&self.email, connection) {
            Ok(()) => {}
            Err(ApiError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        match validate_username(&self.username, connection) {
            Ok(()) => {}
            Err(ApiError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        if let Err(e) = validate_password(&self.password) {
            errors.merge(e);
        }

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(errors.into())
        }
    }
}

#[post("/signup", format = "application/json", data = "<signup>")]
pub fn signup(
    mut connection: DbConnection,
    config: &rocket::State<AppConfig>,
    signup: Json<Signup>,
) -> ApiResult<Value> {
    let signup = signup.validate(&mut connection)?.into_inner();
    let new_user = models::NewUser {
        username: signup.username,
        email: signup.email,
        password: models::User::make_password(&signup.password)?,
    };

    let user = insert_into(users::table)
        .values(&new_user)
        .get_result::<models::User>(&mut *connection)?;
    let token = user.token(&config.jwt_secret)?;
    log::info!("user {} signed up", user.username);
    Ok(Json(json!({ "user": user, "token": token })))
}

#[derive(Debug, Deserialize)]
pub struct Login {
    email: String,
    password: String,
}

#[post("/login", format = "application/json", data = "<login>")]
pub fn login(
    mut connection: DbConnection,
    config: &rocket::State<AppConfig>,
    login: Json<Login>,
) -> ApiResult<Value> {
    let user = users::table
        .filter(users::email.eq(&login.email))
        .first::<models::User>(&mut *connection)?;

    if user.verify_password(&login.password) {
        let token = user.token(&config.jwt_secret)?;
        Ok(Json(json!({ "user": user, "token": token })))
    } else {
        log::warn!("failed login for {}", login.email);
        Err(ValidationError::from("password", "Invalid password").into())
    }
}

/// Target of the unauthenticated redirect. Describes the login form and
/// echoes the return path so a client can resume where it left off.
#[get("/login?<next>")]
pub fn login_form(next: Option<&str>) -> Json<Value> {
    Json(json!({
        "form": { "email": "", "password": "" },
        "next": next,
    }))
}
