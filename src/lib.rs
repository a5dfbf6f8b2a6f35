use std::path::PathBuf;
use std::time::Duration;

use rocket::figment::Figment;
use rocket::request::Request;
use rocket::response::content::RawJson;
use rocket::{catch, catchers, routes, Build, Rocket};
use serde_json::json;

pub mod cache;
pub mod comments;
pub mod db;
pub mod pagination;
pub mod posts;
pub mod profile;
pub mod types;
pub mod users;
pub mod utils;

use cache::PageCache;

/// Application keys read from the figment (Rocket.toml / `ROCKET_*` env),
/// with defaults suitable for development.
pub struct AppConfig {
    pub media_root: PathBuf,
    pub jwt_secret: String,
    pub cache_ttl: Duration,
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Self {
        let media_root = figment
            .extract_inner::<PathBuf>("media_root")
            .unwrap_or_else(|_| PathBuf::from("media"));
        let jwt_secret = figment
            .extract_inner::<String>("jwt_secret")
            .unwrap_or_else(|_| String::from("insecure-dev-secret"));
        let cache_ttl_secs = figment.extract_inner::<u64>("cache_ttl_secs").unwrap_or(20);
        AppConfig {
            media_root,
            jwt_secret,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        }
    }
}

#[catch(404)]
fn not_found(_req: &Request) -> RawJson<String> {
    let body = json!({
        "errors": ["entity not found"]
    });
    RawJson(body.to_string())
}

#[catch(422)]
fn unprocessable(_req: &Request) -> RawJson<String> {
    let body = json!({
        "errors": ["malformed input"]
    });
    RawJson(body.to_string())
}

pub fn rocket(figment: Figment) -> Rocket<Build> {
    dotenvy::dotenv().ok();

    let database_url = figment
        .extract_inner::<String>("database_url")
        .ok()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .expect("database_url is not configured (figment key or DATABASE_URL)");

    let pool = db::init_pool(&database_url).expect("failed to create database pool");
    let mut conn = pool.get().expect("failed to get a startup connection");
    db::run_migrations(&mut conn).expect("failed to run migrations");
    drop(conn);

    let config = AppConfig::from_figment(&figment);
    let page_cache = PageCache::new(config.cache_ttl);
    log::info!("database ready at {}", database_url);

    rocket::custom(figment)
        .manage(pool)
        .manage(config)
        .manage(page_cache)
        .mount(
            "/",
            routes![
                posts::index,
                posts::group_posts,
                posts::post_detail,
                posts::create_form,
                posts::create,
                posts::edit_form,
                posts::edit,
                comments::add,
                profile::profile,
                profile::follow,
                profile::unfollow,
                profile::follow_index,
            ],
        )
        .mount("/auth", routes![users::signup, users::login, users::login_form])
        .register("/", catchers![not_found, unprocessable])
}
