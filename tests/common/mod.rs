#![allow(dead_code)]

use std::path::PathBuf;

use diesel::sqlite::SqliteConnection;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;
use tempfile::TempDir;

/// One application instance over its own database file and media directory.
pub struct TestApp {
    pub client: Client,
    db_path: PathBuf,
    tmp: TempDir,
}

impl TestApp {
    pub fn spawn() -> TestApp {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_path = tmp.path().join("quill.db");
        let figment = rocket::Config::figment()
            .merge(("database_url", db_path.to_str().expect("utf-8 path")))
            .merge((
                "media_root",
                tmp.path().join("media").to_str().expect("utf-8 path"),
            ))
            .merge(("jwt_secret", "test-secret"))
            .merge(("log_level", "off"));
        let client = Client::tracked(quill::rocket(figment)).expect("rocket client");
        TestApp {
            client,
            db_path,
            tmp,
        }
    }

    /// A direct connection to the same database, for seeding and asserting
    /// on storage state.
    pub fn conn(&self) -> SqliteConnection {
        quill::db::connect(self.db_path.to_str().expect("utf-8 path"))
            .expect("test db connection")
    }

    pub fn media_root(&self) -> PathBuf {
        self.tmp.path().join("media")
    }

    /// Registers a user and returns their bearer token.
    pub fn signup(&self, username: &str) -> String {
        let body = serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "sup3r-secret",
        });
        let res = self
            .client
            .post("/auth/signup")
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
        let value: serde_json::Value =
            serde_json::from_str(&res.into_string().expect("signup body")).expect("signup json");
        value["token"].as_str().expect("token").to_string()
    }

    pub fn auth(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Token {}", token))
    }

    /// Creates a post over the HTTP surface; panics unless it redirects.
    pub fn create_post(&self, token: &str, text: &str, group: Option<i32>) {
        let body = match group {
            Some(group) => format!("text={}&group={}", text, group),
            None => format!("text={}", text),
        };
        let res = self
            .client
            .post("/create")
            .header(ContentType::Form)
            .header(Self::auth(token))
            .body(body)
            .dispatch();
        assert_eq!(res.status(), Status::SeeOther);
    }

    pub fn get_json(&self, path: &str) -> serde_json::Value {
        let res = self.client.get(path).dispatch();
        assert_eq!(res.status(), Status::Ok, "GET {}", path);
        serde_json::from_str(&res.into_string().expect("body")).expect("json body")
    }
}
