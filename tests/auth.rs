use rocket::http::{ContentType, Status};

mod common;
use common::TestApp;

#[test]
fn signup_then_login_issues_a_usable_token() {
    let app = TestApp::spawn();
    app.signup("alice");

    let res = app
        .client
        .post("/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "alice@example.com", "password": "sup3r-secret"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = serde_json::from_str(&res.into_string().unwrap()).unwrap();
    let token = body["token"].as_str().unwrap();
    assert_eq!(body["user"]["username"], "alice");

    // The issued token passes the auth guard.
    let res = app
        .client
        .get("/create")
        .header(TestApp::auth(token))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn login_with_wrong_password_is_rejected() {
    let app = TestApp::spawn();
    app.signup("alice");

    let res = app
        .client
        .post("/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "alice@example.com", "password": "not-it"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::UnprocessableEntity);
}

#[test]
fn duplicate_username_is_rejected_at_signup() {
    let app = TestApp::spawn();
    app.signup("alice");

    let res = app
        .client
        .post("/auth/signup")
        .header(ContentType::JSON)
        .body(r#"{"username": "alice", "email": "other@example.com", "password": "sup3r-secret"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::UnprocessableEntity);
}

#[test]
fn garbage_token_redirects_to_login() {
    let app = TestApp::spawn();
    let res = app
        .client
        .get("/create")
        .header(TestApp::auth("not-a-jwt"))
        .dispatch();
    assert_eq!(res.status(), Status::SeeOther);
    assert_eq!(
        res.headers().get_one("Location"),
        Some("/auth/login?next=%2Fcreate")
    );
}

#[test]
fn login_form_echoes_the_return_path() {
    let app = TestApp::spawn();
    let page = app.get_json("/auth/login?next=%2Fcreate");
    assert_eq!(page["next"], "/create");
}
