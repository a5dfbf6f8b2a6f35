use diesel::prelude::*;

use quill::db::schema::{comments, groups, posts, users};
use quill::posts::{Group, Post};

mod common;
use common::TestApp;

#[test]
fn deleting_a_group_clears_the_post_reference() {
    let app = TestApp::spawn();
    let token = app.signup("alice");
    let group = Group::create("Cooking", "recipes", &mut app.conn()).unwrap();
    app.create_post(&token, "stew", Some(group.id));

    let mut conn = app.conn();
    diesel::delete(groups::table.find(group.id))
        .execute(&mut conn)
        .unwrap();

    let post = posts::table.first::<Post>(&mut conn).unwrap();
    assert_eq!(post.text, "stew");
    assert_eq!(post.group_id, None);
}

#[test]
fn deleting_an_author_deletes_their_posts() {
    let app = TestApp::spawn();
    let token = app.signup("alice");
    app.create_post(&token, "ephemeral", None);

    let mut conn = app.conn();
    diesel::delete(users::table.filter(users::username.eq("alice")))
        .execute(&mut conn)
        .unwrap();

    let remaining: i64 = posts::table.count().get_result(&mut conn).unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn deleting_a_comment_author_preserves_the_comment() {
    let app = TestApp::spawn();
    let author = app.signup("alice");
    let commenter = app.signup("bob");
    app.create_post(&author, "discussed", None);

    let mut conn = app.conn();
    let post = posts::table.first::<Post>(&mut conn).unwrap();
    let res = app
        .client
        .post(format!("/posts/{}/comment", post.id))
        .header(rocket::http::ContentType::Form)
        .header(TestApp::auth(&commenter))
        .body("text=hot-take")
        .dispatch();
    assert_eq!(res.status(), rocket::http::Status::SeeOther);

    diesel::delete(users::table.filter(users::username.eq("bob")))
        .execute(&mut conn)
        .unwrap();

    let (text, author_id) = comments::table
        .select((comments::text, comments::author_id))
        .first::<(String, Option<i32>)>(&mut conn)
        .unwrap();
    assert_eq!(text, "hot-take");
    assert_eq!(author_id, None);

    // The detail page renders the orphaned comment with no author.
    let detail = app.get_json(&format!("/posts/{}", post.id));
    assert_eq!(detail["comments"][0]["author"], serde_json::Value::Null);
}

#[test]
fn deleting_a_post_deletes_its_comments() {
    let app = TestApp::spawn();
    let token = app.signup("alice");
    app.create_post(&token, "short-lived", None);

    let mut conn = app.conn();
    let post = posts::table.first::<Post>(&mut conn).unwrap();
    let res = app
        .client
        .post(format!("/posts/{}/comment", post.id))
        .header(rocket::http::ContentType::Form)
        .header(TestApp::auth(&token))
        .body("text=gone-soon")
        .dispatch();
    assert_eq!(res.status(), rocket::http::Status::SeeOther);

    diesel::delete(posts::table.find(post.id))
        .execute(&mut conn)
        .unwrap();

    let remaining: i64 = comments::table.count().get_result(&mut conn).unwrap();
    assert_eq!(remaining, 0);
}
