use chrono::{NaiveDateTime, Utc};
use diesel::insert_into;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::{post, FromForm};
use serde::Serialize;

use crate::db::schema::{comments, users};
use crate::db::DbConnection;
use crate::posts::Post;
use crate::types::{ApiError, Validate, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;

#[derive(Debug, Queryable, Identifiable, Associations, Serialize, PartialEq)]
#[diesel(table_name = comments, belongs_to(Post))]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: Option<i32>,
    pub text: String,
    pub created: NaiveDateTime,
}

/// A comment as rendered on the post detail page. The author is optional:
/// deleting a user keeps their comments around with the author cleared.
#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i32,
    pub author: Option<String>,
    pub text: String,
    pub created: NaiveDateTime,
}

impl From<(Comment, Option<User>)> for CommentView {
    fn from((comment, author): (Comment, Option<User>)) -> Self {
        CommentView {
            id: comment.id,
            author: author.map(|user| user.username),
            text: comment.text,
            created: comment.created,
        }
    }
}

/// Newest first, the entity's default ordering.
pub fn for_post(
    post_id: i32,
    connection: &mut SqliteConnection,
) -> QueryResult<Vec<CommentView>> {
    let rows = comments::table
        .filter(comments::post_id.eq(post_id))
        .left_join(users::table)
        .order((comments::created.desc(), comments::id.desc()))
        .load::<(Comment, Option<User>)>(connection)?;
    Ok(rows.into_iter().map(CommentView::from).collect())
}

#[derive(Debug, FromForm)]
pub struct CommentForm {
    pub text: String,
}

impl Validate for CommentForm {
    type Error = ValidationError;

    fn validate(self, _connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        if self.text.trim().is_empty() {
            Err(ValidationError::from("text", "empty text"))
        } else {
            Ok(self)
        }
    }
}

/// Validated comment text with the server-controlled fields still unset.
#[derive(Debug)]
pub struct CommentDraft {
    pub text: String,
}

impl CommentDraft {
    pub fn attach(self, post_id: i32, author_id: i32) -> NewComment {
        NewComment {
            post_id,
            author_id: Some(author_id),
            text: self.text,
            created: Utc::now().naive_utc(),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub post_id: i32,
    pub author_id: Option<i32>,
    pub text: String,
    pub created: NaiveDateTime,
}

#[post("/posts/<id>/comment", data = "<form>")]
pub fn add(
    mut connection: DbConnection,
    user: CurrentUser,
    id: i32,
    form: Form<CommentForm>,
) -> Result<Redirect, ApiError> {
    let user = user?;
    let post = Post::load(id, &mut connection)?;

    let form = form.into_inner().validate(&mut connection)?;
    let draft = CommentDraft { text: form.text };
    let new_comment = draft.attach(post.id, user.id);
    insert_into(comments::table)
        .values(&new_comment)
        .execute(&mut *connection)?;

    Ok(Redirect::to(format!("/posts/{}", id)))
}
