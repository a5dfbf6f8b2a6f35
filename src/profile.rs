use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel::{delete, insert_into, select};
use rocket::get;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::db::schema::follows;
use crate::db::DbConnection;
use crate::pagination::{paginate, Page};
use crate::posts::{self, PostList, PostView};
use crate::types::{ApiError, ApiResult};
use crate::users::models::User;
use crate::users::CurrentUser;

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub author: String,
    pub following: bool,
    pub page: Page<PostView>,
}

/// An author's posts, plus whether the current viewer follows them. The
/// flag is always false for anonymous viewers and for the author's own page.
#[get("/profile/<username>?<page>")]
pub fn profile(
    mut connection: DbConnection,
    viewer: Option<User>,
    username: &str,
    page: Option<&str>,
) -> ApiResult<ProfilePage> {
    let author = User::load_by_name(username, &mut connection)?;
    let following = match viewer {
        Some(viewer) => is_following(viewer.id, author.id, &mut connection)?,
        None => false,
    };
    let post_list = posts::by_author(author.id, &mut connection)?;

    Ok(Json(ProfilePage {
        author: author.username,
        following,
        page: paginate(post_list, page),
    }))
}

fn is_following(
    user_id: i32,
    author_id: i32,
    connection: &mut SqliteConnection,
) -> QueryResult<bool> {
    select(exists(
        follows::table
            .filter(follows::user_id.eq(user_id))
            .filter(follows::author_id.eq(author_id)),
    ))
    .get_result::<bool>(connection)
}

/// Creates the follow edge. Following yourself is silently a no-op, and the
/// unique (user, author) pair makes a repeated follow one as well.
#[get("/profile/<username>/follow")]
pub fn follow(
    mut connection: DbConnection,
    user: CurrentUser,
    username: &str,
) -> Result<Redirect, ApiError> {
    let user = user?;
    let author = User::load_by_name(username, &mut connection)?;

    if author.id != user.id {
        insert_into(follows::table)
            .values((
                follows::user_id.eq(user.id),
                follows::author_id.eq(author.id),
            ))
            .on_conflict((follows::user_id, follows::author_id))
            .do_nothing()
            .execute(&mut *connection)?;
    }

    Ok(Redirect::to(format!("/profile/{}", author.username)))
}

/// Removes the follow edge if present; removing a missing edge is not an
/// error.
#[get("/profile/<username>/unfollow")]
pub fn unfollow(
    mut connection: DbConnection,
    user: CurrentUser,
    username: &str,
) -> Result<Redirect, ApiError> {
    let user = user?;
    let author = User::load_by_name(username, &mut connection)?;

    delete(
        follows::table
            .filter(follows::user_id.eq(user.id))
            .filter(follows::author_id.eq(author.id)),
    )
    .execute(&mut *connection)?;

    Ok(Redirect::to(format!("/profile/{}", author.username)))
}

/// The personalized timeline: posts whose author the current user follows,
/// newest first.
#[get("/follow?<page>")]
pub fn follow_index(
    mut connection: DbConnection,
    user: CurrentUser,
    page: Option<&str>,
) -> ApiResult<PostList> {
    let user = user?;
    let post_list = posts::by_followed_authors(user.id, &mut connection)?;

    Ok(Json(PostList {
        page: paginate(post_list, page),
    }))
}
