use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel::{insert_into, select};
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::response::content::RawJson;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, FromForm, Responder, State};
use serde::Serialize;
use slug::slugify;

use crate::cache::PageCache;
use crate::db::schema::{groups, posts, users};
use crate::db::DbConnection;
use crate::pagination::{paginate, Page};
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::AppConfig;

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = groups)]
pub struct Group {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl Group {
    /// Groups are created out-of-band; there is no public route for this.
    pub fn create(
        title: &str,
        description: &str,
        connection: &mut SqliteConnection,
    ) -> QueryResult<Group> {
        insert_into(groups::table)
            .values((
                groups::title.eq(title),
                groups::slug.eq(slugify(title)),
                groups::description.eq(description),
            ))
            .get_result::<Group>(connection)
    }

    pub fn load_by_slug(slug_: &str, connection: &mut SqliteConnection) -> Result<Group, ApiError> {
        groups::table
            .filter(groups::slug.eq(slug_))
            .get_result::<Group>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Debug, Queryable, Identifiable, Serialize, PartialEq)]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: i32,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

impl Post {
    pub fn load(post_id: i32, connection: &mut SqliteConnection) -> Result<Post, ApiError> {
        posts::table
            .find(post_id)
            .get_result::<Post>(connection)
            .map_err(|e| e.into())
    }
}

/// Validated post input with the server-controlled fields still unset. The
/// handler turns it into an insertable record by assigning the authenticated
/// author; user input never carries the author or the publication date.
#[derive(Debug)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

impl PostDraft {
    pub fn with_author(self, author_id: i32) -> NewPost {
        NewPost {
            text: self.text,
            pub_date: Utc::now().naive_utc(),
            author_id,
            group_id: self.group_id,
            image: self.image,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// Changes an author may apply to their own post. The author and the
/// publication date are immutable after creation and deliberately absent
/// here; a `None` image keeps the stored one.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = posts)]
struct PostChanges {
    text: String,
    group_id: Option<Option<i32>>,
    image: Option<String>,
}

#[derive(Debug, FromForm)]
pub struct PostForm<'r> {
    pub text: String,
    pub group: Option<i32>,
    pub image: Option<TempFile<'r>>,
}

impl<'r> Validate for PostForm<'r> {
    type Error = ApiError;

    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::default();
        if self.text.trim().is_empty() {
            errors.add_error("text", "empty text");
        }

        if let Some(group_id) = self.group {
            let group_exists =
                select(exists(groups::table.find(group_id))).get_result::<bool>(connection)?;
            if !group_exists {
                errors.add_error("group", format!("unknown group: {}", group_id));
            }
        }

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(errors.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupRef {
    pub id: i32,
    pub title: String,
    pub slug: String,
}

impl From<Group> for GroupRef {
    fn from(group: Group) -> Self {
        GroupRef {
            id: group.id,
            title: group.title,
            slug: group.slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: i32,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author: String,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

type PostRow = (Post, User, Option<Group>);

impl From<PostRow> for PostView {
    fn from((post, author, group): PostRow) -> Self {
        PostView {
            id: post.id,
            text: post.text,
            pub_date: post.pub_date,
            author: author.username,
            group: group.map(GroupRef::from),
            image: post.image,
        }
    }
}

macro_rules! newest_first {
    ($query:expr) => {
        $query
            .inner_join(users::table)
            .left_join(groups::table)
            .order((posts::pub_date.desc(), posts::id.desc()))
    };
}

pub fn all_newest_first(connection: &mut SqliteConnection) -> QueryResult<Vec<PostView>> {
    let rows = newest_first!(posts::table).load::<PostRow>(connection)?;
    Ok(rows.into_iter().map(PostView::from).collect())
}

pub fn by_group(group_id: i32, connection: &mut SqliteConnection) -> QueryResult<Vec<PostView>> {
    let rows = newest_first!(posts::table.filter(posts::group_id.eq(group_id)))
        .load::<PostRow>(connection)?;
    Ok(rows.into_iter().map(PostView::from).collect())
}

pub fn by_author(author_id: i32, connection: &mut SqliteConnection) -> QueryResult<Vec<PostView>> {
    let rows = newest_first!(posts::table.filter(posts::author_id.eq(author_id)))
        .load::<PostRow>(connection)?;
    Ok(rows.into_iter().map(PostView::from).collect())
}

/// The followed-authors timeline for one user.
pub fn by_followed_authors(
    user_id: i32,
    connection: &mut SqliteConnection,
) -> QueryResult<Vec<PostView>> {
    use crate::db::schema::follows;

    let followed = follows::table
        .select(follows::author_id)
        .filter(follows::user_id.eq(user_id));
    let rows = newest_first!(posts::table.filter(posts::author_id.eq_any(followed)))
        .load::<PostRow>(connection)?;
    Ok(rows.into_iter().map(PostView::from).collect())
}

#[derive(Debug, Serialize)]
pub struct PostList {
    pub page: Page<PostView>,
}

#[derive(Debug, Serialize)]
pub struct GroupPage {
    pub group: Group,
    pub page: Page<PostView>,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: PostView,
    pub author_post_count: i64,
    pub comments: Vec<crate::comments::CommentView>,
}

#[derive(Debug, Serialize)]
pub struct FormValues {
    pub text: String,
    pub group: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct FormPage {
    pub form: FormValues,
    pub groups: Vec<GroupRef>,
    pub is_edit: bool,
}

/// All posts, newest first. The only cached page: within the TTL the stored
/// body is served as-is, so deletions do not show until the cache expires or
/// is explicitly cleared.
#[get("/?<page>")]
pub fn index(
    mut connection: DbConnection,
    cache: &State<PageCache>,
    page: Option<&str>,
) -> Result<RawJson<String>, ApiError> {
    let key = PageCache::key("/", page);
    if let Some(body) = cache.get(&key) {
        return Ok(RawJson(body));
    }

    let post_list = all_newest_first(&mut connection)?;
    let response = PostList {
        page: paginate(post_list, page),
    };
    let body = serde_json::to_string(&response)?;
    cache.put(key, body.clone());
    Ok(RawJson(body))
}

#[get("/group/<slug>?<page>")]
pub fn group_posts(
    mut connection: DbConnection,
    slug: &str,
    page: Option<&str>,
) -> ApiResult<GroupPage> {
    let group = Group::load_by_slug(slug, &mut connection)?;
    let post_list = by_group(group.id, &mut connection)?;
    Ok(Json(GroupPage {
        page: paginate(post_list, page),
        group,
    }))
}

#[get("/posts/<id>")]
pub fn post_detail(mut connection: DbConnection, id: i32) -> ApiResult<PostDetail> {
    let row = newest_first!(posts::table.filter(posts::id.eq(id)))
        .first::<PostRow>(&mut *connection)?;
    let author_post_count = posts::table
        .filter(posts::author_id.eq(row.1.id))
        .count()
        .get_result::<i64>(&mut *connection)?;
    let comments = crate::comments::for_post(id, &mut connection)?;

    Ok(Json(PostDetail {
        post: PostView::from(row),
        author_post_count,
        comments,
    }))
}

fn groups_for_form(connection: &mut SqliteConnection) -> QueryResult<Vec<GroupRef>> {
    let all = groups::table
        .order(groups::title.asc())
        .load::<Group>(connection)?;
    Ok(all.into_iter().map(GroupRef::from).collect())
}

#[get("/create")]
pub fn create_form(mut connection: DbConnection, user: CurrentUser) -> ApiResult<FormPage> {
    user?;
    Ok(Json(FormPage {
        form: FormValues {
            text: String::new(),
            group: None,
        },
        groups: groups_for_form(&mut connection)?,
        is_edit: false,
    }))
}

#[post("/create", data = "<form>")]
pub async fn create(
    mut connection: DbConnection,
    user: CurrentUser,
    config: &State<AppConfig>,
    form: Form<PostForm<'_>>,
) -> Result<Redirect, ApiError> {
    let user = user?;
    let mut form = form.into_inner().validate(&mut connection)?;
    let image = store_image(form.image.as_mut(), &config.media_root).await?;

    let draft = PostDraft {
        text: form.text,
        group_id: form.group,
        image: image.clone(),
    };
    let new_post = draft.with_author(user.id);
    if let Err(error) = insert_into(posts::table)
        .values(&new_post)
        .execute(&mut *connection)
    {
        discard_image(image.as_deref(), &config.media_root);
        return Err(error.into());
    }

    Ok(Redirect::to(format!("/profile/{}", user.username)))
}

#[derive(Responder)]
pub enum EditPage {
    Form(Json<FormPage>),
    Redirect(Redirect),
}

#[get("/posts/<id>/edit")]
pub fn edit_form(
    mut connection: DbConnection,
    user: CurrentUser,
    id: i32,
) -> Result<EditPage, ApiError> {
    let user = user?;
    let post = Post::load(id, &mut connection)?;
    if post.author_id != user.id {
        return Ok(EditPage::Redirect(Redirect::to(format!("/posts/{}", id))));
    }

    Ok(EditPage::Form(Json(FormPage {
        form: FormValues {
            text: post.text,
            group: post.group_id,
        },
        groups: groups_for_form(&mut connection)?,
        is_edit: true,
    })))
}

#[post("/posts/<id>/edit", data = "<form>")]
pub async fn edit(
    mut connection: DbConnection,
    user: CurrentUser,
    config: &State<AppConfig>,
    id: i32,
    form: Form<PostForm<'_>>,
) -> Result<Redirect, ApiError> {
    let user = user?;
    let post = Post::load(id, &mut connection)?;

    // A non-author is sent back to the detail view, not rejected.
    if post.author_id != user.id {
        return Ok(Redirect::to(format!("/posts/{}", id)));
    }

    let mut form = form.into_inner().validate(&mut connection)?;
    let image = store_image(form.image.as_mut(), &config.media_root).await?;
    let changes = PostChanges {
        text: form.text,
        group_id: Some(form.group),
        image: image.clone(),
    };
    if let Err(error) = diesel::update(posts::table.find(id))
        .set(&changes)
        .execute(&mut *connection)
    {
        discard_image(image.as_deref(), &config.media_root);
        return Err(error.into());
    }

    Ok(Redirect::to(format!("/posts/{}", id)))
}

/// Persists an uploaded image under `<media_root>/posts/` and returns the
/// path stored on the record. An absent or empty upload stores nothing.
async fn store_image(
    image: Option<&mut TempFile<'_>>,
    media_root: &Path,
) -> Result<Option<String>, ApiError> {
    let Some(file) = image else {
        return Ok(None);
    };
    if file.len() == 0 {
        return Ok(None);
    }

    let stem = file.name().unwrap_or("upload").to_string();
    let extension = file
        .content_type()
        .and_then(|ct| ct.extension())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| String::from("bin"));
    let relative = format!(
        "posts/{}-{}.{}",
        Utc::now().timestamp_millis(),
        stem,
        extension
    );

    let destination = media_root.join(&relative);
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    file.move_copy_to(&destination).await?;
    log::info!("stored upload at {}", destination.display());

    Ok(Some(relative))
}

/// Removes a stored upload whose record never made it into the database.
fn discard_image(image: Option<&str>, media_root: &Path) {
    if let Some(relative) = image {
        if let Err(error) = std::fs::remove_file(media_root.join(relative)) {
            log::warn!("could not remove orphaned upload {}: {}", relative, error);
        }
    }
}
