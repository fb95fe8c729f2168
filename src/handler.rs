use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    models::{Post, PostDTO},
    storage::{Change, Result, Select, Session},
};

/// Query string parameters of a request, in their original order.
#[derive(Debug, Default, Clone)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs: Vec<(String, String)> = query
            .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Params(pairs)
    }

    /// First value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// `id` as a base-10 integer; `None` when missing or malformed.
    pub fn id(&self) -> Option<i64> {
        self.get("id")?.parse().ok()
    }

    /// `id` as read by lookups, where a missing or blank value reads as 0.
    fn lookup_id(&self) -> Option<i64> {
        match self.get("id") {
            None => Some(0),
            Some(raw) if raw.trim().is_empty() => Some(0),
            Some(raw) => raw.parse().ok(),
        }
    }

    /// `id` as accepted by the mutating routes, which also refuse zero.
    fn target_id(&self) -> Option<i64> {
        self.id().filter(|&id| id != 0)
    }
}

/// What a handler answers with. Status replies have an empty body.
#[derive(Debug)]
pub enum Reply {
    Status(StatusCode),
    Post(PostDTO),
    Posts(Vec<PostDTO>),
}

impl Reply {
    fn bad_request() -> Self {
        Reply::Status(StatusCode::BAD_REQUEST)
    }

    fn not_found() -> Self {
        Reply::Status(StatusCode::NOT_FOUND)
    }

    fn found(post: Option<PostDTO>) -> Self {
        post.map_or_else(Reply::not_found, Reply::Post)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Status(status) => status.into_response(),
            Reply::Post(post) => Json(post).into_response(),
            Reply::Posts(posts) => Json(posts).into_response(),
        }
    }
}

fn find(posts: Vec<Post>, id: i64) -> Option<Post> {
    posts.into_iter().find(|post| post.id == id)
}

pub async fn get_posts(session: &mut dyn Session, _params: &Params) -> Result<Reply> {
    let posts = session
        .select(Select::all().removed(false).newest_first())
        .await?;

    Ok(Reply::Posts(posts.into_iter().map(PostDTO::from).collect()))
}

pub async fn get_post_by_id(session: &mut dyn Session, params: &Params) -> Result<Reply> {
    let Some(id) = params.lookup_id() else {
        return Ok(Reply::bad_request());
    };

    let posts = session.select(Select::all().removed(false).id(id)).await?;

    Ok(Reply::found(find(posts, id).map(PostDTO::from)))
}

pub async fn create_post(session: &mut dyn Session, params: &Params) -> Result<Reply> {
    let Some(content) = params.get("content") else {
        return Ok(Reply::bad_request());
    };

    let id = session.insert(content).await?;
    let posts = session.select(Select::all().removed(false).id(id)).await?;

    Ok(Reply::found(find(posts, id).map(PostDTO::from)))
}

pub async fn edit_post(session: &mut dyn Session, params: &Params) -> Result<Reply> {
    let (Some(id), Some(content)) = (params.target_id(), params.get("content")) else {
        return Ok(Reply::bad_request());
    };

    session
        .update(id, Change::Content(content.to_owned()))
        .await?;
    let posts = session.select(Select::all().removed(false).id(id)).await?;

    Ok(Reply::found(find(posts, id).map(PostDTO::from)))
}

pub async fn delete_post(session: &mut dyn Session, params: &Params) -> Result<Reply> {
    set_removed(session, params, true).await
}

pub async fn restore_post(session: &mut dyn Session, params: &Params) -> Result<Reply> {
    set_removed(session, params, false).await
}

/// Moves a post between visible and removed. The post must exist and be in
/// the opposite state.
async fn set_removed(session: &mut dyn Session, params: &Params, removed: bool) -> Result<Reply> {
    let Some(id) = params.target_id() else {
        return Ok(Reply::bad_request());
    };

    let current = find(session.select(Select::all().id(id)).await?, id);
    if current.map_or(true, |post| post.removed == removed) {
        return Ok(Reply::not_found());
    }

    session.update(id, Change::Removed(removed)).await?;
    let posts = session.select(Select::all().removed(removed).id(id)).await?;

    Ok(Reply::found(find(posts, id).map(PostDTO::with_removed)))
}

pub async fn like_post(session: &mut dyn Session, params: &Params) -> Result<Reply> {
    adjust_likes(session, params, 1).await
}

pub async fn dislike_post(session: &mut dyn Session, params: &Params) -> Result<Reply> {
    adjust_likes(session, params, -1).await
}

async fn adjust_likes(session: &mut dyn Session, params: &Params, delta: i32) -> Result<Reply> {
    let Some(id) = params.target_id() else {
        return Ok(Reply::bad_request());
    };

    let visible = session.select(Select::all().removed(false).id(id)).await?;
    if find(visible, id).is_none() {
        return Ok(Reply::not_found());
    }

    session.update(id, Change::Likes(delta)).await?;
    let posts = session.select(Select::all().id(id)).await?;
    let post = find(posts, id);
    if let Some(post) = &post {
        tracing::debug!(id, delta, likes = post.likes, "Likes updated");
    }

    Ok(Reply::found(post.map(PostDTO::from)))
}
