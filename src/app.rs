use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    handler::{self, Params, Reply},
    storage::{self, Session, Storage},
};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }
}

/// Every path the service answers. Matching is exact and ignores the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Get,
    GetById,
    Post,
    Edit,
    Delete,
    Restore,
    Like,
    Dislike,
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Get,
        Route::GetById,
        Route::Post,
        Route::Edit,
        Route::Delete,
        Route::Restore,
        Route::Like,
        Route::Dislike,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Get => "/posts.get",
            Route::GetById => "/posts.getById",
            Route::Post => "/posts.post",
            Route::Edit => "/posts.edit",
            Route::Delete => "/posts.delete",
            Route::Restore => "/posts.restore",
            Route::Like => "/posts.like",
            Route::Dislike => "/posts.dislike",
        }
    }

    async fn handle(self, session: &mut dyn Session, params: &Params) -> storage::Result<Reply> {
        match self {
            Route::Get => handler::get_posts(session, params).await,
            Route::GetById => handler::get_post_by_id(session, params).await,
            Route::Post => handler::create_post(session, params).await,
            Route::Edit => handler::edit_post(session, params).await,
            Route::Delete => handler::delete_post(session, params).await,
            Route::Restore => handler::restore_post(session, params).await,
            Route::Like => handler::like_post(session, params).await,
            Route::Dislike => handler::dislike_post(session, params).await,
        }
    }
}

/// Runs one request: open a session, run the route, release the session.
///
/// Storage failures become an empty 500. The session is closed on every
/// path; a failed close is logged and leaves the response untouched.
pub async fn dispatch(route: Route, storage: &dyn Storage, params: Params) -> Response {
    let mut session = match storage.session().await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, route = route.path(), "Failed to open session");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let response = match route.handle(session.as_mut(), &params).await {
        Ok(reply) => reply.into_response(),
        Err(err) => {
            tracing::error!(error = %err, route = route.path(), "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    if let Err(err) = session.close().await {
        tracing::warn!(error = %err, route = route.path(), "Failed to release session");
    }

    response
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let router = Route::ALL.into_iter().fold(Router::new(), |router, route| {
        router.route(
            route.path(),
            any(
                move |State(state): State<AppState>, RawQuery(query): RawQuery| async move {
                    dispatch(route, state.storage.as_ref(), Params::parse(query.as_deref())).await
                },
            ),
        )
    });

    router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
