use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/api/login", post(handlers::login))
        .route(
            "/api/images",
            get(handlers::list_images).post(handlers::upload_images),
        )
        .route(
            "/api/images/:id",
            get(handlers::get_image)
                .patch(handlers::patch_image)
                .delete(handlers::delete_image),
        )
        .route("/api/resize/:id", get(handlers::resize_image))
        .route("/images/:filename", get(handlers::serve_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
