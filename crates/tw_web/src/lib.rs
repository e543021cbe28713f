use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod analytics;
pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/articles/count", get(handlers::article_count))
        .route("/api/stats/words", get(handlers::top_words))
        .route("/api/stats/volume", get(handlers::crawl_volume))
        .route("/api/crawl", post(handlers::run_crawl))
        .route(
            "/api/schedule",
            get(handlers::get_schedule)
                .post(handlers::set_schedule)
                .delete(handlers::delete_schedule),
        )
        .layer(cors)
        .with_state(Arc::new(state))
}
