pub mod handler;
mod params;
mod template;

use axum::{Router, routing::any};

use crate::state::AppState;

pub use handler::{CARD_CACHE_CONTROL, CARD_CONTENT_TYPE, serve_card};
pub use params::{CardParams, canonical_request_url};
pub use template::build_card_markup;

/// 卡片路由：根路径接受任意方法，其余路径一律 404
pub fn create_card_router() -> Router<AppState> {
    Router::new()
        .route("/", any(handler::render_card))
        .fallback(handler::not_found)
}
