use axum::Router;
use tower_http::trace::TraceLayer;

use crate::features::card::create_card_router;
use crate::state::AppState;

/// 组装完整路由
pub fn build_router(state: AppState) -> Router {
    create_card_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
