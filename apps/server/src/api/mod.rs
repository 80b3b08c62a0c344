use std::sync::Arc;

use axum::Router;

use crate::main_lib::AppState;

mod events;
mod records;
mod sync;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(sync::router())
        .merge(records::router())
        .merge(events::router())
}
