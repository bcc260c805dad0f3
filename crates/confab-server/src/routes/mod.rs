use axum::Router;

use crate::state::AppState;

pub mod reply;
pub mod status;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(reply::routes(state))
        .merge(status::routes())
}
