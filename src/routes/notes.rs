use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::notes;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notes::list_notes))
        .route("/", post(notes::create_note))
        .route("/:note_id", get(notes::get_note))
        .route("/:note_id", put(notes::update_note))
        .route("/:note_id", delete(notes::delete_note))
        .layer(middleware::from_fn(crate::middleware::auth::auth_middleware))
}
