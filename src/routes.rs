use crate::{
    routes::{
        index::{get_index_route, internal_get_students},
        students::{delete_student, get_students, post_student, put_student},
    },
    state::RegistrarState,
};
use axum::{
    Router,
    routing::{get, put},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod index;
pub mod students;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn router(state: RegistrarState) -> Router {
    Router::new()
        .route("/", get(get_index_route))
        .route("/internal/students", get(internal_get_students))
        .route("/api/students", get(get_students).post(post_student))
        .route(
            "/api/students/{id}",
            put(put_student).delete(delete_student),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
