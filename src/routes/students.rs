use crate::{
    data::{
        DataType,
        student::{Student, StudentForm},
    },
    error::{
        BadBodySnafu, BadStudentIdSnafu, MissingStudentSnafu, RegistrarResult,
        StudentIdOutOfRangeSnafu,
    },
    state::RegistrarState,
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, ensure};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Only non-negative integers that fit the column name a student; anything else
/// in the path cannot match a row.
fn student_id(path: Result<Path<u32>, PathRejection>) -> RegistrarResult<i32> {
    let Path(id) = path.context(BadStudentIdSnafu)?;
    i32::try_from(id).ok().context(StudentIdOutOfRangeSnafu { id })
}

pub async fn get_students(
    State(state): State<RegistrarState>,
) -> RegistrarResult<Json<Vec<Student>>> {
    let mut conn = state.get_connection().await?;
    let students = Student::get_all(&mut conn).await;
    state.release(conn).await;

    Ok(Json(students?))
}

pub async fn post_student(
    State(state): State<RegistrarState>,
    body: Result<Json<StudentForm>, JsonRejection>,
) -> RegistrarResult<(StatusCode, Json<Outcome>)> {
    let Json(form) = body.context(BadBodySnafu)?;
    let student_id = form.student_id.clone();

    let mut conn = state.get_connection().await?;
    let inserted =
        Student::insert_into_database(form, &mut conn, state.expose_database_errors()).await;
    state.release(conn).await;
    inserted?;

    info!(?student_id, "Added student");
    Ok((
        StatusCode::CREATED,
        Json(Outcome::success("Student added successfully!")),
    ))
}

pub async fn put_student(
    State(state): State<RegistrarState>,
    path: Result<Path<u32>, PathRejection>,
    body: Result<Json<StudentForm>, JsonRejection>,
) -> RegistrarResult<Json<Outcome>> {
    let original_id = student_id(path)?;
    let Json(form) = body.context(BadBodySnafu)?;
    let new_id = form.student_id.clone();

    let mut conn = state.get_connection().await?;
    let updated = Student::update_in_database(
        original_id,
        form,
        &mut conn,
        state.expose_database_errors(),
    )
    .await;
    state.release(conn).await;
    ensure!(updated?, MissingStudentSnafu { id: original_id });

    info!(original_id, ?new_id, "Updated student");
    Ok(Json(Outcome::success("Student updated successfully!")))
}

pub async fn delete_student(
    State(state): State<RegistrarState>,
    path: Result<Path<u32>, PathRejection>,
) -> RegistrarResult<Json<Outcome>> {
    let id = student_id(path)?;
    let mut conn = state.get_connection().await?;
    let removed =
        Student::remove_from_database(id, &mut conn, state.expose_database_errors()).await;
    state.release(conn).await;
    ensure!(removed?, MissingStudentSnafu { id });

    info!(id, "Deleted student");
    Ok(Json(Outcome::success("Student deleted successfully!")))
}

#[cfg(test)]
mod tests {
    use crate::{routes::router, state::RegistrarState};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header::CONTENT_TYPE},
    };
    use serde_json::{Value, json};
    use sqlx::postgres::PgConnectOptions;
    use tower::ServiceExt;

    // nothing listens on port 1, so every connect attempt is refused
    fn unreachable_app() -> Router {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("nobody")
            .database("college");
        router(RegistrarState::from_connect_options(options, true))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn list_without_database_is_500() {
        let (status, body) = send(
            unreachable_app(),
            Request::builder()
                .uri("/api/students")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Database connection failed" }));
    }

    #[tokio::test]
    async fn create_without_database_is_500() {
        let (status, body) = send(
            unreachable_app(),
            json_request("POST", "/api/students", r#"{"StudentID": 101}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Database connection failed"));
    }

    #[tokio::test]
    async fn update_without_database_is_500() {
        let (status, _) = send(
            unreachable_app(),
            json_request("PUT", "/api/students/101", r#"{"StudentID": 202}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn delete_without_database_is_500() {
        let (status, _) = send(
            unreachable_app(),
            Request::builder()
                .method("DELETE")
                .uri("/api/students/101")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn quoted_numbers_reach_the_database() {
        for body in [
            r#"{"StudentID": "101", "FirstName": "Ann"}"#,
            r#"{"StudentID": 101, "PassingYear": "2021"}"#,
        ] {
            let (status, body) = send(
                unreachable_app(),
                json_request("POST", "/api/students", body),
            )
            .await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, json!({ "error": "Database connection failed" }));
        }
    }

    #[tokio::test]
    async fn non_numeric_path_id_is_not_found() {
        for uri in ["/api/students/abc", "/api/students/-5", "/api/students/3000000000"] {
            let (status, body) = send(
                unreachable_app(),
                Request::builder()
                    .method("DELETE")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(
                body,
                json!({ "success": false, "message": "Student not found" })
            );
        }

        let (status, _) = send(
            unreachable_app(),
            json_request("PUT", "/api/students/1.5", r#"{"StudentID": 2}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_connecting() {
        let (status, body) = send(
            unreachable_app(),
            json_request("POST", "/api/students", "{not json"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn non_object_body_is_a_bad_request() {
        let (status, body) = send(
            unreachable_app(),
            json_request("PUT", "/api/students/5", r#""just text""#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }
}
