use crate::routes::students::Outcome;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use serde_json::json;
use snafu::Snafu;
use std::num::ParseIntError;
use std::str::ParseBoolError;

pub type RegistrarResult<T> = Result<T, RegistrarError>;

pub const CONNECTION_FAILED: &str = "Database connection failed";
pub const STUDENT_NOT_FOUND: &str = "Student not found";
pub const GENERIC_DATABASE_ERROR: &str = "Database error";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RegistrarError {
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery {
        source: sqlx::Error,
        expose_detail: bool,
    },
    #[snafu(display("Error listing students"))]
    ListStudents { source: sqlx::Error },
    #[snafu(display("Unable to find student with ID: {}", id))]
    MissingStudent { id: i32 },
    #[snafu(display("Student ID in path is not a student ID"))]
    BadStudentId { source: PathRejection },
    #[snafu(display("Student ID {} is out of range", id))]
    StudentIdOutOfRange { id: u32 },
    #[snafu(display("Unable to read request body"))]
    BadBody { source: JsonRejection },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse IP port"))]
    ParsePort { source: ParseIntError },
    #[snafu(display("Unable to parse `{}` as a boolean", name))]
    ParseFlag {
        source: ParseBoolError,
        name: &'static str,
    },
}

impl RegistrarError {
    #[allow(clippy::match_same_arms)]
    pub const fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        match self {
            Self::GetDatabaseConnection { .. } => ISE,
            Self::MakeQuery { .. } => BI,
            Self::ListStudents { .. } => ISE,
            Self::MissingStudent { .. }
            | Self::BadStudentId { .. }
            | Self::StudentIdOutOfRange { .. } => NF,
            Self::BadBody { .. } => BI,
            Self::BadEnvVar { .. } | Self::ParsePort { .. } | Self::ParseFlag { .. } => ISE,
        }
    }

    /// The text a client gets to see. Database text is passed through as-is unless
    /// the deployment turned that off.
    pub fn client_message(&self) -> String {
        match self {
            Self::GetDatabaseConnection { .. } => CONNECTION_FAILED.to_string(),
            Self::MakeQuery {
                source,
                expose_detail: true,
            } => source.to_string(),
            Self::MakeQuery {
                expose_detail: false,
                ..
            } => GENERIC_DATABASE_ERROR.to_string(),
            Self::ListStudents { .. } => GENERIC_DATABASE_ERROR.to_string(),
            Self::MissingStudent { .. }
            | Self::BadStudentId { .. }
            | Self::StudentIdOutOfRange { .. } => STUDENT_NOT_FOUND.to_string(),
            Self::BadBody { source } => source.body_text(),
            Self::BadEnvVar { .. } | Self::ParsePort { .. } | Self::ParseFlag { .. } => {
                self.to_string()
            }
        }
    }

    pub fn render_inline(&self) -> Markup {
        html! {
            div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
                strong class="font-bold" {"Registrar Error "}
                span {(self.client_message())}
            }
        }
    }
}

impl IntoResponse for RegistrarError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            error!(?self, "Error!");
            return (status_code, Json(json!({ "error": self.client_message() })))
                .into_response();
        }

        warn!(?self, "Request rejected");
        (status_code, Json(Outcome::failure(self.client_message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(error: RegistrarError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn connection_failure_hides_driver_detail() {
        let (status, body) = body_json(RegistrarError::GetDatabaseConnection {
            source: sqlx::Error::Protocol("tls handshake eof at 10.0.0.4".into()),
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Database connection failed" }));
    }

    #[tokio::test]
    async fn query_error_passes_raw_text_through() {
        let source = sqlx::Error::Protocol("duplicate key value".into());
        let expected = source.to_string();
        let (status, body) = body_json(RegistrarError::MakeQuery {
            source,
            expose_detail: true,
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!(expected));
    }

    #[tokio::test]
    async fn query_error_detail_can_be_suppressed() {
        let (status, body) = body_json(RegistrarError::MakeQuery {
            source: sqlx::Error::Protocol("duplicate key value".into()),
            expose_detail: false,
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Database error"));
    }

    #[tokio::test]
    async fn missing_student_is_not_found() {
        let (status, body) = body_json(RegistrarError::MissingStudent { id: 9999 }).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({ "success": false, "message": "Student not found" })
        );
    }

    #[tokio::test]
    async fn failed_listing_is_a_server_error() {
        let (status, body) = body_json(RegistrarError::ListStudents {
            source: sqlx::Error::Protocol("relation \"public.students\" does not exist".into()),
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Database error" }));
    }

    #[tokio::test]
    async fn out_of_range_path_id_is_not_found() {
        let (status, body) =
            body_json(RegistrarError::StudentIdOutOfRange { id: u32::MAX }).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Student not found"));
    }

    #[test]
    fn inline_render_carries_client_message() {
        let markup = RegistrarError::MissingStudent { id: 3 }
            .render_inline()
            .into_string();
        assert!(markup.contains("Student not found"));
        assert!(markup.contains("role=\"alert\""));
    }
}
