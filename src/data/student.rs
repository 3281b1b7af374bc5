use crate::data::DataType;
use crate::error::{ListStudentsSnafu, MakeQuerySnafu, RegistrarResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use snafu::ResultExt;
use sqlx::{FromRow, PgConnection};

pub const STUDENTS_SCHEMA: &str = include_str!("../../schema/students.sql");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "PascalCase")]
pub struct Student {
    #[serde(rename = "StudentID")]
    pub student_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub major: Option<String>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub board: Option<String>,
    pub passing_year: Option<i32>,
}

/// Body of a create or update. Every field arrives as the text of whatever JSON
/// scalar the client sent, and the database does the type checking: `"101"` and
/// `101` are the same student, `"abc"` fails in Postgres rather than here.
/// Missing fields become NULL.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StudentForm {
    #[serde(rename = "StudentID", default, deserialize_with = "as_sql_text")]
    pub student_id: Option<String>,
    #[serde(default, deserialize_with = "as_sql_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "as_sql_text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "as_sql_text")]
    pub major: Option<String>,
    #[serde(default, deserialize_with = "as_sql_text")]
    pub school: Option<String>,
    #[serde(default, deserialize_with = "as_sql_text")]
    pub grade: Option<String>,
    #[serde(default, deserialize_with = "as_sql_text")]
    pub board: Option<String>,
    #[serde(default, deserialize_with = "as_sql_text")]
    pub passing_year: Option<String>,
}

fn as_sql_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

impl DataType for Student {
    type Id = i32;
    type FormForAdding = StudentForm;

    async fn get_all(conn: &mut PgConnection) -> RegistrarResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT student_id, first_name, last_name, major, school, grade, board, passing_year \
             FROM public.students ORDER BY student_id",
        )
        .fetch_all(conn)
        .await
        .context(ListStudentsSnafu)
    }

    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut PgConnection,
        expose_detail: bool,
    ) -> RegistrarResult<()> {
        let StudentForm {
            student_id,
            first_name,
            last_name,
            major,
            school,
            grade,
            board,
            passing_year,
        } = to_be_added;

        sqlx::query(
            "INSERT INTO public.students \
             (student_id, first_name, last_name, major, school, grade, board, passing_year) \
             VALUES ($1::integer, $2, $3, $4, $5, $6, $7, $8::integer)",
        )
        .bind(student_id)
        .bind(first_name)
        .bind(last_name)
        .bind(major)
        .bind(school)
        .bind(grade)
        .bind(board)
        .bind(passing_year)
        .execute(conn)
        .await
        .context(MakeQuerySnafu { expose_detail })?;
        Ok(())
    }

    async fn update_in_database(
        id: Self::Id,
        replacement: Self::FormForAdding,
        conn: &mut PgConnection,
        expose_detail: bool,
    ) -> RegistrarResult<bool> {
        let StudentForm {
            student_id,
            first_name,
            last_name,
            major,
            school,
            grade,
            board,
            passing_year,
        } = replacement;

        //the row is found by its old id, and may come out with a new one
        let result = sqlx::query(
            "UPDATE public.students SET student_id = $1::integer, first_name = $2, last_name = $3, \
             major = $4, school = $5, grade = $6, board = $7, passing_year = $8::integer \
             WHERE student_id = $9",
        )
        .bind(student_id)
        .bind(first_name)
        .bind(last_name)
        .bind(major)
        .bind(school)
        .bind(grade)
        .bind(board)
        .bind(passing_year)
        .bind(id)
        .execute(conn)
        .await
        .context(MakeQuerySnafu { expose_detail })?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_database(
        id: Self::Id,
        conn: &mut PgConnection,
        expose_detail: bool,
    ) -> RegistrarResult<bool> {
        let result = sqlx::query("DELETE FROM public.students WHERE student_id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu { expose_detail })?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn student_serialises_with_column_style_keys() {
        let student = Student {
            student_id: 101,
            first_name: Some("Ann".into()),
            last_name: None,
            major: None,
            school: None,
            grade: None,
            board: None,
            passing_year: Some(2021),
        };

        assert_eq!(
            serde_json::to_value(&student).unwrap(),
            json!({
                "StudentID": 101,
                "FirstName": "Ann",
                "LastName": null,
                "Major": null,
                "School": null,
                "Grade": null,
                "Board": null,
                "PassingYear": 2021,
            })
        );
    }

    #[test]
    fn partial_form_leaves_missing_fields_empty() {
        let form: StudentForm =
            serde_json::from_value(json!({ "StudentID": 101, "FirstName": "Ann" })).unwrap();

        assert_eq!(form.student_id.as_deref(), Some("101"));
        assert_eq!(form.first_name.as_deref(), Some("Ann"));
        assert!(form.last_name.is_none());
        assert!(form.passing_year.is_none());
    }

    #[test]
    fn form_keeps_any_scalar_for_the_database_to_judge() {
        let form: StudentForm = serde_json::from_value(json!({
            "StudentID": "101",
            "FirstName": null,
            "Grade": 9,
            "PassingYear": "2021",
            "Board": true,
        }))
        .unwrap();

        assert_eq!(form.student_id.as_deref(), Some("101"));
        assert!(form.first_name.is_none());
        assert_eq!(form.grade.as_deref(), Some("9"));
        assert_eq!(form.passing_year.as_deref(), Some("2021"));
        assert_eq!(form.board.as_deref(), Some("true"));
    }

    #[test]
    fn empty_form_is_accepted() {
        let form: StudentForm = serde_json::from_value(json!({})).unwrap();
        assert!(form.student_id.is_none());
    }

    #[test]
    fn schema_defines_students_table() {
        assert!(STUDENTS_SCHEMA.contains("public.students"));
        assert!(STUDENTS_SCHEMA.contains("student_id   INTEGER PRIMARY KEY"));
    }
}
