use crate::{
    data::{DataType, student::Student},
    error::RegistrarResult,
    maud_conveniences::{optional, render_table},
    state::RegistrarState,
};
use axum::{extract::State, http::StatusCode};
use maud::{Markup, html};

pub async fn get_index_route(State(state): State<RegistrarState>) -> Markup {
    state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-5xl w-full flex flex-col space-y-4" {
            h1 class="text-2xl font-semibold mb-6 text-center" {
                "Student Records"
            }
            div id="all_students" hx-get="/internal/students" hx-trigger="load" {}
        }
    })
}

pub async fn internal_get_students(State(state): State<RegistrarState>) -> (StatusCode, Markup) {
    match load_students(&state).await {
        Ok(students) => (StatusCode::OK, students_table(students)),
        Err(e) => {
            error!(?e, "Unable to render students table");
            (e.status_code(), e.render_inline())
        }
    }
}

async fn load_students(state: &RegistrarState) -> RegistrarResult<Vec<Student>> {
    let mut conn = state.get_connection().await?;
    let students = Student::get_all(&mut conn).await;
    state.release(conn).await;
    students
}

fn students_table(students: Vec<Student>) -> Markup {
    let rows = students
        .into_iter()
        .map(|student| {
            [
                html! {(student.student_id)},
                optional(student.first_name.as_ref()),
                optional(student.last_name.as_ref()),
                optional(student.major.as_ref()),
                optional(student.school.as_ref()),
                optional(student.grade.as_ref()),
                optional(student.board.as_ref()),
                optional(student.passing_year.as_ref()),
            ]
        })
        .collect();

    render_table(
        "Students",
        [
            "ID",
            "First Name",
            "Last Name",
            "Major",
            "School",
            "Grade",
            "Board",
            "Passing Year",
        ],
        rows,
    )
}
