use crate::error::RegistrarResult;
use sqlx::PgConnection;

pub mod student;

/// A table the API exposes. Every method runs exactly one statement on the
/// connection it is handed.
pub trait DataType: Sized {
    type Id;
    type FormForAdding;

    async fn get_all(conn: &mut PgConnection) -> RegistrarResult<Vec<Self>>;
    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut PgConnection,
        expose_detail: bool,
    ) -> RegistrarResult<()>;
    /// Returns `false` when nothing matched `id`.
    async fn update_in_database(
        id: Self::Id,
        replacement: Self::FormForAdding,
        conn: &mut PgConnection,
        expose_detail: bool,
    ) -> RegistrarResult<bool>;
    /// Returns `false` when nothing matched `id`.
    async fn remove_from_database(
        id: Self::Id,
        conn: &mut PgConnection,
        expose_detail: bool,
    ) -> RegistrarResult<bool>;
}
