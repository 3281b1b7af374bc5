use crate::{
    config::RuntimeConfiguration,
    error::{GetDatabaseConnectionSnafu, RegistrarResult},
};
use maud::{DOCTYPE, Markup, html};
use snafu::ResultExt;
use sqlx::{Connection, PgConnection, postgres::PgConnectOptions};
use std::sync::Arc;

/// Everything a handler needs: where the database lives and how loudly to
/// report its errors. Connections are opened per request, never pooled.
#[derive(Clone, Debug)]
pub struct RegistrarState {
    connect_options: Arc<PgConnectOptions>,
    expose_database_errors: bool,
}

impl RegistrarState {
    pub fn new(config: &RuntimeConfiguration) -> Self {
        Self::from_connect_options(
            config.db_config().connect_options(),
            config.expose_database_errors(),
        )
    }

    pub fn from_connect_options(
        connect_options: PgConnectOptions,
        expose_database_errors: bool,
    ) -> Self {
        Self {
            connect_options: Arc::new(connect_options),
            expose_database_errors,
        }
    }

    pub const fn expose_database_errors(&self) -> bool {
        self.expose_database_errors
    }

    #[allow(clippy::unused_self)] //in case self is ever needed :), and to allow direct html! usage
    pub fn render(&self, markup: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Registrar" }
                }
                body class="bg-gray-900 min-h-screen flex flex-col items-center justify-center text-white" {
                    (markup)
                }
            }
        }
    }

    pub async fn get_connection(&self) -> RegistrarResult<PgConnection> {
        PgConnection::connect_with(&self.connect_options)
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    /// Closes a request's connection. Failures are logged, not returned.
    #[allow(clippy::unused_self)]
    pub async fn release(&self, conn: PgConnection) {
        if let Err(e) = conn.close().await {
            warn!(?e, "Error closing db connection");
        }
    }
}
