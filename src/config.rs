use crate::error::{BadEnvVarSnafu, ParseFlagSnafu, ParsePortSnafu, RegistrarResult};
use dotenvy::var;
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use sqlx::postgres::PgConnectOptions;
use std::sync::Arc;

pub const DEFAULT_SERVER_IP: &str = "127.0.0.1:5000";

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    db_config: Arc<DbConfig>,
    server_ip: String,
    expose_database_errors: bool,
}

impl RuntimeConfiguration {
    pub fn new() -> RegistrarResult<Self> {
        let server_ip =
            var("REGISTRAR_SERVER_IP").unwrap_or_else(|_| DEFAULT_SERVER_IP.to_string());
        let expose_database_errors = match var("REGISTRAR_EXPOSE_DB_ERRORS") {
            Ok(raw) => raw.trim().to_ascii_lowercase().parse().context(ParseFlagSnafu {
                name: "REGISTRAR_EXPOSE_DB_ERRORS",
            })?,
            Err(_) => true,
        };

        Ok(Self {
            db_config: Arc::new(DbConfig::new()?),
            server_ip,
            expose_database_errors,
        })
    }

    pub fn db_config(&self) -> Arc<DbConfig> {
        self.db_config.clone()
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }

    pub const fn expose_database_errors(&self) -> bool {
        self.expose_database_errors
    }
}

#[derive(Debug)]
pub struct DbConfig {
    user: String,
    password: SecretString,
    path: String,
    port: u16,
    database: String,
}

impl DbConfig {
    pub fn new() -> RegistrarResult<Self> {
        let get_env_var = |name| var(name).context(BadEnvVarSnafu { name });

        Ok(Self {
            user: get_env_var("DB_USER")?,
            password: SecretString::from(get_env_var("DB_PASSWORD")?),
            path: get_env_var("DB_PATH")?,
            port: get_env_var("DB_PORT")?.parse().context(ParsePortSnafu)?,
            database: get_env_var("DB_NAME")?,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.path)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.database)
    }

    /// Only for logs: the password never leaves the `SecretString`.
    pub fn masked_db_path(&self) -> String {
        format!(
            "postgres://{}:****@{}:{}/{}",
            self.user, self.path, self.port, self.database
        )
    }
}
