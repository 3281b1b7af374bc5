//! Connectivity smoke-test for the database the service talks to.
//!
//! The probe resolves a target from flags, then `MSSQL_*` environment variables, then
//! defaults. It prints the connection string with its password masked, connects, and runs
//! a few read/write checks. Each way of failing maps onto its own exit code so calling
//! scripts can branch without parsing output.

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use snafu::{Report, ResultExt, Snafu, ensure};
use sqlx::{Connection, PgConnection, postgres::PgConnectOptions};
use std::{io::Write, time::Duration};

pub const DEFAULT_DRIVER: &str = "postgres";
pub const DEFAULT_SERVER: &str = "localhost";
pub const DEFAULT_DATABASE: &str = "master";
pub const DEFAULT_PORT: u16 = 5432;
pub const PASSWORD_PLACEHOLDER: &str = "****";

const SUPPORTED_DRIVERS: &[&str] = &["postgres", "postgresql"];
const PROBE_VALUE: &str = "hello";

#[derive(Parser, Debug, Clone)]
#[command(name = "registrar-probe")]
#[command(about = "Database connectivity smoke-test")]
pub struct ProbeArgs {
    /// Database host, optionally as `host:port` (default: localhost).
    #[arg(long)]
    pub server: Option<String>,
    /// Database to use (default: master).
    #[arg(long)]
    pub database: Option<String>,
    /// Database driver (default: postgres).
    #[arg(long)]
    pub driver: Option<String>,
    /// Username, use with --pwd.
    #[arg(long)]
    pub uid: Option<String>,
    /// Password, use with --uid.
    #[arg(long)]
    pub pwd: Option<String>,
    /// Authenticate as the operating-system user instead of with credentials.
    #[arg(long)]
    pub trusted: bool,
    /// Connection timeout in seconds, 0 to wait indefinitely.
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProbeError {
    #[snafu(display(
        "Database driver `{}` is not available, supported drivers: {}",
        driver,
        SUPPORTED_DRIVERS.join(", ")
    ))]
    MissingDriver { driver: String },
    #[snafu(display(
        "No credentials provided. Provide --uid/--pwd or use --trusted for \
         operating-system authentication."
    ))]
    MissingCredentials,
    #[snafu(display("Unable to connect"))]
    Connect { source: sqlx::Error },
    #[snafu(display("Timed out connecting after {}s", seconds))]
    ConnectTimeout {
        source: tokio::time::error::Elapsed,
        seconds: u64,
    },
    #[snafu(display("Error running the {} check", check))]
    RunCheck {
        source: sqlx::Error,
        check: &'static str,
    },
    #[snafu(display("Temp table returned unexpected value: {}", found))]
    UnexpectedValue { found: String },
    #[snafu(display("Unable to write probe output"))]
    WriteOutput { source: std::io::Error },
}

impl ProbeError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Connect { .. } | Self::ConnectTimeout { .. } => 1,
            Self::MissingCredentials => 2,
            Self::RunCheck { .. } | Self::UnexpectedValue { .. } | Self::WriteOutput { .. } => 3,
            Self::MissingDriver { .. } => 4,
        }
    }

    /// Operator-facing line for stderr, including the underlying driver error.
    pub fn describe(&self) -> String {
        match self {
            Self::MissingDriver { .. } | Self::MissingCredentials => self.to_string(),
            Self::Connect { .. } | Self::ConnectTimeout { .. } => {
                format!("Connection failed: {}", Report::from_error(self))
            }
            Self::RunCheck { .. } | Self::UnexpectedValue { .. } | Self::WriteOutput { .. } => {
                format!("Test failed: {}", Report::from_error(self))
            }
        }
    }
}

#[derive(Debug)]
pub enum Auth {
    Trusted,
    Credentials { uid: String, pwd: SecretString },
}

#[derive(Debug)]
pub struct ProbeTarget {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub auth: Auth,
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn split_server(server: &str) -> (String, u16) {
    match server.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (server.to_string(), DEFAULT_PORT),
        },
        _ => (server.to_string(), DEFAULT_PORT),
    }
}

impl ProbeTarget {
    /// `env` looks up an environment variable; blank values count as unset.
    pub fn resolve(
        args: &ProbeArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProbeError> {
        let pick = |flag: &Option<String>, name: &str| {
            flag.clone()
                .filter(|value| !value.is_empty())
                .or_else(|| env(name).filter(|value| !value.is_empty()))
        };

        let driver =
            pick(&args.driver, "MSSQL_DRIVER").unwrap_or_else(|| DEFAULT_DRIVER.to_string());
        ensure!(
            SUPPORTED_DRIVERS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(driver.trim())),
            MissingDriverSnafu { driver }
        );

        let server =
            pick(&args.server, "MSSQL_SERVER").unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let (host, port) = split_server(&server);
        let database =
            pick(&args.database, "MSSQL_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let trusted = args.trusted || env("MSSQL_TRUSTED").is_some_and(|raw| is_truthy(&raw));
        let auth = if trusted {
            Auth::Trusted
        } else {
            match (pick(&args.uid, "MSSQL_UID"), pick(&args.pwd, "MSSQL_PWD")) {
                (Some(uid), Some(pwd)) => Auth::Credentials {
                    uid,
                    pwd: SecretString::from(pwd),
                },
                _ => return MissingCredentialsSnafu.fail(),
            }
        };

        Ok(Self {
            driver,
            host,
            port,
            database,
            auth,
        })
    }

    pub fn connection_string(&self) -> SecretString {
        let base = format!(
            "driver={{{}}};host={};port={};dbname={}",
            self.driver, self.host, self.port, self.database
        );

        let full = match &self.auth {
            Auth::Trusted => format!("{base};trusted_connection=yes"),
            Auth::Credentials { uid, pwd } => {
                format!("{base};user={uid};password={}", pwd.expose_secret())
            }
        };
        SecretString::from(full)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database);

        //trusted leaves the username to libpq-style defaults: $PGUSER, then the OS user
        match &self.auth {
            Auth::Trusted => options,
            Auth::Credentials { uid, pwd } => {
                options.username(uid).password(pwd.expose_secret())
            }
        }
    }
}

pub fn mask_connection_string(connection_string: &str) -> String {
    connection_string
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, _))
                if key.trim().eq_ignore_ascii_case("password")
                    || key.trim().eq_ignore_ascii_case("pwd") =>
            {
                format!("{key}={PASSWORD_PLACEHOLDER}")
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

async fn run_basic_checks(
    conn: &mut PgConnection,
    out: &mut impl Write,
) -> Result<(), ProbeError> {
    let version: String = sqlx::query_scalar("SELECT version()")
        .fetch_one(&mut *conn)
        .await
        .context(RunCheckSnafu { check: "server version" })?;
    writeln!(out, "Server version: {version}").context(WriteOutputSnafu)?;

    let database: String = sqlx::query_scalar("SELECT current_database()")
        .fetch_one(&mut *conn)
        .await
        .context(RunCheckSnafu { check: "current database" })?;
    writeln!(out, "Connected database: {database}").context(WriteOutputSnafu)?;

    sqlx::query("CREATE TEMPORARY TABLE tmp_probe (id INTEGER PRIMARY KEY, val TEXT)")
        .execute(&mut *conn)
        .await
        .context(RunCheckSnafu { check: "temp table create" })?;
    sqlx::query("INSERT INTO tmp_probe (id, val) VALUES (1, $1)")
        .bind(PROBE_VALUE)
        .execute(&mut *conn)
        .await
        .context(RunCheckSnafu { check: "temp table insert" })?;
    let val: Option<String> = sqlx::query_scalar("SELECT val FROM tmp_probe WHERE id = 1")
        .fetch_one(&mut *conn)
        .await
        .context(RunCheckSnafu { check: "temp table select" })?;
    ensure!(
        val.as_deref() == Some(PROBE_VALUE),
        UnexpectedValueSnafu {
            found: format!("{val:?}")
        }
    );
    sqlx::query("DROP TABLE tmp_probe")
        .execute(&mut *conn)
        .await
        .context(RunCheckSnafu { check: "temp table drop" })?;

    writeln!(out, "Basic CRUD checks passed.").context(WriteOutputSnafu)?;
    Ok(())
}

/// Runs the whole probe, writing progress to `out`. The error decides the exit code.
pub async fn run(
    args: &ProbeArgs,
    env: impl Fn(&str) -> Option<String>,
    out: &mut impl Write,
) -> Result<(), ProbeError> {
    let target = ProbeTarget::resolve(args, env)?;

    writeln!(
        out,
        "Using connection string (masked): {}",
        mask_connection_string(target.connection_string().expose_secret())
    )
    .context(WriteOutputSnafu)?;

    debug!(timeout = args.timeout, host = %target.host, port = target.port, "Connecting");
    let options = target.connect_options();
    let connecting = PgConnection::connect_with(&options);
    //a zero timeout means wait for as long as the driver does
    let connected = match args.timeout {
        0 => connecting.await,
        seconds => tokio::time::timeout(Duration::from_secs(seconds), connecting)
            .await
            .context(ConnectTimeoutSnafu { seconds })?,
    };
    let mut conn = connected.context(ConnectSnafu)?;

    let checked = run_basic_checks(&mut conn, out).await;
    if let Err(e) = conn.close().await {
        warn!(?e, "Error closing probe connection");
    }
    checked?;

    writeln!(out, "All checks passed.").context(WriteOutputSnafu)?;
    Ok(())
}
