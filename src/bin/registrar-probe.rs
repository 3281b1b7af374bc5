use clap::Parser;
use registrar::probe::{ProbeArgs, run};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    //the probe is happy to run on flags alone
    let _ = dotenvy::dotenv();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    let args = ProbeArgs::parse();
    let mut stdout = std::io::stdout();

    match run(&args, |name| dotenvy::var(name).ok(), &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(?e, "Probe failed");
            eprintln!("{}", e.describe());
            ExitCode::from(e.exit_code())
        }
    }
}
