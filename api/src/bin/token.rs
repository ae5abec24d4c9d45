//! Mint a bearer token for development.
//!
//! Reads the same `BRANDBOARD_*` environment as the server so the token is
//! signed with its secret and audience.

use std::time::Duration;

use brandboard_api::server::{Config, JWTContext};
use clap::Parser;
use humantime_serde::re::humantime;

#[derive(Debug, Parser)]
#[command(about = "Mint a bearer token for a Brandboard user")]
struct Args {
    /// User the token is issued to.
    user_id: String,
    /// Lifetime of the token, e.g. `30m` or `7days`. Defaults to the configured timeout.
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(timeout) = args.timeout {
        config.token_timeout = timeout;
    }
    if config.has_insecure_secret() {
        eprintln!("warning: signing with the default secret");
    }

    let (token, claims) = JWTContext::new(&config).encode(&args.user_id)?;
    eprintln!(
        "valid until {}",
        humantime::format_rfc3339_seconds(claims.valid_until())
    );
    println!("{token}");

    Ok(())
}
