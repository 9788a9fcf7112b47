//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_domain::HttpMethod;

/// Session-aware client for the Tally API.
#[derive(Parser, Debug)]
#[command(name = "tally", version, about)]
pub struct Cli {
    /// Settings file (TOML). Defaults to the platform config directory.
    #[arg(long, env = "TALLY_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Exchange username and password for a session.
    SignIn {
        /// Account name
        #[arg(long, env = "TALLY_USERNAME")]
        username: String,
        /// Account password
        #[arg(long, env = "TALLY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Revoke and forget the stored session.
    SignOut,
    /// Resume the stored session and print the signed-in user.
    Whoami,
    /// Send one request to the API and print the JSON payload.
    Request {
        /// GET, POST, PUT, PATCH, DELETE or HEAD
        method: HttpMethod,
        /// Path and query, e.g. `/transactions?limit=15`
        path: String,
        /// JSON body
        #[arg(long)]
        body: Option<String>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_request() {
        let cli = Cli::try_parse_from([
            "tally",
            "request",
            "post",
            "/transactions",
            "--body",
            r#"{"amount":5}"#,
        ])
        .unwrap();

        match cli.command {
            Command::Request { method, path, body } => {
                assert_eq!(method, HttpMethod::Post);
                assert_eq!(path, "/transactions");
                assert_eq!(body.as_deref(), Some(r#"{"amount":5}"#));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
