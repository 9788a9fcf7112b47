//! Tally API Client - Command-line entry point
//!
//! Loads settings, wires the reqwest transport and the file-backed
//! credential storage into an `ApiClient`, and runs one subcommand.

mod cli;

use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tally_application::{ApiClient, ClientPorts};
use tally_domain::{ApiRequest, ClassifiedError};
use tally_infrastructure::{
    FileCredentialStorage, HintNavigator, ReqwestTransport, Settings, SystemClock, TracingNotifier,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = build_client(&settings)?;
    client.register_failure_observer(|| {
        tracing::warn!("Stored session is no longer valid");
    });

    match cli.command {
        Command::SignIn { username, password } => {
            let user = client.sign_in(&username, &password).await.map_err(report)?;
            print_json(&user)?;
        }
        Command::SignOut => client.sign_out().await,
        Command::Whoami => match client.restore().await {
            Some(user) => print_json(&user)?,
            None => println!("{}", client.state()),
        },
        Command::Request { method, path, body } => {
            let mut request = ApiRequest::new(method, path);
            if let Some(body) = body {
                request = request.with_body(serde_json::from_str(&body)?);
            }
            let payload: Value = client.execute(request).await.map_err(report)?;
            print_json(&payload)?;
        }
    }

    Ok(())
}

fn build_client(settings: &Settings) -> Result<ApiClient, Box<dyn std::error::Error>> {
    let config = settings.client.clone();
    let transport = ReqwestTransport::new(config.request_timeout())?;
    let storage = FileCredentialStorage::new(settings.credential_path()?);
    tracing::debug!(
        base_url = %config.base_url,
        storage = %storage.path().display(),
        "Building client"
    );

    Ok(ApiClient::new(
        config,
        ClientPorts {
            transport: Arc::new(transport),
            storage: Arc::new(storage),
            clock: Arc::new(SystemClock::new()),
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(HintNavigator::new(
                "Session expired, run `tally sign-in` to continue",
            )),
        },
    ))
}

fn report(error: ClassifiedError) -> ClassifiedError {
    tracing::error!(kind = error.kind().title(), "{error}");
    error
}

fn print_json(value: &Value) -> Result<(), serde_json::Error> {
    if !value.is_null() {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}
