use clap::Parser;
use serde_json::json;

use sealed_session::config::constants::{CSRF_HEADER_NAME, SESSION_COOKIE_NAME};
use sealed_session::config::{Command, CoreArgs, CoreConfig};
use sealed_session::protocol::{Credentials, CredentialsRequest};
use sealed_session::utils::logging::{init_file_logging, init_logging};
use sealed_session::{ClientHandshake, SecurityCore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = CoreArgs::parse();

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = match &args.log_file {
        Some(file) => Some(init_file_logging(&args.log_level, file)?),
        None => {
            init_logging(&args.log_level)?;
            None
        }
    };

    tracing::info!("sealed-session version: {}", env!("CARGO_PKG_VERSION"));

    let config = CoreConfig::from_args(&args)?;

    match &args.command {
        Command::Params => {
            let core = SecurityCore::new(config)?;
            let response = core.auth().init_exchange()?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::SelfCheck { username, password } => {
            self_check(config, username, password).await?;
        }
    }

    Ok(())
}

/// Walk a demo user through the sealed channel, sessions and CSRF guard
async fn self_check(config: CoreConfig, username: &str, password: &str) -> anyhow::Result<()> {
    let core = SecurityCore::new(config)?;
    core.start().await?;
    let auth = core.auth();

    let handshake = ClientHandshake::from_response(&auth.init_exchange()?)?;
    let sealed = handshake.seal_credentials(&Credentials::new(username, password))?;
    let registered = auth.register(&CredentialsRequest::Sealed(sealed)).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&registered.to_response("Registration successful"))?
    );

    let handshake = ClientHandshake::from_response(&auth.init_exchange()?)?;
    let sealed = handshake.seal_credentials(&Credentials::new(username, password))?;
    let outcome = auth.login(&CredentialsRequest::Sealed(sealed)).await?;
    println!("{}={}", SESSION_COOKIE_NAME, outcome.cookie);

    let user = auth.guard("POST", Some(&outcome.cookie), Some(&outcome.csrf_token))?;
    tracing::info!("State-changing request admitted for user {}", user.id);

    match auth.guard("POST", Some(&outcome.cookie), Some(&outcome.csrf_token)) {
        Err(e) => tracing::info!("Replayed {} rejected: {}", CSRF_HEADER_NAME, e),
        Ok(_) => anyhow::bail!("replayed CSRF token was accepted"),
    }

    // Server-to-client sealing under a fresh exchange
    let handshake = ClientHandshake::from_response(&auth.init_exchange()?)?;
    let request = handshake.seal_json(&json!({ "action": "whoami" }))?;
    let opened = auth.open_sealed(&request)?;
    let reply = opened.cipher.seal(serde_json::to_string(&user.username)?.as_bytes())?;
    let echoed = handshake.open_response(&reply.to_payload())?;
    println!("sealed reply: {}", String::from_utf8_lossy(&echoed));

    auth.logout(Some(&outcome.cookie));
    let report = core.sweep_once();
    tracing::info!("Final sweep removed {} rows", report.total());

    core.shutdown().await?;
    println!("self-check passed");
    Ok(())
}
