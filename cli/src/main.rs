// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quarry CLI
//!
//! Entry point for the `quarry` binary. Parses arguments, initializes
//! logging, and runs one of:
//!
//! - `keygen`: generate an identity (optionally writing a keyfile)
//! - `address`: print the address of an identity
//! - `balance`: native and token balance of an address
//! - `send`: build, sign and broadcast one transfer
//! - `grind`: rebuild until the signature matches, then broadcast once
//!
//! Results go to stdout (text, or JSON with `--json`). Logs go to stderr.

mod cli;
mod logging;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::signal;
use tokio::sync::watch;

use quarry_protocol::grind::{GrindOutcome, SignaturePattern, TransferRequest};
use quarry_protocol::network::{LedgerGateway, RpcGateway};
use quarry_protocol::session::{gateway_factory, Session};
use quarry_protocol::vault::{usdc, TokenDescriptor};
use quarry_protocol::{Identity, Network};

use cli::{AmountArgs, Commands, QuarryCli, SignerArgs};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = QuarryCli::parse();
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.log_format),
    );

    let json = cli.json;
    match cli.command {
        Commands::Keygen(args) => keygen(args.out.as_deref(), json),
        Commands::Address(args) => {
            let identity = load_identity(&args)?;
            emit(
                json,
                &AddressReport {
                    address: identity.address().to_string(),
                },
            )
        }
        Commands::Balance(args) => {
            let session = connect(cli.network, cli.rpc_url)?;
            balance(&session, &args.address, json).await
        }
        Commands::Send(args) => {
            let session = connect(cli.network, cli.rpc_url)?;
            let identity = load_identity(&args.signer)?;
            let request = transfer_request(args.to, &args.amount)?;
            send(&session, &identity, &request, args.dry_run, json).await
        }
        Commands::Grind(args) => {
            let session = connect(cli.network, cli.rpc_url)?.with_policy(args.policy());
            let identity = load_identity(&args.signer)?;
            let request = transfer_request(args.to, &args.amount)?;
            let pattern =
                SignaturePattern::new(args.position.into(), args.pattern, args.ignore_case)
                    .context("unusable pattern")?;
            grind(&session, &identity, &request, pattern, args.attempts, json).await
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn keygen(out: Option<&Path>, json: bool) -> Result<()> {
    let identity = Identity::create();

    if let Some(path) = out {
        std::fs::write(path, identity.to_json()?)
            .with_context(|| format!("failed to write keyfile to {}", path.display()))?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(
            address = %identity.address(),
            keyfile = %path.display(),
            "keyfile written"
        );
    }

    emit(
        json,
        &KeyReport {
            address: identity.address().to_string(),
            secret: identity.secret_base58().to_string(),
        },
    )
}

async fn balance(session: &Session, address: &str, json: bool) -> Result<()> {
    let native = session
        .native_balance(address)
        .await
        .context("native balance lookup failed")?;
    let token = session
        .token_balance(address)
        .await
        .context("token balance lookup failed")?;

    emit(
        json,
        &BalanceReport {
            address: address.to_string(),
            network: session.network(),
            native,
            token,
            token_info: usdc(session.network()).into(),
        },
    )
}

async fn send(
    session: &Session,
    identity: &Identity,
    request: &TransferRequest,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let signed = match request {
        TransferRequest::Native {
            recipient,
            lamports,
        } => {
            session
                .build_native_transfer(identity, recipient, *lamports)
                .await?
        }
        TransferRequest::Token { recipient, amount } => {
            session
                .build_token_transfer(identity, recipient, *amount)
                .await?
        }
    };

    let broadcast = if dry_run {
        tracing::info!(signature = %signed.signature, "dry run, not broadcasting");
        false
    } else {
        session
            .submit_if_accepted(&signed, |_| true)
            .await
            .context("broadcast failed")?
            .is_some()
    };

    emit(
        json,
        &SendReport {
            signature: signed.signature.to_string(),
            instructions: signed.instruction_count(),
            broadcast,
            transaction: dry_run.then(|| signed.to_base64()),
        },
    )
}

async fn grind(
    session: &Session,
    identity: &Identity,
    request: &TransferRequest,
    pattern: SignaturePattern,
    attempts: u32,
    json: bool,
) -> Result<()> {
    tracing::info!(
        %pattern,
        expected_attempts = pattern.expected_attempts(),
        budget = attempts,
        "grinding"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, stopping grind");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "no Ctrl+C handler, grind can't be interrupted cleanly");
                // A dropped sender stops the grind, so hold on to it.
                shutdown_tx.closed().await;
            }
        }
    });

    let description = pattern.to_string();
    let outcome = session
        .grind_with_shutdown(
            identity,
            request,
            pattern.into_predicate(),
            attempts,
            Some(shutdown_rx),
        )
        .await?;

    emit(json, &GrindReport::from(&outcome))?;
    if !outcome.is_accepted() {
        bail!(
            "no signature matched {} within {} attempts",
            description,
            outcome.attempts
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn connect(network: Network, rpc_url: Option<String>) -> Result<Session> {
    let session = match rpc_url {
        None => Session::connect(network)?,
        Some(url) => Session::with_factory(
            network,
            gateway_factory(move |n| {
                Ok(Arc::new(RpcGateway::with_url(n, url.clone())?) as Arc<dyn LedgerGateway>)
            }),
        )?,
    };
    tracing::debug!(%network, "session ready");
    Ok(session)
}

fn load_identity(args: &SignerArgs) -> Result<Identity> {
    if let Some(path) = &args.keyfile {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read keyfile {}", path.display()))?;
        return Identity::restore_from_json(&body)
            .with_context(|| format!("{} is not a keyfile", path.display()));
    }
    match &args.secret {
        Some(secret) => Identity::restore(secret).context("--secret is not a valid secret key"),
        None => bail!("no identity given, pass --secret or --keyfile"),
    }
}

fn transfer_request(to: String, amount: &AmountArgs) -> Result<TransferRequest> {
    match (amount.lamports, amount.token) {
        (Some(lamports), None) => Ok(TransferRequest::native(to, lamports)),
        (None, Some(tokens)) => Ok(TransferRequest::token(to, tokens)),
        _ => bail!("exactly one of --lamports or --token is required"),
    }
}

fn emit<T: Serialize + fmt::Display>(json: bool, report: &T) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AddressReport {
    address: String,
}

impl fmt::Display for AddressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

#[derive(Serialize)]
struct KeyReport {
    address: String,
    secret: String,
}

impl fmt::Display for KeyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Address : {}", self.address)?;
        write!(f, "Secret  : {}", self.secret)
    }
}

#[derive(Serialize)]
struct BalanceReport {
    address: String,
    network: Network,
    native: f64,
    token: f64,
    token_info: TokenDescriptor,
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Address : {} ({})", self.address, self.network)?;
        writeln!(f, "Native  : {}", self.native)?;
        write!(
            f,
            "{:<8}: {} (mint {})",
            self.token_info.symbol, self.token, self.token_info.mint
        )
    }
}

#[derive(Serialize)]
struct SendReport {
    signature: String,
    instructions: usize,
    broadcast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
}

impl fmt::Display for SendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Signature    : {}", self.signature)?;
        writeln!(f, "Instructions : {}", self.instructions)?;
        write!(f, "Broadcast    : {}", self.broadcast)?;
        if let Some(tx) = &self.transaction {
            write!(f, "\nTransaction  : {}", tx)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct GrindReport {
    state: String,
    signature: Option<String>,
    attempts: u32,
    transient_failures: u32,
    elapsed_ms: u128,
}

impl From<&GrindOutcome> for GrindReport {
    fn from(outcome: &GrindOutcome) -> Self {
        Self {
            state: outcome.state.to_string(),
            signature: outcome.signature.map(|s| s.to_string()),
            attempts: outcome.attempts,
            transient_failures: outcome.transient_failures,
            elapsed_ms: outcome.elapsed.as_millis(),
        }
    }
}

impl fmt::Display for GrindReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State     : {}", self.state)?;
        writeln!(
            f,
            "Signature : {}",
            self.signature.as_deref().unwrap_or("-")
        )?;
        writeln!(
            f,
            "Attempts  : {} ({} transient failures)",
            self.attempts, self.transient_failures
        )?;
        write!(f, "Elapsed   : {} ms", self.elapsed_ms)
    }
}
