//! # Token Subcommand
//!
//! Issues and verifies the bearer session tokens the API accepts. The
//! signing key is derived from the same secret the service reads from
//! `SESSION_SECRET`, so a token issued here verifies there.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use fwd_core::{Role, SessionClaims, SessionSigner, Timestamp, UserId};

/// Default token lifetime: 12 hours.
const DEFAULT_TTL_SECS: i64 = 12 * 60 * 60;

/// Arguments for `fwd token`.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Issue a signed session token.
    Issue {
        /// Signing secret (the service's SESSION_SECRET).
        #[arg(long)]
        secret: String,
        /// User id (UUID).
        #[arg(long)]
        user_id: String,
        /// Display name.
        #[arg(long)]
        name: String,
        /// STAFF, MANAGER or ADMIN.
        #[arg(long)]
        role: String,
        /// Lifetime in seconds.
        #[arg(long, default_value_t = DEFAULT_TTL_SECS)]
        ttl_secs: i64,
    },

    /// Verify a token and print its claims.
    Verify {
        /// Signing secret (the service's SESSION_SECRET).
        #[arg(long)]
        secret: String,
        /// The token (`v1.<claims>.<signature>`).
        #[arg(value_name = "TOKEN")]
        token: String,
    },
}

/// Execute `fwd token`.
pub fn run_token(args: &TokenArgs) -> Result<u8> {
    match &args.command {
        TokenCommand::Issue {
            secret,
            user_id,
            name,
            role,
            ttl_secs,
        } => {
            let token = issue(secret, user_id, name, role, *ttl_secs, Timestamp::now())?;
            println!("{token}");
            Ok(0)
        }
        TokenCommand::Verify { secret, token } => {
            let claims = verify(secret, token, Timestamp::now())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&claims).context("failed to serialize claims")?
            );
            Ok(0)
        }
    }
}

/// Sign a token for the given user.
pub fn issue(
    secret: &str,
    user_id: &str,
    name: &str,
    role: &str,
    ttl_secs: i64,
    now: Timestamp,
) -> Result<String> {
    anyhow::ensure!(!secret.is_empty(), "secret must not be empty");
    anyhow::ensure!(ttl_secs > 0, "ttl must be positive, got {ttl_secs}");
    let user: UserId = user_id
        .parse()
        .with_context(|| format!("invalid user id: {user_id}"))?;
    let role: Role = role.parse()?;

    let claims = SessionClaims::new(user, name, role, now, ttl_secs);
    let token = SessionSigner::from_secret(secret).issue(&claims)?;
    tracing::info!(user_id = %user, role = %role, exp = claims.exp, "session token issued");
    Ok(token)
}

/// Verify `token` against `secret` at `now`.
pub fn verify(secret: &str, token: &str, now: Timestamp) -> Result<SessionClaims> {
    SessionSigner::from_secret(secret)
        .verify(token, now)
        .context("token rejected")
}
