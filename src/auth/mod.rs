//! Authentication against the Talk to Refugee backend
//!
//! E-mail/password sign-in returns a bearer token, which is stored in the
//! config file and attached to every later request.

pub mod tokens;

use anyhow::Result;
use thiserror::Error;

pub use tokens::{StoredToken, TokenStore};

use crate::api::client::T2rClient;
use crate::api::sign_in_data;
use crate::config::Config;
use crate::models::SignInResponse;
use crate::validation::{self, ValidationError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// Every backend failure is reported the same way; details go to the debug log.
    #[error("Invalid credentials.")]
    InvalidCredentials,
}

/// Validate, then exchange credentials for a token.
pub async fn sign_in(
    client: &T2rClient,
    email: &str,
    password: &str,
) -> Result<SignInResponse, AuthError> {
    validation::validate_sign_in(email, password)?;
    match sign_in_data(client, email, password).await {
        Ok(resp) if !resp.access_token.is_empty() => Ok(resp),
        Ok(_) => {
            tracing::debug!("Sign-in response carried an empty token");
            Err(AuthError::InvalidCredentials)
        }
        Err(e) => {
            tracing::debug!("Sign-in failed: {:#}", e);
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Sign in and store the token.
pub async fn login(email: &str, password: &str, force: bool) -> Result<()> {
    let mut config = Config::load()?;

    if !force {
        if let Some(token) = config.get_access_token() {
            if !token.is_expired() {
                println!("Already signed in. Use --force to sign in again.");
                return Ok(());
            }
            tracing::info!("Stored token expired, signing in again");
        }
    }

    let client = T2rClient::anonymous(&config)?;
    let resp = sign_in(&client, email, password).await?;
    config.set_access_token(resp.access_token, resp.expires_in);
    config.save()?;

    println!("Signed in as {}.", email);
    Ok(())
}

pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_tokens();
    config.save()?;
    println!("Signed out.");
    Ok(())
}

/// Display current auth status
pub async fn status() -> Result<()> {
    let config = Config::load()?;
    println!("Backend:     {}", config.api_url);
    println!("Push:        {}", config.ws_url);

    match config.get_access_token() {
        Some(token) if !token.is_expired() => {
            println!("Token:       valid");
            if let Some(secs) = token.remaining_secs() {
                println!("  expires in: {}m", secs / 60);
            }
            if let Some(sub) = token.subject() {
                println!("  subject:    {}", sub);
            }
        }
        Some(_) => println!("Token:       expired (run 't2r-cli login')"),
        None => println!("Token:       none (run 't2r-cli login')"),
    }

    Ok(())
}
