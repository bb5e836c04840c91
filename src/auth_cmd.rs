//! `folio auth`: sign in once and reuse the token, or revoke it.

use anyhow::{bail, Result};
use tracing::info;

use crate::auth::{AuthGate, EnvToken, UserInfoClient, ACCESS_TOKEN_ENV};
use crate::config::Config;
use crate::drive_http::HttpDrive;
use crate::http::HttpPolicy;
use crate::upload_cmd::sign_in;

pub async fn run_login(config: &Config, print_token: bool) -> Result<()> {
    let credentials = config.drive.credentials()?;
    let http = HttpPolicy::new(&config.http)?;
    let session = sign_in(config, &http, credentials).await?;
    if let Some(device) = &session.device {
        println!("Device: {} on {} ({})", device.platform, device.os, device.location);
    }
    if print_token {
        println!("export {}={}", ACCESS_TOKEN_ENV, session.access_token);
    }
    Ok(())
}

/// Revoke the token in `FOLIO_ACCESS_TOKEN`.
pub async fn run_logout(config: &Config) -> Result<()> {
    let http = HttpPolicy::new(&config.http)?;
    let userinfo = UserInfoClient::new(http);
    let mut gate = AuthGate::new();
    if gate.authenticate(&EnvToken, &userinfo).await?.is_none() {
        bail!("{} is not set; nothing to revoke", ACCESS_TOKEN_ENV);
    }
    gate.logout::<HttpDrive>(&userinfo, None).await;
    info!("token revoked");
    println!("Signed out. Unset {} in your shell.", ACCESS_TOKEN_ENV);
    Ok(())
}
