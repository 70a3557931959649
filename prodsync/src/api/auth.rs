//! Service-account authentication for Google APIs

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use std::path::Path;

/// Scopes needed to edit the workbook and to find it by name
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// Exchange a service-account key file for a bearer token.
///
/// The token is fetched once per sync session; sessions are far shorter than
/// the token lifetime.
pub async fn service_account_token(credentials_file: &Path) -> Result<String> {
    if !credentials_file.exists() {
        bail!(
            "Credentials file {} not found. Download a service-account key and share the workbook with its e-mail address.",
            credentials_file.display()
        );
    }

    let key = yup_oauth2::read_service_account_key(credentials_file)
        .await
        .with_context(|| {
            format!(
                "Failed to read service account key from {}",
                credentials_file.display()
            )
        })?;
    debug!("Loaded service account key for {}", key.client_email);

    let authenticator = yup_oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .context("Failed to build service account authenticator")?;

    let token = authenticator
        .token(SCOPES)
        .await
        .context("Failed to obtain access token for Google Sheets")?;

    token
        .token()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Google returned an access token response without a token"))
}
