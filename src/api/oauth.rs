//! OAuth 2.0 for the Google Sheets and Drive APIs.
//!
//! On the first run there is no `token.json`. We print the Google consent URL, the user visits it,
//! approves access and pastes the authorization code back into the terminal. The code is exchanged
//! for an access token and a refresh token, which are cached in `token.json`. On later runs the
//! cached token is used, and refreshed when it is about to expire.

use crate::api::files::{File, SecretFile, TokenFile};
use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use anyhow::{bail, Context};
use chrono::Utc;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Holds the cached token and knows how to refresh it.
pub(crate) struct TokenProvider {
    client: OAuthClient,
    http: reqwest::Client,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Loads the cached token from `token_path`. If there is no usable cached token, runs the
    /// interactive authorization flow on the terminal and caches the result.
    pub(crate) async fn load_or_authorize(secret: &SecretFile, token_path: &Path) -> Res<Self> {
        let client = oauth_client(secret)?;
        let http = http_client()?;

        let token = match TokenFile::load(token_path).await {
            Ok(token) => token,
            Err(e) => {
                debug!("No usable cached token: {e:#}");
                let stdin = BufReader::new(tokio::io::stdin());
                let token = authorize(&client, &http, stdin).await?;
                let file = File::new(token_path, token);
                println!("Saving credential file to: {}", token_path.display());
                file.save().await.context("Unable to cache the OAuth token")?;
                file
            }
        };

        Ok(Self {
            client,
            http,
            token,
        })
    }

    /// Returns the current access token without refreshing it.
    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }

    /// Returns an access token, refreshing and re-caching it first if it has expired.
    pub(crate) async fn token_with_refresh(&mut self) -> Res<&str> {
        if self.token.data().is_expired() {
            self.refresh().await?;
        }
        Ok(self.token())
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        let refresh_token = self.token.data().refresh_token().to_string();
        if refresh_token.is_empty() {
            bail!(
                "The cached OAuth token has expired and has no refresh token. Delete {} and run \
                again to re-authorize.",
                self.token.path().display()
            );
        }

        debug!("Refreshing the OAuth access token");
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(&self.http)
            .await
            .context("Unable to refresh the OAuth token")?;

        let expiry = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        self.token.data_mut().update(
            response.access_token().secret().to_string(),
            expiry,
            response.refresh_token().map(|t| t.secret().to_string()),
        );
        self.token
            .save()
            .await
            .context("Unable to cache the refreshed OAuth token")?;
        debug!("OAuth token refreshed");
        Ok(())
    }
}

fn oauth_client(secret: &SecretFile) -> Res<OAuthClient> {
    let client = BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?)
        .set_redirect_uri(
            RedirectUrl::new(secret.redirect_uri().to_string()).context("Invalid redirect URI")?,
        );
    Ok(client)
}

fn http_client() -> Res<reqwest::Client> {
    // The token endpoint must not be allowed to redirect us elsewhere.
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to create the HTTP client")
}

/// Builds the URL that the user visits to grant access. Offline access is requested so that Google
/// issues a refresh token.
fn authorization_url(client: &OAuthClient) -> String {
    let (url, _state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new(s.to_string())))
        .add_extra_param("access_type", "offline")
        .url();
    url.to_string()
}

/// Runs the interactive flow: print the consent URL, read the code from `input`, exchange it.
async fn authorize<R>(client: &OAuthClient, http: &reqwest::Client, input: R) -> Res<TokenFile>
where
    R: AsyncBufRead + Unpin,
{
    println!(
        "Go to the following link in your browser then type the authorization code: \n{}",
        authorization_url(client)
    );

    let code = read_code(input)
        .await
        .context("Unable to read authorization code")?;

    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(http)
        .await
        .context("Unable to retrieve token from web")?;

    let expiry = response
        .expires_in()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .map(|d| Utc::now() + d);
    let scopes = match response.scopes() {
        Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
        None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
    };
    info!("Authorization successful");
    Ok(TokenFile::new(
        response.access_token().secret().to_string(),
        response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .unwrap_or_default(),
        expiry,
        scopes,
    ))
}

/// Reads the first whitespace-delimited word from `input`, skipping blank lines.
async fn read_code<R>(input: R) -> Res<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(code) = line.split_whitespace().next() {
            return Ok(code.to_string());
        }
    }
    bail!("Reached the end of input before an authorization code was entered")
}
