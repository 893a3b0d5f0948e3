//! Serialization and deserialization structures for Google OAuth credential files.
//! - `creds.json`: OAuth 2.0 client credentials from Google Cloud Console
//! - `token.json`: the cached OAuth token

use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use crate::utils;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Represents a file that we want to `Serialize`, `Deserialize`, and read from memory in-between
/// serializations and deserialization. Basically we are just holding the `path` and the `data`
/// here.
#[derive(Default, Debug, Clone)]
pub(super) struct File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    path: PathBuf,
    data: F,
}

impl<F> File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    /// Load data from a file and create a File instance
    pub(super) async fn load(path: impl Into<PathBuf>) -> Res<Self> {
        let path = path.into();
        let data: F = utils::deserialize(&path).await?;
        Ok(Self { path, data })
    }

    /// Create a File instance with the given path and data
    pub(super) fn new(path: impl Into<PathBuf>, data: F) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Save the current data to the file. Only the owner may read or write it.
    pub(super) async fn save(&self) -> Res<()> {
        let json =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize data to JSON")?;
        utils::write_private(&self.path, json).await
    }

    pub(super) fn data(&self) -> &F {
        &self.data
    }

    pub(super) fn data_mut(&mut self) -> &mut F {
        &mut self.data
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }
}

/// Represents the structure of the `creds.json` file downloaded from Google Cloud Console.
///
/// Desktop application credentials come wrapped in `installed`, web application credentials in
/// `web`. Either is accepted.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct SecretFile {
    #[serde(alias = "web")]
    installed: InstalledCredentials,
}

impl SecretFile {
    /// Loads the OAuth client credentials from `creds.json`.
    pub(crate) async fn load(path: &Path) -> Res<SecretFile> {
        utils::deserialize(path)
            .await
            .context("Unable to read the OAuth client credentials")
    }

    /// The redirect URI that the authorization code is sent to. Google lists the preferred one
    /// first.
    pub(super) fn redirect_uri(&self) -> &str {
        self.installed.redirect_uris.first()
    }

    pub(super) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(super) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(super) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(super) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

/// The actual OAuth credentials nested within the `creds.json` file.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct InstalledCredentials {
    client_id: String,
    client_secret: String,
    redirect_uris: RedirectUris,
    auth_uri: String,
    token_uri: String,
}

/// A non-empty list of redirect URIs.
#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl RedirectUris {
    fn first(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }
}

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if vec.is_empty() {
            return Err(D::Error::custom(
                "The OAuth client credentials have no redirect_uris. When creating the OAuth \
                client in Google Cloud Console, add at least one redirect URI such as \
                'http://localhost'",
            ));
        }
        Ok(RedirectUris(vec))
    }
}

/// This is how we save the token information that we receive from Google OAuth.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct TokenFile {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default, alias = "expires_at", skip_serializing_if = "Option::is_none")]
    expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    scopes: Vec<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenFile {
    pub(super) async fn load(p: impl AsRef<Path>) -> Res<File<Self>> {
        let file: File<Self> = File::load(p.as_ref())
            .await
            .context("Unable to deserialize the token JSON file")?;
        file.data().validate_scopes()?;
        Ok(file)
    }

    /// Tokens written before scopes were recorded carry no scopes and are accepted as-is.
    fn validate_scopes(&self) -> Res<()> {
        if self.scopes.is_empty() {
            return Ok(());
        }
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for &required_scope in OAUTH_SCOPES {
            if !found_scopes.contains(required_scope) {
                bail!("OAuth scope '{required_scope}' is missing.");
            }
        }
        Ok(())
    }

    pub(super) fn new(
        access_token: String,
        refresh_token: String,
        expiry: Option<DateTime<Utc>>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token,
            token_type: default_token_type(),
            refresh_token,
            expiry,
            scopes,
        }
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    #[cfg(test)]
    pub(super) fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Check if the token is expired or will expire soon (within 5 minutes). A token without an
    /// expiry never expires.
    pub(super) fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= Utc::now() + chrono::Duration::minutes(5),
            None => false,
        }
    }

    /// Update the token with new values
    pub(super) fn update(
        &mut self,
        access_token: String,
        expiry: Option<DateTime<Utc>>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expiry = expiry;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn load_secret(json: &str) -> Res<SecretFile> {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("creds.json");
        utils::write(&p, json).await.unwrap();
        SecretFile::load(&p).await
    }

    #[tokio::test]
    async fn test_client_secret_installed() {
        let secret_file = load_secret(
            r#"
{
    "installed": {
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": ["http://localhost", "https://example.com:4040/whatever"],
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }
}
"#,
        )
        .await
        .unwrap();
        assert_eq!("http://localhost", secret_file.redirect_uri());
        assert_eq!(
            "YOUR_CLIENT_ID.apps.googleusercontent.com",
            secret_file.client_id()
        );
        assert_eq!("YOUR_CLIENT_SECRET", secret_file.client_secret());
        assert_eq!(
            "https://accounts.google.com/o/oauth2/auth",
            secret_file.auth_uri()
        );
        assert_eq!("https://oauth2.googleapis.com/token", secret_file.token_uri());
    }

    #[tokio::test]
    async fn test_client_secret_web() {
        let secret_file = load_secret(
            r#"
{
    "web": {
        "client_id": "web-id",
        "client_secret": "web-secret",
        "redirect_uris": ["https://example.com/callback"],
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }
}
"#,
        )
        .await
        .unwrap();
        assert_eq!("web-id", secret_file.client_id());
        assert_eq!("https://example.com/callback", secret_file.redirect_uri());
    }

    #[tokio::test]
    async fn test_client_secret_no_redirects() {
        let parse_result = load_secret(
            r#"
{
    "installed": {
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": [],
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }
}
"#,
        )
        .await;
        let parse_error_message = format!("{:?}", parse_result.err().unwrap());
        assert!(parse_error_message.contains("have no redirect_uris"));
    }

    #[tokio::test]
    async fn test_validate_token_file_bad() {
        let json = r##"
        {
            "scopes": ["https://www.googleapis.com/auth/spreadsheets"],
            "access_token": "abc12",
            "refresh_token": "xyz89",
            "expiry": "2025-01-01T00:00:00Z"
        }
    "##;
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("token.json");
        utils::write(&json_path, json).await.unwrap();

        let error_message = TokenFile::load(&json_path).await.err().unwrap().to_string();
        assert!(error_message.contains("https://www.googleapis.com/auth/drive"));
    }

    #[tokio::test]
    async fn test_validate_token_file_good() {
        let json = r##"
        {
            "scopes": [
                "https://www.googleapis.com/auth/spreadsheets",
                "https://www.googleapis.com/auth/drive"
            ],
            "access_token": "abc12",
            "token_type": "Bearer",
            "refresh_token": "xyz89",
            "expiry": "2025-01-01T00:00:00Z"
        }
    "##;
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("token.json");
        utils::write(&json_path, json).await.unwrap();

        let file = TokenFile::load(&json_path).await.unwrap();
        assert_eq!("abc12", file.data().access_token());
        assert_eq!("xyz89", file.data().refresh_token());
        assert!(file.data().is_expired());
    }

    #[tokio::test]
    async fn test_token_file_without_scopes_or_expiry() {
        let json = r#"{"access_token": "abc12"}"#;
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("token.json");
        utils::write(&json_path, json).await.unwrap();

        let file = TokenFile::load(&json_path).await.unwrap();
        assert!(!file.data().is_expired());
        assert_eq!("", file.data().refresh_token());
    }

    #[tokio::test]
    async fn test_token_file_save_and_update() {
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("token.json");
        let expiry = Utc::now() + chrono::Duration::hours(1);
        let token = TokenFile::new(
            "access".to_string(),
            "refresh".to_string(),
            Some(expiry),
            OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
        );
        let mut file = File::new(&json_path, token);
        assert!(!file.data().is_expired());

        file.data_mut().update("access2".to_string(), None, None);
        file.save().await.unwrap();

        let loaded = TokenFile::load(file.path()).await.unwrap();
        assert_eq!("access2", loaded.data().access_token());
        assert_eq!("refresh", loaded.data().refresh_token());
        assert_eq!(None, loaded.data().expiry());
    }
}
