//! Configuration file handling for the budget reporter.
//!
//! The configuration file is stored at `$HOME_DIR/config/config.json` and holds the Mint account
//! email, whether to run against the local test fixture, and the (currently unused) ignore list.
//! The OAuth client credentials live next to it in `config/creds.json`, and the cached OAuth token
//! is kept at `$HOME_DIR/token.json`.

use crate::error::Res;
use crate::model::Schema;
use crate::utils;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";
const CONFIG_JSON: &str = "config.json";
const CREDS_JSON: &str = "creds.json";
const TOKEN_JSON: &str = "token.json";
const TEST_JSON: &str = "test.json";

/// The budget report template that is copied at the start of every run.
pub const DEFAULT_TEMPLATE_ID: &str = "1ZEOkPYJtFnNoNa6fruTghp45q7A5UCUL2eeqGB3kLMU";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the home directory and from there it loads `config/config.json`. It provides paths to the other
/// files that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_file: ConfigFile,
    template_id: String,
}

impl Config {
    /// This will
    /// - validate that `home` exists and that the config file exists
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Res<Self> {
        let root = home.into();
        if !root.is_dir() {
            bail!("The home directory is missing '{}'", root.display())
        }

        let config_path = root.join(CONFIG_DIR).join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let template_id = match config_file.template_id.as_deref() {
            Some(template) => extract_spreadsheet_id(template)
                .context("Failed to extract the template ID from template_id")?
                .to_string(),
            None => DEFAULT_TEMPLATE_ID.to_string(),
        };

        Ok(Self {
            root,
            config_file,
            template_id,
        })
    }

    /// The Mint account email, which is also the key of the password in the secret store.
    pub fn email(&self) -> &str {
        &self.config_file.email
    }

    /// When true, transactions are read from `test.json` instead of calling `mintapi`.
    pub fn test_mode(&self) -> bool {
        self.config_file.testmode
    }

    pub fn ignore_list(&self) -> &IgnoreList {
        &self.config_file.ignore
    }

    pub fn schema(&self) -> Schema {
        self.config_file.schema
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// The OAuth 2.0 client credentials downloaded from Google Cloud Console.
    pub fn creds_path(&self) -> PathBuf {
        self.root.join(CONFIG_DIR).join(CREDS_JSON)
    }

    /// Where the OAuth token is cached between runs.
    pub fn token_path(&self) -> PathBuf {
        self.root.join(TOKEN_JSON)
    }

    /// The transaction fixture used in test mode.
    pub fn fixture_path(&self) -> PathBuf {
        self.root.join(TEST_JSON)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "email": "someone@example.com",
///   "testmode": false,
///   "ignore": {}
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[cfg_attr(test, derive(serde::Serialize))]
struct ConfigFile {
    /// The Mint account email
    email: String,

    /// Read transactions from the fixture file instead of running mintapi
    #[serde(default)]
    testmode: bool,

    /// Reserved for merchant and category exclusions
    #[serde(default)]
    ignore: IgnoreList,

    /// The ID or URL of the template spreadsheet, defaults to `DEFAULT_TEMPLATE_ID`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template_id: Option<String>,

    /// Which transaction JSON layout mintapi produces
    #[serde(default)]
    schema: Schema,
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;
        anyhow::ensure!(
            !config.email.trim().is_empty(),
            "The email in {} must not be empty",
            path.display()
        );
        Ok(config)
    }

    #[cfg(test)]
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }
}

/// Placeholder for merchant and category exclusions. Any object is accepted and its contents are
/// not used.
#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct IgnoreList {}

/// Accepts either a bare spreadsheet ID or a Google Sheets URL and returns the ID.
///
/// URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
fn extract_spreadsheet_id(s: &str) -> Res<&str> {
    let s = s.trim();
    if s.is_empty() {
        bail!("The spreadsheet ID must not be empty");
    }
    if !s.contains('/') {
        return Ok(s);
    }

    let parts: Vec<&str> = s.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split('?')
                .next()
                .unwrap_or(id_part)
                .split('#')
                .next()
                .unwrap_or(id_part);
            return Ok(id);
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}
