//! Gets the raw transaction JSON, either from the `mintapi` CLI or from the local test fixture.

use crate::error::Res;
use crate::utils;
use anyhow::{bail, Context};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// The aggregator CLI.
pub const MINTAPI: &str = "mintapi";

/// Runs the aggregator CLI and captures what it prints.
#[derive(Debug, Clone)]
pub(crate) struct Fetcher {
    program: String,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(MINTAPI)
    }
}

impl Fetcher {
    pub(crate) fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `<program> --extended-transactions --headless <email> <password>` and returns its
    /// standard output. A non-zero exit status is an error that carries the program's stderr.
    pub(crate) async fn fetch(&self, email: &str, password: &[u8]) -> Res<Vec<u8>> {
        let password = std::str::from_utf8(password)
            .context("The password stored in the keyring is not valid UTF-8")?;

        info!("Fetching transactions for {email} with {}", self.program);
        let output = Command::new(&self.program)
            .arg("--extended-transactions")
            .arg("--headless")
            .arg(email)
            .arg(password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Unable to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }
        debug!("{} printed {} bytes", self.program, output.stdout.len());
        Ok(output.stdout)
    }
}

/// Reads the transaction fixture used in test mode.
pub(crate) async fn read_fixture(path: &Path) -> Res<Vec<u8>> {
    info!("Test mode, reading transactions from {}", path.display());
    utils::read_bytes(path).await
}
