//! Looks up the aggregator password in the operating system's secret store.

use crate::error::Res;
use anyhow::Context;
use tracing::debug;
use zeroize::Zeroizing;

/// The keyring service under which `mintapi` stores passwords.
pub const KEYRING_SERVICE: &str = "mintapi";

/// A source of passwords, keyed by account email.
pub(crate) trait SecretStore {
    /// Returns the raw password bytes for `email`. The bytes are wiped when dropped.
    fn password(&self, email: &str) -> Res<Zeroizing<Vec<u8>>>;
}

/// The platform keyring: Keychain on macOS, Credential Manager on Windows and the Secret Service
/// on Linux.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Keyring;

impl SecretStore for Keyring {
    fn password(&self, email: &str) -> Res<Zeroizing<Vec<u8>>> {
        debug!("Reading the {KEYRING_SERVICE} password for {email} from the keyring");
        let entry = entry(email)?;
        let secret = entry
            .get_secret()
            .with_context(|| format!("Unable to read the {KEYRING_SERVICE} password for {email}"))?;
        Ok(Zeroizing::new(secret))
    }
}

fn entry(email: &str) -> Res<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, email)
        .with_context(|| format!("Unable to open the keyring entry for {email}"))
}

/// A store holding a single password, for tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct StaticSecret {
    pub(crate) email: String,
    pub(crate) password: Vec<u8>,
}

#[cfg(test)]
impl SecretStore for StaticSecret {
    fn password(&self, email: &str) -> Res<Zeroizing<Vec<u8>>> {
        if email != self.email {
            anyhow::bail!("No password stored for {email}");
        }
        Ok(Zeroizing::new(self.password.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_secret() {
        let store = StaticSecret {
            email: "me@example.com".to_string(),
            password: b"hunter2".to_vec(),
        };
        assert_eq!(b"hunter2".as_slice(), store.password("me@example.com").unwrap().as_slice());
        assert!(store.password("you@example.com").is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_entry_uses_secret_service() {
        let entry = entry("me@example.com").unwrap();
        assert!(entry
            .get_credential()
            .downcast_ref::<keyring::secret_service::SsCredential>()
            .is_some());
    }
}
