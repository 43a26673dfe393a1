use keyring::Entry;
use keyring::Error as KeyringError;
use std::fmt::Debug;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("{0}")]
    Other(KeyringError),
}

impl CredentialStoreError {
    pub fn new(error: KeyringError) -> Self {
        Self::Other(error)
    }

    pub fn message(&self) -> String {
        match self {
            Self::Other(error) => error.to_string(),
        }
    }
}

/// Shim for interacting with the OS keyring so callers can swap in an
/// in-memory store under test.
pub trait KeyringStore: Debug + Send + Sync {
    fn load(&self, service: &str, account: &str) -> Result<Option<String>, CredentialStoreError>;
    fn save(&self, service: &str, account: &str, value: &str) -> Result<(), CredentialStoreError>;
    fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialStoreError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKeyringStore;

impl KeyringStore for DefaultKeyringStore {
    fn load(&self, service: &str, account: &str) -> Result<Option<String>, CredentialStoreError> {
        trace!("keyring.load start, service={service}, account={account}");
        let entry = Entry::new(service, account).map_err(CredentialStoreError::new)?;
        match entry.get_password() {
            Ok(password) => {
                trace!("keyring.load success, service={service}, account={account}");
                Ok(Some(password))
            }
            Err(KeyringError::NoEntry) => {
                trace!("keyring.load no entry, service={service}, account={account}");
                Ok(None)
            }
            Err(error) => {
                trace!("keyring.load error, service={service}, account={account}, error={error}");
                Err(CredentialStoreError::new(error))
            }
        }
    }

    fn save(&self, service: &str, account: &str, value: &str) -> Result<(), CredentialStoreError> {
        trace!(
            "keyring.save start, service={service}, account={account}, value_len={}",
            value.len()
        );
        let entry = Entry::new(service, account).map_err(CredentialStoreError::new)?;
        match entry.set_password(value) {
            Ok(()) => {
                trace!("keyring.save success, service={service}, account={account}");
                Ok(())
            }
            Err(error) => {
                trace!("keyring.save error, service={service}, account={account}, error={error}");
                Err(CredentialStoreError::new(error))
            }
        }
    }

    fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialStoreError> {
        trace!("keyring.delete start, service={service}, account={account}");
        let entry = Entry::new(service, account).map_err(CredentialStoreError::new)?;
        match entry.delete_credential() {
            Ok(()) => {
                trace!("keyring.delete success, service={service}, account={account}");
                Ok(true)
            }
            Err(KeyringError::NoEntry) => {
                trace!("keyring.delete no entry, service={service}, account={account}");
                Ok(false)
            }
            Err(error) => {
                trace!("keyring.delete error, service={service}, account={account}, error={error}");
                Err(CredentialStoreError::new(error))
            }
        }
    }
}

pub mod tests {
    use super::CredentialStoreError;
    use super::KeyringStore;
    use keyring::Error as KeyringError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// In-memory keyring used by tests in this workspace. Individual accounts
    /// can be primed to fail so error paths are reachable.
    #[derive(Default, Clone, Debug)]
    pub struct MockKeyringStore {
        entries: Arc<Mutex<HashMap<(String, String), String>>>,
        failing: Arc<Mutex<HashMap<String, String>>>,
    }

    impl MockKeyringStore {
        pub fn saved_value(&self, service: &str, account: &str) -> Option<String> {
            self.entries
                .lock()
                .ok()?
                .get(&(service.to_string(), account.to_string()))
                .cloned()
        }

        pub fn set_error(&self, account: &str, message: &str) {
            if let Ok(mut failing) = self.failing.lock() {
                failing.insert(account.to_string(), message.to_string());
            }
        }

        fn check(&self, account: &str) -> Result<(), CredentialStoreError> {
            let failing = self.failing.lock().map_err(|_| poisoned())?;
            match failing.get(account) {
                Some(message) => Err(CredentialStoreError::new(KeyringError::PlatformFailure(
                    message.clone().into(),
                ))),
                None => Ok(()),
            }
        }
    }

    fn poisoned() -> CredentialStoreError {
        CredentialStoreError::new(KeyringError::PlatformFailure(
            "mock keyring lock poisoned".into(),
        ))
    }

    impl KeyringStore for MockKeyringStore {
        fn load(
            &self,
            service: &str,
            account: &str,
        ) -> Result<Option<String>, CredentialStoreError> {
            self.check(account)?;
            let entries = self.entries.lock().map_err(|_| poisoned())?;
            Ok(entries
                .get(&(service.to_string(), account.to_string()))
                .cloned())
        }

        fn save(
            &self,
            service: &str,
            account: &str,
            value: &str,
        ) -> Result<(), CredentialStoreError> {
            self.check(account)?;
            let mut entries = self.entries.lock().map_err(|_| poisoned())?;
            entries.insert((service.to_string(), account.to_string()), value.to_string());
            Ok(())
        }

        fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialStoreError> {
            self.check(account)?;
            let mut entries = self.entries.lock().map_err(|_| poisoned())?;
            Ok(entries
                .remove(&(service.to_string(), account.to_string()))
                .is_some())
        }
    }

}
