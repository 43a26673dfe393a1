use crate::endpoint::Endpoint;
use crate::error::HeaderError;
use serde::Deserialize;
use serde::Serialize;
use sg_keyring_store::DefaultKeyringStore;
use sg_keyring_store::KeyringStore;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::warn;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const KEYRING_SERVICE: &str = "Sourcegraph Access Token";
const TOKENS_FILE: &str = "tokens.json";

/// Where access tokens are persisted between runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreMode {
    /// `tokens.json` under the home directory.
    #[default]
    File,
    /// The OS keyring.
    Keyring,
}

/// Access tokens keyed by endpoint.
pub trait TokenStore: Debug + Send + Sync {
    fn load(&self, endpoint: &Endpoint) -> Result<Option<String>, HeaderError>;
    fn save(&self, endpoint: &Endpoint, token: &str) -> Result<(), HeaderError>;
    fn delete(&self, endpoint: &Endpoint) -> Result<bool, HeaderError>;
}

pub fn create_token_store(home: &Path, mode: TokenStoreMode) -> Arc<dyn TokenStore> {
    match mode {
        TokenStoreMode::File => Arc::new(FileTokenStore::new(home.join(TOKENS_FILE))),
        TokenStoreMode::Keyring => Arc::new(KeyringTokenStore::new(Arc::new(DefaultKeyringStore))),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<Endpoint, String>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, endpoint: Endpoint, token: impl Into<String>) -> Self {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(endpoint, token.into());
        }
        self
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self, endpoint: &Endpoint) -> Result<Option<String>, HeaderError> {
        let tokens = self.tokens.lock().map_err(|_| poisoned())?;
        Ok(tokens.get(endpoint).cloned())
    }

    fn save(&self, endpoint: &Endpoint, token: &str) -> Result<(), HeaderError> {
        let mut tokens = self.tokens.lock().map_err(|_| poisoned())?;
        tokens.insert(endpoint.clone(), token.to_string());
        Ok(())
    }

    fn delete(&self, endpoint: &Endpoint) -> Result<bool, HeaderError> {
        let mut tokens = self.tokens.lock().map_err(|_| poisoned())?;
        Ok(tokens.remove(endpoint).is_some())
    }
}

fn poisoned() -> HeaderError {
    HeaderError::Store("token store lock poisoned".to_string())
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
struct TokensFile {
    #[serde(default)]
    tokens: BTreeMap<String, String>,
}

/// JSON file of `endpoint -> token`, written with owner-only permissions.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> io::Result<TokensFile> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(TokensFile::default()),
            Err(err) => Err(err),
        }
    }

    fn write(&self, file: &TokensFile) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json_data = serde_json::to_string_pretty(file)?;
        let mut options = OpenOptions::new();
        options.truncate(true).write(true).create(true);
        #[cfg(unix)]
        {
            options.mode(0o600);
        }
        let mut handle = options.open(&self.path)?;
        handle.write_all(json_data.as_bytes())?;
        handle.flush()?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, endpoint: &Endpoint) -> Result<Option<String>, HeaderError> {
        let file = self.read().map_err(store_error)?;
        Ok(file.tokens.get(&endpoint.to_string()).cloned())
    }

    fn save(&self, endpoint: &Endpoint, token: &str) -> Result<(), HeaderError> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        let mut file = self.read().map_err(store_error)?;
        file.tokens.insert(endpoint.to_string(), token.to_string());
        self.write(&file).map_err(store_error)
    }

    fn delete(&self, endpoint: &Endpoint) -> Result<bool, HeaderError> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        let mut file = self.read().map_err(store_error)?;
        let removed = file.tokens.remove(&endpoint.to_string()).is_some();
        if removed {
            self.write(&file).map_err(store_error)?;
        }
        Ok(removed)
    }
}

fn store_error(err: io::Error) -> HeaderError {
    HeaderError::Store(err.to_string())
}

/// Tokens in the OS keyring, one entry per endpoint.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    keyring: Arc<dyn KeyringStore>,
}

impl KeyringTokenStore {
    pub fn new(keyring: Arc<dyn KeyringStore>) -> Self {
        Self { keyring }
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self, endpoint: &Endpoint) -> Result<Option<String>, HeaderError> {
        self.keyring
            .load(KEYRING_SERVICE, &endpoint.to_string())
            .map_err(|err| {
                warn!("failed to read token for {endpoint} from keyring: {err}");
                HeaderError::Store(err.message())
            })
    }

    fn save(&self, endpoint: &Endpoint, token: &str) -> Result<(), HeaderError> {
        self.keyring
            .save(KEYRING_SERVICE, &endpoint.to_string(), token)
            .map_err(|err| HeaderError::Store(err.message()))
    }

    fn delete(&self, endpoint: &Endpoint) -> Result<bool, HeaderError> {
        self.keyring
            .delete(KEYRING_SERVICE, &endpoint.to_string())
            .map_err(|err| HeaderError::Store(err.message()))
    }
}
