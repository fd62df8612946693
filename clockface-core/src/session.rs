use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encryption error: {0}")]
    Encryption(String),
    #[error("Decryption error: {0}")]
    Decryption(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Machine ID not found")]
    MachineIdNotFound,
}

/// Bearer token plus the admin flag returned at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub is_admin: bool,
}

/// Where the session lives between invocations. Reads and writes are
/// uncoordinated; the last write wins.
pub trait SessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError>;
    fn save(&self, session: &Session) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// On-disk layout of the session file
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    /// AES-256-GCM ciphertext of the token
    ciphertext: Vec<u8>,
    /// Nonce used for encryption (12 bytes for GCM)
    nonce: Vec<u8>,
    is_admin: bool,
    version: u32,
}

/// Session file encrypted with a key bound to this machine
pub struct FileSessionStore {
    path: PathBuf,
    secret: Option<Vec<u8>>,
}

impl FileSessionStore {
    /// Store under `dir/session.json`, keyed on the machine id
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join("session.json"),
            secret: None,
        }
    }

    /// Store keyed on an explicit secret instead of the machine id
    pub fn with_secret<P: AsRef<Path>>(dir: P, secret: &[u8]) -> Self {
        Self {
            path: dir.as_ref().join("session.json"),
            secret: Some(secret.to_vec()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Derive encryption key using SHA-256(secret || salt)
    fn derive_key(&self) -> Result<aes_gcm::Key<Aes256Gcm>, SessionError> {
        const SALT: &[u8] = b"clockface-session-v1";

        let secret = match &self.secret {
            Some(secret) => secret.clone(),
            None => fs::read_to_string("/etc/machine-id")
                .or_else(|_| fs::read_to_string("/var/lib/dbus/machine-id"))
                .map_err(|_| SessionError::MachineIdNotFound)?
                .trim()
                .as_bytes()
                .to_vec(),
        };

        let mut hasher = Sha256::new();
        hasher.update(&secret);
        hasher.update(SALT);
        let key_bytes = hasher.finalize();

        Ok(*aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)?;
        let stored: StoredSession = serde_json::from_str(&json)?;

        if stored.nonce.len() != 12 {
            return Err(SessionError::Decryption(format!(
                "bad nonce length {}",
                stored.nonce.len()
            )));
        }

        let cipher = Aes256Gcm::new(&self.derive_key()?);
        let nonce = Nonce::from_slice(&stored.nonce);
        let plaintext = cipher
            .decrypt(nonce, stored.ciphertext.as_ref())
            .map_err(|e| SessionError::Decryption(e.to_string()))?;

        let token = String::from_utf8(plaintext)
            .map_err(|e| SessionError::Decryption(format!("Invalid UTF-8: {}", e)))?;

        Ok(Some(Session {
            token,
            is_admin: stored.is_admin,
        }))
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        let key = self.derive_key()?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new(&key);
        let ciphertext = cipher
            .encrypt(nonce, session.token.as_bytes())
            .map_err(|e| SessionError::Encryption(e.to_string()))?;

        let stored = StoredSession {
            ciphertext,
            nonce: nonce_bytes.to_vec(),
            is_admin: session.is_admin,
            version: 1,
        };
        let json = serde_json::to_string(&stored)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;

        // Set file permissions to 0600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        log::debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            log::info!("Session removed");
        }
        Ok(())
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RefCell<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: RefCell::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.session.borrow().clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.session.borrow_mut() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.session.borrow_mut().take();
        Ok(())
    }
}
