use std::ffi::OsString;
use std::process::Command;

use repoman_core::error::RepomanError;

/// Keychain entry under which `repoman auth login` stores the token.
pub const TOKEN_KEY: &str = "github-token";

/// Trait for credential storage backends.
pub trait CredentialStore: Send + Sync {
    /// Store a token under the given key.
    fn store(&self, key: &str, token: &str) -> Result<(), RepomanError>;

    /// Retrieve a token by key.
    fn get(&self, key: &str) -> Result<Option<String>, RepomanError>;

    /// Delete a stored token.
    fn delete(&self, key: &str) -> Result<(), RepomanError>;
}

/// OS keychain-backed credential store using the `keyring` crate.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: "repoman".to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, RepomanError> {
        keyring::Entry::new(&self.service, key).map_err(|e| RepomanError::CredentialError {
            message: e.to_string(),
        })
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn store(&self, key: &str, token: &str) -> Result<(), RepomanError> {
        self.entry(key)?
            .set_password(token)
            .map_err(|e| RepomanError::CredentialError {
                message: e.to_string(),
            })
    }

    fn get(&self, key: &str) -> Result<Option<String>, RepomanError> {
        match self.entry(key)?.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(RepomanError::CredentialError {
                message: e.to_string(),
            }),
        }
    }

    fn delete(&self, key: &str) -> Result<(), RepomanError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(RepomanError::CredentialError {
                message: e.to_string(),
            }),
        }
    }
}

/// In-memory credential store for testing.
pub struct MemoryStore {
    store: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            store: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, std::collections::HashMap<String, String>>, RepomanError>
    {
        self.store.lock().map_err(|_| RepomanError::CredentialError {
            message: "credential store lock poisoned".into(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryStore {
    fn store(&self, key: &str, token: &str) -> Result<(), RepomanError> {
        self.lock()?.insert(key.to_string(), token.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, RepomanError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), RepomanError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Where a resolved token came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Env(&'static str),
    Keychain,
    GhCli,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Env(var) => write!(f, "environment variable {var}"),
            TokenSource::Keychain => write!(f, "OS keychain"),
            TokenSource::GhCli => write!(f, "gh auth token"),
        }
    }
}

/// A GitHub token together with its origin.
#[derive(Clone)]
pub struct ResolvedToken {
    pub token: String,
    pub source: TokenSource,
}

impl std::fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Looks up a GitHub token, in order: `GITHUB_TOKEN`, `GH_TOKEN`, the OS
/// keychain, then `gh auth token`.
pub struct TokenResolver<'a> {
    env: Box<dyn Fn(&str) -> Option<String> + 'a>,
    store: &'a dyn CredentialStore,
    gh_program: OsString,
}

impl<'a> TokenResolver<'a> {
    pub fn new(store: &'a dyn CredentialStore) -> Self {
        Self {
            env: Box::new(|var| std::env::var(var).ok()),
            store,
            gh_program: OsString::from("gh"),
        }
    }

    /// Replace the environment lookup.
    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + 'a) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Replace the GitHub CLI executable.
    pub fn with_gh_program(mut self, program: impl Into<OsString>) -> Self {
        self.gh_program = program.into();
        self
    }

    pub fn resolve(&self) -> Result<ResolvedToken, RepomanError> {
        for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
            if let Some(token) = (self.env)(var).filter(|t| !t.trim().is_empty()) {
                tracing::debug!("using GitHub token from environment variable {var}");
                return Ok(ResolvedToken {
                    token: token.trim().to_string(),
                    source: TokenSource::Env(var),
                });
            }
        }

        // A missing or locked keychain is not fatal; the gh CLI may still work.
        match self.store.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.trim().is_empty() => {
                tracing::debug!("using GitHub token from OS keychain");
                return Ok(ResolvedToken {
                    token: token.trim().to_string(),
                    source: TokenSource::Keychain,
                });
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("keychain lookup failed: {e}"),
        }

        if let Some(token) = self.gh_auth_token() {
            tracing::debug!("using GitHub token from the GitHub CLI");
            return Ok(ResolvedToken {
                token,
                source: TokenSource::GhCli,
            });
        }

        Err(RepomanError::AuthFailed {
            message: "no GitHub token found; set GITHUB_TOKEN or GH_TOKEN, run `repoman auth login`, or log in with `gh auth login`".into(),
        })
    }

    fn gh_auth_token(&self) -> Option<String> {
        let output = Command::new(&self.gh_program)
            .args(["auth", "token"])
            .output();
        match output {
            Ok(out) if out.status.success() => {
                let token = String::from_utf8_lossy(&out.stdout).trim().to_string();
                (!token.is_empty()).then_some(token)
            }
            Ok(out) => {
                tracing::debug!(
                    "gh auth token failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                None
            }
            Err(e) => {
                tracing::debug!("could not run {:?}: {e}", self.gh_program);
                None
            }
        }
    }
}
