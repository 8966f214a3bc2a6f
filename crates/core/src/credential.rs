//! Bearer credential supplied by an external login flow
//!
//! The core never obtains or refreshes tokens. It reads whatever the login
//! flow last stored and treats "no credential" as a reason to skip the call.

use parking_lot::RwLock;
use std::fmt;
use tokio::sync::watch;

/// Bearer token plus the refresh token the login flow handed over
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// `Authorization` header value
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where authenticated calls get their credential from
pub trait CredentialSource: Send + Sync {
    fn current(&self) -> Option<Credential>;

    /// Ticks each time a new credential is stored. `None` for sources that
    /// never change.
    fn acquisitions(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

/// Credential slot written by the login flow and read by the core
#[derive(Debug)]
pub struct SharedCredential {
    inner: RwLock<Option<Credential>>,
    acquired: watch::Sender<u64>,
}

impl Default for SharedCredential {
    fn default() -> Self {
        Self::from_slot(None)
    }
}

impl SharedCredential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self::from_slot(Some(credential))
    }

    fn from_slot(credential: Option<Credential>) -> Self {
        let (acquired, _) = watch::channel(0);
        Self {
            inner: RwLock::new(credential),
            acquired,
        }
    }

    pub fn set(&self, credential: Credential) {
        *self.inner.write() = Some(credential);
        self.acquired.send_modify(|count| *count += 1);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

impl CredentialSource for SharedCredential {
    fn current(&self) -> Option<Credential> {
        self.inner.read().clone()
    }

    fn acquisitions(&self) -> Option<watch::Receiver<u64>> {
        Some(self.acquired.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let credential = Credential::new("secret-access").with_refresh_token("secret-refresh");
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("secret"));
        assert_eq!(credential.bearer_header(), "Bearer secret-access");
        assert_eq!(credential.refresh_token(), Some("secret-refresh"));
    }

    #[test]
    fn test_shared_credential_set_and_clear() {
        let shared = SharedCredential::new();
        assert!(shared.current().is_none());

        shared.set(Credential::new("a"));
        assert_eq!(shared.current().unwrap().access_token(), "a");

        shared.clear();
        assert!(shared.current().is_none());
    }

    #[test]
    fn test_set_signals_acquisition() {
        let shared = SharedCredential::new();
        let mut acquisitions = shared.acquisitions().unwrap();
        assert!(!acquisitions.has_changed().unwrap());

        shared.set(Credential::new("a"));
        assert!(acquisitions.has_changed().unwrap());
        assert_eq!(*acquisitions.borrow_and_update(), 1);

        // Clearing is not an acquisition
        shared.clear();
        assert!(!acquisitions.has_changed().unwrap());
    }
}
