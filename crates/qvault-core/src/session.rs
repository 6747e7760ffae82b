//! Explicit per-user session context.
//!
//! Carries the current user, their file selection, the security of the
//! transport behind the stores, and a refresh signal that file-list views
//! subscribe to. Passed to every pipeline operation instead of living in
//! process-wide state.

use tokio::sync::watch;
use url::{Host, Url};

use crate::config::{StorageBackend, StorageConfig};
use crate::types::Selection;

/// How bytes reach the backing stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSecurity {
    /// No network hop (memory or local filesystem backend)
    Local,
    /// TLS-protected endpoint
    Tls,
    /// Plain HTTP to a loopback address
    Loopback,
    /// Plain HTTP over the network
    Plaintext,
}

impl TransportSecurity {
    /// Classify the transport for a storage configuration.
    ///
    /// Loopback HTTP counts as secure, matching how browsers treat
    /// `http://localhost` as a secure context.
    pub fn classify(storage: &StorageConfig) -> Self {
        match storage.backend {
            StorageBackend::Memory | StorageBackend::Fs => TransportSecurity::Local,
            StorageBackend::S3 => Self::classify_endpoint(&storage.endpoint),
        }
    }

    /// Classify an S3 endpoint URL. Anything that fails to parse is
    /// treated as plaintext.
    pub fn classify_endpoint(endpoint: &str) -> Self {
        let Ok(url) = Url::parse(endpoint.trim()) else {
            return TransportSecurity::Plaintext;
        };
        match url.scheme() {
            "https" => TransportSecurity::Tls,
            "http" => match url.host() {
                Some(Host::Domain(domain))
                    if domain == "localhost" || domain.ends_with(".localhost") =>
                {
                    TransportSecurity::Loopback
                }
                Some(Host::Ipv4(ip)) if ip.is_loopback() => TransportSecurity::Loopback,
                Some(Host::Ipv6(ip)) if ip.is_loopback() => TransportSecurity::Loopback,
                _ => TransportSecurity::Plaintext,
            },
            _ => TransportSecurity::Plaintext,
        }
    }

    pub fn is_secure(&self) -> bool {
        !matches!(self, TransportSecurity::Plaintext)
    }
}

/// A signed-in user's working context
#[derive(Debug)]
pub struct Session {
    user_id: String,
    display_name: Option<String>,
    transport: TransportSecurity,
    selection: Selection,
    refresh: watch::Sender<u64>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, transport: TransportSecurity) -> Self {
        let (refresh, _) = watch::channel(0);
        Self {
            user_id: user_id.into(),
            display_name: None,
            transport,
            selection: Selection::Empty,
            refresh,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Display name, falling back to the user id
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }

    pub fn transport(&self) -> TransportSecurity {
        self.transport
    }

    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::Empty;
    }

    /// Subscribe to file-list invalidations. The value is a generation
    /// counter bumped on every successful batch.
    pub fn subscribe_refresh(&self) -> watch::Receiver<u64> {
        self.refresh.subscribe()
    }

    pub fn refresh_generation(&self) -> u64 {
        *self.refresh.borrow()
    }

    pub fn signal_refresh(&self) {
        self.refresh.send_modify(|generation| *generation += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SelectedItem;

    #[test]
    fn test_classify_endpoints() {
        use TransportSecurity::*;
        assert_eq!(TransportSecurity::classify_endpoint("https://s3.example.com"), Tls);
        assert_eq!(TransportSecurity::classify_endpoint("HTTPS://S3.EXAMPLE.COM"), Tls);
        assert_eq!(TransportSecurity::classify_endpoint("http://localhost:9000"), Loopback);
        assert_eq!(TransportSecurity::classify_endpoint("http://127.0.0.1:8333/x"), Loopback);
        assert_eq!(TransportSecurity::classify_endpoint("http://[::1]:9000"), Loopback);
        assert_eq!(TransportSecurity::classify_endpoint("http://minio.lan:9000"), Plaintext);
        assert_eq!(TransportSecurity::classify_endpoint("http://localhost.evil.com"), Plaintext);
        assert_eq!(TransportSecurity::classify_endpoint("ftp://host"), Plaintext);
    }

    #[test]
    fn test_classify_endpoints_ignores_spoofed_hosts() {
        use TransportSecurity::*;
        assert_eq!(TransportSecurity::classify_endpoint("http://127.0.0.1.nip.io:9000"), Plaintext);
        assert_eq!(TransportSecurity::classify_endpoint("http://evil.example#@localhost"), Plaintext);
        assert_eq!(TransportSecurity::classify_endpoint("http://evil.example?@localhost"), Plaintext);
        assert_eq!(TransportSecurity::classify_endpoint("http://user@localhost:9000"), Loopback);
        assert_eq!(TransportSecurity::classify_endpoint("HTTP://LOCALHOST:9000"), Loopback);
        assert_eq!(TransportSecurity::classify_endpoint("not a url"), Plaintext);
    }

    #[test]
    fn test_classify_local_backends() {
        let storage = StorageConfig {
            backend: StorageBackend::Memory,
            endpoint: "http://far-away:80".into(),
            ..Default::default()
        };
        assert_eq!(TransportSecurity::classify(&storage), TransportSecurity::Local);
        assert!(TransportSecurity::Local.is_secure());
        assert!(!TransportSecurity::Plaintext.is_secure());
    }

    #[test]
    fn test_selection_lifecycle() {
        let mut session = Session::new("u1", TransportSecurity::Local);
        assert!(session.selection().is_empty());

        session.select(Selection::Files(vec![SelectedItem::new("a", vec![1])]));
        assert_eq!(session.selection().len(), 1);

        session.clear_selection();
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_refresh_signal_reaches_subscribers() {
        let session = Session::new("u1", TransportSecurity::Tls).with_display_name("Ada");
        let mut rx = session.subscribe_refresh();
        assert_eq!(session.display_name(), "Ada");

        session.signal_refresh();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(session.refresh_generation(), 1);
    }
}
