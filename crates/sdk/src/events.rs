//! Domain events emitted by quorum clients.
//!
//! Listeners are named, ordered callbacks registered at runtime. Adding a
//! listener under an existing name replaces it in place, keeping its
//! position; otherwise it is appended. Delivery is synchronous and in
//! registration order, on the task that emitted the event.
//!
//! ```ignore
//! let (listener, mut rx) = ChannelListener::new();
//! orchestrator.events().add("ui", Arc::new(listener));
//! while let Some(event) = rx.recv().await { /* ... */ }
//! ```

use std::sync::{Arc, RwLock};

use hearth_core::FederationId;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A notification about one federation membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Quorum reached on connect.
    Connected {
        federation_id: FederationId,
        online: usize,
        threshold: usize,
        total: usize,
    },
    /// Quorum not reached on connect.
    ConnectionFailed {
        federation_id: FederationId,
        online: usize,
        threshold: usize,
    },
    Disconnected {
        federation_id: FederationId,
    },
    /// Balance fetched from the federation gateway.
    BalanceSynced {
        federation_id: FederationId,
        balance_sats: u64,
    },
    EcashIssued {
        federation_id: FederationId,
        amount_sats: u64,
        note_count: usize,
    },
    EcashRedeemed {
        federation_id: FederationId,
        amount_sats: u64,
        note_count: usize,
    },
    InvoiceCreated {
        federation_id: FederationId,
        amount_sats: u64,
    },
    InvoicePaid {
        federation_id: FederationId,
        amount_sats: u64,
    },
}

impl Event {
    pub fn federation_id(&self) -> &FederationId {
        match self {
            Self::Connected { federation_id, .. }
            | Self::ConnectionFailed { federation_id, .. }
            | Self::Disconnected { federation_id }
            | Self::BalanceSynced { federation_id, .. }
            | Self::EcashIssued { federation_id, .. }
            | Self::EcashRedeemed { federation_id, .. }
            | Self::InvoiceCreated { federation_id, .. }
            | Self::InvoicePaid { federation_id, .. } => federation_id,
        }
    }

    /// Stable snake_case name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::Disconnected { .. } => "disconnected",
            Self::BalanceSynced { .. } => "balance_synced",
            Self::EcashIssued { .. } => "ecash_issued",
            Self::EcashRedeemed { .. } => "ecash_redeemed",
            Self::InvoiceCreated { .. } => "invoice_created",
            Self::InvoicePaid { .. } => "invoice_paid",
        }
    }
}

// ---------------------------------------------------------------------------
// EventListener
// ---------------------------------------------------------------------------

/// Receives every emitted event.
///
/// Called while the registry's read lock is held, so implementations must
/// not block and must not register or remove listeners.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event);
}

/// Forwards events onto a tokio unbounded channel.
///
/// Events emitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventListener for ChannelListener {
    fn on_event(&self, event: &Event) {
        let _ = self.tx.send(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Events registry
// ---------------------------------------------------------------------------

/// Ordered registry of named listeners.
#[derive(Default)]
pub struct Events {
    listeners: RwLock<Vec<(&'static str, Arc<dyn EventListener>)>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named listener, replacing any listener with the same name.
    pub fn add(&self, name: &'static str, listener: Arc<dyn EventListener>) {
        let Ok(mut chain) = self.listeners.write() else {
            return;
        };
        if let Some(entry) = chain.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = listener;
        } else {
            chain.push((name, listener));
        }
    }

    /// Remove a named listener. Returns `true` if found.
    pub fn remove(&self, name: &'static str) -> bool {
        let Ok(mut chain) = self.listeners.write() else {
            return false;
        };
        let len_before = chain.len();
        chain.retain(|(n, _)| *n != name);
        chain.len() < len_before
    }

    /// Names of the registered listeners, in delivery order.
    pub fn names(&self) -> Vec<&'static str> {
        self.listeners
            .read()
            .map(|chain| chain.iter().map(|(n, _)| *n).collect())
            .unwrap_or_default()
    }

    pub(crate) fn emit(&self, event: Event) {
        tracing::debug!(
            event = event.name(),
            federation_id = %event.federation_id(),
            "event"
        );
        let Ok(chain) = self.listeners.read() else {
            return;
        };
        for (_, listener) in chain.iter() {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events")
            .field("listeners", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl EventListener for Recorder {
        fn on_event(&self, event: &Event) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.tag, event.name()));
        }
    }

    fn fed() -> FederationId {
        FederationId::parse("fed_1760400000000_abcdefghi").unwrap()
    }

    #[test]
    fn delivery_follows_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let events = Events::new();
        events.add("a", Arc::new(Recorder { tag: "a", log: log.clone() }));
        events.add("b", Arc::new(Recorder { tag: "b", log: log.clone() }));
        // Replacing keeps position.
        events.add("a", Arc::new(Recorder { tag: "a2", log: log.clone() }));

        events.emit(Event::Disconnected { federation_id: fed() });
        assert_eq!(*log.lock().unwrap(), vec!["a2:disconnected", "b:disconnected"]);
        assert_eq!(events.names(), vec!["a", "b"]);
    }

    #[test]
    fn remove_stops_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let events = Events::new();
        events.add("a", Arc::new(Recorder { tag: "a", log: log.clone() }));
        assert!(events.remove("a"));
        assert!(!events.remove("a"));
        events.emit(Event::Disconnected { federation_id: fed() });
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn channel_listener_forwards() {
        let (listener, mut rx) = ChannelListener::new();
        let events = Events::new();
        events.add("chan", Arc::new(listener));
        events.emit(Event::BalanceSynced {
            federation_id: fed(),
            balance_sats: 42,
        });
        let got = rx.recv().await.unwrap();
        assert_eq!(
            got,
            Event::BalanceSynced {
                federation_id: fed(),
                balance_sats: 42
            }
        );
    }
}
