// traffic-monitor/src/registry.rs
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Shutdown signal handed to a channel's transport task
pub type ShutdownSignal = oneshot::Receiver<()>;

/// Registry-side half of one live push channel
struct ChannelHandle {
    id: Uuid,
    shutdown: oneshot::Sender<()>,
}

/// Live push channels keyed by application id.
///
/// Cloning yields another handle onto the same registry. Owned by the
/// session layer and passed to whoever subscribes.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<DashMap<String, ChannelHandle>>,
}

impl ChannelRegistry {
    pub fn create() -> Self {
        Self::default()
    }

    /// Open a channel for `app_id` unless one is already live.
    ///
    /// The check and the insert happen under the same shard lock, so `start`
    /// runs at most once per live id. Returns the new channel's instance id.
    pub fn open_with<F>(&self, app_id: &str, start: F) -> Option<Uuid>
    where
        F: FnOnce(Uuid, ShutdownSignal),
    {
        match self.channels.entry(app_id.to_string()) {
            Entry::Occupied(_) => {
                tracing::info!("Push channel already open for {}", app_id);
                None
            },
            Entry::Vacant(slot) => {
                let id = Uuid::new_v4();
                let (tx, rx) = oneshot::channel();
                start(id, rx);
                slot.insert(ChannelHandle { id, shutdown: tx });
                tracing::info!("Push channel {} opened for {}", id, app_id);
                Some(id)
            }
        }
    }

    /// Close the channel for `app_id`. Absent ids are a no-op.
    pub fn close(&self, app_id: &str) -> bool {
        match self.channels.remove(app_id) {
            Some((_, handle)) => {
                Self::signal(app_id, handle);
                true
            },
            None => false,
        }
    }

    /// Close the channel only if it is still the given instance
    pub fn close_instance(&self, app_id: &str, id: Uuid) -> bool {
        match self.channels.remove_if(app_id, |_, handle| handle.id == id) {
            Some((_, handle)) => {
                Self::signal(app_id, handle);
                true
            },
            None => false,
        }
    }

    pub fn is_live(&self, app_id: &str) -> bool {
        self.channels.contains_key(app_id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Close every live channel
    pub fn destroy(&self) {
        let ids: Vec<String> = self.channels.iter().map(|entry| entry.key().clone()).collect();
        for app_id in ids {
            self.close(&app_id);
        }
        tracing::info!("Channel registry destroyed");
    }

    fn signal(app_id: &str, handle: ChannelHandle) {
        // The transport may already be gone; a dropped receiver is fine.
        let _ = handle.shutdown.send(());
        tracing::info!("Push channel {} closed for {}", handle.id, app_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_second_open_is_noop() {
        let registry = ChannelRegistry::create();
        let started = RefCell::new(0);

        let first = registry.open_with("app", |_, _| *started.borrow_mut() += 1);
        let second = registry.open_with("app", |_, _| *started.borrow_mut() += 1);

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(*started.borrow(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_close_signals_transport() {
        let registry = ChannelRegistry::create();
        let mut signal = None;
        registry.open_with("app", |_, rx| signal = Some(rx));

        assert!(registry.close("app"));
        assert!(!registry.is_live("app"));
        assert!(signal.unwrap().try_recv().is_ok());
    }

    #[test]
    fn test_close_absent_is_noop() {
        let registry = ChannelRegistry::create();
        assert!(!registry.close("missing"));
    }

    #[test]
    fn test_stale_instance_does_not_close_newer_channel() {
        let registry = ChannelRegistry::create();
        let old = registry.open_with("app", |_, _| {}).unwrap();
        registry.close("app");
        let new = registry.open_with("app", |_, _| {}).unwrap();

        assert!(!registry.close_instance("app", old));
        assert!(registry.is_live("app"));
        assert!(registry.close_instance("app", new));
    }

    #[test]
    fn test_destroy_closes_everything() {
        let registry = ChannelRegistry::create();
        let shared = registry.clone();
        registry.open_with("a", |_, _| {});
        registry.open_with("b", |_, _| {});

        shared.destroy();
        assert!(registry.is_empty());
    }
}
