//! Per-type synchronization configuration and engine tuning.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use shardsync_core::{RecordRef, SyncObject};

use crate::error::SyncError;
use crate::store::Store;

/// Builds a fresh blank record so an inbound snapshot can be decoded into it.
pub type BuildFn = Arc<dyn Fn() -> Box<dyn SyncObject> + Send + Sync>;

/// Applies a record after it has been materialized.
///
/// Arguments: type name, record, `is_remove`. Returning `false` rejects the
/// change; a rejected change is not relayed. Handlers run with the engine
/// lock held and must not block or call back into the engine.
pub type UpdateFn = Arc<dyn Fn(&str, &RecordRef, bool) -> bool + Send + Sync>;

/// Synchronization configuration for one object type.
///
/// Registered once via [`SyncEngine::register_type`](crate::SyncEngine::register_type)
/// and immutable afterwards. A type is *persistent* when it carries a store
/// (records travel as UUIDs and are reloaded on receipt) and *transient*
/// otherwise (full snapshots on the wire, materialized through `build`).
#[derive(Clone)]
pub struct ObjectConfig {
    /// Canonical type identifier used on the wire.
    pub name: String,
    /// Whether this peer is the master (authoritative) owner of the type.
    pub server_owned: bool,
    /// Store used to reload records by UUID; present iff the type is
    /// persistent.
    pub store: Option<Arc<dyn Store>>,
    /// Blank-record constructor. Required for transient types; optional for
    /// persistent ones, whose records normally come from the store.
    pub build: Option<BuildFn>,
    /// Post-apply callback. Required for transient types, optional for
    /// persistent ones.
    pub update: Option<UpdateFn>,
}

impl ObjectConfig {
    /// Config for a persistent type backed by `store`.
    pub fn persistent(
        name: impl Into<String>,
        server_owned: bool,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            name: name.into(),
            server_owned,
            store: Some(store),
            build: None,
            update: None,
        }
    }

    /// Config for a transient type materialized through `build` and applied
    /// through `update`.
    pub fn transient(
        name: impl Into<String>,
        server_owned: bool,
        build: BuildFn,
        update: UpdateFn,
    ) -> Self {
        Self {
            name: name.into(),
            server_owned,
            store: None,
            build: Some(build),
            update: Some(update),
        }
    }

    /// Attach an update hook (the optional persistent-type callback).
    #[must_use]
    pub fn with_update(mut self, update: UpdateFn) -> Self {
        self.update = Some(update);
        self
    }

    /// Attach a blank-record constructor.
    #[must_use]
    pub fn with_build(mut self, build: BuildFn) -> Self {
        self.build = Some(build);
        self
    }

    /// Whether records of this type are referenced by UUID on the wire.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Check the registration invariants: a transient type must be able to
    /// materialize and apply inbound records.
    pub(crate) fn validate(&self) -> Result<(), SyncError> {
        if !self.is_persistent() {
            if self.build.is_none() {
                return Err(SyncError::InvalidConfig {
                    name: self.name.clone(),
                    reason: "transient type needs a build handler",
                });
            }
            if self.update.is_none() {
                return Err(SyncError::InvalidConfig {
                    name: self.name.clone(),
                    reason: "transient type needs an update handler",
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectConfig")
            .field("name", &self.name)
            .field("server_owned", &self.server_owned)
            .field("persistent", &self.is_persistent())
            .field("has_build", &self.build.is_some())
            .field("has_update", &self.update.is_some())
            .finish()
    }
}

/// Host-level tuning for the engine's flush cadence and peer channels.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between flush worker drains in milliseconds.
    pub flush_interval_ms: u64,
    /// Bound of each peer's outbound frame channel.
    pub outbound_channel_capacity: usize,
}

impl EngineConfig {
    /// The flush cadence as a [`Duration`].
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 250,
            outbound_channel_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::{BufMut, Bytes};
    use shardsync_core::CodecError;
    use uuid::Uuid;

    use super::*;
    use crate::store::MemoryStore;

    /// Fresh persistent record before the store has filled it in.
    #[derive(Debug, Default)]
    struct BlankCharacter {
        id: Option<Uuid>,
    }

    impl SyncObject for BlankCharacter {
        fn uuid(&self) -> Option<Uuid> {
            self.id
        }
        fn encode_snapshot(&self, _buf: &mut dyn BufMut) -> Result<(), CodecError> {
            Ok(())
        }
        fn decode_snapshot(&mut self, _buf: &mut Bytes) -> Result<(), CodecError> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn noop_build() -> BuildFn {
        Arc::new(|| unreachable!("not materialized in this test"))
    }

    fn noop_update() -> UpdateFn {
        Arc::new(|_, _, _| true)
    }

    #[test]
    fn transient_constructor_validates() {
        let config = ObjectConfig::transient("ChatMessage", true, noop_build(), noop_update());
        assert!(!config.is_persistent());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn persistent_constructor_validates_without_handlers() {
        let config = ObjectConfig::persistent("Character", false, Arc::new(MemoryStore::new()));
        assert!(config.is_persistent());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn persistent_config_may_carry_a_build_constructor() {
        // The engine reloads persistent records from the store, but a host
        // may still attach a constructor for its own blank-record paths.
        let built = Arc::new(AtomicUsize::new(0));
        let counting = Arc::clone(&built);
        let config = ObjectConfig::persistent("Character", true, Arc::new(MemoryStore::new()))
            .with_build(Arc::new(move || {
                counting.fetch_add(1, Ordering::SeqCst);
                Box::new(BlankCharacter::default())
            }));

        assert!(config.validate().is_ok());
        let build = config.build.as_ref().unwrap();
        let blank = build();
        assert!(blank.uuid().is_none());
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_without_build_is_invalid() {
        let config = ObjectConfig {
            name: "ChatMessage".to_string(),
            server_owned: true,
            store: None,
            build: None,
            update: Some(noop_update()),
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn transient_without_update_is_invalid() {
        let config = ObjectConfig {
            name: "ChatMessage".to_string(),
            server_owned: true,
            store: None,
            build: Some(noop_build()),
            update: None,
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn debug_omits_handler_internals() {
        let config = ObjectConfig::transient("Item", false, noop_build(), noop_update());
        let rendered = format!("{config:?}");
        assert!(rendered.contains("\"Item\""));
        assert!(rendered.contains("has_build: true"));
    }

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.flush_interval(), Duration::from_millis(250));
        assert!(config.outbound_channel_capacity > 0);
    }
}
