//! The synchronization engine: master/replica routing, batched fan-out,
//! inbound apply and relay.
//!
//! One peer is the master (authoritative) owner of each object type.
//! Producers on any peer submit changes through
//! [`SyncEngine::update_record`] / [`SyncEngine::remove_record`]; a master
//! applies locally and fans out, a replica only queues -- the master's echo
//! is what applies the change locally. Inbound frames go through
//! [`SyncEngine::sync_incoming`], which applies records and, on the master,
//! re-queues them so every subscriber converges on the accepted version.
//!
//! Producer threads, the flush worker and the transport's inbound threads
//! all run concurrently; one engine-wide mutex serializes the registry, the
//! connection table, the queue and every apply step. Encoding, transport
//! sends and store loads happen with the lock released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use parking_lot::Mutex;
use shardsync_core::{encode_frame, FrameReader, RecordRef};
use tracing::{debug, warn};

use crate::config::ObjectConfig;
use crate::connection::{transport_identity, PeerTransport};
use crate::error::SyncError;
use crate::queue::{DrainedType, OutboundQueue};

/// A registered peer connection and the types it subscribes to.
struct PeerEntry {
    identity: usize,
    transport: Arc<dyn PeerTransport>,
    types: HashSet<String>,
}

/// Everything behind the engine-wide lock.
#[derive(Default)]
struct EngineState {
    types: HashMap<String, Arc<ObjectConfig>>,
    peers: Vec<PeerEntry>,
    queue: OutboundQueue,
}

/// Multi-server data synchronization engine.
///
/// See the [module docs](self) for the protocol; construction is just
/// [`SyncEngine::new`] followed by type and connection registration.
pub struct SyncEngine {
    state: Mutex<EngineState>,
}

impl SyncEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
        }
    }

    // -- Registration ------------------------------------------------------

    /// Register a type's synchronization config.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] when the config violates the
    /// transient-type invariants, [`SyncError::AlreadyRegistered`] when the
    /// name is taken.
    pub fn register_type(&self, config: ObjectConfig) -> Result<(), SyncError> {
        config.validate()?;
        let mut state = self.state.lock();
        if state.types.contains_key(&config.name) {
            return Err(SyncError::AlreadyRegistered { name: config.name });
        }
        debug!(
            type_name = %config.name,
            server_owned = config.server_owned,
            persistent = config.is_persistent(),
            "type registered"
        );
        state.types.insert(config.name.clone(), Arc::new(config));
        Ok(())
    }

    /// Remove a type's config, dropping anything still queued for it.
    /// Returns `true` iff the type was registered.
    pub fn unregister_type(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.types.remove(name).is_some();
        if removed {
            state.queue.discard_type(name);
            debug!(type_name = %name, "type unregistered");
        }
        removed
    }

    /// Register a peer connection with the set of types it should receive.
    ///
    /// An empty set is allowed and means "relay source only": the peer can
    /// deliver inbound frames but is never fanned out to. Returns `false`
    /// (and logs) when the same transport is already registered.
    pub fn register_connection(
        &self,
        conn: Arc<dyn PeerTransport>,
        types: HashSet<String>,
    ) -> bool {
        let identity = transport_identity(&conn);
        let mut state = self.state.lock();
        if state.peers.iter().any(|p| p.identity == identity) {
            warn!(error = %SyncError::DuplicateConnection, "connection rejected");
            return false;
        }

        // Diagnostic only: for a type this peer does not own, the single
        // expected subscriber is the master. Cluster config owns uniqueness.
        for name in &types {
            let replica_owned = state.types.get(name).is_some_and(|c| !c.server_owned);
            if replica_owned && state.peers.iter().any(|p| p.types.contains(name)) {
                warn!(
                    type_name = %name,
                    "second subscriber for a type this peer does not own"
                );
            }
        }

        debug!(subscriptions = types.len(), "connection registered");
        state.peers.push(PeerEntry {
            identity,
            transport: conn,
            types,
        });
        true
    }

    /// Remove a peer connection. Idempotent; returns `true` iff a
    /// registration existed. No further frames are dispatched to it.
    pub fn remove_connection(&self, conn: &Arc<dyn PeerTransport>) -> bool {
        let identity = transport_identity(conn);
        let mut state = self.state.lock();
        let before = state.peers.len();
        state.peers.retain(|p| p.identity != identity);
        before != state.peers.len()
    }

    // -- Producer API ------------------------------------------------------

    /// Submit an insert or update for `record`.
    ///
    /// On the master for the type this applies the change locally (for
    /// transient types, through the update handler) and queues it for
    /// fan-out; on a replica it only queues -- the next flush carries it to
    /// the master, whose echo performs the local apply.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownType`], or [`SyncError::LocalApplyFailed`] when
    /// the local update handler rejects the change.
    pub fn update_record(&self, record: RecordRef, type_name: &str) -> Result<(), SyncError> {
        self.submit(record, type_name, false)
    }

    /// Submit a remove for `record`. Mirrors [`SyncEngine::update_record`]
    /// with `is_remove = true`.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::update_record`].
    pub fn remove_record(&self, record: RecordRef, type_name: &str) -> Result<(), SyncError> {
        self.submit(record, type_name, true)
    }

    fn submit(&self, record: RecordRef, type_name: &str, is_remove: bool) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        let config = state
            .types
            .get(type_name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownType {
                name: type_name.to_string(),
            })?;

        if config.server_owned && !config.is_persistent() {
            // Persistent records were already written to the store by the
            // caller; transient ones are applied through the handler here.
            let update = config
                .update
                .as_ref()
                .ok_or_else(|| SyncError::InvalidConfig {
                    name: type_name.to_string(),
                    reason: "transient type without update handler",
                })?;
            if !update(type_name, &record, is_remove) {
                return Err(SyncError::LocalApplyFailed {
                    name: type_name.to_string(),
                });
            }
        }

        let fresh = if is_remove {
            state.queue.enqueue_remove(type_name, record)
        } else {
            state.queue.enqueue_update(type_name, record)
        };
        if !fresh {
            counter!("shardsync_records_coalesced_total").increment(1);
        }
        Ok(())
    }

    // -- Outbound ----------------------------------------------------------

    /// Drain the outbound queue and fan the batches out to subscribed peers.
    ///
    /// The drain and the peer snapshot happen under the engine lock; encode
    /// and transport sends happen after it is released. Each drained type
    /// yields at most one frame, shared across its subscribers. Peers are
    /// visited in registration order and types in name order, so frame order
    /// per connection is fixed within one call. Failed sends are logged and
    /// skipped; connection teardown belongs to the host.
    pub fn sync_outgoing(&self) {
        let (batches, peers) = {
            let mut state = self.state.lock();
            let drained = state.queue.drain();
            if drained.is_empty() {
                return;
            }
            let batches: Vec<(DrainedType, Arc<ObjectConfig>)> = drained
                .into_iter()
                .filter_map(|batch| match state.types.get(&batch.name) {
                    Some(config) => Some((batch, Arc::clone(config))),
                    None => {
                        warn!(type_name = %batch.name, "dropping batch for unregistered type");
                        None
                    }
                })
                .collect();
            let peers: Vec<(Arc<dyn PeerTransport>, HashSet<String>)> = state
                .peers
                .iter()
                .map(|p| (Arc::clone(&p.transport), p.types.clone()))
                .collect();
            (batches, peers)
        };

        let mut frames = Vec::with_capacity(batches.len());
        for (batch, config) in &batches {
            let persistent = config.is_persistent();
            let updates = with_wire_identity(&batch.name, persistent, &batch.updates);
            let removes = with_wire_identity(&batch.name, persistent, &batch.removes);
            if updates.is_empty() && removes.is_empty() {
                continue;
            }
            match encode_frame(&batch.name, persistent, &updates, &removes) {
                Ok(frame) => {
                    debug!(
                        type_name = %batch.name,
                        updates = updates.len(),
                        removes = removes.len(),
                        "encoded sync frame"
                    );
                    frames.push((batch.name.as_str(), frame));
                }
                Err(err) => {
                    warn!(type_name = %batch.name, error = %err, "frame encode failed; batch dropped");
                }
            }
        }

        for (transport, types) in &peers {
            for (name, frame) in &frames {
                if !types.contains(*name) {
                    continue;
                }
                match transport.send(frame.clone()) {
                    Ok(()) => {
                        counter!("shardsync_frames_sent_total").increment(1);
                    }
                    Err(err) => {
                        warn!(
                            type_name = %name,
                            error = %err,
                            "frame send failed; expecting the host to remove the connection"
                        );
                    }
                }
            }
        }
    }

    // -- Inbound -----------------------------------------------------------

    /// Apply one inbound frame and, when this peer is the master for its
    /// type, queue the records for relay to every subscriber (the origin
    /// included -- its echo is what applies a replica's own submission).
    ///
    /// Record materialization (store loads, snapshot decodes) runs without
    /// the engine lock; the apply-and-relay step takes it once.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownType`] (the frame is consumed so the stream stays
    /// aligned) or [`SyncError::Decode`] for structural failures, after
    /// which the host should drop the connection. Missing store records and
    /// handler rejections are logged and skipped, not returned.
    pub fn sync_incoming(&self, frame: Bytes) -> Result<(), SyncError> {
        counter!("shardsync_frames_received_total").increment(1);

        let mut reader = FrameReader::new(frame);
        let type_name = reader.read_type_name()?;
        let Some(config) = self.lookup(&type_name) else {
            reader.consume_remaining();
            return Err(SyncError::UnknownType { name: type_name });
        };

        let updates = read_records(&mut reader, &type_name, &config)?;
        let removes = read_records(&mut reader, &type_name, &config)?;
        reader.finish()?;

        let mut state = self.state.lock();
        apply_inbound(&mut state, &type_name, &config, updates, false);
        apply_inbound(&mut state, &type_name, &config, removes, true);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Arc<ObjectConfig>> {
        self.state.lock().types.get(name).cloned()
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the records that can be put on the wire. For a persistent type a
/// record without a UUID is a host bug; it is skipped like an inbound
/// missing record, not allowed to sink the whole batch.
fn with_wire_identity(type_name: &str, persistent: bool, records: &[RecordRef]) -> Vec<RecordRef> {
    if !persistent {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| {
            let has_uuid = record.uuid().is_some();
            if !has_uuid {
                warn!(type_name, "persistent record without uuid; skipping");
            }
            has_uuid
        })
        .cloned()
        .collect()
}

/// Materialize one wire section: UUID-plus-store-load for persistent types,
/// build-plus-snapshot-decode for transient ones.
fn read_records(
    reader: &mut FrameReader,
    type_name: &str,
    config: &ObjectConfig,
) -> Result<Vec<RecordRef>, SyncError> {
    let count = reader.read_count()?;
    // The count is remote input; cap the preallocation.
    let mut records = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        if let Some(store) = &config.store {
            let uuid = reader.read_uuid()?;
            match store.load(type_name, uuid) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    let err = SyncError::MissingPersistent {
                        name: type_name.to_string(),
                        uuid,
                    };
                    warn!(error = %err, "skipping inbound record");
                }
                Err(source) => {
                    let err = SyncError::StoreLoad {
                        name: type_name.to_string(),
                        source,
                    };
                    warn!(error = %err, "skipping inbound record");
                }
            }
        } else {
            let build = config
                .build
                .as_ref()
                .ok_or_else(|| SyncError::InvalidConfig {
                    name: type_name.to_string(),
                    reason: "transient type without build handler",
                })?;
            let mut blank = build();
            reader.decode_snapshot_into(blank.as_mut())?;
            records.push(Arc::from(blank));
        }
    }
    Ok(records)
}

fn apply_inbound(
    state: &mut EngineState,
    type_name: &str,
    config: &ObjectConfig,
    records: Vec<RecordRef>,
    is_remove: bool,
) {
    for record in records {
        if let Some(update) = &config.update {
            if !update(type_name, &record, is_remove) {
                // Rejected changes are dropped, not relayed; the frame
                // itself continues.
                warn!(type_name, is_remove, "update handler rejected inbound change");
                continue;
            }
        }
        if config.server_owned {
            if is_remove {
                state.queue.enqueue_remove(type_name, record);
            } else {
                state.queue.enqueue_update(type_name, record);
            }
        }
    }
}
