//! Thread Projection Tracker.
//!
//! Remembers which roster sheet a chat thread announced and which message in
//! that thread renders each party, so a claim can be mirrored back into the
//! right message.
//!
//! Bindings live in process memory only and are lost on restart. Each binding
//! sits behind its own mutex: operations on one thread are serialized, while
//! different threads never wait on each other beyond the brief map lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::roster::{codec, HEADER_ROWS};
use crate::store::{CellRange, RosterSource, StoreError, TabularStore};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque pointer to a posted chat message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoundParty {
    pub index: u32,
    pub name: String,
    pub message: MessageHandle,
    pub last_rendered: Option<String>,
}

impl BoundParty {
    pub fn new(index: u32, name: impl Into<String>, message: MessageHandle) -> Self {
        Self { index, name: name.into(), message, last_rendered: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ThreadBinding {
    pub thread_id: ThreadId,
    pub source: RosterSource,
    /// One entry per party block, in header order.
    pub parties: Vec<BoundParty>,
}

impl ThreadBinding {
    pub fn party(&self, party_index: u32) -> Option<&BoundParty> {
        self.parties.iter().find(|party| party.index == party_index)
    }
}

/// Freshly rendered view of one party, ready to be pushed into `message`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub message: MessageHandle,
    pub party_index: u32,
    pub party_name: String,
    pub rendered: String,
    /// False when the table is identical to the last projection of this party.
    pub changed: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("thread `{0}` already has a roster bound")]
    AlreadyBound(ThreadId),
    #[error("thread `{0}` has no roster bound")]
    UnknownThread(ThreadId),
    #[error("party index {party_index} has no message among the {bound} bound to `{thread_id}`")]
    IndexOutOfRange { thread_id: ThreadId, party_index: u32, bound: usize },
    #[error("roster read failed: {0}")]
    ReadFailed(#[source] StoreError),
}

pub struct ThreadTracker {
    store: Arc<dyn TabularStore>,
    bindings: RwLock<HashMap<ThreadId, Arc<Mutex<ThreadBinding>>>>,
}

impl ThreadTracker {
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        Self { store, bindings: RwLock::new(HashMap::new()) }
    }

    pub async fn bind(
        &self,
        thread_id: ThreadId,
        source: RosterSource,
        parties: Vec<BoundParty>,
    ) -> Result<ThreadBinding, TrackerError> {
        let mut bindings = self.bindings.write().await;
        if bindings.contains_key(&thread_id) {
            return Err(TrackerError::AlreadyBound(thread_id));
        }

        let binding = ThreadBinding { thread_id: thread_id.clone(), source, parties };
        info!(
            event_name = "roster.thread.bound",
            thread_id = %thread_id,
            source = %binding.source,
            parties = binding.parties.len(),
            "thread bound to roster"
        );
        bindings.insert(thread_id, Arc::new(Mutex::new(binding.clone())));
        Ok(binding)
    }

    pub async fn resolve(&self, thread_id: &ThreadId) -> Result<RosterSource, TrackerError> {
        let entry = self.entry(thread_id).await?;
        let binding = entry.lock().await;
        Ok(binding.source.clone())
    }

    /// Snapshot of the whole binding.
    pub async fn binding(&self, thread_id: &ThreadId) -> Result<ThreadBinding, TrackerError> {
        let entry = self.entry(thread_id).await?;
        let binding = entry.lock().await;
        Ok(binding.clone())
    }

    /// Re-reads the block at `party_index` from the bound sheet and renders it.
    pub async fn project(
        &self,
        thread_id: &ThreadId,
        party_index: u32,
    ) -> Result<Projection, TrackerError> {
        let entry = self.entry(thread_id).await?;
        let mut binding = entry.lock().await;

        let bound = binding.parties.len();
        let position = binding
            .parties
            .iter()
            .position(|party| party.index == party_index)
            .ok_or_else(|| TrackerError::IndexOutOfRange {
                thread_id: thread_id.clone(),
                party_index,
                bound,
            })?;

        let (first_column, last_column) = codec::party_columns(party_index);
        let rows = self
            .store
            .read_range(
                &binding.source,
                &CellRange::columns_from(first_column, last_column, HEADER_ROWS + 1),
            )
            .await
            .map_err(TrackerError::ReadFailed)?;

        let party = &mut binding.parties[position];
        let block = codec::decode_block(party_index, party.name.clone(), &rows);
        let rendered = codec::encode(&block);
        let changed = party.last_rendered.as_deref() != Some(rendered.as_str());
        party.last_rendered = Some(rendered.clone());

        debug!(
            event_name = "roster.projection.rendered",
            thread_id = %thread_id,
            party_index,
            slots = block.slots.len(),
            changed,
            "party projection rendered"
        );

        Ok(Projection {
            message: party.message.clone(),
            party_index,
            party_name: party.name.clone(),
            rendered,
            changed,
        })
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }

    async fn entry(&self, thread_id: &ThreadId) -> Result<Arc<Mutex<ThreadBinding>>, TrackerError> {
        self.bindings
            .read()
            .await
            .get(thread_id)
            .cloned()
            .ok_or_else(|| TrackerError::UnknownThread(thread_id.clone()))
    }
}
