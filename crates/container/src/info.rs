//! The container metadata record.
//!
//! A [`ContainerInfo`] is a passive value: it never checks state
//! transitions or usage counters, and it has no internal locking. The
//! container manager serialises writers (one lock per container, see
//! [`crate::ContainerMap`]) and decides which mutations are legal.

use crate::pipeline::Pipeline;
use scm_common::{ContainerId, LifeCycleState, ScmError};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::time::Instant;

/// Metadata for one storage container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    container_id: ContainerId,
    state: LifeCycleState,
    pipeline: Arc<Pipeline>,
    /// Bytes handed out to clients by the manager.
    allocated_bytes: i64,
    /// Actual usage, as last reported by the datanodes.
    used_bytes: i64,
    number_of_keys: i64,
    /// Process-local recency marker; never sent over the wire.
    last_used: Instant,
    /// Wall-clock ms since the epoch at which `state` was entered.
    state_enter_time: i64,
    owner: Option<String>,
    delete_transaction_id: i64,
    /// Caller scratch data; never sent over the wire.
    data: Option<Vec<u8>>,
}

impl ContainerInfo {
    /// Start building a record served by `pipeline`.
    pub fn builder(pipeline: Arc<Pipeline>) -> ContainerInfoBuilder {
        ContainerInfoBuilder::new(pipeline)
    }

    pub fn container_id(&self) -> ContainerId {
        self.container_id
    }

    /// Raw container identifier.
    pub fn id(&self) -> i64 {
        self.container_id.get()
    }

    pub fn state(&self) -> LifeCycleState {
        self.state
    }

    /// Overwrite the lifecycle state. No transition check is made, and
    /// `state_enter_time` is left untouched.
    pub fn set_state(&mut self, state: LifeCycleState) {
        self.state = state;
    }

    pub fn state_enter_time(&self) -> i64 {
        self.state_enter_time
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn allocated_bytes(&self) -> i64 {
        self.allocated_bytes
    }

    /// Add `delta` to the allocated bytes. Negative deltas release space;
    /// the result is not clamped at zero and wraps on overflow.
    pub fn update_allocated_bytes(&mut self, delta: i64) {
        self.allocated_bytes = self.allocated_bytes.wrapping_add(delta);
    }

    /// Reserve `size` more bytes for client writes.
    pub fn allocate(&mut self, size: i64) {
        // TODO: check against a container size limit once records carry one.
        self.update_allocated_bytes(size);
    }

    pub fn used_bytes(&self) -> i64 {
        self.used_bytes
    }

    pub fn number_of_keys(&self) -> i64 {
        self.number_of_keys
    }

    pub fn delete_transaction_id(&self) -> i64 {
        self.delete_transaction_id
    }

    /// Record that delete transaction `transaction_id` has been applied.
    ///
    /// Keeps the larger of the stored and given ids, so stale or repeated
    /// values are harmless.
    pub fn merge_delete_transaction_id(&mut self, transaction_id: i64) {
        self.delete_transaction_id = self.delete_transaction_id.max(transaction_id);
    }

    /// When this record was last used, from the manager's point of view.
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Mark the record as used now.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn set_owner(&mut self, owner: Option<String>) {
        self.owner = owner;
    }

    /// A copy of the private data attached to this record.
    pub fn data(&self) -> Option<Vec<u8>> {
        self.data.clone()
    }

    /// Replace the private data with a copy of `data`.
    ///
    /// `None` leaves the current data in place; `Some(&[])` replaces it with
    /// an empty buffer.
    pub fn set_data(&mut self, data: Option<&[u8]>) {
        if let Some(data) = data {
            self.data = Some(data.to_vec());
        }
    }

    /// Order two records by recency, least recently used first.
    ///
    /// This ignores every other field, so records that are equal by
    /// identity may still compare as `Less` or `Greater`.
    pub fn cmp_last_used(&self, other: &Self) -> Ordering {
        self.last_used.cmp(&other.last_used)
    }
}

/// Identity is container id plus owner. The pipeline is not part of it.
impl PartialEq for ContainerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.container_id == other.container_id && self.owner == other.owner
    }
}

impl Eq for ContainerInfo {}

/// Hashes the pipeline's factor and type along with the identity fields.
/// Two equal records on differently shaped pipelines may therefore hash
/// differently; lookups keyed by `ContainerInfo` must not rely on `Eq`
/// alone.
impl Hash for ContainerInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container_id.hash(state);
        self.pipeline.factor().hash(state);
        self.pipeline.replication_type().hash(state);
        self.owner.hash(state);
    }
}

impl fmt::Display for ContainerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContainerInfo{{id={}, state={}, pipeline={}, allocated={}, used={}, keys={}, \
             stateEnterTime={}, owner={}, deleteTxId={}}}",
            self.container_id.get(),
            self.state,
            self.pipeline.id(),
            self.allocated_bytes,
            self.used_bytes,
            self.number_of_keys,
            self.state_enter_time,
            self.owner.as_deref().unwrap_or("-"),
            self.delete_transaction_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`ContainerInfo`].
///
/// Unset numeric fields default to zero, the state defaults to
/// [`LifeCycleState::Open`] and the owner to absent.
#[derive(Debug, Clone)]
pub struct ContainerInfoBuilder {
    container_id: i64,
    state: LifeCycleState,
    pipeline: Arc<Pipeline>,
    allocated_bytes: i64,
    used_bytes: i64,
    number_of_keys: i64,
    state_enter_time: i64,
    owner: Option<String>,
    delete_transaction_id: i64,
}

impl ContainerInfoBuilder {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            container_id: 0,
            state: LifeCycleState::default(),
            pipeline,
            allocated_bytes: 0,
            used_bytes: 0,
            number_of_keys: 0,
            state_enter_time: 0,
            owner: None,
            delete_transaction_id: 0,
        }
    }

    pub fn container_id(mut self, id: i64) -> Self {
        self.container_id = id;
        self
    }

    pub fn state(mut self, state: LifeCycleState) -> Self {
        self.state = state;
        self
    }

    pub fn pipeline(mut self, pipeline: Arc<Pipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn allocated_bytes(mut self, bytes: i64) -> Self {
        self.allocated_bytes = bytes;
        self
    }

    pub fn used_bytes(mut self, bytes: i64) -> Self {
        self.used_bytes = bytes;
        self
    }

    pub fn number_of_keys(mut self, keys: i64) -> Self {
        self.number_of_keys = keys;
        self
    }

    /// Wall-clock ms since the epoch at which the state was entered.
    pub fn state_enter_time(mut self, millis: i64) -> Self {
        self.state_enter_time = millis;
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Set or clear the owner; `None` leaves the record without one.
    pub fn optional_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }

    pub fn delete_transaction_id(mut self, transaction_id: i64) -> Self {
        self.delete_transaction_id = transaction_id;
        self
    }

    /// Finish the record, stamping `last_used` with the current instant.
    pub fn build(self) -> Result<ContainerInfo, ScmError> {
        if self.container_id < 0 {
            return Err(ScmError::InvalidArgument(format!(
                "container id must be >= 0, got {}",
                self.container_id
            )));
        }
        Ok(ContainerInfo {
            container_id: ContainerId::new(self.container_id),
            state: self.state,
            pipeline: self.pipeline,
            allocated_bytes: self.allocated_bytes,
            used_bytes: self.used_bytes,
            number_of_keys: self.number_of_keys,
            last_used: Instant::now(),
            state_enter_time: self.state_enter_time,
            owner: self.owner,
            delete_transaction_id: self.delete_transaction_id,
            data: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
