//! scm-common: shared types for the storage container manager.
//!
//! Provides the identifier newtypes (`ContainerId`, `PipelineId`,
//! `DatanodeId`), the lifecycle and replication enums, and the
//! crate-wide [`ScmError`].

use rand::Rng;
use std::fmt;

/// Number of bytes in a pipeline or datanode identifier.
pub const ID_BYTES: usize = 16;

// ---------------------------------------------------------------------------
// ContainerId
// ---------------------------------------------------------------------------

/// Cluster-wide identifier of a storage container.
///
/// Valid identifiers are non-negative; the check happens where records are
/// built, not here, so that a bad value read off the wire can still be
/// reported back to the caller.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContainerId(i64);

impl ContainerId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Return the raw identifier.
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// The identifier immediately after this one, or `None` at `i64::MAX`.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Debug for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerId({})", self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DatanodeId / PipelineId
// ---------------------------------------------------------------------------

fn random_id_bytes() -> [u8; ID_BYTES] {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill(&mut bytes);
    bytes
}

fn fmt_short_hex(bytes: &[u8; ID_BYTES], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // First 4 bytes are enough to tell nodes apart in logs
    for byte in &bytes[..4] {
        write!(f, "{:02x}", byte)?;
    }
    write!(f, "…")
}

/// A 128-bit identifier of a storage node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatanodeId([u8; ID_BYTES]);

impl DatanodeId {
    /// Create a `DatanodeId` from raw bytes.
    pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, failing unless it is exactly [`ID_BYTES`] long.
    pub fn from_slice(raw: &[u8]) -> Result<Self, ScmError> {
        id_bytes_from_slice("datanode id", raw).map(Self)
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    /// Generate a random `DatanodeId`.
    pub fn random() -> Self {
        Self(random_id_bytes())
    }
}

impl fmt::Debug for DatanodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatanodeId({})", self)
    }
}

impl fmt::Display for DatanodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_short_hex(&self.0, f)
    }
}

/// A 128-bit identifier of a replication pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId([u8; ID_BYTES]);

impl PipelineId {
    /// Create a `PipelineId` from raw bytes.
    pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, failing unless it is exactly [`ID_BYTES`] long.
    pub fn from_slice(raw: &[u8]) -> Result<Self, ScmError> {
        id_bytes_from_slice("pipeline id", raw).map(Self)
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    /// Generate a random `PipelineId`.
    pub fn random() -> Self {
        Self(random_id_bytes())
    }
}

impl fmt::Debug for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PipelineId({})", self)
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_short_hex(&self.0, f)
    }
}

fn id_bytes_from_slice(what: &str, raw: &[u8]) -> Result<[u8; ID_BYTES], ScmError> {
    if raw.len() != ID_BYTES {
        return Err(ScmError::InvalidArgument(format!(
            "{} must be {} bytes, got {}",
            what,
            ID_BYTES,
            raw.len()
        )));
    }
    let mut bytes = [0u8; ID_BYTES];
    bytes.copy_from_slice(raw);
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle phase of a container.
///
/// Any transition is accepted by the record itself; the container manager
/// decides which ones are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifeCycleState {
    #[default]
    Open,
    Closing,
    QuasiClosed,
    Closed,
    Deleting,
    Deleted,
    Recovering,
}

impl fmt::Display for LifeCycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifeCycleState::Open => "OPEN",
            LifeCycleState::Closing => "CLOSING",
            LifeCycleState::QuasiClosed => "QUASI_CLOSED",
            LifeCycleState::Closed => "CLOSED",
            LifeCycleState::Deleting => "DELETING",
            LifeCycleState::Deleted => "DELETED",
            LifeCycleState::Recovering => "RECOVERING",
        };
        f.write_str(s)
    }
}

/// Number of replicas a pipeline keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicationFactor {
    One,
    Three,
}

impl ReplicationFactor {
    /// Number of datanodes in a pipeline with this factor.
    pub fn replicas(&self) -> usize {
        match self {
            ReplicationFactor::One => 1,
            ReplicationFactor::Three => 3,
        }
    }
}

impl fmt::Display for ReplicationFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationFactor::One => f.write_str("ONE"),
            ReplicationFactor::Three => f.write_str("THREE"),
        }
    }
}

/// How a pipeline replicates writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicationType {
    Ratis,
    StandAlone,
    Chained,
}

impl fmt::Display for ReplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationType::Ratis => f.write_str("RATIS"),
            ReplicationType::StandAlone => f.write_str("STAND_ALONE"),
            ReplicationType::Chained => f.write_str("CHAINED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("container not found: {0}")]
    ContainerNotFound(ContainerId),

    #[error("container already exists: {0}")]
    ContainerExists(ContainerId),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
