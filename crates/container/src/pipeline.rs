//! Replication pipelines and the datanodes that form them.

use scm_common::{DatanodeId, PipelineId, ReplicationFactor, ReplicationType};
use std::net::SocketAddr;

/// Descriptor for a storage node taking part in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatanodeDetails {
    pub id: DatanodeId,
    pub host_name: String,
    /// Address the datanode serves container traffic on.
    pub addr: SocketAddr,
}

impl DatanodeDetails {
    pub fn new(id: DatanodeId, host_name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            id,
            host_name: host_name.into(),
            addr,
        }
    }

    /// Create a `DatanodeDetails` with a dummy address (useful for testing).
    pub fn with_dummy_addr(id: DatanodeId) -> Self {
        Self::new(id, "localhost", SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}

/// A replication group: a set of datanodes plus how they replicate.
///
/// Container records hold pipelines behind an `Arc`; many containers share
/// one pipeline and none of them own it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    id: PipelineId,
    factor: ReplicationFactor,
    replication_type: ReplicationType,
    members: Vec<DatanodeDetails>,
    leader: Option<DatanodeId>,
}

impl Pipeline {
    pub fn new(
        id: PipelineId,
        factor: ReplicationFactor,
        replication_type: ReplicationType,
        members: Vec<DatanodeDetails>,
    ) -> Self {
        Self {
            id,
            factor,
            replication_type,
            members,
            leader: None,
        }
    }

    /// Set the member currently leading the group.
    pub fn with_leader(mut self, leader: DatanodeId) -> Self {
        self.leader = Some(leader);
        self
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    pub fn factor(&self) -> ReplicationFactor {
        self.factor
    }

    pub fn replication_type(&self) -> ReplicationType {
        self.replication_type
    }

    pub fn members(&self) -> &[DatanodeDetails] {
        &self.members
    }

    pub fn leader(&self) -> Option<DatanodeId> {
        self.leader
    }

    /// Whether the pipeline has as many members as its factor asks for.
    pub fn is_complete(&self) -> bool {
        self.members.len() == self.factor.replicas()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_completeness() {
        let members: Vec<DatanodeDetails> = (0..3)
            .map(|_| DatanodeDetails::with_dummy_addr(DatanodeId::random()))
            .collect();
        let full = Pipeline::new(
            PipelineId::random(),
            ReplicationFactor::Three,
            ReplicationType::Ratis,
            members.clone(),
        );
        assert!(full.is_complete());
        assert_eq!(full.leader(), None);

        let partial = Pipeline::new(
            PipelineId::random(),
            ReplicationFactor::Three,
            ReplicationType::Ratis,
            members[..2].to_vec(),
        );
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_with_leader() {
        let node = DatanodeDetails::with_dummy_addr(DatanodeId::random());
        let leader = node.id;
        let p = Pipeline::new(
            PipelineId::random(),
            ReplicationFactor::One,
            ReplicationType::StandAlone,
            vec![node],
        )
        .with_leader(leader);
        assert_eq!(p.leader(), Some(leader));
        assert_eq!(p.members()[0].host_name, "localhost");
    }
}
