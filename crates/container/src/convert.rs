//! Conversions between proto types and domain types.
//!
//! Malformed messages are reported as `tonic::Status::invalid_argument`,
//! the error type of the wire layer itself.

use crate::info::{ContainerInfo, ContainerInfoBuilder};
use crate::pipeline::{DatanodeDetails, Pipeline};
use scm_common::{
    DatanodeId, LifeCycleState, PipelineId, ReplicationFactor, ReplicationType, ScmError,
};
use scm_proto::hdds as pb;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::Status;

/// Map a domain error onto the gRPC status a caller should see.
pub fn status_from_error(err: ScmError) -> Status {
    match err {
        ScmError::InvalidArgument(msg) => Status::invalid_argument(msg),
        ScmError::ContainerNotFound(_) => Status::not_found(err.to_string()),
        ScmError::ContainerExists(_) => Status::already_exists(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

pub fn state_to_proto(state: LifeCycleState) -> pb::LifeCycleState {
    match state {
        LifeCycleState::Open => pb::LifeCycleState::Open,
        LifeCycleState::Closing => pb::LifeCycleState::Closing,
        LifeCycleState::QuasiClosed => pb::LifeCycleState::QuasiClosed,
        LifeCycleState::Closed => pb::LifeCycleState::Closed,
        LifeCycleState::Deleting => pb::LifeCycleState::Deleting,
        LifeCycleState::Deleted => pb::LifeCycleState::Deleted,
        LifeCycleState::Recovering => pb::LifeCycleState::Recovering,
    }
}

pub fn state_from_proto(raw: i32) -> Result<LifeCycleState, Status> {
    match pb::LifeCycleState::try_from(raw) {
        Ok(pb::LifeCycleState::Open) => Ok(LifeCycleState::Open),
        Ok(pb::LifeCycleState::Closing) => Ok(LifeCycleState::Closing),
        Ok(pb::LifeCycleState::QuasiClosed) => Ok(LifeCycleState::QuasiClosed),
        Ok(pb::LifeCycleState::Closed) => Ok(LifeCycleState::Closed),
        Ok(pb::LifeCycleState::Deleting) => Ok(LifeCycleState::Deleting),
        Ok(pb::LifeCycleState::Deleted) => Ok(LifeCycleState::Deleted),
        Ok(pb::LifeCycleState::Recovering) => Ok(LifeCycleState::Recovering),
        Ok(pb::LifeCycleState::Unspecified) => {
            Err(Status::invalid_argument("missing lifecycle state"))
        }
        Err(_) => Err(Status::invalid_argument(format!(
            "unknown lifecycle state: {}",
            raw
        ))),
    }
}

pub fn factor_to_proto(factor: ReplicationFactor) -> pb::ReplicationFactor {
    match factor {
        ReplicationFactor::One => pb::ReplicationFactor::One,
        ReplicationFactor::Three => pb::ReplicationFactor::Three,
    }
}

pub fn factor_from_proto(raw: i32) -> Result<ReplicationFactor, Status> {
    match pb::ReplicationFactor::try_from(raw) {
        Ok(pb::ReplicationFactor::One) => Ok(ReplicationFactor::One),
        Ok(pb::ReplicationFactor::Three) => Ok(ReplicationFactor::Three),
        Ok(pb::ReplicationFactor::Unspecified) => {
            Err(Status::invalid_argument("missing replication factor"))
        }
        Err(_) => Err(Status::invalid_argument(format!(
            "unknown replication factor: {}",
            raw
        ))),
    }
}

pub fn type_to_proto(ty: ReplicationType) -> pb::ReplicationType {
    match ty {
        ReplicationType::Ratis => pb::ReplicationType::Ratis,
        ReplicationType::StandAlone => pb::ReplicationType::StandAlone,
        ReplicationType::Chained => pb::ReplicationType::Chained,
    }
}

pub fn type_from_proto(raw: i32) -> Result<ReplicationType, Status> {
    match pb::ReplicationType::try_from(raw) {
        Ok(pb::ReplicationType::Ratis) => Ok(ReplicationType::Ratis),
        Ok(pb::ReplicationType::StandAlone) => Ok(ReplicationType::StandAlone),
        Ok(pb::ReplicationType::Chained) => Ok(ReplicationType::Chained),
        Ok(pb::ReplicationType::Unspecified) => {
            Err(Status::invalid_argument("missing replication type"))
        }
        Err(_) => Err(Status::invalid_argument(format!(
            "unknown replication type: {}",
            raw
        ))),
    }
}

// ---------------------------------------------------------------------------
// DatanodeDetails
// ---------------------------------------------------------------------------

pub fn datanode_to_proto(node: &DatanodeDetails) -> pb::DatanodeDetails {
    pb::DatanodeDetails {
        uuid: node.id.as_bytes().to_vec(),
        host_name: node.host_name.clone(),
        address: node.addr.to_string(),
    }
}

pub fn datanode_from_proto(proto: &pb::DatanodeDetails) -> Result<DatanodeDetails, Status> {
    let id = DatanodeId::from_slice(&proto.uuid).map_err(status_from_error)?;
    let addr: SocketAddr = proto
        .address
        .parse()
        .map_err(|e| Status::invalid_argument(format!("invalid address: {}", e)))?;
    Ok(DatanodeDetails::new(id, proto.host_name.clone(), addr))
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

impl Pipeline {
    pub fn to_proto(&self) -> pb::Pipeline {
        pb::Pipeline {
            id: self.id().as_bytes().to_vec(),
            factor: factor_to_proto(self.factor()) as i32,
            r#type: type_to_proto(self.replication_type()) as i32,
            members: self.members().iter().map(datanode_to_proto).collect(),
            leader_id: self.leader().map(|id| id.as_bytes().to_vec()),
        }
    }

    pub fn from_proto(proto: &pb::Pipeline) -> Result<Self, Status> {
        let id = PipelineId::from_slice(&proto.id).map_err(status_from_error)?;
        let members = proto
            .members
            .iter()
            .map(datanode_from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        let pipeline = Pipeline::new(
            id,
            factor_from_proto(proto.factor)?,
            type_from_proto(proto.r#type)?,
            members,
        );
        match &proto.leader_id {
            Some(raw) => {
                let leader = DatanodeId::from_slice(raw).map_err(status_from_error)?;
                Ok(pipeline.with_leader(leader))
            }
            None => Ok(pipeline),
        }
    }
}

// ---------------------------------------------------------------------------
// ContainerInfo
// ---------------------------------------------------------------------------

impl ContainerInfo {
    /// Encode every transmitted field. Private data and the last-used
    /// instant stay local; an absent owner is left out rather than sent as
    /// an empty string.
    pub fn to_proto(&self) -> pb::ContainerInfo {
        pb::ContainerInfo {
            container_id: self.id(),
            pipeline: Some(self.pipeline().to_proto()),
            allocated_bytes: self.allocated_bytes(),
            used_bytes: self.used_bytes(),
            number_of_keys: self.number_of_keys(),
            state: state_to_proto(self.state()) as i32,
            state_enter_time: self.state_enter_time(),
            owner: self.owner().map(str::to_string),
            delete_transaction_id: self.delete_transaction_id(),
        }
    }

    /// Decode a record, going through the builder so that the same
    /// validation applies and `last_used` is stamped fresh.
    pub fn from_proto(proto: &pb::ContainerInfo) -> Result<Self, Status> {
        let pipeline = Pipeline::from_proto(
            proto
                .pipeline
                .as_ref()
                .ok_or_else(|| Status::invalid_argument("missing pipeline"))?,
        )?;

        ContainerInfoBuilder::new(Arc::new(pipeline))
            .container_id(proto.container_id)
            .state(state_from_proto(proto.state)?)
            .allocated_bytes(proto.allocated_bytes)
            .used_bytes(proto.used_bytes)
            .number_of_keys(proto.number_of_keys)
            .state_enter_time(proto.state_enter_time)
            .delete_transaction_id(proto.delete_transaction_id)
            .optional_owner(proto.owner.clone())
            .build()
            .map_err(status_from_error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
