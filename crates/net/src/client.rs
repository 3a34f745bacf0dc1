//! gRPC client for the container location service.
//!
//! `ScmClient` wraps the generated tonic client and hands back decoded
//! [`ContainerInfo`] records instead of raw proto messages.

use scm_common::ContainerId;
use scm_container::{ContainerInfo, Pipeline};
use scm_proto::location::container_location_client::ContainerLocationClient;
use scm_proto::location::{AllocateContainerRequest, GetContainerRequest, ListContainersRequest};
use tonic::transport::Channel;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),
}

/// Typed client for a remote container manager.
#[derive(Debug, Clone)]
pub struct ScmClient {
    inner: ContainerLocationClient<Channel>,
}

impl ScmClient {
    /// Connect to `endpoint`, e.g. `http://127.0.0.1:9860`.
    pub async fn connect(endpoint: String) -> Result<Self, ClientError> {
        let inner = ContainerLocationClient::connect(endpoint).await?;
        Ok(Self { inner })
    }

    /// Ask the manager for a new container on `pipeline`.
    pub async fn allocate_container(
        &mut self,
        pipeline: &Pipeline,
        owner: Option<&str>,
    ) -> Result<ContainerInfo, ClientError> {
        let resp = self
            .inner
            .allocate_container(AllocateContainerRequest {
                pipeline: Some(pipeline.to_proto()),
                owner: owner.map(str::to_string),
            })
            .await?;
        Ok(ContainerInfo::from_proto(&resp.into_inner())?)
    }

    pub async fn get_container(&mut self, id: ContainerId) -> Result<ContainerInfo, ClientError> {
        let resp = self
            .inner
            .get_container(GetContainerRequest {
                container_id: id.get(),
            })
            .await?;
        Ok(ContainerInfo::from_proto(&resp.into_inner())?)
    }

    /// List up to `count` containers starting at `start`. A `count` of zero
    /// asks for the server's maximum.
    pub async fn list_containers(
        &mut self,
        start: ContainerId,
        count: u32,
    ) -> Result<Vec<ContainerInfo>, ClientError> {
        let resp = self
            .inner
            .list_containers(ListContainersRequest {
                start_container_id: start.get(),
                count,
            })
            .await?;
        let containers = resp
            .into_inner()
            .containers
            .iter()
            .map(ContainerInfo::from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("listed {} container(s) from {}", containers.len(), start);
        Ok(containers)
    }
}
