//! gRPC service implementations.
//!
//! Bridges the tonic-generated `ContainerLocation` trait to the
//! container registry.

use scm_common::{ContainerId, PipelineId};
use scm_container::convert::status_from_error;
use scm_container::{ContainerMap, Pipeline};
use scm_proto::hdds as pb;
use scm_proto::location::{
    container_location_server::ContainerLocation, AllocateContainerRequest, GetContainerRequest,
    ListContainersRequest, ListContainersResponse,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

/// Wall-clock millis since the epoch, for state enter times.
fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub struct ContainerLocationService {
    containers: Arc<ContainerMap>,
    /// Pipelines still referenced by some container, so containers on the
    /// same group share one `Arc`. Entries die with their last container.
    pipelines: RwLock<HashMap<PipelineId, Weak<Pipeline>>>,
    max_list_count: u32,
}

impl std::fmt::Debug for ContainerLocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerLocationService")
            .field("max_list_count", &self.max_list_count)
            .finish_non_exhaustive()
    }
}

impl ContainerLocationService {
    pub fn new(containers: Arc<ContainerMap>, max_list_count: u32) -> Self {
        Self {
            containers,
            pipelines: RwLock::new(HashMap::new()),
            max_list_count,
        }
    }

    /// Return the shared handle for `pipeline`, replacing the cached one if
    /// its membership changed.
    ///
    /// Lookup and insert happen under one write guard, so concurrent
    /// allocations on the same pipeline always end up with the same `Arc`.
    async fn shared_pipeline(&self, pipeline: Pipeline) -> Arc<Pipeline> {
        let mut cache = self.pipelines.write().await;
        cache.retain(|_, weak| weak.strong_count() > 0);
        match cache.entry(pipeline.id()) {
            Entry::Occupied(mut slot) => {
                if let Some(existing) = slot.get().upgrade() {
                    if *existing == pipeline {
                        return existing;
                    }
                }
                let shared = Arc::new(pipeline);
                slot.insert(Arc::downgrade(&shared));
                shared
            }
            Entry::Vacant(slot) => {
                let shared = Arc::new(pipeline);
                slot.insert(Arc::downgrade(&shared));
                shared
            }
        }
    }
}

#[tonic::async_trait]
impl ContainerLocation for ContainerLocationService {
    async fn allocate_container(
        &self,
        request: tonic::Request<AllocateContainerRequest>,
    ) -> Result<tonic::Response<pb::ContainerInfo>, tonic::Status> {
        let _timer = scm_metrics::record_rpc("allocate_container");
        let req = request.into_inner();
        let pipeline = Pipeline::from_proto(
            req.pipeline
                .as_ref()
                .ok_or_else(|| tonic::Status::invalid_argument("missing pipeline"))?,
        )?;
        if !pipeline.is_complete() {
            tracing::warn!(
                "allocating on pipeline {} with {} of {} members",
                pipeline.id(),
                pipeline.members().len(),
                pipeline.factor().replicas()
            );
        }
        let pipeline = self.shared_pipeline(pipeline).await;

        let info = self
            .containers
            .allocate(pipeline, req.owner, now_millis())
            .await
            .map_err(status_from_error)?;
        tracing::info!("allocated {}", info);
        Ok(tonic::Response::new(info.to_proto()))
    }

    async fn get_container(
        &self,
        request: tonic::Request<GetContainerRequest>,
    ) -> Result<tonic::Response<pb::ContainerInfo>, tonic::Status> {
        let _timer = scm_metrics::record_rpc("get_container");
        let id = ContainerId::new(request.into_inner().container_id);
        let info = self.containers.get(id).await.map_err(status_from_error)?;
        Ok(tonic::Response::new(info.to_proto()))
    }

    async fn list_containers(
        &self,
        request: tonic::Request<ListContainersRequest>,
    ) -> Result<tonic::Response<ListContainersResponse>, tonic::Status> {
        let _timer = scm_metrics::record_rpc("list_containers");
        let req = request.into_inner();
        let count = match req.count {
            0 => self.max_list_count,
            n => n.min(self.max_list_count),
        };
        let containers = self
            .containers
            .list(ContainerId::new(req.start_container_id), count as usize)
            .await;
        Ok(tonic::Response::new(ListContainersResponse {
            containers: containers.iter().map(|c| c.to_proto()).collect(),
        }))
    }
}
