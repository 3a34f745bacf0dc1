//! gRPC networking layer for the storage container manager.
//!
//! Provides:
//! - `ContainerLocationService`: bridges the location proto to `ContainerMap`
//! - `ScmClient`: typed client returning domain records
//! - `build_server`: assembles the services into a tonic `Router`

#![allow(clippy::result_large_err)]

pub mod client;
pub mod server;

pub use client::{ClientError, ScmClient};
pub use server::ContainerLocationService;

use scm_container::ContainerMap;
use scm_proto::location::container_location_server::ContainerLocationServer;
use std::sync::Arc;

/// Build a tonic `Router` serving the container location service.
pub fn build_server(
    containers: Arc<ContainerMap>,
    max_list_count: u32,
) -> tonic::transport::server::Router {
    let location = ContainerLocationService::new(containers, max_list_count);
    tonic::transport::Server::builder().add_service(ContainerLocationServer::new(location))
}
