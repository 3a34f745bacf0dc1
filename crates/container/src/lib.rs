//! Container metadata for the storage container manager.
//!
//! - [`ContainerInfo`]: one container's metadata record and its builder
//! - [`Pipeline`]: the replication group a container is placed on
//! - [`convert`]: lossless conversion to and from the protobuf wire types
//! - [`ContainerMap`]: the manager's in-memory registry of records

#![allow(clippy::result_large_err)]

pub mod convert;
pub mod info;
pub mod map;
pub mod pipeline;

pub use info::{ContainerInfo, ContainerInfoBuilder};
pub use map::ContainerMap;
pub use pipeline::{DatanodeDetails, Pipeline};
