//! Generated gRPC code for the storage container manager protobuf definitions.

/// Container metadata wire types (ContainerInfo, Pipeline, DatanodeDetails, enums).
pub mod hdds {
    tonic::include_proto!("scm.hdds");
}

/// Container location service (AllocateContainer, GetContainer, ListContainers).
pub mod location {
    tonic::include_proto!("scm.location");
}
