//! Integration test: run the container location service over real gRPC
//! and drive it with `ScmClient`.

use scm_common::{
    ContainerId, DatanodeId, LifeCycleState, PipelineId, ReplicationFactor, ReplicationType,
};
use scm_container::{ContainerMap, DatanodeDetails, Pipeline};
use scm_net::{build_server, ClientError, ScmClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Duration;

struct TestServer {
    addr: SocketAddr,
    containers: Arc<ContainerMap>,
}

async fn spawn_server(port: u16, max_list_count: u32) -> TestServer {
    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let containers = Arc::new(ContainerMap::new(1));
    let router = build_server(containers.clone(), max_list_count);

    tokio::spawn(async move {
        router.serve(addr).await.unwrap();
    });

    // Wait for server to be ready
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestServer { addr, containers }
}

async fn connect(server: &TestServer) -> ScmClient {
    ScmClient::connect(format!("http://{}", server.addr))
        .await
        .unwrap()
}

fn ratis_pipeline() -> Pipeline {
    let members: Vec<DatanodeDetails> = (0..3u8)
        .map(|i| {
            DatanodeDetails::new(
                DatanodeId::random(),
                format!("dn{}", i),
                SocketAddr::from(([10, 1, 0, i + 1], 9858)),
            )
        })
        .collect();
    let leader = members[0].id;
    Pipeline::new(
        PipelineId::random(),
        ReplicationFactor::Three,
        ReplicationType::Ratis,
        members,
    )
    .with_leader(leader)
}

#[tokio::test]
async fn test_allocate_then_get() {
    let server = spawn_server(17300, 100).await;
    let mut client = connect(&server).await;
    let pipeline = ratis_pipeline();

    let allocated = client
        .allocate_container(&pipeline, Some("ozone"))
        .await
        .unwrap();
    assert_eq!(allocated.id(), 1);
    assert_eq!(allocated.state(), LifeCycleState::Open);
    assert_eq!(allocated.owner(), Some("ozone"));
    assert_eq!(allocated.pipeline().as_ref(), &pipeline);

    let fetched = client.get_container(allocated.container_id()).await.unwrap();
    assert_eq!(fetched, allocated);
    assert_eq!(fetched.state_enter_time(), allocated.state_enter_time());
    assert_eq!(server.containers.len().await, 1);
}

#[tokio::test]
async fn test_absent_owner_survives_the_wire() {
    let server = spawn_server(17310, 100).await;
    let mut client = connect(&server).await;

    let allocated = client
        .allocate_container(&ratis_pipeline(), None)
        .await
        .unwrap();
    assert_eq!(allocated.owner(), None);

    let fetched = client.get_container(allocated.container_id()).await.unwrap();
    assert_eq!(fetched.owner(), None);
}

#[tokio::test]
async fn test_server_side_mutations_visible() {
    let server = spawn_server(17320, 100).await;
    let mut client = connect(&server).await;

    let id = client
        .allocate_container(&ratis_pipeline(), None)
        .await
        .unwrap()
        .container_id();

    server
        .containers
        .update_allocated_bytes(id, 4096)
        .await
        .unwrap();
    server
        .containers
        .merge_delete_transaction_id(id, 12)
        .await
        .unwrap();
    server
        .containers
        .update_state(id, LifeCycleState::Closing)
        .await
        .unwrap();

    let fetched = client.get_container(id).await.unwrap();
    assert_eq!(fetched.allocated_bytes(), 4096);
    assert_eq!(fetched.delete_transaction_id(), 12);
    assert_eq!(fetched.state(), LifeCycleState::Closing);
}

#[tokio::test]
async fn test_get_missing_container() {
    let server = spawn_server(17330, 100).await;
    let mut client = connect(&server).await;

    let err = client
        .get_container(ContainerId::new(404))
        .await
        .unwrap_err();
    match err {
        ClientError::Rpc(status) => assert_eq!(status.code(), tonic::Code::NotFound),
        other => panic!("expected rpc error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_containers_paged() {
    let server = spawn_server(17340, 3).await;
    let mut client = connect(&server).await;
    let pipeline = ratis_pipeline();

    for _ in 0..7 {
        client.allocate_container(&pipeline, None).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut start = ContainerId::new(0);
    loop {
        let page = client.list_containers(start, 0).await.unwrap();
        if page.is_empty() {
            break;
        }
        assert!(page.len() <= 3, "server cap must apply");
        start = page.last().unwrap().container_id().next().unwrap();
        seen.extend(page.iter().map(|c| c.id()));
    }
    assert_eq!(seen, (1..=7).collect::<Vec<i64>>());
}
