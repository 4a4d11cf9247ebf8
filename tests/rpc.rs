//! RPC transport behaviour: tonic services served through the supervisor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tandem::Supervisor;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::ServerReflectionRequest;

mod common;

use common::{rpc_channel, start, test_config, GrpcHealth};

fn overall() -> HealthCheckRequest {
    HealthCheckRequest {
        service: String::new(),
    }
}

fn list_services() -> ServerReflectionRequest {
    ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::ListServices(String::new())),
    }
}

#[tokio::test]
async fn unary_call_is_served_until_stop() {
    let supervisor = Supervisor::new(test_config());
    supervisor.set_service(Arc::new(GrpcHealth)).unwrap();
    let (addrs, run) = start(&supervisor).await;

    let mut client = HealthClient::new(rpc_channel(addrs.rpc).await);
    let response = client.check(overall()).await.unwrap().into_inner();
    assert_eq!(response.status, ServingStatus::Serving as i32);

    supervisor.stop(Duration::from_secs(1)).await;
    let result = tokio::time::timeout(Duration::from_secs(3), run)
        .await
        .expect("run should return after stop")
        .unwrap();
    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
async fn reflection_lists_registered_services() {
    let supervisor = Supervisor::new(test_config());
    supervisor.set_service(Arc::new(GrpcHealth)).unwrap();
    let (addrs, run) = start(&supervisor).await;

    let mut client = ServerReflectionClient::new(rpc_channel(addrs.rpc).await);
    let mut responses = client
        .server_reflection_info(tokio_stream::once(list_services()))
        .await
        .unwrap()
        .into_inner();
    let response = responses.message().await.unwrap().expect("one response");

    let names: Vec<String> = match response.message_response {
        Some(MessageResponse::ListServicesResponse(list)) => {
            list.service.into_iter().map(|s| s.name).collect()
        }
        other => panic!("unexpected reflection response: {:?}", other),
    };
    assert!(names.iter().any(|n| n == "grpc.health.v1.Health"), "{:?}", names);
    assert!(
        names.iter().any(|n| n == "grpc.reflection.v1.ServerReflection"),
        "{:?}",
        names
    );

    drop(responses);
    drop(client);
    supervisor.stop(Duration::from_secs(1)).await;
    assert!(run.await.unwrap().is_ok());
}

#[tokio::test]
async fn reflection_can_be_disabled() {
    let mut config = test_config();
    config.rpc.disable_reflection = true;
    let supervisor = Supervisor::new(config);
    supervisor.set_service(Arc::new(GrpcHealth)).unwrap();
    let (addrs, run) = start(&supervisor).await;

    let mut client = ServerReflectionClient::new(rpc_channel(addrs.rpc).await);
    match client
        .server_reflection_info(tokio_stream::once(list_services()))
        .await
    {
        Ok(_) => panic!("reflection should not be served"),
        Err(status) => assert_eq!(status.code(), tonic::Code::Unimplemented),
    }

    supervisor.stop(Duration::from_secs(1)).await;
    assert!(run.await.unwrap().is_ok());
}

#[tokio::test]
async fn open_stream_is_cut_off_after_grace() {
    let supervisor = Supervisor::new(test_config());
    supervisor.set_service(Arc::new(GrpcHealth)).unwrap();
    let (addrs, run) = start(&supervisor).await;

    // Watch streams stay open until the server goes away.
    let mut client = HealthClient::new(rpc_channel(addrs.rpc).await);
    let mut updates = client.watch(overall()).await.unwrap().into_inner();
    let first = updates.message().await.unwrap().expect("current status");
    assert_eq!(first.status, ServingStatus::Serving as i32);

    let started = Instant::now();
    supervisor.stop(Duration::from_millis(200)).await;
    assert!(run.await.unwrap().is_ok());
    assert!(started.elapsed() < Duration::from_secs(2));

    let next = tokio::time::timeout(Duration::from_secs(2), updates.message())
        .await
        .expect("RPC transport must force-close open streams after the grace period");
    assert!(!matches!(next, Ok(Some(_))), "{:?}", next);
}
