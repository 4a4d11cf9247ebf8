//! Gateway transport behaviour during normal serving and shutdown.

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use tandem::Supervisor;

mod common;

use common::{client, start, test_config, EventLog, RecordingService};

#[tokio::test]
async fn service_routes_and_trace_ids() {
    let log = EventLog::default();
    let supervisor = Supervisor::new(test_config());
    supervisor.set_service(RecordingService::new("orders", &log)).unwrap();
    let (addrs, run) = start(&supervisor).await;

    let response = client()
        .get(format!("http://{}/v1/orders", addrs.gateway))
        .header("x-trace-id", "trace-123")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-trace-id"], "trace-123");
    assert_eq!(response.text().await.unwrap(), "orders");

    let response = client()
        .get(format!("http://{}/v1/orders", addrs.gateway))
        .send()
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-trace-id"));

    supervisor.stop(Duration::from_secs(1)).await;
    assert!(run.await.unwrap().is_ok());
}

#[tokio::test]
async fn admin_surfaces_take_precedence() {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let supervisor = Supervisor::with_metrics(test_config(), handle);
    supervisor.set_openapi_handler(
        Router::new().route("/service.swagger.json", get(|| async { "{\"swagger\":\"2.0\"}" })),
    );
    let (addrs, run) = start(&supervisor).await;

    let response = client()
        .get(format!("http://{}/swagger/service.swagger.json", addrs.gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("swagger"));

    let response = client()
        .get(format!("http://{}/metrics", addrs.gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    supervisor.stop(Duration::from_secs(1)).await;
    assert!(run.await.unwrap().is_ok());
}

#[tokio::test]
async fn in_flight_request_finishes_during_stop() {
    let log = EventLog::default();
    let supervisor = Supervisor::new(test_config());
    supervisor.set_service(RecordingService::new("svc", &log)).unwrap();
    let (addrs, run) = start(&supervisor).await;

    let url = format!("http://{}/v1/svc/slow", addrs.gateway);
    let request = tokio::spawn(async move { client().get(url).send().await?.text().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    supervisor.stop(Duration::from_secs(2)).await;
    assert_eq!(request.await.unwrap().unwrap(), "slow");
    assert!(run.await.unwrap().is_ok());
}

#[tokio::test]
async fn hung_request_is_cut_off_after_grace() {
    let log = EventLog::default();
    let supervisor = Supervisor::new(test_config());
    supervisor.set_service(RecordingService::new("svc", &log)).unwrap();
    let (addrs, run) = start(&supervisor).await;

    let url = format!("http://{}/v1/svc/hang", addrs.gateway);
    let request = tokio::spawn(async move { client().get(url).send().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    supervisor.stop(Duration::from_millis(200)).await;
    assert!(run.await.unwrap().is_ok());

    let result = tokio::time::timeout(Duration::from_secs(2), request)
        .await
        .expect("gateway must force-close hung connections after the grace period");
    assert!(result.unwrap().is_err());
}
