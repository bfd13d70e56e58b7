//! Reporting of client exchanges against a live server.

mod common;

use std::net::SocketAddr;

use axum::body::Body;
use axum::routing::post;
use axum::Router;
use common::{wait_for, RecordingReporter};
use http::{Request, StatusCode};
use http_reporter::http::{ClientReporterLayer, ReportedBody};
use http_reporter::{Exchange, Reporter, Tracker};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;
use tower::{Layer, ServiceExt};

async fn start_server() -> SocketAddr {
    let app = Router::new().route(
        "/echo",
        post(|body: String| async move {
            assert_eq!(body, "req-body");
            "resp-body"
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client() -> Client<hyper_util::client::legacy::connect::HttpConnector, ReportedBody<Body>> {
    Client::builder(TokioExecutor::new()).build_http()
}

#[tokio::test]
async fn test_reports_client_exchange() {
    let addr = start_server().await;
    let reporter = RecordingReporter::new();
    let svc = ClientReporterLayer::new(reporter.clone()).layer(client());

    let req = Request::post(format!("http://{addr}/echo"))
        .body(Body::from("req-body"))
        .unwrap();
    let resp = svc.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stats = reporter.stats();
    assert_eq!(stats.request_started, 1);
    assert_eq!(stats.response_started, 1);
    assert_eq!(stats.status, Some(StatusCode::OK));
    assert_eq!(stats.response_done, 0);

    let body = axum::body::to_bytes(Body::new(resp.into_body()), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"resp-body");

    assert!(wait_for(|| reporter.stats().request_read == 1).await);
    let stats = reporter.stats();
    assert_eq!(stats.request_size, 8);
    assert_eq!(stats.response_done, 1);
    assert_eq!(stats.done_status, Some(StatusCode::OK));
    assert_eq!(stats.response_size, 9);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_dropped_response_body_completes_exchange() {
    let addr = start_server().await;
    let reporter = RecordingReporter::new();
    let svc = ClientReporterLayer::new(reporter.clone()).layer(client());

    let req = Request::post(format!("http://{addr}/echo"))
        .body(Body::from("req-body"))
        .unwrap();
    let resp = svc.oneshot(req).await.unwrap();
    drop(resp);

    let stats = reporter.stats();
    assert_eq!(stats.response_done, 1);
    assert_eq!(stats.response_size, 0);
}

#[tokio::test]
async fn test_transport_error_reports_failure() {
    // Bind and release a port so nothing is listening on it.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let reporter = RecordingReporter::new();
    let svc = ClientReporterLayer::new(reporter.clone()).layer(client());

    let req = Request::post(format!("http://{addr}/echo"))
        .body(Body::from("req-body"))
        .unwrap();
    assert!(svc.oneshot(req).await.is_err());

    let stats = reporter.stats();
    assert_eq!(stats.request_started, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.response_started, 0);
    assert_eq!(stats.response_done, 0);
}

#[tokio::test]
async fn test_declined_client_exchange_is_untouched() {
    struct Declining;

    impl Reporter for Declining {
        fn track(&self, _exchange: &Exchange<'_>) -> Option<Box<dyn Tracker>> {
            None
        }
    }

    let addr = start_server().await;
    let svc = ClientReporterLayer::new(Declining).layer(client());

    let req = Request::post(format!("http://{addr}/echo"))
        .body(Body::from("req-body"))
        .unwrap();
    let resp = svc.oneshot(req).await.unwrap();
    let body = axum::body::to_bytes(Body::new(resp.into_body()), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"resp-body");
}
