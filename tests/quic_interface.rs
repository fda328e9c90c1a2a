//! End-to-end calls over QUIC
//!
//! These tests run a real server on a loopback UDP socket and exercise the
//! full client -> stream -> dispatch -> response path.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::TestServer;
use network_rpc::core::codec::{Codec, JsonCodec, MessagePackCodec};
use network_rpc::transport::tls::TlsClientConfig;
use network_rpc::{dial, rpc_args, Client, ClientConfig, ConnectionConfig, RpcError, Value};

#[tokio::test]
async fn test_calculator_add_and_divide() {
    let server = TestServer::start().await;
    let conn = server.connect().await;
    let client = Client::new(ClientConfig::default());

    let sum = client.call(&conn, "Calc.Add", rpc_args![10, 20]).await.unwrap();
    assert_eq!(sum, Value::Int(30));

    let err = client
        .call(&conn, "Calc.Divide", rpc_args![10, 0])
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Remote(_)));
    assert_eq!(err.to_string(), "division by zero");

    let quotient: f64 = client
        .call_as(&conn, "Calc.Divide", rpc_args![10, 4])
        .await
        .unwrap();
    assert_eq!(quotient, 2.5);

    drop(conn);
    server.stop().await;
}

#[tokio::test]
async fn test_all_calculator_methods() {
    let server = TestServer::start().await;
    let conn = server.connect().await;
    let client = Client::default();

    let diff: i64 = client
        .call_as(&conn, "Calc.Subtract", rpc_args![10, 20])
        .await
        .unwrap();
    let product: i64 = client
        .call_as(&conn, "Calc.Multiply", rpc_args![6, 7])
        .await
        .unwrap();
    assert_eq!(diff, -10);
    assert_eq!(product, 42);

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_service_method_and_malformed_name() {
    let server = TestServer::start().await;
    let conn = server.connect().await;
    let client = Client::default();

    let missing = client.call(&conn, "Missing.Foo", vec![]).await.unwrap_err();
    assert_eq!(missing.to_string(), "service not found: Missing");

    let nope = client.call(&conn, "Calc.Nope", vec![]).await.unwrap_err();
    assert_eq!(nope.to_string(), "method not found: Nope");

    let malformed = client.call(&conn, "NoDotHere", vec![]).await.unwrap_err();
    assert!(malformed.to_string().starts_with("invalid service method"));

    let arity = client.call(&conn, "Calc.Add", rpc_args![1]).await.unwrap_err();
    assert!(arity.to_string().starts_with("argument mismatch"));

    let snapshot = server.metrics.snapshot();
    assert_eq!(snapshot.calls_failed, 4);
    assert_eq!(snapshot.calls_succeeded, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_alternate_codecs() {
    let codecs: [Arc<dyn Codec>; 2] = [Arc::new(JsonCodec), Arc::new(MessagePackCodec)];
    for codec in codecs {
        let server = TestServer::start_with_codec(codec.clone()).await;
        let conn = server.connect().await;
        let client = Client::new(ClientConfig::default().with_codec(codec));

        let sum = client.call(&conn, "Calc.Add", rpc_args![2, 3]).await.unwrap();
        assert_eq!(sum, Value::Int(5));
        let err = client
            .call(&conn, "Calc.Divide", rpc_args![1, 0])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "division by zero");

        server.stop().await;
    }
}

#[tokio::test]
async fn test_pinned_and_insecure_client_modes() {
    let server = TestServer::start().await;
    let cert = server.tls.certificate_chain().unwrap().remove(0);
    let hash = TlsClientConfig::calculate_cert_hash(&cert);

    for tls in [
        TlsClientConfig::new().with_pinned_cert_hash(hash),
        TlsClientConfig::new().insecure(),
    ] {
        let config = ConnectionConfig::new().with_tls(tls);
        let conn = dial(&server.addr.to_string(), Some(config)).await.unwrap();
        let sum = network_rpc::service::client::call(&conn, "Calc.Add", rpc_args![1, 1])
            .await
            .unwrap();
        assert_eq!(sum, Value::Int(2));
    }

    server.stop().await;
}

#[tokio::test]
async fn test_wrong_pinned_hash_fails_to_dial() {
    let server = TestServer::start().await;
    let config =
        ConnectionConfig::new().with_tls(TlsClientConfig::new().with_pinned_cert_hash(vec![0; 32]));

    let err = dial(&server.addr.to_string(), Some(config)).await.unwrap_err();
    assert!(matches!(err, RpcError::Dial(_)));

    server.stop().await;
}

#[tokio::test]
async fn test_call_timeout() {
    let server = TestServer::start().await;
    let conn = server.connect().await;
    let client = Client::new(ClientConfig::default().with_call_timeout(Duration::from_millis(50)));

    let err = client
        .call(&conn, "Calc.Slow", rpc_args![500u64])
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Timeout));

    let fast: u64 = client.call_as(&conn, "Calc.Slow", rpc_args![0u64]).await.unwrap();
    assert_eq!(fast, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_sessions_but_not_caller_transport() {
    let server = TestServer::start().await;
    let conn = server.connect().await;
    let transport = server.transport.clone();
    server.stop().await;

    let reason = tokio::time::timeout(Duration::from_secs(5), conn.inner().closed())
        .await
        .unwrap();
    assert!(matches!(
        reason,
        quinn::ConnectionError::ApplicationClosed(ref close) if &close.reason[..] == b"server closing"
    ));

    // The caller-owned endpoint is still usable as a client
    let _ = transport.endpoint().local_addr().unwrap();
}
