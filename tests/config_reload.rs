//! Hot reload: configs sent to a running server replace its relay.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use route_relay::config::RelayConfig;

mod common;

async fn fetch(relay: SocketAddr) -> (StatusCode, String) {
    let res = common::client()
        .get(format!("http://{}/", relay))
        .query(&[("route", "/")])
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.text().await.unwrap())
}

/// Poll until the relay answers with `expected`, failing after a few seconds.
async fn wait_for(relay: SocketAddr, expected: (StatusCode, &str)) {
    for _ in 0..100 {
        let (status, body) = fetch(relay).await;
        if status == expected.0 && body == expected.1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("relay never answered {:?}", expected);
}

#[tokio::test]
async fn test_reload_switches_upstream() {
    let (first, _) = common::start_fixed_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nfirst").await;
    let (second, mut second_seen) =
        common::start_fixed_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nsecond").await;
    let (relay, shutdown, updates) = common::start_reloadable_relay(common::relay_config(first)).await;

    assert_eq!(fetch(relay).await, (StatusCode::OK, "first".to_string()));

    updates.send(common::relay_config(second)).unwrap();
    wait_for(relay, (StatusCode::OK, "second")).await;
    assert!(second_seen.recv().await.is_some());

    shutdown.trigger();
}

#[tokio::test]
async fn test_reload_applies_allow_list() {
    let (upstream, _) = common::start_fixed_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;
    let (relay, shutdown, updates) = common::start_reloadable_relay(common::relay_config(upstream)).await;

    assert_eq!(fetch(relay).await.0, StatusCode::OK);

    let mut restricted = common::relay_config(upstream);
    restricted.access.allowed_clients = Some(vec!["10.9.9.9".into()]);
    updates.send(restricted).unwrap();

    wait_for(
        relay,
        (
            StatusCode::FORBIDDEN,
            "Fatal relay error: requests from hostname (127.0.0.1) are not allowed",
        ),
    )
    .await;

    shutdown.trigger();
}

#[tokio::test]
async fn test_rejected_reload_keeps_current_relay() {
    let (upstream, _) = common::start_fixed_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nkept").await;
    let (relay, shutdown, updates) = common::start_reloadable_relay(common::relay_config(upstream)).await;

    let mut secure = RelayConfig::default();
    secure.upstream.base_address = "https://secure.internal".into();
    updates.send(secure).unwrap();

    let mut missing = RelayConfig::default();
    missing.upstream.base_address = String::new();
    updates.send(missing).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fetch(relay).await, (StatusCode::OK, "kept".to_string()));

    // The reload loop is still alive after the rejections.
    let mut restricted = common::relay_config(upstream);
    restricted.access.allowed_clients = Some(vec!["10.9.9.9".into()]);
    updates.send(restricted).unwrap();
    for _ in 0..100 {
        if fetch(relay).await.0 == StatusCode::FORBIDDEN {
            shutdown.trigger();
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("valid reload after rejected ones was not applied");
}

#[tokio::test]
async fn test_reload_changes_body_limit() {
    let (upstream, _) = common::start_fixed_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;
    let mut small = common::relay_config(upstream);
    small.request.max_body_size = 8;
    let (relay, shutdown, updates) = common::start_reloadable_relay(small).await;

    let post = || async {
        let res = common::client()
            .post(format!("http://{}/", relay))
            .query(&[("route", "/upload")])
            .body(vec![b'x'; 32])
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.text().await.unwrap())
    };

    let (status, body) = post().await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, "Fatal relay error: request body exceeds 8 bytes");

    let mut large = common::relay_config(upstream);
    large.request.max_body_size = 64;
    updates.send(large).unwrap();

    for _ in 0..100 {
        if post().await == (StatusCode::OK, "ok".to_string()) {
            shutdown.trigger();
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("raised body limit was not applied");
}
