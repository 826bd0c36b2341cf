//! The server over a real socket: config updates and graceful shutdown.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use storefront_edge::config::Environment;
use storefront_edge::{HttpServer, Shutdown};

mod common;
use common::Echo;

async fn fetch(client: &reqwest::Client, addr: std::net::SocketAddr, host: &str, path: &str) -> reqwest::Response {
    client
        .get(format!("http://{}{}", addr, path))
        .header("host", host)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_serves_reloads_and_shuts_down() {
    let upstream = common::start_echo_upstream().await;
    let config = common::edge_config(Environment::Development, upstream);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config.clone(), common::components());
    let handle = tokio::spawn(server.run(listener, updates_rx, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let response = fetch(&client, addr, "acme.shop.example", "/products").await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let echo: Echo = response.json().await.unwrap();
    assert_eq!(echo.uri, "/sites/acme/products");
    assert!(echo.header("x-request-id").is_some());

    let mut reloaded = config;
    reloaded.tenancy.root_domain = "mall.example".to_string();
    updates_tx.send(reloaded).unwrap();

    let mut applied = false;
    for _ in 0..40 {
        let echo: Echo = fetch(&client, addr, "acme.mall.example", "/products")
            .await
            .json()
            .await
            .unwrap();
        if echo.uri == "/sites/acme/products" {
            applied = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(applied, "reloaded root domain never took effect");

    drop(client);
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
