//! End-to-end tests of the Icecast webhook contract.

use radio_gateway::config::GatewayConfig;
use radio_gateway::tracker::webhook::ICECAST_AUTH_HEADER;
use reqwest::StatusCode;
use tokio::task::JoinSet;

mod common;

async fn post(client: &reqwest::Client, url: String, client_id: &str) -> reqwest::Response {
    client
        .post(url)
        .form(&[("client", client_id)])
        .send()
        .await
        .expect("gateway unreachable")
}

#[tokio::test]
async fn join_then_leave() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    let res = post(&client, gateway.url("/listener_joined"), "500").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get(ICECAST_AUTH_HEADER.as_str()).unwrap(), "1");
    assert!(common::eventually(|| gateway.recorder.listener_amount() == 1).await);

    let res = post(&client, gateway.url("/listener_left"), "500").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get(ICECAST_AUTH_HEADER.as_str()).unwrap(), "1");
    assert!(common::eventually(|| gateway.recorder.listener_amount() == 0).await);
    assert_eq!(gateway.recorder.pending_amount(), 0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn invalid_client_ids_are_not_admitted() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    for path in ["/listener_joined", "/listener_left"] {
        for id in ["", "not an integer", "-1", "1.5"] {
            let res = post(&client, gateway.url(path), id).await;
            assert_eq!(res.status(), StatusCode::OK, "{path} {id:?}");
            assert!(
                res.headers().get(ICECAST_AUTH_HEADER.as_str()).is_none(),
                "{path} {id:?}"
            );
        }

        // No form at all.
        let res = client.post(gateway.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(ICECAST_AUTH_HEADER.as_str()).is_none());
    }

    assert_eq!(gateway.recorder.listener_amount(), 0);
    assert_eq!(gateway.recorder.pending_amount(), 0);

    gateway.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_out_of_order_burst() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    let burst = |invert: bool| {
        let mut set = JoinSet::new();
        for id in 0..200u32 {
            let joins = (id % 2 == 0) != invert;
            let path = if joins { "/listener_joined" } else { "/listener_left" };
            let url = gateway.url(path);
            let client = client.clone();
            set.spawn(async move {
                let res = post(&client, url, &id.to_string()).await;
                assert_eq!(res.status(), StatusCode::OK);
                assert!(res.headers().get(ICECAST_AUTH_HEADER.as_str()).is_some());
            });
        }
        set
    };

    burst(false).join_all().await;
    assert_eq!(gateway.recorder.listener_amount(), 100);
    assert_eq!(gateway.recorder.pending_amount(), 100);

    burst(true).join_all().await;
    assert_eq!(gateway.recorder.listener_amount(), 0);
    assert_eq!(gateway.recorder.pending_amount(), 0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn status_reflects_webhooks() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    post(&client, gateway.url("/listener_joined"), "1").await;
    post(&client, gateway.url("/listener_joined"), "2").await;
    post(&client, gateway.url("/listener_left"), "3").await;

    let json: serde_json::Value = client
        .get(gateway.url("/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["listeners"], 2);
    assert_eq!(json["pending_removal"], 1);

    gateway.shutdown.trigger();
}
