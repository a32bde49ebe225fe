//! Concurrent load through a single session.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::json;

mod common;

use common::{client, mx_form, start_gateway, unwrap_reply};

#[tokio::test]
async fn test_concurrent_requests_share_one_identity() {
    let addr: SocketAddr = "127.0.0.1:28320".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;
    let client = client(false);
    let body = json!({"Protocol": "Account_Check", "Payload": {}}).to_string();

    // Establish the session and its token.
    let res = client
        .post(gateway.gateway_url())
        .multipart(mx_form(body.as_bytes()))
        .send()
        .await
        .unwrap();
    let session_cookie = res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|c| c.to_str().ok())
        .find(|c| c.starts_with("uuid="))
        .and_then(|c| c.split(';').next())
        .unwrap()
        .to_string();
    let (_, seed) = unwrap_reply(&res.bytes().await.unwrap());

    let concurrency = 20;
    let requests_per_task = 10;
    let total_requests = concurrency * requests_per_task;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = gateway.gateway_url();
        let cookie = session_cookie.clone();
        let body = body.clone();
        tasks.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                let res = client
                    .post(&url)
                    .header(COOKIE, &cookie)
                    .multipart(mx_form(body.as_bytes()))
                    .send()
                    .await
                    .unwrap();
                assert!(res.status().is_success());
                let (_, inner) = unwrap_reply(&res.bytes().await.unwrap());
                seen.push((
                    inner["SessionKey"]["MxToken"].as_str().unwrap().to_string(),
                    inner["AccountId"].as_i64().unwrap(),
                    req_start.elapsed(),
                ));
            }
            seen
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.extend(task.await.unwrap());
    }
    let duration = start.elapsed();

    let identities: HashSet<_> = results.iter().map(|(t, a, _)| (t.clone(), *a)).collect();
    assert_eq!(identities.len(), 1, "one session, one identity");
    let (token, account_id) = identities.into_iter().next().unwrap();
    assert_eq!(seed["SessionKey"]["MxToken"], token);
    assert_eq!(seed["AccountId"], account_id);

    let mut latencies: Vec<Duration> = results.into_iter().map(|(_, _, l)| l).collect();
    latencies.sort();
    let p50 = latencies[latencies.len() / 2];
    let p99 = latencies[(latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");
}
