use std::time::Duration;

use sinkpool_connection::{ConnectionPool, PoolConfig, RetryPolicy, TcpSinkConfig, TcpSinkFactory};
use sinkpool_connection::{foreach_partition, split_into_partitions};
use tokio::io::AsyncWriteExt;

use super::*;

async fn start() -> (SocketAddr, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(accept_loop(listener, tx));
    (address, rx)
}

async fn next(rx: &mut mpsc::Receiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

#[tokio::test]
async fn test_forwards_lines_from_several_clients() {
    let (address, mut rx) = start().await;

    let mut first = TcpStream::connect(address).await.expect("connect");
    first.write_all(b"one\ntwo\n").await.expect("write");
    assert_eq!(next(&mut rx).await, "one");
    assert_eq!(next(&mut rx).await, "two");

    let mut second = TcpStream::connect(address).await.expect("connect");
    second.write_all(b"three\n").await.expect("write");
    assert_eq!(next(&mut rx).await, "three");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_receives_pooled_partition_output() {
    let (address, mut rx) = start().await;
    let factory = TcpSinkFactory::new(TcpSinkConfig::new(address.to_string()));
    let pool = std::sync::Arc::new(ConnectionPool::new(PoolConfig::new(3), factory));

    let records: Vec<String> = (0..12).map(|i| format!("event {i}")).collect();
    let summary = foreach_partition(
        pool.clone(),
        split_into_partitions(records.clone(), 4),
        &RetryPolicy::none(),
    )
    .await;
    assert!(summary.is_success());

    let mut received = Vec::new();
    for _ in 0..records.len() {
        received.push(next(&mut rx).await);
    }
    received.sort();
    let mut expected = records;
    expected.sort();
    assert_eq!(received, expected);

    pool.shutdown().await.expect("shutdown");
}

#[test]
fn test_accept_backoff_grows_and_caps() {
    assert_eq!(accept_backoff(1), Duration::from_millis(10));
    assert_eq!(accept_backoff(2), Duration::from_millis(20));
    assert_eq!(accept_backoff(5), Duration::from_millis(160));
    assert_eq!(accept_backoff(8), Duration::from_secs(1));
    assert_eq!(accept_backoff(u32::MAX), Duration::from_secs(1));
    assert!(accept_backoff(0) > Duration::ZERO);
}
