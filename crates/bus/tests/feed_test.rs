//! Change batches travelling over real ZeroMQ sockets.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use alerter_bus::{ChangePublisher, Transport, ZmqChangeFeed, ZmqPublisher};
use alerter_core::{ChangeFeed, ChangeListener, ChangeOperation, TriggerChange};

const TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(200);

#[tokio::test]
async fn batch_reaches_listener_over_tcp() {
    let transport = Transport::tcp("127.0.0.1", 16210);
    let publisher = ChangePublisher::new(Arc::new(ZmqPublisher::bind(&transport).await.unwrap()));

    let feed = ZmqChangeFeed::connect(&transport).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener: ChangeListener = Arc::new(move |batch| {
        let _ = tx.send(batch);
    });
    feed.register_listener(listener).await.unwrap();
    feed.start().await.unwrap();
    tokio::time::sleep(SETTLE).await;

    let changes = vec![
        TriggerChange::new("acme", "disk-full", ChangeOperation::Add),
        TriggerChange::new("acme", "cpu-high", ChangeOperation::Update),
        TriggerChange::new("globex", "latency", ChangeOperation::Remove),
    ];
    publisher.publish_changes(changes.clone()).await.unwrap();

    let received = timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for batch")
        .expect("listener channel closed");
    assert_eq!(received, changes);

    feed.stop().await;
}

#[tokio::test]
async fn consecutive_batches_arrive_in_order() {
    let transport = Transport::tcp("127.0.0.1", 16211);
    let publisher = ChangePublisher::new(Arc::new(ZmqPublisher::bind(&transport).await.unwrap()));

    let feed = ZmqChangeFeed::connect(&transport).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    feed.register_listener(Arc::new(move |batch: Vec<TriggerChange>| {
        let _ = tx.send(batch);
    }))
    .await
    .unwrap();
    feed.start().await.unwrap();
    tokio::time::sleep(SETTLE).await;

    for i in 0..3 {
        publisher
            .publish_changes(vec![TriggerChange::new("t", format!("trg-{i}"), ChangeOperation::Add)])
            .await
            .unwrap();
    }

    for i in 0..3 {
        let batch = timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(batch[0].trigger_id, format!("trg-{i}"));
    }
    assert_eq!(feed.listener_count(), 1);
    feed.stop().await;
}
