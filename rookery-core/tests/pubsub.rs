use std::{sync::Arc, time::Duration};

use mqtt3_codec::common::QualityOfService;
use rookery_core::client::{Client, Options, Topic};

mod common;

fn options() -> Options {
    Options {
        keep_alive: 60,
        clean_session: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn publish_reaches_subscriber() {
    let broker =
        common::start_broker(Arc::new(common::TestAdapter::new()), Default::default()).await;

    let c0 = Client::connect(common::client_param(&broker.addr, "pubsub-c0", options()))
        .await
        .expect("c0 connect failed");
    c0.subscribe(&[Topic {
        filter: "#".to_owned(),
        qos: QualityOfService::Level0,
    }])
    .await
    .expect("c0 subscribe failed");

    let reader = c0.clone();
    let read_task = tokio::spawn(async move { reader.read(true).await });

    let c1 = Client::connect(common::client_param(&broker.addr, "pubsub-c1", options()))
        .await
        .expect("c1 connect failed");
    c1.publish(
        QualityOfService::Level0,
        false,
        "users/123/objects/789",
        b"Hello MQTT".to_vec(),
    )
    .await
    .expect("c1 publish failed");

    let message = tokio::time::timeout(Duration::from_secs(5), read_task)
        .await
        .expect("read timed out")
        .expect("read task panicked")
        .expect("read failed")
        .expect("read returned no message");
    assert_eq!(message.topic, "users/123/objects/789");
    assert_eq!(message.body, b"Hello MQTT");
    assert_eq!(message.qos, QualityOfService::Level0);
    assert!(!message.retain);
    assert!(!message.dup);

    c1.disconnect(false).await.expect("c1 disconnect failed");
    c0.disconnect(false).await.expect("c0 disconnect failed");
    broker.stop().await;
}

#[tokio::test]
async fn qos1_publish_is_acknowledged() {
    let broker =
        common::start_broker(Arc::new(common::TestAdapter::new()), Default::default()).await;

    let client = Client::connect(common::client_param(&broker.addr, "qos1-c0", options()))
        .await
        .expect("connect failed");

    tokio::time::timeout(
        Duration::from_secs(5),
        client.publish(
            QualityOfService::Level1,
            false,
            "jobs/42",
            b"acknowledged".to_vec(),
        ),
    )
    .await
    .expect("publish timed out")
    .expect("publish failed");

    client.disconnect(false).await.expect("disconnect failed");
    broker.stop().await;
}

#[tokio::test]
async fn qos2_publish_is_unsupported() {
    let broker =
        common::start_broker(Arc::new(common::TestAdapter::new()), Default::default()).await;

    let client = Client::connect(common::client_param(&broker.addr, "qos2-c0", options()))
        .await
        .expect("connect failed");

    let got = client
        .publish(QualityOfService::Level2, false, "jobs/43", b"nope".to_vec())
        .await;
    assert!(matches!(
        got,
        Err(rookery_core::client::Error::UnsupportedQos)
    ));

    client.disconnect(false).await.expect("disconnect failed");
    broker.stop().await;
}

#[tokio::test]
async fn slow_reader_drops_oldest() {
    let broker =
        common::start_broker(Arc::new(common::TestAdapter::new()), Default::default()).await;

    let c0 = Client::connect(common::client_param(&broker.addr, "slow-c0", options()))
        .await
        .expect("c0 connect failed");
    c0.subscribe(&[Topic {
        filter: "m/+".to_owned(),
        qos: QualityOfService::Level0,
    }])
    .await
    .expect("c0 subscribe failed");

    let c1 = Client::connect(common::client_param(&broker.addr, "slow-c1", options()))
        .await
        .expect("c1 connect failed");
    // overflow the 32-slot inbound buffer while nobody reads; paced so the
    // broker's send queue never backs up
    for n in 0..40 {
        c1.publish(
            QualityOfService::Level0,
            false,
            &format!("m/{n}"),
            n.to_string().into_bytes(),
        )
        .await
        .expect("publish failed");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut received = Vec::new();
    while let Some(message) = c0.read(false).await.expect("read failed") {
        let n: usize = message.topic["m/".len()..].parse().expect("topic index");
        received.push(n);
    }

    assert!(received.len() <= 32, "got {} messages", received.len());
    assert!(received.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(received.last().copied(), Some(39));

    c1.disconnect(false).await.expect("c1 disconnect failed");
    c0.disconnect(false).await.expect("c0 disconnect failed");
    broker.stop().await;
}
