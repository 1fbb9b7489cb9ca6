use std::time::Duration;

use arq_lab_abstract::{Message, ProtocolConfig, SimConfig};
use arq_lab_core::{receiver, sender};
use arq_lab_runtime::spawn_link;
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(600);

fn protocol() -> ProtocolConfig {
    ProtocolConfig {
        retransmit_timeout_ms: 100,
    }
}

#[tokio::test(start_paused = true)]
async fn perfect_link_delivers_in_order() {
    let mut link = spawn_link(sender(protocol()), receiver(), SimConfig::default());
    let messages: Vec<Message> = ["one", "two", "three"]
        .iter()
        .map(|t| Message::new(t.as_bytes()).unwrap())
        .collect();

    for message in &messages {
        link.send(*message).unwrap();
    }
    for expected in &messages {
        let got = timeout(DEADLINE, link.next_delivery())
            .await
            .expect("delivery timed out")
            .unwrap();
        assert_eq!(&got, expected);
    }

    link.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn lossy_link_delivers_everything_once() {
    let channel = SimConfig {
        loss_rate: 0.25,
        corrupt_rate: 0.2,
        min_latency: 5,
        max_latency: 40,
        seed: 9,
    };
    let mut link = spawn_link(sender(protocol()), receiver(), channel);

    for i in 0..30u8 {
        link.send(Message::filled(b'a' + i % 26)).unwrap();
    }
    for i in 0..30u8 {
        let got = timeout(DEADLINE, link.next_delivery())
            .await
            .expect("delivery timed out")
            .unwrap();
        assert_eq!(got, Message::filled(b'a' + i % 26), "message {i}");
    }

    // no duplicate shows up once the sender has gone quiet
    let extra = timeout(Duration::from_secs(5), link.next_delivery()).await;
    assert!(extra.is_err(), "unexpected extra delivery {extra:?}");

    link.shutdown().await.unwrap();
}
