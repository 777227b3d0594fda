use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use shared::{
    domain::{Anchor, BadgeDefaults},
    protocol::Response,
};
use tokio::sync::oneshot;

const REQUEST_TIMEOUT: Duration = Duration::from_millis(3_000);

fn establish(generation: u64) -> (Connection, PagePeer, mpsc::UnboundedReceiver<(u64, PageEvent)>) {
    let (port, peer) = in_process_port();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let connection = Connection::establish(TabId(4), generation, port, events_tx, REQUEST_TIMEOUT);
    (connection, peer, events_rx)
}

/// Answers every reply-expecting request; `RENDER` reports item 2 missing.
fn spawn_responder(mut peer: PagePeer) -> JoinHandle<Vec<Value>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(message) = peer.outbound.recv().await {
            let request: Request = serde_json::from_value(message.clone()).expect("request");
            seen.push(message);
            if !request.expect_reply {
                continue;
            }
            let data = match request.command {
                PageCommand::Render { .. } => Some(json!({ "missingIds": [2] })),
                _ => None,
            };
            let reply = serde_json::to_value(Response::ok(request.id, data)).expect("reply");
            if peer.inbound.send(reply).is_err() {
                break;
            }
        }
        seen
    })
}

#[tokio::test]
async fn ping_and_render_round_trip_through_peer() {
    let (connection, peer, _events) = establish(1);
    let responder = spawn_responder(peer);

    assert!(connection.page().ping(Duration::from_millis(500)).await);

    let item = ScreenItem::new(ItemId(1), Anchor::new("#a"), &BadgeDefaults::default());
    let report = connection.page().render(vec![item]).await.expect("report");
    assert_eq!(report.missing_ids, vec![ItemId(2)]);

    connection.page().toggle_select(true).await;
    connection.page().hover(Some(ItemId(1))).await;
    connection.page().clear().await;

    connection.discard().await;
    let seen = responder.await.expect("responder");
    let types: Vec<_> = seen
        .iter()
        .map(|message| message["type"].as_str().expect("type").to_string())
        .collect();
    assert_eq!(types, vec!["PING", "RENDER", "TOGGLE_SELECT", "HOVER", "CLEAR"]);
    assert!(seen[2].get("expectReply").is_none());
}

#[tokio::test(start_paused = true)]
async fn silent_peer_fails_ping() {
    let (connection, _peer, _events) = establish(1);
    assert!(!connection.page().ping(Duration::from_millis(500)).await);
    assert!(connection.is_alive().await);
}

#[tokio::test]
async fn inbound_events_are_tagged_with_generation() {
    let (_connection, peer, mut events) = establish(7);

    peer.inbound
        .send(json!({ "type": "NOT_AN_EVENT" }))
        .expect("send");
    peer.inbound
        .send(json!({
            "type": "SELECTION_CHANGED",
            "anchors": [{ "selector": "#hero" }]
        }))
        .expect("send");

    let (generation, event) = events.recv().await.expect("event");
    assert_eq!(generation, 7);
    assert_eq!(
        event,
        PageEvent::SelectionChanged {
            anchors: vec![Anchor::new("#hero")]
        }
    );
}

#[tokio::test]
async fn peer_close_flushes_and_fires_handlers_once() {
    let (connection, peer, _events) = establish(1);
    let fired = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = oneshot::channel();

    {
        let fired = Arc::clone(&fired);
        connection
            .on_disconnect(move || {
                fired.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .await;
    }

    let page = connection.page().clone();
    let pending = tokio::spawn(async move {
        page.render(Vec::new()).await
    });
    let PagePeer {
        mut outbound,
        inbound,
    } = peer;
    outbound.recv().await.expect("render posted");
    drop(inbound);

    done_rx.await.expect("handler fired");
    assert_eq!(pending.await.expect("render task"), None);
    assert!(!connection.is_alive().await);

    let late = Arc::clone(&fired);
    connection
        .on_disconnect(move || {
            late.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn discard_closes_port_without_notifying() {
    let (connection, mut peer, _events) = establish(1);
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let fired = Arc::clone(&fired);
        connection
            .on_disconnect(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
            .await;
    }

    connection.discard().await;

    assert!(peer.outbound.recv().await.is_none());
    assert!(!connection.is_alive().await);
    connection.page().clear().await;
    tokio::task::yield_now().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
