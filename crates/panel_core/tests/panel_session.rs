//! Full panel session against a WebSocket page peer and a SQLite store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    routing::get,
    Router,
};
use panel_core::{
    Action, ConnectionStatus, Controller, ControllerSettings, LogView, MissingCaptureService,
    PanelDeps, SelectionChange, StaticTabResolver, Tab, WsPageConnector,
};
use serde_json::json;
use shared::{
    domain::{BadgeShape, PageKey, TabId, WindowId},
    protocol::{check_port_name, PageCommand, Request, Response},
};
use storage::{StateStore, Storage};
use tokio::net::TcpListener;

type Commands = Arc<Mutex<Vec<String>>>;

/// Page overlay stand-in: reports one picked element on connect, records
/// command types and answers everything that expects a reply.
async fn page_overlay(mut socket: WebSocket, commands: Commands) {
    let picked = json!({
        "type": "SELECTION_CHANGED",
        "anchors": [{ "selector": "main > h1", "text": "Welcome" }]
    });
    if socket.send(Message::Text(picked.to_string())).await.is_err() {
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Request>(&text) else {
            continue;
        };
        commands
            .lock()
            .expect("commands")
            .push(request.command.name().to_string());
        if !request.expect_reply {
            continue;
        }
        let data = match request.command {
            PageCommand::Render { .. } => Some(json!({ "missingIds": [] })),
            _ => None,
        };
        let reply = serde_json::to_string(&Response::ok(request.id, data)).expect("reply");
        if socket.send(Message::Text(reply)).await.is_err() {
            break;
        }
    }
}

async fn spawn_overlay_server(commands: Commands) -> anyhow::Result<String> {
    let app = Router::new().route(
        "/ports/*name",
        get(
            move |Path(name): Path<String>,
                  Query(_params): Query<HashMap<String, String>>,
                  ws: WebSocketUpgrade| {
                let commands = Arc::clone(&commands);
                async move {
                    if check_port_name(&name).is_err() {
                        return StatusCode::BAD_REQUEST.into_response();
                    }
                    let response: HttpResponse =
                        ws.on_upgrade(move |socket| page_overlay(socket, commands));
                    response
                }
            },
        ),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..300 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn picked_element_is_persisted_and_restyled() {
    let commands: Commands = Arc::new(Mutex::new(Vec::new()));
    let endpoint = spawn_overlay_server(Arc::clone(&commands))
        .await
        .expect("overlay server");
    let store = Arc::new(Storage::new("sqlite::memory:").await.expect("storage"));
    let page_url = "https://docs.example.com/guide?lang=en#intro";
    let page_key = PageKey::from_url(page_url).expect("page key");

    let controller = Controller::spawn(
        PanelDeps {
            tabs: Arc::new(StaticTabResolver::new(Some(Tab {
                id: TabId(21),
                window_id: WindowId(1),
                url: page_url.to_string(),
            }))),
            connector: Arc::new(WsPageConnector::new(endpoint)),
            store: store.clone(),
            capture: Arc::new(MissingCaptureService),
            view: Arc::new(LogView),
        },
        ControllerSettings::default(),
    );

    let liveness = controller.ensure_connection_alive(false).await;
    assert!(liveness.alive);
    assert_eq!(controller.model().status, ConnectionStatus::Connected);

    let watched = controller.clone();
    wait_for(|| watched.model().items.len() == 1).await;
    controller.settle().await;

    controller
        .dispatch(Action::ItemSelectionChanged(SelectionChange::All(true)))
        .expect("select all");
    controller
        .dispatch(Action::SetBadgeShape(BadgeShape::Square))
        .expect("shape");
    controller.settle().await;

    let saved = store.load_page_state(&page_key).await.expect("saved state");
    assert_eq!(saved.items.len(), 1);
    assert_eq!(saved.items[0].anchor.selector, "main > h1");
    assert_eq!(saved.items[0].shape, BadgeShape::Square);
    assert_eq!(saved.next_id, 2);

    let sent = commands.lock().expect("commands").clone();
    assert!(sent.iter().filter(|name| *name == "render").count() >= 2);

    controller.disconnect().await;
}
