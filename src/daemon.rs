//! WebSocket gateway daemon
//!
//! One JSON text frame per request. Every connection owns its own session,
//! so sandbox limits never leak between orchestrators. Requests on one
//! connection are answered strictly in order.

use crate::dispatcher::ToolDispatcher;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::Session;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Message},
};

/// Default gateway port
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind address; orchestrators usually run in another container
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Frames carry JSON plans and previews, never file contents
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Daemon shared state
pub struct DaemonState {
    pub dispatcher: Arc<ToolDispatcher>,
    /// Session id per connected client
    pub clients: HashMap<SocketAddr, String>,
}

impl DaemonState {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            clients: HashMap::new(),
        }
    }
}

pub type SharedState = Arc<RwLock<DaemonState>>;

/// Start the gateway and serve until Ctrl+C or SIGTERM
pub async fn run(bind: &str, port: u16, dispatcher: ToolDispatcher) -> std::io::Result<()> {
    let root = dispatcher.fs().validator().root().display().to_string();
    let state: SharedState = Arc::new(RwLock::new(DaemonState::new(dispatcher)));

    let listener = TcpListener::bind(format!("{}:{}", bind, port)).await?;
    tracing::info!(
        "Gateway listening on {} (root {})",
        listener.local_addr()?,
        root
    );

    #[cfg(unix)]
    run_server_loop_unix(listener, state).await;

    #[cfg(not(unix))]
    run_server_loop_ctrlc_only(listener, state).await;

    Ok(())
}

/// Server loop with Unix signal handling (SIGTERM + Ctrl+C)
#[cfg(unix)]
async fn run_server_loop_unix(listener: TcpListener, state: SharedState) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(
                "Failed to set up SIGTERM handler: {}. Only Ctrl+C will work for shutdown.",
                e
            );
            run_server_loop_ctrlc_only(listener, state).await;
            return;
        }
    };

    loop {
        tokio::select! {
            result = listener.accept() => {
                if let Ok((stream, addr)) = result {
                    spawn_connection(stream, addr, state.clone());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Gateway shutting down (Ctrl+C)");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("Gateway shutting down (SIGTERM)");
                break;
            }
        }
    }
}

/// Server loop with Ctrl+C only (fallback or non-Unix)
async fn run_server_loop_ctrlc_only(listener: TcpListener, state: SharedState) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                if let Ok((stream, addr)) = result {
                    spawn_connection(stream, addr, state.clone());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Gateway shutting down (Ctrl+C)");
                break;
            }
        }
    }
}

fn spawn_connection(stream: TcpStream, addr: SocketAddr, state: SharedState) {
    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, addr, state).await {
            tracing::debug!("Connection {} ended with error: {}", addr, e);
        }
    });
}

/// Serve one orchestrator until it closes the socket
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: SharedState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(MAX_MESSAGE_BYTES),
        max_frame_size: Some(MAX_MESSAGE_BYTES),
        ..Default::default()
    };
    let ws = accept_async_with_config(stream, Some(ws_config)).await?;
    let (mut tx, mut rx) = ws.split();

    let mut session = Session::new();
    let dispatcher = {
        let mut st = state.write().await;
        st.clients.insert(addr, session.session_id.clone());
        st.dispatcher.clone()
    };
    tracing::info!("Client connected: {} (session {})", addr, session.session_id);

    let result = async {
        while let Some(frame) = rx.next().await {
            match frame? {
                Message::Text(text) => {
                    let reply = handle_client_message(&text, &mut session, &dispatcher).await;
                    tx.send(Message::Text(serde_json::to_string(&reply)?)).await?;
                }
                Message::Ping(data) => tx.send(Message::Pong(data)).await?,
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
    }
    .await;

    {
        let mut st = state.write().await;
        st.clients.remove(&addr);
    }
    tracing::info!(
        "Client disconnected: {} after {}s",
        addr,
        (chrono::Utc::now() - session.started_at).num_seconds()
    );
    result
}

/// Answer one text frame. Never fails; bad frames get an `error` reply.
pub async fn handle_client_message(
    text: &str,
    session: &mut Session,
    dispatcher: &ToolDispatcher,
) -> ServerMessage {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!("Rejecting unparsable frame: {}", e);
            return ServerMessage::Error {
                code: "bad_request".to_string(),
                message: e.to_string(),
            };
        }
    };

    match msg {
        ClientMessage::Hello { client_version } => {
            tracing::debug!(
                "Hello from client version {}",
                client_version.as_deref().unwrap_or("unknown")
            );
            ServerMessage::Welcome {
                server_version: env!("CARGO_PKG_VERSION").to_string(),
                session_id: session.session_id.clone(),
            }
        }
        ClientMessage::Ping => ServerMessage::Pong,
        ClientMessage::ListTools => ServerMessage::Tools {
            tools: dispatcher.catalog(),
        },
        ClientMessage::CallTool {
            request_id,
            name,
            arguments,
        } => {
            tracing::info!("[{}] {} ({})", session.session_id, name, request_id);
            let output = dispatcher.call_named(session, &name, arguments).await;
            ServerMessage::ToolResult {
                request_id,
                name,
                output,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Unavailable;
    use crate::filesystem::{config::GatewayConfig, FileSystemService};
    use crate::protocol::ToolOutput;
    use tempfile::TempDir;

    fn dispatcher(temp: &TempDir) -> ToolDispatcher {
        let fs = FileSystemService::new(GatewayConfig::with_root(temp.path())).unwrap();
        ToolDispatcher::new(Arc::new(fs), Arc::new(Unavailable), Arc::new(Unavailable))
    }

    #[tokio::test]
    async fn bad_frame_gets_an_error_reply() {
        let temp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&temp);
        let mut session = Session::new();

        let reply = handle_client_message("{not json", &mut session, &dispatcher).await;
        assert!(matches!(reply, ServerMessage::Error { code, .. } if code == "bad_request"));

        let reply = handle_client_message(r#"{"type":"ping"}"#, &mut session, &dispatcher).await;
        assert!(matches!(reply, ServerMessage::Pong));
    }

    #[tokio::test]
    async fn hello_reports_the_session() {
        let temp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&temp);
        let mut session = Session::new();

        let reply = handle_client_message(
            r#"{"type":"hello","client_version":"1.0"}"#,
            &mut session,
            &dispatcher,
        )
        .await;
        match reply {
            ServerMessage::Welcome { session_id, .. } => assert_eq!(session_id, session.session_id),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn catalog_lists_every_operation() {
        let temp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&temp);
        let mut session = Session::new();

        let reply =
            handle_client_message(r#"{"type":"list_tools"}"#, &mut session, &dispatcher).await;
        match reply {
            ServerMessage::Tools { tools } => {
                let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                assert_eq!(names.len(), 8);
                assert!(names.contains(&"set_sandbox_limit"));
                assert!(names.contains(&"apply_file_plan"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn websocket_round_trip() {
        use tokio_tungstenite::connect_async;

        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("notes.txt"), "hello").unwrap();
        let state: SharedState = Arc::new(RwLock::new(DaemonState::new(dispatcher(&temp))));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_state = state.clone();
        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            let _ = handle_connection(stream, peer, server_state).await;
        });

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        let frames = [
            r#"{"type":"call_tool","request_id":"r1","name":"list_files","arguments":{"path":""}}"#,
            r#"{"type":"call_tool","request_id":"r2","name":"extract_preview","arguments":{"path":"notes.txt"}}"#,
            r#"{"type":"call_tool","request_id":"r3","name":"list_files","arguments":{"path":"../"}}"#,
            "garbage",
        ];
        let mut replies = Vec::new();
        for frame in frames {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    replies.push(serde_json::from_str::<ServerMessage>(&text).unwrap())
                }
                other => panic!("unexpected frame: {:?}", other),
            }
        }

        match &replies[0] {
            ServerMessage::ToolResult { request_id, output, .. } => {
                assert_eq!(request_id, "r1");
                assert_eq!(output, &ToolOutput::Lines(vec!["notes.txt".into()]));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        match &replies[1] {
            ServerMessage::ToolResult { output, .. } => {
                assert_eq!(output, &ToolOutput::Text("hello".into()));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        match &replies[2] {
            ServerMessage::ToolResult { output, .. } => assert!(output.is_error()),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert!(matches!(&replies[3], ServerMessage::Error { code, .. } if code == "bad_request"));
        assert_eq!(state.read().await.clients.len(), 1);

        ws.close(None).await.unwrap();
    }
}
