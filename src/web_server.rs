/*!
Module serveur web pour l'interface de monitoring

Fournit :
- Dashboard HTML avec horloge temps-réel
- API REST pour les statistiques
- WebSocket pour mises à jour temps-réel
- Indicateurs GPS/PPS/stratum
*/

use crate::discipline::DisciplineEngine;
use crate::monotonic::MonotonicClock;
use crate::stats::{ServerStats, StatsManager};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Clone)]
pub struct WebServerState {
    stats: Arc<StatsManager>,
    discipline: Arc<DisciplineEngine>,
    monotonic: Arc<dyn MonotonicClock>,
}

/// Informations temps-réel pour WebSocket et l'API `/api/time`
#[derive(Debug, Clone, Serialize)]
struct RealtimeData {
    utc_unix_micros: i64,
    stratum: u8,
    reference_id: String,
    stats: ServerStats,
}

pub struct WebServer {
    bind_addr: String,
    stats: Arc<StatsManager>,
    discipline: Arc<DisciplineEngine>,
    monotonic: Arc<dyn MonotonicClock>,
}

impl WebServer {
    pub fn new(
        bind_addr: String,
        stats: Arc<StatsManager>,
        discipline: Arc<DisciplineEngine>,
        monotonic: Arc<dyn MonotonicClock>,
    ) -> Self {
        WebServer {
            bind_addr,
            stats,
            discipline,
            monotonic,
        }
    }

    /// Démarre le serveur web dans un thread Tokio séparé
    pub fn start(self) -> std::thread::JoinHandle<()> {
        info!("Starting web server on {}", self.bind_addr);

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                if let Err(e) = self.run().await {
                    error!("Web server error: {:#}", e);
                }
            });
        })
    }

    async fn run(self) -> anyhow::Result<()> {
        let state = WebServerState {
            stats: self.stats,
            discipline: self.discipline,
            monotonic: self.monotonic,
        };

        let app = Router::new()
            .route("/", get(index_handler))
            .route("/api/stats", get(stats_handler))
            .route("/api/time", get(time_handler))
            .route("/ws", get(websocket_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        info!("Web server listening on {}", self.bind_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../web/index.html"))
}

async fn stats_handler(State(state): State<WebServerState>) -> Json<ServerStats> {
    Json(state.stats.get())
}

async fn time_handler(State(state): State<WebServerState>) -> Json<RealtimeData> {
    Json(snapshot(&state))
}

fn snapshot(state: &WebServerState) -> RealtimeData {
    let now = state.monotonic.now_micros();
    RealtimeData {
        utc_unix_micros: state.discipline.get_utc_micros(now),
        stratum: state.discipline.get_stratum(),
        reference_id: String::from_utf8_lossy(&state.discipline.get_reference_id().to_be_bytes())
            .trim_end_matches('\0')
            .to_string(),
        stats: state.stats.get(),
    }
}

#[axum::debug_handler]
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<WebServerState>,
) -> axum::response::Response {
    ws.on_upgrade(|socket| websocket_task(socket, state))
}

/// Tâche WebSocket : envoie les mises à jour toutes les 50ms
async fn websocket_task(mut socket: WebSocket, state: WebServerState) {
    loop {
        let data = snapshot(&state);

        let json = match serde_json::to_string(&data) {
            Ok(j) => j,
            Err(_) => break,
        };

        if socket.send(Message::Text(json)).await.is_err() {
            break;
        }

        sleep(Duration::from_millis(50)).await;
    }
}
