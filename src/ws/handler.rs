//! WebSocket upgrade handler and per-connection session

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::snapshot;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::gateway::ConnectionId;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn_id, outbound_rx) = state.gateway.register();
    info!(conn_id = %conn_id, "New WebSocket connection");

    state.gateway.send_to(
        conn_id,
        ServerMsg::Welcome {
            connection_id: conn_id,
            server_time: unix_millis(),
        },
    );

    let (ws_sink, ws_stream) = socket.split();
    let writer = tokio::spawn(run_writer(
        conn_id,
        ws_sink,
        outbound_rx,
        state.config.ws_ping_interval,
    ));

    run_reader(conn_id, ws_stream, &state).await;

    // Disconnect: leave every group, no broadcast
    state.gateway.unregister(conn_id);
    writer.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Outbound queue -> WebSocket, plus transport pings for liveness
async fn run_writer(
    conn_id: ConnectionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
    ping_interval: Duration,
) {
    let mut ping = interval(ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ping.tick().await;

    loop {
        tokio::select! {
            msg = outbound_rx.recv() => {
                let Some(msg) = msg else {
                    debug!(conn_id = %conn_id, "Outbound queue closed");
                    break;
                };
                if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                    debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if ws_sink.send(Message::Ping(Vec::new())).await.is_err() {
                    debug!(conn_id = %conn_id, "WebSocket ping failed");
                    break;
                }
            }
        }
    }
}

/// WebSocket -> dispatch, until close, error or liveness timeout
async fn run_reader(conn_id: ConnectionId, mut ws_stream: SplitStream<WebSocket>, state: &AppState) {
    let rate_limiter = ConnectionRateLimiter::default();
    let idle_timeout = state.config.ws_idle_timeout();

    loop {
        let result = match timeout(idle_timeout, ws_stream.next()).await {
            Ok(Some(result)) => result,
            Ok(None) => break,
            Err(_) => {
                info!(conn_id = %conn_id, "No traffic within liveness timeout, dropping connection");
                break;
            }
        };

        match result {
            Ok(Message::Text(text)) => {
                handle_text(state, conn_id, &rate_limiter, &text).await;
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Liveness frame");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Rate-limit, parse and apply one text frame. Rejections go back to the sender.
async fn handle_text(
    state: &AppState,
    conn_id: ConnectionId,
    rate_limiter: &ConnectionRateLimiter,
    text: &str,
) {
    if !rate_limiter.check() {
        warn!(conn_id = %conn_id, "Rate limited inbound message");
        state.gateway.send_to(
            conn_id,
            ServerMsg::error("rate_limited", "Too many messages, slow down"),
        );
        return;
    }

    match serde_json::from_str::<ClientMsg>(text) {
        Ok(client_msg) => dispatch(state, conn_id, client_msg).await,
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
            state.gateway.send_to(
                conn_id,
                ServerMsg::error("bad_message", format!("Unrecognized message: {}", e)),
            );
        }
    }
}

/// Apply one client message. Replies and errors go to the sender only; the
/// service handles global and group broadcasts.
pub async fn dispatch(state: &AppState, conn_id: ConnectionId, msg: ClientMsg) {
    let gateway = &state.gateway;

    match msg {
        ClientMsg::JoinTeam { team_name } => {
            match team_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                Some(name) => {
                    gateway.join(conn_id, name);
                    gateway.send_to(
                        conn_id,
                        ServerMsg::JoinedTeam {
                            team_name: name.to_string(),
                            message: format!("You have joined team {}", name),
                        },
                    );
                }
                None => {
                    gateway.send_to(conn_id, ServerMsg::error("validation", "Team name is required"));
                }
            }
        }

        ClientMsg::UpdateLocation {
            team_name,
            latitude,
            longitude,
        } => match state
            .teams
            .report_location(team_name.as_deref(), latitude, longitude)
            .await
        {
            Ok(team) => {
                if let Some(confirmation) = snapshot::location_confirmed(&team) {
                    gateway.send_to(conn_id, confirmation);
                }
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "Location update rejected");
                gateway.send_to(conn_id, ServerMsg::from(&e));
            }
        },

        ClientMsg::KillTeam {
            team_name,
            target_team_name,
        } => {
            if let Err(e) = state
                .teams
                .eliminate(team_name.as_deref(), target_team_name.as_deref())
                .await
            {
                debug!(conn_id = %conn_id, error = %e, "Kill request rejected");
                gateway.send_to(conn_id, ServerMsg::from(&e));
            }
        }

        ClientMsg::Ping { t } => {
            gateway.send_to(conn_id, ServerMsg::Pong { t });
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
