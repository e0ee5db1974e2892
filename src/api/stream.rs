//! The solver push stream: one SSE connection per solver, fed by the
//! notification hub with a liveness ping on idle connections.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures_util::stream::{self, Stream};
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::domain::SolverId;
use crate::error::InputError;
use crate::notify::StreamMessage;

use super::{ApiError, AppContext};

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub solver: Option<String>,
}

/// `GET /stream?solver=<id>`. Rejects with 400 when the solver id is
/// missing; otherwise registers the connection, replays a capped
/// snapshot of open orders, and forwards hub broadcasts until the
/// client disconnects.
pub async fn order_stream(
    State(ctx): State<AppContext>,
    Query(params): Query<StreamParams>,
) -> Response {
    let solver = match params.solver.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => SolverId::from(id),
        _ => {
            return ApiError::from(InputError::MissingField { field: "solver" })
                .into_response();
        }
    };

    let snapshot = match ctx.orders.open_orders(ctx.server.snapshot_limit).await {
        Ok(orders) => orders,
        Err(error) => return ApiError::from(error).into_response(),
    };

    let (guard, rx) = ctx.hub.register(solver.clone());
    let handshake = vec![
        StreamMessage::Connected { solver },
        StreamMessage::ActiveOrders { orders: snapshot },
    ];
    let ping_interval = Duration::from_secs(ctx.server.ping_interval_secs);

    Sse::new(event_stream(guard, rx, handshake, ping_interval))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn event_stream(
    guard: crate::notify::ConnectionGuard,
    rx: tokio::sync::mpsc::Receiver<StreamMessage>,
    handshake: Vec<StreamMessage>,
    ping_interval: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let mut interval = tokio::time::interval(ping_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // Push the immediate first tick out so pings start one interval
    // after the handshake.
    interval.reset();

    let live = stream::unfold(
        (guard, rx, interval),
        |(guard, mut rx, mut interval)| async move {
            let message = tokio::select! {
                received = rx.recv() => match received {
                    Some(message) => message,
                    // Channel closed: the hub evicted or replaced this
                    // connection. End the stream so the guard drops.
                    None => return None,
                },
                _ = interval.tick() => StreamMessage::Ping { at: Utc::now() },
            };
            Some((message, (guard, rx, interval)))
        },
    );

    stream::iter(handshake)
        .chain(live)
        .map(|message| Ok(to_event(&message)))
}

fn to_event(message: &StreamMessage) -> Event {
    match Event::default().json_data(message) {
        Ok(event) => event,
        Err(error) => {
            debug!(error = %error, "failed to encode stream message");
            Event::default().event("error").data("encoding failure")
        }
    }
}
