//! 抓包会话 handlers
//!
//! - GET /tap/status
//! - GET /tap/events?q=&protocol=&direction=
//! - GET /tap/events/{sequence_id}
//! - POST /tap/pause | /tap/resume | /tap/stop | /tap/clear
//! - GET | PUT | DELETE /tap/selection
//! - POST /tap/ingest

use crate::AppState;
use crate::utils::response::{
    bad_request_error, event_to_dto, ingest_error, inspection_to_dto, not_captured_error, ok,
    push_disabled_error,
};
use crate::utils::validation::{parse_direction, parse_protocol};
use api_contract::{
    AcceptedDto, ClearDto, EventsQuery, IngestRequest, RunStateDto, SelectRequest, SourceDto,
    TapEventDto, TapStatusDto,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use domain::{RawSourceEvent, now_epoch_ms};
use tap_capture::TapFilter;
use tap_ingest::{IngestError, TapSession};
use tracing::debug;

#[derive(serde::Deserialize)]
pub struct EventPath {
    pub(crate) sequence_id: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Response {
    let session = &state.session;
    let stats = session.stats();
    let descriptor = session.descriptor();
    let now_ms = now_epoch_ms();
    ok(TapStatusDto {
        source: SourceDto {
            name: descriptor.name.clone(),
            protocol: descriptor.protocol.as_str().to_string(),
            kind: state.source_kind.as_str().to_string(),
        },
        state: stats.state.as_str().to_string(),
        stalled: session.is_stalled(now_ms),
        buffered: stats.buffered,
        capacity: stats.capacity,
        captured: stats.captured,
        evicted: stats.evicted,
        dropped_while_paused: stats.dropped_while_paused,
        adapter_errors: stats.adapter_errors,
        next_sequence_id: stats.next_sequence_id,
        last_capture_ms: stats.last_capture_ms,
        selected_sequence_id: session.selected().map(|inspection| inspection.metadata.sequence_id),
    })
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let protocol = match parse_protocol(query.protocol, "protocol") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let direction = match parse_direction(query.direction, "direction") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let mut filter = TapFilter::new(&query.q.unwrap_or_default());
    if let Some(protocol) = protocol {
        filter = filter.with_protocol(protocol);
    }
    if let Some(direction) = direction {
        filter = filter.with_direction(direction);
    }
    let data: Vec<TapEventDto> = state
        .session
        .filter(&filter)
        .iter()
        .map(|event| event_to_dto(event))
        .collect();
    ok(data)
}

pub async fn get_event(State(state): State<AppState>, Path(path): Path<EventPath>) -> Response {
    match state.session.inspect(path.sequence_id) {
        Ok(inspection) => ok(inspection_to_dto(inspection)),
        Err(err) => not_captured_error(err),
    }
}

pub async fn pause(State(state): State<AppState>) -> Response {
    run_state_result(&state.session, state.session.pause())
}

pub async fn resume(State(state): State<AppState>) -> Response {
    run_state_result(&state.session, state.session.resume())
}

pub async fn stop(State(state): State<AppState>) -> Response {
    run_state_result(&state.session, state.session.stop())
}

pub async fn clear(State(state): State<AppState>) -> Response {
    let cleared = state.session.clear();
    ok(ClearDto { cleared })
}

pub async fn get_selection(State(state): State<AppState>) -> Response {
    ok(state.session.selected().map(inspection_to_dto))
}

pub async fn put_selection(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> Response {
    match state.session.select(req.sequence_id) {
        Ok(inspection) => ok(inspection_to_dto(inspection)),
        Err(err) => not_captured_error(err),
    }
}

pub async fn delete_selection(State(state): State<AppState>) -> Response {
    let cleared = state.session.clear_selection();
    debug!(cleared = ?cleared, "selection_cleared");
    ok(serde_json::Value::Null)
}

pub async fn ingest(State(state): State<AppState>, Json(req): Json<IngestRequest>) -> Response {
    let Some(handle) = state.push.as_ref() else {
        return push_disabled_error();
    };
    let direction = match parse_direction(req.direction, "direction") {
        Ok(value) => value,
        Err(response) => return response,
    };
    if req.payload.is_null() {
        return bad_request_error("payload required");
    }
    let received_at_ms = req.received_at_ms.unwrap_or_else(now_epoch_ms);
    let mut event = RawSourceEvent::structured(received_at_ms, req.payload);
    if let Some(direction) = direction {
        event = event.with_direction(direction);
    }
    match handle.try_push(event) {
        Ok(()) => ok(AcceptedDto { accepted: true }),
        Err(err) => ingest_error(err),
    }
}

fn run_state_result(session: &TapSession, result: Result<(), IngestError>) -> Response {
    match result {
        Ok(()) => ok(RunStateDto {
            state: session.state().as_str().to_string(),
        }),
        Err(err) => ingest_error(err),
    }
}
