//! Newline-delimited JSON protocol. One request object per line, one response
//! line per request, in order. Requests are tagged with `"op"`; responses are
//! `{"ok":true,"data":...}` or `{"ok":false,"error":{...}}`. Malformed input
//! is answered, never fatal: only I/O errors drop the connection.

use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::engine::{
    event_activity_totals, find_conflicts, is_fully_assigned, is_privileged_role,
    is_resource_available, personal_schedule, Engine, EngineError, ResourceKind,
};
use crate::limits::MAX_LINE_BYTES;
use crate::model::*;
use crate::store::{
    ActivityPatch, AssetPatch, DataStore, EventPatch, LocationPatch, PersonnelPatch,
};

// ── Requests ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Login {
        role: String,
    },
    Refresh,

    ListEvents,
    ListActivities {
        #[serde(default)]
        event_id: Option<String>,
    },
    ListAssets,
    ListPersonnel,
    ListLocations,

    CreateEvent {
        #[serde(flatten)]
        event: Event,
    },
    UpdateEvent {
        id: String,
        #[serde(flatten)]
        patch: EventPatch,
    },
    DeleteEvent {
        id: String,
    },
    CreateActivity {
        #[serde(flatten)]
        activity: Activity,
    },
    UpdateActivity {
        id: String,
        #[serde(flatten)]
        patch: ActivityPatch,
    },
    DeleteActivity {
        id: String,
    },
    CreateAsset {
        #[serde(flatten)]
        asset: Asset,
    },
    UpdateAsset {
        id: String,
        #[serde(flatten)]
        patch: AssetPatch,
    },
    DeleteAsset {
        id: String,
    },
    CreatePersonnel {
        #[serde(flatten)]
        person: Personnel,
    },
    UpdatePersonnel {
        id: String,
        #[serde(flatten)]
        patch: PersonnelPatch,
    },
    DeletePersonnel {
        id: String,
    },
    CreateLocation {
        #[serde(flatten)]
        location: Location,
    },
    UpdateLocation {
        id: String,
        #[serde(flatten)]
        patch: LocationPatch,
    },
    DeleteLocation {
        id: String,
    },

    AssignPersonnel {
        activity_id: String,
        personnel_id: String,
        #[serde(default)]
        role: String,
        #[serde(default)]
        start_time: String,
        #[serde(default)]
        end_time: String,
        #[serde(default)]
        force: bool,
    },
    AssignAsset {
        activity_id: String,
        asset_id: String,
        #[serde(default)]
        start_time: String,
        #[serde(default)]
        end_time: String,
        #[serde(default)]
        force: bool,
    },
    UnassignPersonnel {
        activity_id: String,
        personnel_id: String,
    },
    UnassignAsset {
        activity_id: String,
        asset_id: String,
    },
    AssignOperator {
        asset_id: String,
        personnel_id: String,
        role: String,
        date: String,
        start_time: String,
        end_time: String,
    },
    UnassignOperator {
        asset_id: String,
        personnel_id: String,
    },
    Route {
        activity_id: String,
        kind: ResourceKind,
        index: usize,
        #[serde(default)]
        from_location_id: String,
        #[serde(default)]
        to_location_id: String,
        #[serde(default)]
        stay_at_location: bool,
    },

    FullyAssigned {
        activity_id: String,
    },
    EventTotals {
        event_id: String,
    },
    Conflicts {
        activity_id: String,
        kind: ResourceKind,
        resource_id: String,
        #[serde(default)]
        start_time: String,
        #[serde(default)]
        end_time: String,
    },
    Available {
        kind: ResourceKind,
        resource_id: String,
        activity_id: String,
    },
    Schedule {
        personnel_id: String,
    },
}

// ── Responses ────────────────────────────────────────────────────

fn to_data<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn ok_response(data: Value) -> Value {
    json!({"ok": true, "data": data})
}

fn error_code(err: &EngineError) -> &'static str {
    match err {
        EngineError::NotFound { .. } => "not_found",
        EngineError::AlreadyAssigned { .. } => "already_assigned",
        EngineError::RosterOverlap => "roster_overlap",
        EngineError::Unavailable { .. } => "unavailable",
        EngineError::NoOperatorCoverage => "no_operator_coverage",
        EngineError::ScheduleConflict { .. } => "schedule_conflict",
        EngineError::InvalidRole(_) => "invalid_role",
        EngineError::InvalidWindow => "invalid_window",
        EngineError::ImmutableDerived => "immutable_derived",
        EngineError::LimitExceeded(_) => "limit_exceeded",
        EngineError::Store(_) => "store_error",
    }
}

fn error_response(err: &EngineError) -> Value {
    let mut error = json!({
        "code": error_code(err),
        "message": err.to_string(),
    });
    if let EngineError::ScheduleConflict { titles } = err {
        error["conflicts"] = json!(titles);
    }
    json!({"ok": false, "error": error})
}

fn protocol_error(code: &str, message: &str) -> Value {
    json!({"ok": false, "error": {"code": code, "message": message}})
}

// ── Connection loop ──────────────────────────────────────────────

pub async fn process_connection(
    socket: TcpStream,
    store: Arc<dyn DataStore>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    // Sessions start unprivileged; login upgrades in place.
    let mut engine = Engine::new(store.clone(), false);

    while let Some(line) = framed.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                // The codec discards to the next newline on its own.
                framed
                    .send(protocol_error("line_too_long", "request line exceeds limit").to_string())
                    .await?;
                continue;
            }
            Err(LinesCodecError::Io(e)) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                framed
                    .send(protocol_error("bad_request", &e.to_string()).to_string())
                    .await?;
                continue;
            }
        };

        let label = crate::observability::op_label(&request);
        metrics::counter!(crate::observability::REQUESTS_TOTAL, "op" => label).increment(1);
        let started = Instant::now();
        let response = match dispatch(&mut engine, &store, request).await {
            Ok(data) => ok_response(data),
            Err(err) => {
                debug!(op = label, error = %err, "request failed");
                error_response(&err)
            }
        };
        metrics::histogram!(crate::observability::REQUEST_DURATION_SECONDS, "op" => label)
            .record(started.elapsed().as_secs_f64());
        framed.send(response.to_string()).await?;
    }
    Ok(())
}

async fn dispatch(
    engine: &mut Engine,
    store: &Arc<dyn DataStore>,
    request: Request,
) -> Result<Value, EngineError> {
    match request {
        Request::Login { role } => {
            *engine = Engine::new(store.clone(), is_privileged_role(&role));
            Ok(json!({"role": role, "privileged": engine.privileged()}))
        }
        Request::Refresh => {
            let snap = engine.refresh().await?;
            Ok(to_data(&snap))
        }

        Request::ListEvents => Ok(to_data(&store.list_events().await?)),
        Request::ListActivities { event_id } => {
            Ok(to_data(&store.list_activities(event_id.as_deref()).await?))
        }
        Request::ListAssets => Ok(to_data(&store.list_assets().await?)),
        Request::ListPersonnel => Ok(to_data(&store.list_personnel().await?)),
        Request::ListLocations => Ok(to_data(&store.list_locations().await?)),

        Request::CreateEvent { event } => Ok(to_data(&engine.create_event(event).await?)),
        Request::UpdateEvent { id, patch } => Ok(to_data(&engine.update_event(&id, patch).await?)),
        Request::DeleteEvent { id } => {
            engine.delete_event(&id).await?;
            Ok(Value::Null)
        }
        Request::CreateActivity { activity } => {
            Ok(to_data(&engine.create_activity(activity).await?))
        }
        Request::UpdateActivity { id, patch } => {
            let activity = engine.update_activity(&id, patch).await?;
            engine.refresh().await?;
            Ok(to_data(&activity))
        }
        Request::DeleteActivity { id } => {
            engine.delete_activity(&id).await?;
            Ok(Value::Null)
        }
        Request::CreateAsset { asset } => Ok(to_data(&engine.create_asset(asset).await?)),
        Request::UpdateAsset { id, patch } => {
            let asset = engine.update_asset(&id, patch).await?;
            engine.refresh().await?;
            Ok(to_data(&asset))
        }
        Request::DeleteAsset { id } => {
            engine.delete_asset(&id).await?;
            engine.refresh().await?;
            Ok(Value::Null)
        }
        Request::CreatePersonnel { person } => {
            Ok(to_data(&engine.create_personnel(person).await?))
        }
        Request::UpdatePersonnel { id, patch } => {
            Ok(to_data(&engine.update_personnel(&id, patch).await?))
        }
        Request::DeletePersonnel { id } => {
            engine.delete_personnel(&id).await?;
            Ok(Value::Null)
        }
        Request::CreateLocation { location } => {
            Ok(to_data(&engine.create_location(location).await?))
        }
        Request::UpdateLocation { id, patch } => {
            Ok(to_data(&engine.update_location(&id, patch).await?))
        }
        Request::DeleteLocation { id } => {
            engine.delete_location(&id).await?;
            Ok(Value::Null)
        }

        Request::AssignPersonnel { activity_id, personnel_id, role, start_time, end_time, force } => {
            engine
                .assign_personnel_to_activity(
                    &activity_id,
                    &personnel_id,
                    &role,
                    &start_time,
                    &end_time,
                    force,
                )
                .await?;
            engine.refresh().await?;
            Ok(Value::Null)
        }
        Request::AssignAsset { activity_id, asset_id, start_time, end_time, force } => {
            engine
                .assign_asset_to_activity(&activity_id, &asset_id, &start_time, &end_time, force)
                .await?;
            engine.refresh().await?;
            Ok(Value::Null)
        }
        Request::UnassignPersonnel { activity_id, personnel_id } => {
            engine.unassign_personnel_from_activity(&activity_id, &personnel_id).await?;
            engine.refresh().await?;
            Ok(Value::Null)
        }
        Request::UnassignAsset { activity_id, asset_id } => {
            engine.unassign_asset_from_activity(&activity_id, &asset_id).await?;
            engine.refresh().await?;
            Ok(Value::Null)
        }
        Request::AssignOperator { asset_id, personnel_id, role, date, start_time, end_time } => {
            engine
                .assign_operator_to_asset(
                    &asset_id,
                    &personnel_id,
                    &role,
                    &date,
                    &start_time,
                    &end_time,
                )
                .await?;
            engine.refresh().await?;
            Ok(Value::Null)
        }
        Request::UnassignOperator { asset_id, personnel_id } => {
            engine.unassign_operator_from_asset(&asset_id, &personnel_id).await?;
            engine.refresh().await?;
            Ok(Value::Null)
        }
        Request::Route {
            activity_id,
            kind,
            index,
            from_location_id,
            to_location_id,
            stay_at_location,
        } => {
            engine
                .update_assignment_route(
                    &activity_id,
                    kind,
                    index,
                    &from_location_id,
                    &to_location_id,
                    stay_at_location,
                )
                .await?;
            Ok(Value::Null)
        }

        Request::FullyAssigned { activity_id } => {
            let snap = engine.load_snapshot().await?;
            let activity = snap
                .activities
                .iter()
                .find(|a| a.id == activity_id)
                .ok_or(EngineError::NotFound { kind: "activity", id: activity_id })?;
            Ok(json!(is_fully_assigned(activity)))
        }
        Request::EventTotals { event_id } => {
            let snap = engine.load_snapshot().await?;
            Ok(to_data(&event_activity_totals(&event_id, &snap.activities)))
        }
        Request::Conflicts { activity_id, kind, resource_id, start_time, end_time } => {
            let snap = engine.load_snapshot().await?;
            let mut candidate = Assignment::bare(resource_id.clone());
            candidate.assignment_start_time = start_time;
            candidate.assignment_end_time = end_time;
            let conflicts =
                find_conflicts(&snap.activities, &activity_id, kind, &resource_id, &candidate);
            let rows: Vec<Value> =
                conflicts.iter().map(|a| json!({"id": a.id, "title": a.title})).collect();
            Ok(Value::Array(rows))
        }
        Request::Available { kind, resource_id, activity_id } => {
            let snap = engine.load_snapshot().await?;
            let activity = snap
                .activities
                .iter()
                .find(|a| a.id == activity_id)
                .ok_or(EngineError::NotFound { kind: "activity", id: activity_id })?;
            let available = match kind {
                ResourceKind::Personnel => {
                    let person = snap
                        .personnel
                        .iter()
                        .find(|p| p.id == resource_id)
                        .ok_or(EngineError::NotFound { kind: "personnel", id: resource_id })?;
                    is_resource_available(&person.availability, activity)
                }
                ResourceKind::Asset => {
                    let asset = snap
                        .assets
                        .iter()
                        .find(|a| a.id == resource_id)
                        .ok_or(EngineError::NotFound { kind: "asset", id: resource_id })?;
                    is_resource_available(&asset.availability, activity)
                }
            };
            Ok(json!(available))
        }
        Request::Schedule { personnel_id } => {
            let snap = engine.load_snapshot().await?;
            Ok(to_data(&personal_schedule(&snap, &personnel_id)))
        }
    }
}
