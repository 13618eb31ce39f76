use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};

use muster::store::{DataStore, MemoryStore};
use muster::wire;

// ── Test infrastructure ──────────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<MemoryStore>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store = Arc::new(MemoryStore::new());

    let accept_store = store.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let store: Arc<dyn DataStore> = accept_store.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, store).await;
            });
        }
    });

    (addr, store)
}

struct Client {
    framed: Framed<TcpStream, LinesCodec>,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let socket = TcpStream::connect(addr).await.unwrap();
        Self { framed: Framed::new(socket, LinesCodec::new()) }
    }

    async fn send_raw(&mut self, line: &str) -> Value {
        self.framed.send(line.to_string()).await.unwrap();
        let line = self.framed.next().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, body: Value) -> Value {
        self.send_raw(&body.to_string()).await
    }

    /// Request that must succeed; returns the data payload.
    async fn ok(&mut self, body: Value) -> Value {
        let resp = self.request(body).await;
        assert_eq!(resp["ok"], true, "unexpected error: {resp}");
        resp["data"].clone()
    }

    /// Request that must fail; returns the error object.
    async fn err(&mut self, body: Value) -> Value {
        let resp = self.request(body).await;
        assert_eq!(resp["ok"], false, "expected an error: {resp}");
        resp["error"].clone()
    }
}

fn june_availability() -> Value {
    json!([{
        "start_date": "2026-06-01",
        "end_date": "2026-06-30",
        "start_time": "06:00",
        "end_time": "22:00",
    }])
}

// ── Sessions and CRUD ────────────────────────────────────────────

#[tokio::test]
async fn login_reports_privilege() {
    let (addr, _store) = start_test_server().await;
    let mut client = Client::connect(addr).await;

    let data = client.ok(json!({"op": "login", "role": "admin"})).await;
    assert_eq!(data["privileged"], true);
    let data = client.ok(json!({"op": "login", "role": "cadet"})).await;
    assert_eq!(data["privileged"], false);
    let data = client.ok(json!({"op": "login", "role": "Staff"})).await;
    assert_eq!(data["privileged"], true);
}

#[tokio::test]
async fn crud_round_trip_with_cascade() {
    let (addr, _store) = start_test_server().await;
    let mut client = Client::connect(addr).await;

    let event = client
        .ok(json!({"op": "create_event", "title": "Encampment", "start_date": "2026-06-08"}))
        .await;
    let event_id = event["id"].as_str().unwrap().to_string();
    assert_eq!(event["status"], "upcoming");

    let activity = client
        .ok(json!({
            "op": "create_activity",
            "event_id": event_id,
            "title": "Opening Formation",
            "activity_date": "2026-06-08",
        }))
        .await;
    assert_eq!(activity["column"], "Planning");

    let updated = client
        .ok(json!({"op": "update_event", "id": event_id, "title": "Encampment 2026"}))
        .await;
    assert_eq!(updated["title"], "Encampment 2026");

    let listed = client
        .ok(json!({"op": "list_activities", "event_id": event_id}))
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    client.ok(json!({"op": "delete_event", "id": event_id})).await;
    let listed = client.ok(json!({"op": "list_activities"})).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn changes_are_visible_across_connections() {
    let (addr, _store) = start_test_server().await;
    let mut writer = Client::connect(addr).await;
    let mut reader = Client::connect(addr).await;

    writer.ok(json!({"op": "create_location", "name": "HQ", "city": "Cedar Falls"})).await;
    let listed = reader.ok(json!({"op": "list_locations"})).await;
    assert_eq!(listed[0]["name"], "HQ");
}

// ── Assignment flows ─────────────────────────────────────────────

#[tokio::test]
async fn vehicle_flow_end_to_end() {
    let (addr, _store) = start_test_server().await;
    let mut client = Client::connect(addr).await;
    client.ok(json!({"op": "login", "role": "admin"})).await;

    let jane = client
        .ok(json!({
            "op": "create_personnel",
            "name": "Jane Harmon",
            "availability": june_availability(),
        }))
        .await;
    let jane_id = jane["id"].as_str().unwrap().to_string();
    let van = client
        .ok(json!({
            "op": "create_asset",
            "name": "Van 12",
            "type": "12 Passenger Van",
            "availability": june_availability(),
        }))
        .await;
    let van_id = van["id"].as_str().unwrap().to_string();
    let activity = client
        .ok(json!({
            "op": "create_activity",
            "title": "Range Day",
            "activity_date": "2026-06-08",
            "start_time": "09:00",
            "end_time": "11:00",
        }))
        .await;
    let activity_id = activity["id"].as_str().unwrap().to_string();

    // No roster yet: the vehicle is refused.
    let error = client
        .err(json!({
            "op": "assign_asset",
            "activity_id": activity_id,
            "asset_id": van_id,
            "start_time": "09:00",
            "end_time": "10:00",
        }))
        .await;
    assert_eq!(error["code"], "no_operator_coverage");

    client
        .ok(json!({
            "op": "assign_operator",
            "asset_id": van_id,
            "personnel_id": jane_id,
            "role": "Driver",
            "date": "2026-06-08",
            "start_time": "08:00",
            "end_time": "12:00",
        }))
        .await;
    client
        .ok(json!({
            "op": "assign_asset",
            "activity_id": activity_id,
            "asset_id": van_id,
            "start_time": "09:00",
            "end_time": "10:00",
        }))
        .await;

    // The derived driver entry is visible in a refresh...
    let snap = client.ok(json!({"op": "refresh"})).await;
    let acts = snap["activities"].as_array().unwrap();
    let entry = &acts[0]["assigned_personnel"][0];
    assert_eq!(entry["personnel_id"], jane_id.as_str());
    assert_eq!(entry["auto_driver"], true);
    assert_eq!(entry["asset_id"], van_id.as_str());

    // ...and on Jane's itinerary.
    let schedule = client
        .ok(json!({"op": "schedule", "personnel_id": jane_id}))
        .await;
    let rows = schedule.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["asset_name"], "Van 12");
    assert_eq!(rows[0]["start_time"], "09:00");

    // Derived entries cannot be removed by hand.
    let error = client
        .err(json!({
            "op": "unassign_personnel",
            "activity_id": activity_id,
            "personnel_id": jane_id,
        }))
        .await;
    assert_eq!(error["code"], "immutable_derived");

    // Removing the vehicle prunes its derived entry in the same write.
    client
        .ok(json!({
            "op": "unassign_asset",
            "activity_id": activity_id,
            "asset_id": van_id,
        }))
        .await;
    let snap = client.ok(json!({"op": "refresh"})).await;
    let acts = snap["activities"].as_array().unwrap();
    assert!(acts[0]["assigned_personnel"].as_array().unwrap().is_empty());
    assert!(acts[0]["assigned_assets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn conflicts_are_advisory_over_the_wire() {
    let (addr, _store) = start_test_server().await;
    let mut client = Client::connect(addr).await;

    let bob = client
        .ok(json!({
            "op": "create_personnel",
            "name": "Bob Reyes",
            "availability": june_availability(),
        }))
        .await;
    let bob_id = bob["id"].as_str().unwrap().to_string();
    let first = client
        .ok(json!({
            "op": "create_activity",
            "title": "Morning Hike",
            "activity_date": "2026-06-08",
            "start_time": "09:00",
            "end_time": "10:00",
        }))
        .await;
    let second = client
        .ok(json!({
            "op": "create_activity",
            "title": "Flight Line",
            "activity_date": "2026-06-08",
            "start_time": "09:30",
            "end_time": "10:30",
        }))
        .await;
    let second_id = second["id"].as_str().unwrap().to_string();

    client
        .ok(json!({
            "op": "assign_personnel",
            "activity_id": first["id"],
            "personnel_id": bob_id,
            "role": "Medic",
            "start_time": "09:00",
            "end_time": "10:00",
        }))
        .await;

    // The query surface sees the same overlap the mutator will report.
    let conflicts = client
        .ok(json!({
            "op": "conflicts",
            "activity_id": second_id,
            "kind": "personnel",
            "resource_id": bob_id,
        }))
        .await;
    assert_eq!(conflicts[0]["title"], "Morning Hike");

    let error = client
        .err(json!({
            "op": "assign_personnel",
            "activity_id": second_id,
            "personnel_id": bob_id,
            "role": "Medic",
            "start_time": "09:30",
            "end_time": "10:30",
        }))
        .await;
    assert_eq!(error["code"], "schedule_conflict");
    assert_eq!(error["conflicts"][0], "Morning Hike");

    client
        .ok(json!({
            "op": "assign_personnel",
            "activity_id": second_id,
            "personnel_id": bob_id,
            "role": "Medic",
            "start_time": "09:30",
            "end_time": "10:30",
            "force": true,
        }))
        .await;
}

// ── Query surface ────────────────────────────────────────────────

#[tokio::test]
async fn staffing_queries_answer_from_live_state() {
    let (addr, _store) = start_test_server().await;
    let mut client = Client::connect(addr).await;

    let event = client.ok(json!({"op": "create_event", "title": "Encampment"})).await;
    let event_id = event["id"].as_str().unwrap().to_string();
    let priya = client
        .ok(json!({
            "op": "create_personnel",
            "name": "Priya Nair",
            "availability": june_availability(),
        }))
        .await;
    let priya_id = priya["id"].as_str().unwrap().to_string();
    let activity = client
        .ok(json!({
            "op": "create_activity",
            "event_id": event_id,
            "title": "First Aid",
            "activity_date": "2026-06-08",
            "start_time": "09:00",
            "end_time": "10:00",
            "support_personnel_required": ["Medic"],
        }))
        .await;
    let activity_id = activity["id"].as_str().unwrap().to_string();

    let full = client.ok(json!({"op": "fully_assigned", "activity_id": activity_id})).await;
    assert_eq!(full, json!(false));

    let available = client
        .ok(json!({
            "op": "available",
            "kind": "personnel",
            "resource_id": priya_id,
            "activity_id": activity_id,
        }))
        .await;
    assert_eq!(available, json!(true));

    client
        .ok(json!({
            "op": "assign_personnel",
            "activity_id": activity_id,
            "personnel_id": priya_id,
            "role": "Medic",
            "start_time": "09:00",
            "end_time": "10:00",
        }))
        .await;

    let full = client.ok(json!({"op": "fully_assigned", "activity_id": activity_id})).await;
    assert_eq!(full, json!(true));

    let totals = client.ok(json!({"op": "event_totals", "event_id": event_id})).await;
    assert_eq!(totals["required_personnel"], 1);
    assert_eq!(totals["assigned_personnel"], 1);
    assert_eq!(totals["required_assets"], 0);
}

// ── Protocol robustness ──────────────────────────────────────────

#[tokio::test]
async fn malformed_input_keeps_the_connection_alive() {
    let (addr, _store) = start_test_server().await;
    let mut client = Client::connect(addr).await;

    let resp = client.send_raw("this is not json").await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_request");

    let resp = client.request(json!({"op": "drop_tables"})).await;
    assert_eq!(resp["error"]["code"], "bad_request");

    let resp = client.request(json!({"op": "delete_event", "id": "nope"})).await;
    assert_eq!(resp["error"]["code"], "not_found");

    // Still serving after three bad requests.
    let listed = client.ok(json!({"op": "list_events"})).await;
    assert!(listed.as_array().unwrap().is_empty());
}
