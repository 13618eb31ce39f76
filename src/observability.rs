use std::net::SocketAddr;

use crate::wire::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total wire requests handled. Labels: op.
pub const REQUESTS_TOTAL: &str = "muster_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "muster_request_duration_seconds";

/// Counter: assignment mutations accepted. Labels: kind.
pub const ASSIGNMENTS_TOTAL: &str = "muster_assignments_total";

/// Counter: assignment mutations rejected. Labels: reason.
pub const ASSIGNMENTS_REJECTED_TOTAL: &str = "muster_assignments_rejected_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "muster_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "muster_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "muster_connections_rejected_total";

/// Counter: activities rewritten by operator reconcile passes.
pub const RECONCILE_WRITES_TOTAL: &str = "muster_reconcile_writes_total";

/// Counter: activities auto-promoted from Planning to Ready.
pub const PROMOTIONS_TOTAL: &str = "muster_promotions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Request variant to a short label for metrics.
pub fn op_label(request: &Request) -> &'static str {
    match request {
        Request::Login { .. } => "login",
        Request::Refresh => "refresh",
        Request::ListEvents => "list_events",
        Request::ListActivities { .. } => "list_activities",
        Request::ListAssets => "list_assets",
        Request::ListPersonnel => "list_personnel",
        Request::ListLocations => "list_locations",
        Request::CreateEvent { .. } => "create_event",
        Request::UpdateEvent { .. } => "update_event",
        Request::DeleteEvent { .. } => "delete_event",
        Request::CreateActivity { .. } => "create_activity",
        Request::UpdateActivity { .. } => "update_activity",
        Request::DeleteActivity { .. } => "delete_activity",
        Request::CreateAsset { .. } => "create_asset",
        Request::UpdateAsset { .. } => "update_asset",
        Request::DeleteAsset { .. } => "delete_asset",
        Request::CreatePersonnel { .. } => "create_personnel",
        Request::UpdatePersonnel { .. } => "update_personnel",
        Request::DeletePersonnel { .. } => "delete_personnel",
        Request::CreateLocation { .. } => "create_location",
        Request::UpdateLocation { .. } => "update_location",
        Request::DeleteLocation { .. } => "delete_location",
        Request::AssignPersonnel { .. } => "assign_personnel",
        Request::AssignAsset { .. } => "assign_asset",
        Request::UnassignPersonnel { .. } => "unassign_personnel",
        Request::UnassignAsset { .. } => "unassign_asset",
        Request::AssignOperator { .. } => "assign_operator",
        Request::UnassignOperator { .. } => "unassign_operator",
        Request::Route { .. } => "route",
        Request::FullyAssigned { .. } => "fully_assigned",
        Request::EventTotals { .. } => "event_totals",
        Request::Conflicts { .. } => "conflicts",
        Request::Available { .. } => "available",
        Request::Schedule { .. } => "schedule",
    }
}
