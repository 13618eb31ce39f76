use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

struct Client {
    framed: Framed<TcpStream, LinesCodec>,
}

async fn connect(host: &str, port: u16) -> Client {
    let socket = TcpStream::connect((host, port)).await.expect("connect failed");
    Client { framed: Framed::new(socket, LinesCodec::new()) }
}

impl Client {
    async fn request(&mut self, body: Value) -> Value {
        self.framed.send(body.to_string()).await.expect("send failed");
        let line = self
            .framed
            .next()
            .await
            .expect("server closed connection")
            .expect("read failed");
        serde_json::from_str(&line).expect("bad response")
    }

    async fn ok(&mut self, body: Value) -> Value {
        let resp = self.request(body).await;
        assert_eq!(resp["ok"], true, "request failed: {resp}");
        resp["data"].clone()
    }

    async fn create_id(&mut self, body: Value) -> String {
        self.ok(body).await["id"].as_str().expect("no id").to_string()
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn june_availability() -> Value {
    json!([{
        "start_date": "2026-06-01",
        "end_date": "2026-06-30",
        "start_time": "00:00",
        "end_time": "23:59",
    }])
}

/// Window for the i-th operation, spread across the month so overlaps stay rare.
fn window(i: usize) -> (String, String, String) {
    let date = format!("2026-06-{:02}", 1 + (i / 20) % 28);
    let hour = i % 20;
    (date, format!("{hour:02}:00"), format!("{hour:02}:45"))
}

struct Pool {
    event_id: String,
    personnel: Vec<String>,
}

async fn setup(client: &mut Client) -> Pool {
    let event_id = client
        .create_id(json!({"op": "create_event", "title": "Stress Encampment"}))
        .await;

    let mut personnel = Vec::new();
    for i in 0..20 {
        let id = client
            .create_id(json!({
                "op": "create_personnel",
                "name": format!("Stress Cadet {i}"),
                "availability": june_availability(),
            }))
            .await;
        personnel.push(id);
    }

    println!("  created 1 event, {} personnel", personnel.len());
    Pool { event_id, personnel }
}

async fn phase1_sequential(host: &str, port: u16, pool: &Pool) {
    let mut client = connect(host, port).await;

    let n = 1000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let (date, from, to) = window(i);
        let person = &pool.personnel[i % pool.personnel.len()];
        let t = Instant::now();
        let activity_id = client
            .create_id(json!({
                "op": "create_activity",
                "event_id": pool.event_id,
                "title": format!("Drill {i}"),
                "activity_date": date,
                "start_time": from,
                "end_time": to,
            }))
            .await;
        client
            .ok(json!({
                "op": "assign_personnel",
                "activity_id": activity_id,
                "personnel_id": person,
                "role": "Support",
                "start_time": from,
                "end_time": to,
                "force": true,
            }))
            .await;
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} create+assign pairs in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("create+assign latency", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16) {
    let n_tasks = 10;
    let n_per_task = 100;

    let start = Instant::now();
    let mut handles = Vec::new();

    for task in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            let mut client = connect(&host, port).await;
            let event_id = client
                .create_id(json!({"op": "create_event", "title": format!("Concurrent {task}")}))
                .await;
            for j in 0..n_per_task {
                let (date, from, to) = window(j);
                client
                    .create_id(json!({
                        "op": "create_activity",
                        "event_id": event_id,
                        "title": format!("Task {task} slot {j}"),
                        "activity_date": date,
                        "start_time": from,
                        "end_time": to,
                    }))
                    .await;
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} activities = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load(host: &str, port: u16, pool: &Pool) {
    // Writer tasks: keep appending activities in the background
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for w in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        let event_id = pool.event_id.clone();
        writer_handles.push(tokio::spawn(async move {
            let mut client = connect(&host, port).await;
            let mut i = 0usize;
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let (date, from, to) = window(i);
                client
                    .create_id(json!({
                        "op": "create_activity",
                        "event_id": event_id,
                        "title": format!("Writer {w} load {i}"),
                        "activity_date": date,
                        "start_time": from,
                        "end_time": to,
                    }))
                    .await;
                i += 1;
            }
        }));
    }

    // Reader tasks: scan for conflicts across the growing board and measure latency
    let n_readers = 10;
    let reads_per_reader = 300;
    let mut reader_handles = Vec::new();

    for r in 0..n_readers {
        let host = host.to_string();
        let person = pool.personnel[r % pool.personnel.len()].clone();
        reader_handles.push(tokio::spawn(async move {
            let mut client = connect(&host, port).await;
            let (date, from, to) = window(r);
            let activity_id = client
                .create_id(json!({
                    "op": "create_activity",
                    "title": format!("Reader probe {r}"),
                    "activity_date": date,
                    "start_time": from,
                    "end_time": to,
                }))
                .await;

            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                client
                    .ok(json!({
                        "op": "conflicts",
                        "activity_id": activity_id,
                        "kind": "personnel",
                        "resource_id": person,
                    }))
                    .await;
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("conflict scan", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let mut client = connect(&host, port).await;
            for _ in 0..ops_per_conn {
                client.ok(json!({"op": "list_events"})).await;
            }
            success.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(std::sync::atomic::Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} ops each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("MUSTER_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("MUSTER_PORT")
        .unwrap_or_else(|_| "7171".into())
        .parse()
        .expect("invalid MUSTER_PORT");

    println!("=== muster stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[setup]");
    let mut setup_client = connect(&host, port).await;
    let pool = setup(&mut setup_client).await;
    drop(setup_client);

    println!("\n[phase 1] sequential create+assign throughput");
    phase1_sequential(&host, port, &pool).await;

    println!("\n[phase 2] concurrent activity creation");
    phase2_concurrent(&host, port).await;

    println!("\n[phase 3] conflict-scan latency under write load");
    phase3_read_under_load(&host, port, &pool).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
