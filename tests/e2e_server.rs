use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use ann_serve_core::IndexWriter;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::process::{Child, Command};
use tokio::time::sleep;

fn reserve_local_port() -> Option<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").ok()?;
    let port = listener.local_addr().ok()?.port();
    drop(listener);
    Some(port)
}

/// 2-d points (i, 0) labelled 1000 + i
fn write_line_index(path: &Path, n: i64) {
    let mut writer = IndexWriter::new(path, 2).expect("create index");
    for i in 0..n {
        writer.add(1000 + i, &[i as f32, 0.0]).expect("add vector");
    }
    writer.finish().expect("finish index");
}

async fn start_server(index_file: &Path, port: u16, extra: &[&str]) -> std::io::Result<Child> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ann-serve"));
    cmd.arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--index-file")
        .arg(index_file)
        .arg("--num-k")
        .arg("3")
        .args(extra)
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd.spawn()
}

async fn wait_for_ready(client: &reqwest::Client, base_url: &str) -> Result<(), String> {
    let url = format!("{}/search", base_url);
    for _ in 0..80 {
        if let Ok(resp) = client.post(&url).json(&json!({"queries": []})).send().await {
            if resp.status() == StatusCode::OK {
                return Ok(());
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    Err(format!("server did not become ready at {}", url))
}

async fn stop_server(child: &mut Child) {
    let _ = child.start_kill();
    let _ = tokio::time::timeout(Duration::from_secs(3), child.wait()).await;
}

#[tokio::test]
async fn test_serve_search_over_http() {
    let dir = tempdir().expect("tempdir");
    let index_file = dir.path().join("line.idx");
    write_line_index(&index_file, 20);

    let Some(port) = reserve_local_port() else {
        eprintln!("skipping e2e test: localhost bind unavailable");
        return;
    };
    let base_url = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();

    let mut server = match start_server(&index_file, port, &["-t", "2"]).await {
        Ok(child) => child,
        Err(e) => {
            eprintln!("skipping e2e test: failed to spawn server: {}", e);
            return;
        }
    };
    wait_for_ready(&client, &base_url).await.expect("server ready");

    let resp = client
        .post(format!("{}/search", base_url))
        .json(&json!({"queries": [[5.1, 0.0], [18.0, 0.0]]}))
        .send()
        .await
        .expect("search request");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["indices"], json!([[1005, 1006, 1004], [1018, 1017, 1019]]));
    assert_eq!(body["distances"][1][0], json!(0.0));

    let resp = client
        .post(format!("{}/search", base_url))
        .json(&json!({"queries": [[1.0, 0.0]], "top_k": 5}))
        .send()
        .await
        .expect("search request");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["indices"][0].as_array().map(Vec::len), Some(5));

    let resp = client
        .post(format!("{}/search", base_url))
        .json(&json!({"queries": [[1.0, 2.0, 3.0]]}))
        .send()
        .await
        .expect("search request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("json body");
    assert!(body["reason"]
        .as_str()
        .is_some_and(|r| r.contains("dimension mismatch")));

    let resp = client
        .post(format!("{}/search", base_url))
        .body("not json")
        .send()
        .await
        .expect("search request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    stop_server(&mut server).await;
}

#[tokio::test]
async fn test_startup_fails_for_missing_index() {
    let dir = tempdir().expect("tempdir");
    let status = std::process::Command::new(env!("CARGO_BIN_EXE_ann-serve"))
        .arg("--index-file")
        .arg(dir.path().join("missing.idx"))
        .arg("--port")
        .arg("0")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run binary");
    assert!(!status.success());
}

#[tokio::test]
async fn test_startup_fails_for_effort_on_flat_index() {
    let dir = tempdir().expect("tempdir");
    let index_file = dir.path().join("flat.idx");
    write_line_index(&index_file, 4);

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_ann-serve"))
        .arg("--index-file")
        .arg(&index_file)
        .arg("--port")
        .arg("0")
        .arg("--hnsw-ef-search")
        .arg("64")
        .output()
        .expect("run binary");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ef_search"));
}
