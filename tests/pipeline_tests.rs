// End-to-end tests for the upload pipeline against an in-process HTTP
// listener. Each canned response serves exactly one connection, so the
// recorded request list doubles as a request counter.

use artifact_uplink::api::ApiClient;
use artifact_uplink::artifact::{ArtifactStore, LocalArtifactStore};
use artifact_uplink::config::{Config, Source, UploadMode};
use artifact_uplink::error::Error;
use artifact_uplink::payload::{self, Payload};
use artifact_uplink::run::run;
use artifact_uplink::status::FinalResult;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct RecordedRequest {
    request_line: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

struct TestServer {
    url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestServer {
    /// Serve the given canned responses, one connection each, in order.
    fn start(responses: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        std::thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else { return };
                let request = read_request(&mut stream);
                recorded.lock().unwrap().push(request);
                let _ = stream.write_all(response.as_bytes());
            }
        });

        TestServer { url, requests }
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).unwrap();
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if n == 0 {
            break buf.len();
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    RecordedRequest { request_line, headers, body }
}

fn response(status: &str, extra_headers: &[(&str, &str)], body: &str) -> String {
    let mut r = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in extra_headers {
        r.push_str(&format!("{name}: {value}\r\n"));
    }
    r.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));
    r
}

fn ok_json(body: &str) -> String {
    response("200 OK", &[("Content-Type", "application/json")], body)
}

fn config_for(server: &TestServer, source: Source) -> Config {
    Config {
        source,
        api_url: server.url.clone(),
        api_token: None,
        mode: UploadMode::RawBinary,
        poll: false,
        poll_interval: Duration::from_secs(15),
        poll_timeout_mins: 30,
        temp_dir: std::env::temp_dir(),
    }
}

// ---------------------------------------------------------------------------
// Payload resolution
// ---------------------------------------------------------------------------

#[test]
fn file_payload_keeps_exact_bytes_and_base_name() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.bin");
    std::fs::write(&file, b"\x00\x01binary\xff").unwrap();

    let payload = payload::resolve(&file, dir.path()).unwrap();
    assert_eq!(payload.bytes, b"\x00\x01binary\xff");
    assert_eq!(payload.file_name, "report.bin");
}

#[test]
fn empty_file_resolves_to_empty_payload() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("empty.zip");
    std::fs::write(&file, b"").unwrap();

    let payload = payload::resolve(&file, dir.path()).unwrap();
    assert!(payload.bytes.is_empty());
    assert_eq!(payload.file_name, "empty.zip");
}

#[test]
fn missing_path_is_an_invalid_source() {
    let dir = tempfile::tempdir().unwrap();
    let err = payload::resolve(&dir.path().join("nope"), dir.path()).unwrap_err();
    assert!(matches!(err, Error::InvalidSource(_)));
}

fn zip_available() -> bool {
    std::process::Command::new("zip")
        .arg("-v")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn directory_payload_is_an_archive_with_a_unique_name() {
    if !zip_available() {
        eprintln!("zip not installed, skipping");
        return;
    }
    let src = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(src.path().join("b.txt"), "beta").unwrap();
    let temp = tempfile::tempdir().unwrap();

    let first = payload::resolve(src.path(), temp.path()).unwrap();
    let second = payload::resolve(src.path(), temp.path()).unwrap();

    // zip archives start with the PK local-file-header magic
    assert!(first.bytes.starts_with(b"PK"));
    assert_ne!(first.file_name, second.file_name);
    assert!(first.file_name.ends_with(".zip"));
}

// ---------------------------------------------------------------------------
// Upload encodings
// ---------------------------------------------------------------------------

fn sample_payload() -> Payload {
    Payload {
        bytes: b"payload-bytes".to_vec(),
        file_name: "build.zip".into(),
    }
}

#[test]
fn raw_upload_sends_octet_stream_without_auth() {
    let server = TestServer::start(vec![ok_json("{}")]);
    let client = ApiClient::new(&server.url, Some("secret".into())).unwrap();
    client.upload(&sample_payload(), UploadMode::RawBinary).unwrap();

    let reqs = server.requests();
    assert_eq!(reqs.len(), 1);
    assert!(reqs[0].request_line.starts_with("POST"));
    assert_eq!(reqs[0].header("content-type"), Some("application/octet-stream"));
    assert_eq!(reqs[0].header("authorization"), None);
    assert_eq!(reqs[0].body, b"payload-bytes");
}

#[test]
fn authenticated_upload_carries_the_bearer_token() {
    let server = TestServer::start(vec![ok_json("{}")]);
    let client = ApiClient::new(&server.url, Some("secret".into())).unwrap();
    client
        .upload(&sample_payload(), UploadMode::AuthenticatedBinary)
        .unwrap();

    let reqs = server.requests();
    assert_eq!(reqs[0].header("authorization"), Some("Bearer secret"));
    assert_eq!(reqs[0].header("content-type"), Some("application/octet-stream"));
}

#[test]
fn multipart_upload_uses_the_artifact_field_and_a_boundary() {
    let server = TestServer::start(vec![ok_json("{}")]);
    let client = ApiClient::new(&server.url, None).unwrap();
    client.upload(&sample_payload(), UploadMode::Multipart).unwrap();

    let reqs = server.requests();
    let content_type = reqs[0].header("content-type").unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&reqs[0].body);
    assert!(body.contains("name=\"artifact\""));
    assert!(body.contains("filename=\"build.zip\""));
    assert!(body.contains("application/zip"));
    assert!(body.contains("payload-bytes"));
}

#[test]
fn server_error_surfaces_the_status_code_and_body() {
    let server = TestServer::start(vec![response(
        "500 Internal Server Error",
        &[],
        "backend exploded",
    )]);
    let client = ApiClient::new(&server.url, None).unwrap();
    let err = client
        .upload(&sample_payload(), UploadMode::RawBinary)
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("500"), "message should name the status: {msg}");
    assert!(msg.contains("backend exploded"), "message should carry the body: {msg}");
}

// ---------------------------------------------------------------------------
// Whole-run behavior
// ---------------------------------------------------------------------------

#[test]
fn immediate_succeeded_without_polling_is_success() {
    let server = TestServer::start(vec![ok_json(r#"{"status":"succeeded"}"#)]);
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("out.zip");
    std::fs::write(&file, b"zzz").unwrap();

    let config = config_for(&server, Source::Path(file));
    let store = LocalArtifactStore::new(dir.path().join("artifacts"));
    let result = run(&config, &store).unwrap();
    assert!(matches!(result, FinalResult::Success));
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn polling_follows_the_status_url_until_succeeded() {
    let server = TestServerWithStatusUrl::start(vec![
        ok_json(r#"{"status":"pending"}"#),
        ok_json(r#"{"status":"succeeded"}"#),
    ]);

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("out.zip");
    std::fs::write(&file, b"zzz").unwrap();

    let mut config = config_for(&server.inner, Source::Path(file));
    config.poll = true;
    config.api_token = Some("tok".into());
    config.mode = UploadMode::AuthenticatedBinary;
    config.poll_interval = Duration::ZERO; // no real sleeping in tests

    let store = LocalArtifactStore::new(dir.path().join("artifacts"));
    let result = run(&config, &store).unwrap();
    assert!(matches!(result, FinalResult::Success));

    let reqs = server.inner.requests();
    assert_eq!(reqs.len(), 3);
    assert!(reqs[1].request_line.starts_with("GET"));
    assert_eq!(reqs[1].header("authorization"), Some("Bearer tok"));
    assert!(reqs[2].request_line.starts_with("GET"));
}

/// Like [`TestServer`], but the first response advertises the server's own
/// address as the `statusUrl`, so polls loop back to the same listener.
struct TestServerWithStatusUrl {
    inner: TestServer,
}

impl TestServerWithStatusUrl {
    fn start(poll_responses: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let initial = ok_json(&format!(r#"{{"statusUrl":"{url}/status"}}"#));

        std::thread::spawn(move || {
            for response in std::iter::once(initial).chain(poll_responses) {
                let Ok((mut stream, _)) = listener.accept() else { return };
                let request = read_request(&mut stream);
                recorded.lock().unwrap().push(request);
                let _ = stream.write_all(response.as_bytes());
            }
        });

        TestServerWithStatusUrl {
            inner: TestServer { url, requests },
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact store
// ---------------------------------------------------------------------------

#[test]
fn unknown_artifact_fails_before_any_upload() {
    let server = TestServer::start(vec![ok_json("{}")]);
    let dir = tempfile::tempdir().unwrap();

    let config = config_for(&server, Source::Artifact("missing".into()));
    let store = LocalArtifactStore::new(dir.path().join("artifacts"));
    let err = run(&config, &store).unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.to_string().contains("not found"));
    assert!(server.requests().is_empty(), "no upload request may be made");
}

#[test]
fn stored_artifact_becomes_the_payload() {
    let root = tempfile::tempdir().unwrap();
    let artifact_dir = root.path().join("nightly-build");
    std::fs::create_dir_all(&artifact_dir).unwrap();
    std::fs::write(artifact_dir.join("bundle.zip"), b"bundle-bytes").unwrap();

    let store = LocalArtifactStore::new(root.path());
    let record = store.get_artifact("nightly-build").unwrap();
    let dest = tempfile::tempdir().unwrap();
    let downloaded = store.download_artifact(&record.id, dest.path()).unwrap();
    assert_eq!(downloaded.download_path, PathBuf::from(dest.path()));

    let payload =
        artifact_uplink::artifact::payload_from_artifact(&store, "nightly-build", dest.path())
            .unwrap();
    assert_eq!(payload.bytes, b"bundle-bytes");
    assert_eq!(payload.file_name, "bundle.zip");
}
