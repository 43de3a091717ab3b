use fastget::{DownloadConfig, DownloadError, EventSink, FastGetter};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn sample_body(len: usize) -> Arc<Vec<u8>> {
    Arc::new((0..len).map(|i| (i * 31 % 251) as u8).collect())
}

/// Answers `Range: bytes=a-b` with the matching slice of `body`.
fn serve_ranges(body: Arc<Vec<u8>>) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let Some(range) = request
            .headers
            .get("Range")
            .and_then(|value| value.to_str().ok())
        else {
            return ResponseTemplate::new(200).set_body_bytes(body.to_vec());
        };

        let (start, end) = range
            .trim_start_matches("bytes=")
            .split_once('-')
            .expect("malformed range");
        let start: usize = start.parse().expect("range start");
        let end: usize = end.parse().expect("range end");

        ResponseTemplate::new(206)
            .insert_header(
                "Content-Range",
                format!("bytes {}-{}/{}", start, end, body.len()).as_str(),
            )
            .set_body_bytes(body[start..=end].to_vec())
    }
}

/// HEAD answer declaring the length of `body`.
fn head_response(body: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Length", body.len().to_string().as_str())
        .set_body_bytes(body.to_vec())
}

async fn mount_resource(server: &MockServer, body: Arc<Vec<u8>>, accept_ranges: bool) {
    let mut head = head_response(&body);
    if accept_ranges {
        head = head.insert_header("Accept-Ranges", "bytes");
    }

    Mock::given(method("HEAD"))
        .respond_with(head)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .respond_with(serve_ranges(body))
        .mount(server)
        .await;
}

async fn requested_ranges(server: &MockServer) -> Vec<String> {
    let mut ranges: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .filter_map(|r| r.headers.get("Range")?.to_str().ok().map(str::to_string))
        .collect();
    ranges.sort();
    ranges
}

#[derive(Default)]
struct RecordingSink {
    before_start: Mutex<Vec<(u64, u64)>>,
    started: Mutex<HashMap<usize, u64>>,
    last_progress: Mutex<HashMap<usize, u64>>,
    finished: Mutex<HashMap<usize, usize>>,
}

impl EventSink for RecordingSink {
    fn on_before_start(&self, total_length: u64, chunk_length: u64) {
        self.before_start
            .lock()
            .unwrap()
            .push((total_length, chunk_length));
    }

    fn on_start(&self, worker_id: usize, chunk_length: u64) {
        self.started.lock().unwrap().insert(worker_id, chunk_length);
    }

    fn on_progress(&self, worker_id: usize, written: u64) {
        self.last_progress.lock().unwrap().insert(worker_id, written);
    }

    fn on_finish(&self, worker_id: usize) {
        *self.finished.lock().unwrap().entry(worker_id).or_default() += 1;
    }
}

fn config_for(server: &MockServer, output: &Path, workers: usize) -> DownloadConfig {
    DownloadConfig::new(format!("{}/big.bin", server.uri()))
        .unwrap()
        .workers(workers)
        .output(output)
}

#[tokio::test]
async fn test_three_workers_assemble_nine_megabytes() {
    let server = MockServer::start().await;
    let body = sample_body(9_000_000);
    mount_resource(&server, body.clone(), true).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("big.bin");
    let sink = Arc::new(RecordingSink::default());

    let result = FastGetter::new(config_for(&server, &output, 3))
        .with_sink(sink.clone())
        .get()
        .await
        .expect("download failed");

    assert_eq!(result.size, 9_000_000);
    assert_eq!(result.output_file.metadata().unwrap().len(), 9_000_000);
    let content = std::fs::read(&output).unwrap();
    assert!(content == *body, "output differs from the served resource");

    assert_eq!(
        requested_ranges(&server).await,
        vec![
            "bytes=0-2999999",
            "bytes=3000000-5999999",
            "bytes=6000000-8999999"
        ]
    );

    assert_eq!(*sink.before_start.lock().unwrap(), vec![(9_000_000, 3_000_000)]);
    assert_eq!(
        *sink.started.lock().unwrap(),
        HashMap::from([(1, 3_000_000), (2, 3_000_000), (3, 3_000_000)])
    );
    assert_eq!(
        *sink.last_progress.lock().unwrap(),
        HashMap::from([(1, 3_000_000), (2, 3_000_000), (3, 3_000_000)])
    );
    assert_eq!(
        *sink.finished.lock().unwrap(),
        HashMap::from([(1, 1), (2, 1), (3, 1)])
    );
}

#[tokio::test]
async fn test_single_worker_without_accept_ranges() {
    let server = MockServer::start().await;
    let body = sample_body(9_000_000);
    mount_resource(&server, body.clone(), false).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("big.bin");
    let sink = Arc::new(RecordingSink::default());

    FastGetter::new(config_for(&server, &output, 3))
        .with_sink(sink.clone())
        .get()
        .await
        .expect("download failed");

    assert_eq!(requested_ranges(&server).await, vec!["bytes=0-8999999"]);
    assert!(std::fs::read(&output).unwrap() == *body);
    assert_eq!(*sink.finished.lock().unwrap(), HashMap::from([(1, 1)]));
}

#[tokio::test]
async fn test_output_is_identical_for_any_worker_count() {
    let server = MockServer::start().await;
    let body = sample_body(100_003);
    mount_resource(&server, body.clone(), true).await;

    let dir = tempdir().unwrap();
    for workers in 1..=7 {
        let output = dir.path().join(format!("out-{}.bin", workers));
        FastGetter::new(config_for(&server, &output, workers))
            .get()
            .await
            .unwrap_or_else(|e| panic!("{} workers: {}", workers, e));

        assert!(
            std::fs::read(&output).unwrap() == *body,
            "{} workers produced a different file",
            workers
        );
    }
}

#[tokio::test]
async fn test_full_response_to_range_request_aborts() {
    let server = MockServer::start().await;
    let body = sample_body(1_000);
    Mock::given(method("HEAD"))
        .respond_with(head_response(&body).insert_header("Accept-Ranges", "bytes"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("out.bin");
    let sink = Arc::new(RecordingSink::default());

    let err = FastGetter::new(config_for(&server, &output, 2))
        .with_sink(sink.clone())
        .get()
        .await
        .unwrap_err();

    assert!(
        matches!(err, DownloadError::ServerContract { status, .. } if status == 200),
        "unexpected error: {err:?}"
    );
    assert!(sink.finished.lock().unwrap().is_empty());
    assert!(std::fs::read(&output).unwrap().iter().all(|&b| b == 0));
}

#[tokio::test]
async fn test_partial_response_of_wrong_length_aborts() {
    let server = MockServer::start().await;
    let body = sample_body(1_000);
    Mock::given(method("HEAD"))
        .respond_with(head_response(&body).insert_header("Accept-Ranges", "bytes"))
        .mount(&server)
        .await;
    // Every range is answered with its first ten bytes only.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body[..10].to_vec()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("out.bin");
    let sink = Arc::new(RecordingSink::default());

    let err = FastGetter::new(config_for(&server, &output, 2))
        .with_sink(sink.clone())
        .get()
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            DownloadError::RangeMismatch {
                expected: 500,
                actual: 10,
                ..
            }
        ),
        "unexpected error: {err:?}"
    );
    assert!(sink.finished.lock().unwrap().is_empty());
    assert!(std::fs::read(&output).unwrap().iter().all(|&b| b == 0));
}

#[tokio::test]
async fn test_headers_are_sent_with_every_request() {
    let server = MockServer::start().await;
    let body = sample_body(64);
    Mock::given(method("HEAD"))
        .and(header("Authorization", "Bearer token"))
        .respond_with(head_response(&body).insert_header("Accept-Ranges", "bytes"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer token"))
        .respond_with(serve_ranges(body.clone()))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("out.bin");
    let config = config_for(&server, &output, 2).header("Authorization", "Bearer token");

    FastGetter::new(config).get().await.expect("download failed");
    assert!(std::fs::read(&output).unwrap() == *body);
}

#[tokio::test]
async fn test_missing_length_fails_before_writing() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("Accept-Ranges", "bytes"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("out.bin");

    let err = FastGetter::new(config_for(&server, &output, 3))
        .get()
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Planning(_)), "unexpected error: {err:?}");
    assert!(!output.exists());
}

#[tokio::test]
async fn test_cancelled_run_reports_cancellation() {
    let server = MockServer::start().await;
    mount_resource(&server, sample_body(1_000), true).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("out.bin");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = FastGetter::new(config_for(&server, &output, 2))
        .get_with_cancel(cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_existing_longer_file_is_resized() {
    let server = MockServer::start().await;
    let body = sample_body(500);
    mount_resource(&server, body.clone(), true).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("out.bin");
    std::fs::write(&output, vec![0xFFu8; 2_000]).unwrap();

    FastGetter::new(config_for(&server, &output, 4))
        .get()
        .await
        .expect("download failed");

    assert!(std::fs::read(&output).unwrap() == *body);
}
