use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use docbench::bench::{self, SetupError};
use docbench::config::Config;
use docbench::engine::Distribution;
use docbench::http::HttpRemote;
use docbench::record::{Document, FIELD_COUNT, Record};
use docbench::record_log::{Term, parse_line};
use docbench::remote::Remote;
use docbench_client::BulkResponse;
use docbench_test::server::{Documents, TestServer};
use serde_json::json;

fn config(server: &TestServer, record_log: &Path) -> Config {
    Config {
        url: server.url("/"),
        index: "bench".into(),
        count: 40,
        concurrency: 4,
        record_log: record_log.to_owned(),
        progress: false,
        ..Default::default()
    }
}

fn remote(config: &Config) -> Arc<HttpRemote> {
    let (client, index) = bench::connect(config).unwrap();
    Arc::new(HttpRemote::new(client, index))
}

async fn setup(config: &Config) {
    let (client, index) = bench::connect(config).unwrap();
    bench::setup(&client, &index).await.unwrap();
}

fn log_lines(path: &Path) -> usize {
    std::fs::read_to_string(path).unwrap().lines().count()
}

#[tokio::test]
async fn setup_create_and_search() {
    docbench_test::tracing::init();
    let server = TestServer::new().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&server, &dir.path().join("records.txt"));

    let (client, index) = bench::connect(&config).unwrap();
    let info = bench::setup(&client, &index).await.unwrap();
    assert_eq!(info.cluster_name, "docbench");
    assert_eq!(server.documents().mapping("bench"), Some(bench::mapping()));

    // provisioning an existing index only refreshes the mapping
    bench::setup(&client, &index).await.unwrap();

    let report = bench::create(&config, remote(&config)).await.unwrap();
    assert_eq!(report.total, 40);
    assert_eq!(report.succeeded, 40);
    assert_eq!(report.error_percent(), None);
    assert!(report.rate(config.rate_unit).is_some());
    assert_eq!(server.documents().count("bench"), 40);
    assert_eq!(log_lines(&config.record_log), 40 * FIELD_COUNT);

    config.bulk_size = Some(7);
    config.distribution = Distribution::SharedCursor;
    let report = bench::create(&config, remote(&config)).await.unwrap();
    assert_eq!(report.succeeded, 40);
    assert_eq!(server.documents().count("bench"), 80);
    assert_eq!(log_lines(&config.record_log), 80 * FIELD_COUNT);

    config.count = 30;
    let report = bench::search(&config, remote(&config)).await.unwrap();
    assert_eq!(report.total, 30);
    assert_eq!(report.succeeded, 30);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn searching_a_missing_index_is_fatal() {
    let server = TestServer::new().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&server, &dir.path().join("records.txt"));

    // create documents in one index, then search a different one
    setup(&config).await;
    bench::create(&config, remote(&config)).await.unwrap();
    config.index = "missing".into();
    config.count = 8;
    config.concurrency = 2;

    let err = bench::search(&config, remote(&config)).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SetupError>(),
        Some(SetupError::IndexMissing(index)) if index == "missing"
    ));
}

#[tokio::test]
async fn unreachable_service_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("records.txt");
    std::fs::write(&log, "data0:0:abc\n").unwrap();

    let config = Config {
        url: "http://127.0.0.1:1/".into(),
        count: 4,
        concurrency: 2,
        record_log: log.clone(),
        progress: false,
        ..Default::default()
    };

    let err = bench::search(&config, remote(&config)).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SetupError>(),
        Some(SetupError::Client(_))
    ));

    let err = bench::create(&config, remote(&config)).await.unwrap_err();
    assert!(err.downcast_ref::<SetupError>().is_some());
    // nothing was appended to the record log
    assert_eq!(log_lines(&log), 1);
}

#[tokio::test]
async fn searching_an_empty_log_fails_fast() {
    let server = TestServer::new().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.txt");
    std::fs::write(&path, "").unwrap();

    let config = config(&server, &path);
    setup(&config).await;

    let err = bench::search(&config, remote(&config)).await.unwrap_err();
    let expected = format!("failed to sample record log {}: record log is empty", path.display());
    assert_eq!(format!("{err:#}"), expected);
}

/// Occupies some ids in the service right before they are created, so that those writes conflict.
///
/// Every third single create and the first document of every bulk request are taken.
#[derive(Debug)]
struct ConflictingRemote {
    inner: HttpRemote,
    documents: Documents,
    creates: AtomicUsize,
    taken: Mutex<Vec<String>>,
}

impl ConflictingRemote {
    fn new(config: &Config, documents: Documents) -> Self {
        let (client, index) = bench::connect(config).unwrap();
        Self {
            inner: HttpRemote::new(client, index),
            documents,
            creates: AtomicUsize::new(0),
            taken: Mutex::new(Vec::new()),
        }
    }

    fn take(&self, id: &str) {
        let index = self.inner.index.name();
        self.documents.insert(index, id, json!({ "owner": "other" }));
        self.taken.lock().unwrap().push(id.to_owned());
    }
}

#[async_trait::async_trait]
impl Remote for ConflictingRemote {
    async fn check(&self) -> Result<()> {
        self.inner.check().await
    }

    async fn create(&self, id: &str, record: &Record) -> Result<String> {
        if self.creates.fetch_add(1, Ordering::SeqCst) % 3 == 0 {
            self.take(id);
        }
        self.inner.create(id, record).await
    }

    async fn bulk_create(&self, batch: &[Document]) -> Result<BulkResponse> {
        if let Some(first) = batch.first() {
            self.take(&first.id);
        }
        self.inner.bulk_create(batch).await
    }

    async fn count(&self, term: &Term) -> Result<u64> {
        self.inner.count(term).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}

#[tokio::test]
async fn only_confirmed_documents_reach_the_record_log() {
    let server = TestServer::new().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&server, &dir.path().join("records.txt"));
    setup(&config).await;

    // 40 single creates lose every third id, 5 batches of 8 lose their first document
    for (run, bulk_size, conflicts) in [(0, None, 14), (1, Some(8), 5)] {
        config.bulk_size = bulk_size;
        config.record_log = dir.path().join(format!("records-{run}.txt"));
        let remote = Arc::new(ConflictingRemote::new(&config, server.documents().clone()));

        let report = bench::create(&config, remote.clone()).await.unwrap();
        assert_eq!(report.total, 40);
        assert_eq!(report.failed, conflicts);
        assert_eq!(report.succeeded, 40 - conflicts);
        assert_eq!(log_lines(&config.record_log), report.succeeded * FIELD_COUNT);

        // conflicting writes leave the existing documents untouched
        let taken = remote.taken.lock().unwrap().clone();
        assert_eq!(taken.len(), conflicts);
        for id in &taken {
            let document = server.documents().get("bench", id);
            assert_eq!(document, Some(json!({ "owner": "other" })));
        }

        // the first field of every logged record matches exactly one created document
        let log = std::fs::read_to_string(&config.record_log).unwrap();
        for line in log.lines().step_by(FIELD_COUNT) {
            let term = parse_line(line).unwrap();
            assert_eq!(term.field, "data0");
            assert_eq!(remote.count(&term).await.unwrap(), 1);
        }
    }
}
