//! Integration tests for prefab-client

use async_trait::async_trait;
use base64::Engine;
use prefab_client::*;
use prefab_core::{
    ConditionalValue, Config, ConfigRow, ConfigType, ConfigValue, Context, ContextSet, Criterion,
    DumpConfigStore, LogLevel, MapEnv, Operator, PrefabError, Provided, Snapshot,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "api-key";
// base64 of "1:api-key"
const BASIC_AUTH: &str = "Basic MTphcGkta2V5";

fn no_env() -> Arc<MapEnv> {
    Arc::new(MapEnv::new())
}

fn plan_flag(id: i64) -> Config {
    Config::new(id, "pro-feature", ConfigType::FeatureFlag).with_row(ConfigRow::fallback(vec![
        ConditionalValue::new(
            vec![Criterion::new(
                Operator::PropIsOneOf,
                "user.plan",
                ConfigValue::string_list(["pro"]),
            )],
            true,
        ),
        ConditionalValue::always(false),
    ]))
}

fn api_options(server: &MockServer) -> ClientOptionsBuilder {
    ClientOptions::builder()
        .api_key(API_KEY)
        .api_url(server.uri())
        .source(Source::Api)
        .enable_streaming(false)
        .collect_evaluation_summaries(false)
        .context_upload_mode(prefab_telemetry::ContextUploadMode::None)
        .retry(RetryConfig::immediate(3))
        .env(no_env())
}

fn protobuf(snapshot: &Snapshot) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_bytes(snapshot.encode_to_vec())
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

struct StaticFetcher(Snapshot);

#[async_trait]
impl SnapshotFetcher for StaticFetcher {
    async fn fetch(&self, _offset: i64) -> Result<Snapshot> {
        Ok(self.0.clone())
    }
}

struct PendingFetcher;

#[async_trait]
impl SnapshotFetcher for PendingFetcher {
    async fn fetch(&self, _offset: i64) -> Result<Snapshot> {
        std::future::pending().await
    }
}

fn fetcher_options(timeout: Duration, policy: OnInitializationFailure) -> ClientOptions {
    ClientOptions::builder()
        .api_key(API_KEY)
        .source(Source::Api)
        .source(Source::Memory(
            [("log-level".to_string(), ConfigValue::log_level(LogLevel::Warn))].into(),
        ))
        .enable_streaming(false)
        .collect_evaluation_summaries(false)
        .context_upload_mode(prefab_telemetry::ContextUploadMode::None)
        .initialization_timeout(timeout)
        .on_initialization_failure(policy)
        .env(no_env())
        .build()
}

#[tokio::test]
async fn test_refresh_fetches_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/configs/0"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(protobuf(&Snapshot::new(vec![
            Config::constant(1, "greeting", "hello"),
            Config::constant(2, "limit", 25i64),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(api_options(&server).build()).unwrap();
    assert!(!client.is_initialized());

    let outcome = client.refresh().await.unwrap();
    assert_eq!(outcome.updated, 2);
    assert_eq!(outcome.high_watermark, 2);
    assert!(client.is_initialized());

    let ctx = ContextSet::new();
    assert_eq!(
        client.get_string_value("greeting", &ctx).unwrap().as_deref(),
        Some("hello")
    );
    assert_eq!(client.get_int_value("limit", &ctx).unwrap(), Some(25));
    assert_eq!(client.keys(), vec!["greeting", "limit"]);
}

#[tokio::test]
async fn test_fetch_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(protobuf(&Snapshot::new(vec![Config::constant(
            1, "greeting", "hello",
        )])))
        .mount(&server)
        .await;

    let client = Client::new(api_options(&server).build()).unwrap();
    assert_eq!(client.refresh().await.unwrap().updated, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_fetch_falls_back_to_next_url() {
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;
    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(protobuf(&Snapshot::new(vec![Config::constant(
            1, "greeting", "hello",
        )])))
        .mount(&healthy)
        .await;

    let options = api_options(&broken)
        .api_url(healthy.uri())
        .retry(RetryConfig::immediate(2))
        .build();
    let client = Client::new(options).unwrap();
    client.refresh().await.unwrap();

    assert_eq!(broken.received_requests().await.unwrap().len(), 2);
    assert_eq!(
        client
            .get_string_value("greeting", &ContextSet::new())
            .unwrap()
            .as_deref(),
        Some("hello")
    );
}

#[tokio::test]
async fn test_fetch_retries_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(protobuf(&Snapshot::new(vec![Config::constant(
            1, "greeting", "hello",
        )])))
        .mount(&server)
        .await;

    let client = Client::new(api_options(&server).build()).unwrap();
    assert_eq!(client.refresh().await.unwrap().updated, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_fetch_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = Client::new(api_options(&server).build()).unwrap();
    let err = client.refresh().await.unwrap_err();
    assert!(matches!(err, ClientError::RetryExhausted { attempts: 3, .. }));
    assert!(err.to_string().contains("401"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert!(!client.is_initialized());
}

#[test]
fn test_initialization_timeout_policies() {
    let options = |policy| {
        ClientOptions::builder()
            .api_key(API_KEY)
            .source(Source::Api)
            .source(Source::Memory(
                [("fallback".to_string(), ConfigValue::int(1))].into(),
            ))
            .initialization_timeout(Duration::from_millis(20))
            .on_initialization_failure(policy)
            .env(no_env())
            .build()
    };

    let strict = Client::new(options(OnInitializationFailure::ReturnError)).unwrap();
    let err = strict
        .get_int_value("fallback", &ContextSet::new())
        .unwrap_err();
    assert!(matches!(
        err.as_prefab(),
        Some(PrefabError::InitializationTimeout(_))
    ));
    assert_eq!(
        strict.get_int_value_with_default("fallback", &ContextSet::new(), 9),
        9
    );

    let relaxed = Client::new(options(OnInitializationFailure::Unlock)).unwrap();
    assert_eq!(
        relaxed.get_int_value("fallback", &ContextSet::new()).unwrap(),
        Some(1)
    );
    assert!(relaxed.is_initialized());
}

#[tokio::test]
async fn test_lookup_right_after_start() {
    let client = Client::with_fetcher(
        fetcher_options(Duration::from_secs(5), OnInitializationFailure::ReturnError),
        Arc::new(StaticFetcher(Snapshot::new(vec![Config::constant(
            1, "greeting", "hello",
        )]))),
    )
    .unwrap();
    client.start().unwrap();

    let started = std::time::Instant::now();
    assert_eq!(
        client
            .get_string_value("greeting", &ContextSet::new())
            .unwrap()
            .as_deref(),
        Some("hello")
    );
    assert!(started.elapsed() < Duration::from_secs(2));
    client.stop();
}

#[tokio::test]
async fn test_async_initialization_wait() {
    let client = Client::with_fetcher(
        fetcher_options(Duration::from_secs(5), OnInitializationFailure::ReturnError),
        Arc::new(StaticFetcher(Snapshot::new(vec![Config::constant(
            1, "greeting", "hello",
        )]))),
    )
    .unwrap();
    client.start().unwrap();
    client.initialized().await.unwrap();
    assert!(client.is_initialized());

    let stuck = Client::with_fetcher(
        fetcher_options(Duration::from_millis(50), OnInitializationFailure::ReturnError),
        Arc::new(PendingFetcher),
    )
    .unwrap();
    stuck.start().unwrap();
    let err = stuck.initialized().await.unwrap_err();
    assert!(matches!(
        err.as_prefab(),
        Some(PrefabError::InitializationTimeout(_))
    ));
}

#[test]
fn test_log_level_waits_for_initialization_once() {
    let timeout = Duration::from_millis(200);

    let strict = Client::with_fetcher(
        fetcher_options(timeout, OnInitializationFailure::ReturnError),
        Arc::new(PendingFetcher),
    )
    .unwrap();
    let started = std::time::Instant::now();
    assert_eq!(strict.get_log_level("a.b.c"), None);
    assert!(started.elapsed() < timeout * 2);

    let relaxed = Client::with_fetcher(
        fetcher_options(timeout, OnInitializationFailure::Unlock),
        Arc::new(PendingFetcher),
    )
    .unwrap();
    let started = std::time::Instant::now();
    assert_eq!(relaxed.get_log_level("a.b.c"), Some(LogLevel::Warn));
    assert!(started.elapsed() < timeout * 2);
}

#[tokio::test]
async fn test_context_layering() {
    let options = ClientOptions::builder()
        .api_key(API_KEY)
        .source(Source::Api)
        .global_context(ContextSet::new().with_context(Context::new("user").with("plan", "pro")))
        .collect_evaluation_summaries(false)
        .context_upload_mode(prefab_telemetry::ContextUploadMode::None)
        .env(no_env())
        .build();
    let client = Client::with_fetcher(
        options,
        Arc::new(StaticFetcher(Snapshot::new(vec![plan_flag(1)]))),
    )
    .unwrap();
    client.refresh().await.unwrap();

    let free = ContextSet::new().with_context(Context::new("user").with("plan", "free"));

    assert!(client.feature_is_on("pro-feature"));
    assert!(!client.feature_is_on_for("pro-feature", &free));

    let bound = client.with_context(free.clone());
    assert!(!bound.feature_is_on("pro-feature"));
    let upgraded = ContextSet::new().with_context(Context::new("user").with("plan", "pro"));
    assert!(bound.feature_is_on_for("pro-feature", &upgraded));

    let found = client.get_config_match("pro-feature", &free).unwrap();
    assert_eq!(found.conditional_value_index, Some(1));
}

#[test]
fn test_local_files_and_overrides() {
    let config_dir = tempfile::tempdir().unwrap();
    let override_dir = tempfile::tempdir().unwrap();

    std::fs::write(
        config_dir.path().join(DEFAULT_CONFIG_FILE),
        r#"
greeting: hello
limit: 10
log-level:
  _: warn
  app:
    db: debug
beta:
  feature_flag: true
  value: true
"#,
    )
    .unwrap();
    std::fs::write(
        config_dir.path().join(environment_config_file("staging")),
        "limit: 20\n",
    )
    .unwrap();
    std::fs::write(
        override_dir.path().join(DEFAULT_CONFIG_FILE),
        "greeting: overridden\n",
    )
    .unwrap();

    let client = Client::new(
        ClientOptions::builder()
            .config_directory(config_dir.path())
            .config_override_directory(override_dir.path())
            .environment_name("staging")
            .env(no_env())
            .build(),
    )
    .unwrap();
    let ctx = ContextSet::new();

    assert_eq!(
        client.get_string_value("greeting", &ctx).unwrap().as_deref(),
        Some("overridden")
    );
    assert_eq!(client.get_int_value("limit", &ctx).unwrap(), Some(20));
    assert!(client.feature_is_on("beta"));
    assert_eq!(client.get_log_level("app.db.pool"), Some(LogLevel::Debug));
    assert_eq!(client.get_log_level("web"), Some(LogLevel::Warn));
}

#[test]
fn test_datafile_and_provided_values() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("configs.pb");
    let database = Config::constant(
        1,
        "database.url",
        ConfigValue::provided(Provided::env_var("DATABASE_URL")),
    );
    std::fs::write(&dump, DumpConfigStore::encode([&database])).unwrap();

    let client = Client::new(
        ClientOptions::builder()
            .source(Source::Datafile {
                path: dump,
                project_env_id: 5,
            })
            .env(Arc::new(
                MapEnv::new().with_var("DATABASE_URL", "postgres://localhost/app"),
            ))
            .build(),
    )
    .unwrap();

    assert_eq!(
        client
            .get_string_value("database.url", &ContextSet::new())
            .unwrap()
            .as_deref(),
        Some("postgres://localhost/app")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_fetches_then_streams() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/configs/0"))
        .respond_with(protobuf(&Snapshot::new(vec![Config::constant(
            1, "greeting", "hello",
        )])))
        .mount(&server)
        .await;

    let update = base64::engine::general_purpose::STANDARD.encode(
        Snapshot::new(vec![Config::constant(2, "greeting", "streamed")]).encode_to_vec(),
    );
    Mock::given(method("GET"))
        .and(path("/api/v1/sse/config"))
        .and(header(START_AT_ID_HEADER, "1"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(format!("data: \n\ndata: {update}\n\n")),
        )
        .mount(&server)
        .await;

    let client = Client::new(
        api_options(&server)
            .enable_streaming(true)
            .stream_reconnect_delay(Duration::from_millis(50))
            .build(),
    )
    .unwrap();
    client.start().unwrap();

    wait_for(|| client.is_initialized()).await;
    wait_for(|| {
        client
            .get_string_value("greeting", &ContextSet::new())
            .ok()
            .flatten()
            .as_deref()
            == Some("streamed")
    })
    .await;

    client.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_submits_telemetry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/configs/0"))
        .respond_with(protobuf(&Snapshot::new(vec![Config::constant(
            1, "greeting", "hello",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/telemetry"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = Client::new(
        api_options(&server)
            .telemetry_host(server.uri())
            .collect_evaluation_summaries(true)
            .telemetry_sync_interval(Duration::from_millis(50))
            .build(),
    )
    .unwrap();
    assert!(client.telemetry().is_some());
    client.start().unwrap();

    wait_for(|| client.is_initialized()).await;
    client
        .get_string_value("greeting", &ContextSet::new())
        .unwrap();

    for _ in 0..100 {
        let requests = server.received_requests().await.unwrap();
        if requests.iter().any(|r| r.url.path() == "/api/v1/telemetry") {
            client.stop();
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("telemetry was never submitted");
}
