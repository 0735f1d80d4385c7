use collectord::collector::{build_collector, BackfillPolicy, Collector, InvocationStrategy};
use collectord::config::generate::{generate_example_collector, generate_starter_config};
use collectord::config::types::{CollectorType, SinkConfig, SourceConfig, StateStoreType};
use collectord::config::{load_collector, load_collectors, load_config, ConfigError};
use collectord::storage::{MemoryStore, Storer};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const METRIC_COLLECTOR: &str = r#"
name: core.users.total
type: metric
invocation:
  strategy: historic_tumbling_window
schedule:
  cron: "0 * * * *"
metric:
  name: core.users.total
  type: gauge
  tags:
    env: prod
source:
  type: prometheus
  uri: http://localhost:9090
  query: sum(users_total)
  window: 1h
sinks:
  stdout:
    type: console
  archive:
    type: file
    path: /tmp/collectord/users.jsonl
"#;

const PARTITION_COLLECTOR: &str = r#"
name: events.hourly
type: partition
invocation:
  strategy: historic_tumbling_window
  backfill: sequential
schedule:
  interval: 5m
source:
  type: object
  uri: http://objects.local/events/%Y/%m/%d/%H.csv
  window: 1h
sinks:
  ingest:
    type: http
    uri: http://ingest.local/events
    timeout: 30s
"#;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn validation_errors(err: ConfigError) -> Vec<String> {
    match err {
        ConfigError::ValidationList(errors) => errors,
        other => panic!("expected validation errors, got {other}"),
    }
}

#[test]
fn test_load_metric_collector() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "users.yml", METRIC_COLLECTOR);

    let collector = load_collector(&path).expect("collector should be valid");

    assert_eq!(collector.name, "core.users.total");
    assert_eq!(collector.kind, CollectorType::Metric);
    assert_eq!(
        collector.invocation.strategy,
        InvocationStrategy::HistoricTumblingWindow
    );
    assert_eq!(collector.invocation.backfill, BackfillPolicy::Reject);
    assert_eq!(collector.schedule.cron.as_deref(), Some("0 * * * *"));
    assert_eq!(collector.source.window(), Some(Duration::from_secs(3600)));
    assert_eq!(collector.metric.as_ref().unwrap().tags["env"], "prod");

    let names: Vec<&str> = collector.sinks.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["archive", "stdout"]);
}

#[test]
fn test_load_partition_collector() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "events.yaml", PARTITION_COLLECTOR);

    let collector = load_collector(&path).expect("collector should be valid");

    assert_eq!(collector.kind, CollectorType::Partition);
    assert_eq!(collector.invocation.backfill, BackfillPolicy::Sequential);
    assert_eq!(collector.schedule.interval, Some(Duration::from_secs(300)));
    match &collector.sinks["ingest"] {
        SinkConfig::Http(http) => assert_eq!(http.timeout, Duration::from_secs(30)),
        other => panic!("expected http sink, got {other:?}"),
    }
    assert!(matches!(collector.source, SourceConfig::Object(_)));
}

#[tokio::test]
async fn test_built_collector_matches_definition() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "events.yml", PARTITION_COLLECTOR);
    let config = load_collector(&path).unwrap();

    let store: Arc<dyn Storer> = Arc::new(MemoryStore::new());
    let mut collector = build_collector(&config, store).unwrap();

    assert_eq!(collector.name(), "events.hourly");
    assert_eq!(collector.backfill_policy(), BackfillPolicy::Sequential);
    assert_eq!(collector.sourcer().source_type(), "object");
    assert_eq!(collector.sourcer().window(), Some(Duration::from_secs(3600)));
    assert_eq!(collector.sinks_mut().len(), 1);
    assert_eq!(collector.sinks_mut()[0].sink_type(), "http");
}

#[test]
fn test_load_collectors_directory() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "b_users.yml", METRIC_COLLECTOR);
    write(temp_dir.path(), "a_events.yaml", PARTITION_COLLECTOR);
    write(temp_dir.path(), "README.md", "not a collector");

    let collectors = load_collectors(temp_dir.path()).unwrap();

    let names: Vec<&str> = collectors.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["events.hourly", "core.users.total"]);
}

#[test]
fn test_duplicate_collector_names() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "one.yml", METRIC_COLLECTOR);
    write(temp_dir.path(), "two.yml", METRIC_COLLECTOR);

    let errors = validation_errors(load_collectors(temp_dir.path()).unwrap_err());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("two.yml"));
    assert!(errors[0].contains("duplicate collector name 'core.users.total'"));
}

#[test]
fn test_errors_from_every_file_are_reported() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "no_window.yml",
        &METRIC_COLLECTOR.replace("  window: 1h\n", ""),
    );
    write(
        temp_dir.path(),
        "bad_schedule.yml",
        &PARTITION_COLLECTOR.replace("  interval: 5m\n", "  interval: 5m\n  cron: \"0 * * * *\"\n"),
    );

    let errors = validation_errors(load_collectors(temp_dir.path()).unwrap_err());
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors
        .iter()
        .any(|e| e.contains("no_window.yml") && e.contains("requires source.window")));
    assert!(errors
        .iter()
        .any(|e| e.contains("bad_schedule.yml") && e.contains("only one of interval or cron")));
}

#[test]
fn test_invalid_cron_expression() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "cron.yml",
        &METRIC_COLLECTOR.replace("\"0 * * * *\"", "\"whenever\""),
    );

    let errors = validation_errors(load_collector(&path).unwrap_err());
    assert!(errors.iter().any(|e| e.contains("invalid cron expression")), "{errors:?}");
}

#[test]
fn test_partition_collector_requires_windowed_object_source() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "partition.yml",
        &PARTITION_COLLECTOR.replace("historic_tumbling_window", "tick"),
    );

    let errors = validation_errors(load_collector(&path).unwrap_err());
    assert!(errors.iter().any(|e| e.contains("partition collectors require")), "{errors:?}");
}

#[test]
fn test_incremental_strategy_is_accepted() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "incremental.yml",
        &METRIC_COLLECTOR.replace("historic_tumbling_window", "incremental"),
    );

    let collector = load_collector(&path).expect("incremental parses");
    assert_eq!(collector.invocation.strategy, InvocationStrategy::Incremental);
}

#[test]
fn test_unknown_strategy_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "sliding.yml",
        &METRIC_COLLECTOR.replace("historic_tumbling_window", "sliding_window"),
    );

    assert!(load_collector(&path).is_err());
}

#[test]
fn test_env_var_expansion() {
    std::env::set_var("COLLECTORD_TEST_PROM_URI", "http://prom.internal:9090");
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "env.yml",
        &METRIC_COLLECTOR.replace("http://localhost:9090", "$env{COLLECTORD_TEST_PROM_URI}"),
    );

    let collector = load_collector(&path).unwrap();
    match collector.source {
        SourceConfig::Prometheus(p) => assert_eq!(p.uri, "http://prom.internal:9090"),
        other => panic!("expected prometheus source, got {other:?}"),
    }
}

#[test]
fn test_unset_env_var_is_named() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "env.yml",
        &METRIC_COLLECTOR.replace("http://localhost:9090", "$env{COLLECTORD_TEST_NEVER_SET}"),
    );

    match load_collector(&path).unwrap_err() {
        ConfigError::Validation(msg) => assert!(msg.contains("COLLECTORD_TEST_NEVER_SET")),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn test_commented_env_var_does_not_block_loading() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "commented.yml",
        &format!(
            "# uri may be set from $env{{COLLECTORD_TEST_COMMENTED_OUT}}\n{}",
            METRIC_COLLECTOR
        ),
    );

    let collector = load_collector(&path).expect("comments are not checked for variables");
    assert_eq!(collector.name, "core.users.total");
}

#[test]
fn test_duckdb_store_requires_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "config.yml",
        "collectors:\n  path: /etc/collectord/collectors.d\nstate_store:\n  type: duckdb\n",
    );

    let errors = validation_errors(load_config(&path).unwrap_err());
    assert_eq!(errors, vec!["state_store: duckdb requires 'path'".to_string()]);
}

#[test]
fn test_invalid_web_listen_address() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "config.yml",
        "collectors:\n  path: /etc/collectord/collectors.d\nweb:\n  listen: localhost\n",
    );

    let errors = validation_errors(load_config(&path).unwrap_err());
    assert!(errors[0].starts_with("web.listen"));
}

#[test]
fn test_state_store_defaults_to_memory() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "config.yml",
        "collectors:\n  path: /etc/collectord/collectors.d\n",
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.state_store.store_type, StateStoreType::Memory);
    assert!(config.web.is_none());
}

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let collectors_dir = temp_dir.path().join("collectors.d");
    fs::create_dir_all(&collectors_dir).unwrap();
    write(&collectors_dir, "example.yml", &generate_example_collector());

    let config_path = write(
        temp_dir.path(),
        "config.yml",
        &generate_starter_config(&collectors_dir.display().to_string()),
    );

    let config = load_config(&config_path).expect("generated config should be valid");
    assert_eq!(config.collectors.path, collectors_dir);
    assert_eq!(config.state_store.store_type, StateStoreType::Duckdb);

    let collectors = load_collectors(&config.collectors.path).unwrap();
    assert_eq!(collectors.len(), 1);
}
