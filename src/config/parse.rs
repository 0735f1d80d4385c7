use super::types::*;
use crate::collector::{BackfillPolicy, InvocationStrategy, Schedule};
use crate::config::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use crate::service::trigger;
use crate::source::object::is_valid_template;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Loads and validates the daemon config.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut config: Config = read_yaml(path)?;

    config.collectors.path = expand_tilde(&config.collectors.path);
    if let Some(store_path) = config.state_store.path.as_mut() {
        *store_path = expand_tilde(store_path);
    }

    validate_config(&config)?;
    Ok(config)
}

/// Loads and validates one collector definition.
pub fn load_collector(path: &Path) -> Result<CollectorConfig, ConfigError> {
    let mut collector: CollectorConfig = read_yaml(path)?;
    expand_collector_paths(&mut collector);

    let mut errors = Vec::new();
    validate_collector(&collector, &mut errors);
    if errors.is_empty() {
        Ok(collector)
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

/// Loads every `*.yml` / `*.yaml` file in `dir`, in file name order.
///
/// Problems in all files are collected and reported together; collector
/// names must be unique across the directory.
pub fn load_collectors(dir: &Path) -> Result<Vec<CollectorConfig>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read collectors directory '{}': {}", dir.display(), e),
        ))
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut collectors = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    for path in &paths {
        match load_collector(path) {
            Ok(collector) => {
                if !names.insert(collector.name.clone()) {
                    errors.push(format!(
                        "{}: duplicate collector name '{}'",
                        path.display(),
                        collector.name
                    ));
                }
                collectors.push(collector);
            }
            Err(ConfigError::ValidationList(list)) => {
                errors.extend(list.into_iter().map(|e| format!("{}: {}", path.display(), e)));
            }
            Err(e) => errors.push(format!("{}: {}", path.display(), e)),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::ValidationList(errors));
    }
    if collectors.is_empty() {
        warn!(path = %dir.display(), "No collector definitions found");
    }
    Ok(collectors)
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    // Expand environment variables in the YAML string before parsing
    let yaml_string = expand_env_vars(&yaml_string)?;
    check_unexpanded_vars(&yaml_string)?;

    serde_yaml::from_str(&yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        ))
    })
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let unexpanded_vars = unexpanded_env_vars(yaml_string)?;

    let error_msg = match unexpanded_vars.as_slice() {
        [] => return Ok(()),
        [var] => format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            var
        ),
        vars => format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            vars.join(", ")
        ),
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_collector_paths(collector: &mut CollectorConfig) {
    for sink in collector.sinks.values_mut() {
        if let SinkConfig::File(file) = sink {
            file.path = expand_tilde(&file.path);
        }
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.collectors.path.as_os_str().is_empty() {
        errors.push("collectors.path cannot be empty".to_string());
    }

    if config.state_store.store_type == StateStoreType::Duckdb
        && config.state_store.path.is_none()
    {
        errors.push("state_store: duckdb requires 'path'".to_string());
    }

    if let Some(web) = &config.web {
        if web.listen.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "web.listen: '{}' is not a socket address (e.g. 127.0.0.1:9464)",
                web.listen
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

/// Appends every problem with `collector` to `errors`.
pub fn validate_collector(collector: &CollectorConfig, errors: &mut Vec<String>) {
    let prefix = if collector.name.trim().is_empty() {
        errors.push("collector name cannot be empty".to_string());
        "collector".to_string()
    } else {
        format!("collector '{}'", collector.name)
    };

    validate_schedule(&prefix, &collector.schedule, errors);

    let strategy = collector.invocation.strategy;
    match strategy {
        InvocationStrategy::Incremental => {
            warn!(
                collector = %collector.name,
                "The incremental strategy is not supported; every invocation will fail"
            );
        }
        InvocationStrategy::HistoricTumblingWindow => match collector.source.window() {
            None => errors.push(format!(
                "{}: strategy {} requires source.window",
                prefix, strategy
            )),
            Some(d) if d.is_zero() => {
                errors.push(format!("{}: source.window must be non-zero", prefix))
            }
            Some(_) => {}
        },
        InvocationStrategy::Tick => {
            if collector.invocation.backfill == BackfillPolicy::Sequential {
                warn!(
                    collector = %collector.name,
                    "invocation.backfill has no effect on tick collectors"
                );
            }
        }
    }

    match collector.kind {
        CollectorType::Metric => {
            match &collector.metric {
                None => errors.push(format!(
                    "{}: metric collectors require a 'metric' section",
                    prefix
                )),
                Some(metric) if metric.name.trim().is_empty() => {
                    errors.push(format!("{}: metric.name cannot be empty", prefix))
                }
                Some(_) => {}
            }
            if !matches!(collector.source, SourceConfig::Prometheus(_)) {
                errors.push(format!(
                    "{}: metric collectors require a metric-producing source, got {}",
                    prefix,
                    collector.source.source_type()
                ));
            }
        }
        CollectorType::Partition => {
            if strategy != InvocationStrategy::HistoricTumblingWindow {
                errors.push(format!(
                    "{}: partition collectors require the {} strategy",
                    prefix,
                    InvocationStrategy::HistoricTumblingWindow
                ));
            }
            if !matches!(collector.source, SourceConfig::Object(_)) {
                errors.push(format!(
                    "{}: partition collectors require an object source, got {}",
                    prefix,
                    collector.source.source_type()
                ));
            }
        }
    }

    validate_source(&prefix, &collector.source, errors);

    if collector.sinks.is_empty() {
        warn!(collector = %collector.name, "No sinks configured; records will be dropped");
    }
    for (name, sink) in &collector.sinks {
        validate_sink(&format!("{}, sink '{}'", prefix, name), sink, errors);
    }
}

fn validate_schedule(prefix: &str, schedule: &ScheduleConfig, errors: &mut Vec<String>) {
    match Schedule::try_from(schedule) {
        Ok(schedule) => {
            if let Err(e) = trigger::validate(&schedule) {
                errors.push(format!("{}: schedule: {}", prefix, e));
            }
        }
        Err(reason) => errors.push(format!("{}: {}", prefix, reason)),
    }
}

fn validate_source(prefix: &str, source: &SourceConfig, errors: &mut Vec<String>) {
    match source {
        SourceConfig::Prometheus(c) => {
            if c.uri.trim().is_empty() {
                errors.push(format!("{}: source.uri cannot be empty", prefix));
            }
            if c.query.trim().is_empty() {
                errors.push(format!("{}: source.query cannot be empty", prefix));
            }
            if matches!(c.start_of, Some(d) if d.is_zero()) {
                errors.push(format!("{}: source.start_of must be non-zero", prefix));
            }
        }
        SourceConfig::Object(c) => {
            if c.uri.trim().is_empty() {
                errors.push(format!("{}: source.uri cannot be empty", prefix));
            } else if !is_valid_template(&c.uri) {
                errors.push(format!(
                    "{}: source.uri has an invalid strftime placeholder: {}",
                    prefix, c.uri
                ));
            }
        }
    }
}

fn validate_sink(prefix: &str, sink: &SinkConfig, errors: &mut Vec<String>) {
    match sink {
        SinkConfig::Console => {}
        SinkConfig::File(c) => {
            if c.path.as_os_str().is_empty() {
                errors.push(format!("{}: path cannot be empty", prefix));
            }
        }
        SinkConfig::Http(c) => {
            if c.uri.trim().is_empty() {
                errors.push(format!("{}: uri cannot be empty", prefix));
            }
        }
    }
}
