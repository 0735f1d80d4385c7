/// Default location of collector definitions, relative to the user config.
pub const DEFAULT_COLLECTORS_PATH: &str = "~/.config/collectord/collectors.d";

pub fn generate_starter_config(collectors_path: &str) -> String {
    STARTER_CONFIG.replace("{collectors_path}", collectors_path)
}

const STARTER_CONFIG: &str = r#"# =============================================================================
# COLLECTORD CONFIGURATION
# =============================================================================
# Daemon-level settings. Each collector lives in its own file inside the
# collectors directory below.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/collectord/config.yml
#   3. /etc/collectord/config.yml
#
# Any value may reference an environment variable by writing $env followed
# by the variable name in braces. Loading fails if a referenced variable is
# not set.

# =============================================================================
# COLLECTORS
# =============================================================================
# Directory holding one collector definition per *.yml / *.yaml file.
# Validate a single file with: collectord config validate --collector <file>
# Run a single invocation with: collectord config invoke --collector <file>

collectors:
  path: {collectors_path}

# =============================================================================
# STATE STORE
# =============================================================================
# Where windowed collectors keep their watermark (the end of the last window
# delivered to every sink).
#
#   memory   watermarks are lost on restart; the first run after a restart
#            collects only the most recent complete window
#   duckdb   watermarks survive restarts

state_store:
  type: duckdb
  path: ~/.local/share/collectord/state.duckdb

# =============================================================================
# WEB (optional)
# =============================================================================
# Serves /health, /metrics (Prometheus text) and
# /collectors/<name>/invocation. Remove the section to disable.

web:
  listen: 127.0.0.1:9464
"#;

/// A commented example collector definition.
pub fn generate_example_collector() -> String {
    r#"# A collector pulls from one source, optionally enriches the records, and
# writes every record to every sink.
name: core.users.total

# metric     records are metrics stamped with the 'metric' section below
# partition  one raw object per window; requires historic_tumbling_window
type: metric

invocation:
  # tick                      collect current state on every firing
  # historic_tumbling_window  collect each elapsed window exactly once
  strategy: tick
  # Windowed only. What to do when more than one window is pending:
  #   reject      fail the run and leave the watermark alone (default)
  #   sequential  deliver the pending windows one by one, oldest first
  backfill: reject

# Exactly one of interval / cron.
schedule:
  interval: 5m
  # cron: "0 * * * *"

metric:
  name: core.users.total
  type: gauge
  tags:
    env: prod

source:
  type: prometheus
  uri: http://localhost:9090
  query: sum(up)
  # window: 1h        # required for historic_tumbling_window
  # start_of: 1h      # tick only: evaluate at "now" truncated to this

# Sinks are written in name order.
sinks:
  stdout:
    type: console
  # archive:
  #   type: file
  #   path: ~/.local/share/collectord/users.jsonl
  # ingest:
  #   type: http
  #   uri: http://localhost:8080/metrics
  #   timeout: 10s
"#
    .to_string()
}
