//! Structured logging for the dashboard client.
//!
//! Every record is one JSON line: timestamp, run id, sequence number, level,
//! component and event, with domain fields nested under `data`. Records go to
//! stdout and, when `LOG_DIR` is set, to `<LOG_DIR>/<run_id>/events.jsonl`.
//!
//! Logging never feeds back into control decisions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_LEVEL").ok().as_deref())
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("trace") => Level::Trace,
            Some("debug") => Level::Debug,
            Some("info") => Level::Info,
            Some("warn") => Level::Warn,
            Some("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Fetch,  // preview/files/predict bundle loads
    Probe,  // version-skew diagnosis
    Poll,   // health polling sessions
    Panel,  // controller view transitions
    System, // startup, reload, shutdown
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fetch => "fetch",
            Domain::Probe => "probe",
            Domain::Poll => "poll",
            Domain::Panel => "panel",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled_in(std::env::var("LOG_DOMAINS").ok().as_deref())
    }

    fn enabled_in(&self, filter: Option<&str>) -> bool {
        match filter {
            None | Some("all") => true,
            Some(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let events = match std::env::var("LOG_DIR") {
            Ok(base) => match open_events_file(Path::new(&base), &run_id) {
                Ok(file) => Some(Mutex::new(BufWriter::new(file))),
                Err(err) => {
                    eprintln!("[log] failed to open events log: {}", err);
                    None
                }
            },
            Err(_) => None,
        };
        RunContext { run_id, events }
    })
}

/// Create `<base>/<run_id>/events.jsonl` for appending.
pub fn open_events_file(base: &Path, run_id: &str) -> io::Result<File> {
    let mut run_dir = PathBuf::from(base);
    run_dir.push(run_id);
    create_dir_all(&run_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(run_dir.join("events.jsonl"))
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["authorization", "Authorization", "cookie", "Cookie", "api_key"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["vertical", "session", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let ctx = ensure_run_context();
    let line = render_record(&ctx.run_id, level, domain.as_str(), event, fields);
    if let Some(events) = &ctx.events {
        write_line(events, &line);
    }
    println!("{}", line);
}

fn render_record(
    run_id: &str,
    level: Level,
    component: &str,
    event: &str,
    fields: Map<String, Value>,
) -> String {
    let fields = sanitize_fields(fields);
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry).to_string()
}

// =============================================================================
// Domain helpers
// =============================================================================

/// Bundle load finished for a vertical.
pub fn log_fetch_outcome(vertical: &str, ok: bool, detail: &str, elapsed_ms: u64) {
    log(
        if ok { Level::Info } else { Level::Warn },
        Domain::Fetch,
        if ok { "bundle_loaded" } else { "bundle_failed" },
        obj(&[
            ("vertical", v_str(vertical)),
            ("msg", v_str(detail)),
            ("elapsed_ms", json!(elapsed_ms)),
        ]),
    );
}

/// One health poll tick.
pub fn log_health_tick(session: u64, tick: u64, status: &str, next_delay_ms: Option<u64>) {
    log(
        Level::Debug,
        Domain::Poll,
        "health_tick",
        obj(&[
            ("session", json!(session)),
            ("tick", json!(tick)),
            ("status", v_str(status)),
            ("next_delay_ms", next_delay_ms.map(|d| json!(d)).unwrap_or(Value::Null)),
        ]),
    );
}

/// Polling session state change.
pub fn log_session_transition(session: u64, vertical: &str, from: &str, to: &str) {
    log(
        Level::Info,
        Domain::Poll,
        "session_transition",
        obj(&[
            ("session", json!(session)),
            ("vertical", v_str(vertical)),
            ("from", v_str(from)),
            ("to", v_str(to)),
        ]),
    );
}

/// Panel view-state change.
pub fn log_view_transition(vertical: &str, generation: u64, to: &str) {
    log(
        Level::Info,
        Domain::Panel,
        "view_transition",
        obj(&[
            ("vertical", v_str(vertical)),
            ("generation", json!(generation)),
            ("to", v_str(to)),
        ]),
    );
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}
