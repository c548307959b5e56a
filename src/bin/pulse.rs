//! Pulse CLI - Command-line interface for Synheart Pulse
//!
//! Commands:
//! - replay: Replay a recorded sensor stream through the monitor
//! - validate: Validate sensor event schema and ordering
//! - synth: Generate a synthetic sensor stream
//! - zones: Show heart-rate zones for an age
//! - history: List, summarize or delete stored sessions
//! - doctor: Diagnose configuration and storage
//! - schema: Print schema information

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use synheart_pulse::schema::{SensorEvent, SensorEventAdapter, SCHEMA_VERSION};
use synheart_pulse::storage::{
    format_duration, HistorySummary, JsonFileSessionStore, MemorySessionStore, SessionStore,
    StorageError,
};
use synheart_pulse::{
    MonitorConfig, PulseError, PulseMonitor, SessionSnapshot, SnapshotObserver, SyntheticSession,
    ZoneTable, PRODUCER_NAME, PULSE_VERSION,
};

const DEFAULT_STORE: &str = "pulse_sessions.json";

/// Pulse - On-device heart monitor core for optical PPG sensors
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author = "Synheart AI Inc")]
#[command(version = PULSE_VERSION)]
#[command(about = "Detect pulses, BPM statistics and heart-rate zones from PPG streams", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded sensor stream through the monitor
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Monitor config file (TOML, or JSON with a .json extension)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Persist finished sessions to this JSON file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Wall-clock time of t_ms = 0 (RFC 3339); defaults to now
        #[arg(long)]
        origin: Option<String>,

        /// Print every published snapshot as NDJSON
        #[arg(long)]
        snapshots: bool,

        /// Output the replay report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate sensor event schema and ordering
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a synthetic sensor stream (NDJSON)
    Synth {
        /// Simulated heart rate
        #[arg(long, default_value = "72")]
        bpm: u32,

        /// Session length in seconds
        #[arg(long, default_value = "30")]
        duration_secs: u64,

        /// Age entered before the session starts
        #[arg(long)]
        age: Option<u32>,

        /// Lift the finger between these seconds, e.g. 10-12
        #[arg(long)]
        finger_lift: Option<String>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Show heart-rate zones for an age
    Zones {
        /// Age in years (all brackets when omitted)
        #[arg(long)]
        age: Option<u32>,

        /// Classify this BPM instead of printing the table
        #[arg(long, requires = "age")]
        bpm: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect stored sessions
    History {
        /// Session file
        #[arg(long, default_value = DEFAULT_STORE)]
        store: PathBuf,

        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Diagnose configuration and storage
    Doctor {
        /// Config file to check (defaults to the normal search order)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session file to check
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List sessions, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Aggregate over all sessions
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Delete one session
    Delete {
        /// Session id (UUID)
        id: String,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            config,
            store,
            origin,
            snapshots,
            json,
        } => cmd_replay(
            &input,
            input_format,
            config.as_deref(),
            store.as_deref(),
            origin.as_deref(),
            snapshots,
            json,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Synth {
            bpm,
            duration_secs,
            age,
            finger_lift,
            output,
        } => cmd_synth(bpm, duration_secs, age, finger_lift.as_deref(), &output),

        Commands::Zones { age, bpm, json } => cmd_zones(age, bpm, json),

        Commands::History { store, action } => cmd_history(&store, action),

        Commands::Doctor {
            config,
            store,
            json,
        } => cmd_doctor(config.as_deref(), store.as_deref(), json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_events(input: &Path, input_format: InputFormat) -> Result<Vec<SensorEvent>, PulseCliError> {
    let input_data = read_input(input)?;
    let events = match input_format {
        InputFormat::Ndjson => SensorEventAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => SensorEventAdapter::parse_array(&input_data)?,
    };
    if events.is_empty() {
        return Err(PulseCliError::NoEvents);
    }
    Ok(events)
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig, PulseCliError> {
    match path {
        Some(path) => Ok(MonitorConfig::load_from_file(path)?),
        None => Ok(MonitorConfig::load()),
    }
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    store: Option<&Path>,
    origin: Option<&str>,
    snapshots: bool,
    json: bool,
) -> Result<(), PulseCliError> {
    let events = read_events(input, input_format)?;
    let config = load_config(config)?;

    let origin = match origin {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| PulseCliError::InvalidArgument(format!("--origin: {}", e)))?,
        None => Utc::now(),
    };

    let session_store: Box<dyn SessionStore> = match store {
        Some(path) => Box::new(JsonFileSessionStore::new(path)),
        None => Box::new(MemorySessionStore::new()),
    };
    let mut monitor = PulseMonitor::new(config, session_store);

    if snapshots {
        monitor.subscribe(Box::new(NdjsonSnapshotWriter::new(io::stdout())));
    }

    let report = SensorEventAdapter::replay(&mut monitor, &events, origin)?;

    let mut stdout = io::stdout();

    if json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
    } else if !snapshots {
        println!("Replay Report");
        println!("=============");
        println!("Events:        {}", report.events);
        println!("Optical:       {}", report.ppg_samples);
        println!("BPM readings:  {}", report.bpm_readings);
        println!("Pulses:        {} ({} haptic)", report.pulses, report.haptics);

        if !report.stops.is_empty() {
            println!("\nSessions:");
            for stop in &report.stops {
                let status = match (&stop.record, &stop.error) {
                    (Some(record), None) => format!(
                        "saved (avg {}, min {}, max {})",
                        record.avg_bpm, record.min_bpm, record.max_bpm
                    ),
                    (Some(_), Some(error)) => format!("save failed: {}", error),
                    (None, _) => "not recorded".to_string(),
                };
                println!(
                    "  - stopped at {} ms after {}: {}",
                    stop.t_ms,
                    format_duration(stop.duration_secs),
                    status
                );
            }
        }

        if !report.rejected.is_empty() {
            println!("\nRejected commands:");
            for rejected in &report.rejected {
                println!("  - {:?} at {} ms: {}", rejected.action, rejected.t_ms, rejected.reason);
            }
        }

        println!("\nFinal phase:   {}", report.final_snapshot.phase);
    }
    stdout.flush()?;

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), PulseCliError> {
    let input_data = read_input(input)?;
    let events = match input_format {
        InputFormat::Ndjson => SensorEventAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => SensorEventAdapter::parse_array(&input_data)?,
    };

    let results = SensorEventAdapter::validate_events(&events);
    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                t_ms: events[r.index].t_ms,
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - index {} (t_ms {}): {}", err.index, err.t_ms, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(PulseCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn parse_finger_lift(text: &str) -> Result<(u64, u64), PulseCliError> {
    let invalid = || PulseCliError::InvalidArgument(format!("--finger-lift expects FROM-TO seconds, got '{}'", text));
    let (from, to) = text.split_once('-').ok_or_else(invalid)?;
    let from: u64 = from.trim().parse().map_err(|_| invalid())?;
    let to: u64 = to.trim().parse().map_err(|_| invalid())?;
    if to <= from {
        return Err(invalid());
    }
    Ok((secs_to_ms(from, "--finger-lift")?, secs_to_ms(to, "--finger-lift")?))
}

fn secs_to_ms(secs: u64, flag: &str) -> Result<u64, PulseCliError> {
    secs.checked_mul(1000)
        .ok_or_else(|| PulseCliError::InvalidArgument(format!("{} is too large: {} s", flag, secs)))
}

fn cmd_synth(
    bpm: u32,
    duration_secs: u64,
    age: Option<u32>,
    finger_lift: Option<&str>,
    output: &Path,
) -> Result<(), PulseCliError> {
    if bpm == 0 {
        return Err(PulseCliError::InvalidArgument("--bpm must be > 0".to_string()));
    }

    let mut session = SyntheticSession::new(bpm, secs_to_ms(duration_secs, "--duration-secs")?);
    if let Some(age) = age {
        session = session.with_age(age);
    }
    if let Some(text) = finger_lift {
        let (from, to) = parse_finger_lift(text)?;
        session = session.with_finger_lift(from, to);
    }

    let ndjson = SensorEventAdapter::to_ndjson(&session.events())?;
    if output.to_string_lossy() == "-" {
        print!("{}", ndjson);
    } else {
        fs::write(output, ndjson)?;
    }
    Ok(())
}

fn cmd_zones(age: Option<u32>, bpm: Option<u32>, json: bool) -> Result<(), PulseCliError> {
    if let (Some(age), Some(bpm)) = (age, bpm) {
        let zone = ZoneTable::classify(age, bpm);
        if json {
            println!("{}", serde_json::to_string_pretty(&zone)?);
        } else {
            match zone {
                Some(zone) => println!("{} ({})", zone.name, zone.color.to_hex()),
                None => println!("No zone for age {} at {} bpm", age, bpm),
            }
        }
        return Ok(());
    }

    let brackets: Vec<_> = match age {
        Some(age) => {
            let bracket = ZoneTable::bracket_for(age).ok_or_else(|| {
                PulseCliError::InvalidArgument(format!("No zone table for age {}", age))
            })?;
            vec![bracket]
        }
        None => ZoneTable::brackets().iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&brackets)?);
        return Ok(());
    }

    for bracket in brackets {
        println!("Ages {}-{}", bracket.ages.start(), bracket.ages.end());
        for band in &bracket.bands {
            println!(
                "  {:<9} {:>3}-{:<3} bpm  {}",
                band.name.as_str(),
                band.bpm.start(),
                band.bpm.end(),
                band.color.to_hex()
            );
        }
    }
    Ok(())
}

fn cmd_history(store_path: &Path, action: HistoryAction) -> Result<(), PulseCliError> {
    let mut store = JsonFileSessionStore::new(store_path);

    match action {
        HistoryAction::List { json } => {
            let sessions = store.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("No sessions recorded");
            } else {
                for s in &sessions {
                    println!(
                        "{}  {:>6}  avg {:>3}  ({}-{})  {}",
                        s.started_at.format("%Y-%m-%d %H:%M"),
                        format_duration(s.duration_secs),
                        s.avg_bpm,
                        s.min_bpm,
                        s.max_bpm,
                        s.id
                    );
                }
            }
        }
        HistoryAction::Summary { json } => {
            let summary = HistorySummary::from_sessions(&store.list()?);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                let total = u32::try_from(summary.total_duration_secs).unwrap_or(u32::MAX);
                let show = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
                println!("Sessions:       {}", summary.sessions);
                println!("Total time:     {}", format_duration(total));
                println!("Average BPM:    {}", show(summary.weighted_avg_bpm));
                println!("Lowest BPM:     {}", show(summary.lowest_bpm));
                println!("Highest BPM:    {}", show(summary.highest_bpm));
            }
        }
        HistoryAction::Delete { id } => {
            let uuid = Uuid::parse_str(&id)
                .map_err(|e| PulseCliError::InvalidArgument(format!("Invalid session id: {}", e)))?;
            if !store.delete(uuid)? {
                return Err(PulseCliError::NotFound(id));
            }
            println!("Deleted session {}", id);
        }
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, store: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    // Config: an explicit path must load; otherwise report what the search order finds
    let config_check = match config {
        Some(path) => match MonitorConfig::load_from_file(path) {
            Ok(c) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} valid (calibration {} ms, warm-up {} ms, age {})",
                    path.display(),
                    c.calibration_ms,
                    c.warmup_ms,
                    c.user_age
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
        None => {
            let c = MonitorConfig::load();
            let status = if c == MonitorConfig::default() {
                CheckStatus::Warning
            } else {
                CheckStatus::Ok
            };
            DoctorCheck {
                name: "config".to_string(),
                status,
                message: format!(
                    "Effective config: calibration {} ms, warm-up {} ms, age {}",
                    c.calibration_ms, c.warmup_ms, c.user_age
                ),
            }
        }
    };
    checks.push(config_check);

    if let Some(store_path) = store {
        let check = if store_path.exists() {
            match JsonFileSessionStore::new(store_path).list() {
                Ok(sessions) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Session file valid ({} sessions)", sessions.len()),
                },
                Err(e) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            }
        } else {
            DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Session file does not exist yet".to_string(),
            }
        };
        checks.push(check);
    }

    // Check stdin is available (for piped replay)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay -i - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(json_schema: bool) -> Result<(), PulseCliError> {
    if json_schema {
        println!("{}", serde_json::to_string_pretty(&input_json_schema())?);
        return Ok(());
    }

    println!("Input Schema: {}", SCHEMA_VERSION);
    println!();
    println!("One record per host callback, with a monotonic t_ms timestamp:");
    println!();
    println!("1. ppg      - raw optical level        {{\"ppg\": {{\"value\": 151234.5}}}}");
    println!("2. bpm      - discrete BPM reading     {{\"bpm\": {{\"value\": 72}}}}");
    println!("3. tick     - timer tick               {{\"tick\": {{}}}}");
    println!("4. command  - start | stop | reset     {{\"command\": {{\"action\": \"start\"}}}}");
    println!("5. age      - years or entered text    {{\"age\": {{\"value\": 35}}}}");
    println!("6. sensors  - availability             {{\"sensors\": {{\"optical\": true, \"bpm\": true}}}}");
    println!();
    println!("Optical values below the finger threshold reset acquisition; non-positive");
    println!("BPM readings are ignored. Timestamps must never decrease.");
    Ok(())
}

fn input_json_schema() -> serde_json::Value {
    let payload = |key: &str, body: serde_json::Value| {
        serde_json::json!({
            "type": "object",
            "required": [key],
            "properties": { key: body }
        })
    };

    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": "https://synheart.ai/schemas/pulse.sensor_event.v1.json",
        "title": SCHEMA_VERSION,
        "type": "object",
        "required": ["schema_version", "t_ms", "record_type", "payload"],
        "properties": {
            "schema_version": { "const": SCHEMA_VERSION },
            "t_ms": { "type": "integer", "minimum": 0 },
            "record_type": {
                "enum": ["ppg", "bpm", "tick", "command", "age", "sensors"]
            },
            "payload": {
                "oneOf": [
                    payload("ppg", serde_json::json!({
                        "type": "object", "required": ["value"],
                        "properties": { "value": { "type": "number" } }
                    })),
                    payload("bpm", serde_json::json!({
                        "type": "object", "required": ["value"],
                        "properties": { "value": { "type": "integer" } }
                    })),
                    payload("tick", serde_json::json!({ "type": "object" })),
                    payload("command", serde_json::json!({
                        "type": "object", "required": ["action"],
                        "properties": { "action": { "enum": ["start", "stop", "reset"] } }
                    })),
                    payload("age", serde_json::json!({
                        "type": "object", "required": ["value"],
                        "properties": { "value": { "type": ["integer", "string"] } }
                    })),
                    payload("sensors", serde_json::json!({
                        "type": "object", "required": ["optical", "bpm"],
                        "properties": {
                            "optical": { "type": "boolean" },
                            "bpm": { "type": "boolean" }
                        }
                    }))
                ]
            },
            "source": {
                "type": "object",
                "properties": {
                    "device_model": { "type": "string" },
                    "sensor_name": { "type": "string" }
                }
            }
        }
    })
}

/// Observer that streams each published snapshot as one NDJSON line
struct NdjsonSnapshotWriter<W> {
    out: Mutex<W>,
}

impl<W: Write> NdjsonSnapshotWriter<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> SnapshotObserver for NdjsonSnapshotWriter<W> {
    fn publish(&self, snapshot: Arc<SessionSnapshot>) {
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let written = serde_json::to_writer(&mut *out, &*snapshot)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(out));
        if let Err(e) = written {
            tracing::warn!(error = %e, "Failed to write snapshot");
        }
    }
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Pulse(PulseError),
    Json(serde_json::Error),
    Storage(StorageError),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
    NotFound(String),
    InvalidArgument(String),
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<PulseError> for PulseCliError {
    fn from(e: PulseError) -> Self {
        PulseCliError::Pulse(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

impl From<StorageError> for PulseCliError {
    fn from(e: StorageError) -> Self {
        PulseCliError::Storage(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Pulse(PulseError::ConfigError(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'pulse doctor --config <file>' for details".to_string()),
            },
            PulseCliError::Pulse(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::Storage(e) => CliError {
                code: "STORAGE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the session file path or remove a corrupt file".to_string()),
            },
            PulseCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PulseCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PulseCliError::NotFound(id) => CliError {
                code: "NOT_FOUND".to_string(),
                message: format!("No session with id {}", id),
                hint: Some("Run 'pulse history list' to see stored ids".to_string()),
            },
            PulseCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: None,
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    t_ms: u64,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
