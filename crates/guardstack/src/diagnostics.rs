//! Diagnostic dumps for guarded stacks
//!
//! Every error detected by a stack operation is rendered here and written to
//! one process-wide sink. The sink starts out as stderr, or whatever the
//! `GUARDSTACK_DUMP` environment variable asks for:
//!
//! - Unset or empty → human-readable to stderr
//! - `0` → dumps disabled
//! - `1` → human-readable to stderr
//! - `json` → JSON to stderr
//! - `json:/path` → JSON to file
//! - `file:/path` → human-readable to file
//!
//! [`configure_diagnostic_sink`] redirects dumps to a file at runtime; the most
//! recently configured sink wins.
//!
//! ## Dump layout (human)
//!
//! ```text
//! ----------------------------------------------------------------
//! stack[0x7ffd5a1c] was initialized at src/main.rs:10:21
//!     called from src/main.rs:24:15:
//!               ERROR CODE: 8 (POP_OUT_OF_RANGE_ERROR)
//!      *leading guard: 0xdeadbeefcafebabe
//!      *size = 0
//!      *capacity = 4
//!      *data[0x55d0c2a8]:
//!          leading guard: 0xdeadbeefcafebabe
//!         > data[0] = POISON <
//!         O data[1] = POISON
//!         ...
//!          trailing guard: 0xdeadbeefcafebabe
//!      *trailing guard: 0xdeadbeefcafebabe
//! ```
//!
//! `>` marks the cursor (the slot at index `size`), `O` a poisoned slot and
//! `@` a live one.

use std::fs::File;
use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use serde::Serialize;
use tracing::warn;

use crate::error::{Result, StackError};

/// Environment variable read once to pick the initial sink
pub const DUMP_ENV_VAR: &str = "GUARDSTACK_DUMP";

const SEPARATOR: &str = "----------------------------------------------------------------";

// =============================================================================
// Snapshot
// =============================================================================

/// One slot of the element buffer as shown in a dump
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotLine {
    pub index: usize,
    /// Slot at index `size` (next free slot)
    pub cursor: bool,
    pub poisoned: bool,
    pub value: f64,
}

/// Everything a dump shows, captured from a stack at the point of failure
#[derive(Debug, Clone, Serialize)]
pub struct StackSnapshot {
    pub stack_address: usize,
    /// Call site that created the stack
    pub origin: String,
    /// Call site of the failing operation
    pub site: String,
    pub error_code: i32,
    pub error_symbol: &'static str,
    /// (leading, trailing) structure guards, when guards are enabled
    pub structure_guards: Option<(u64, u64)>,
    pub size: i64,
    pub capacity: i64,
    pub buffer_address: Option<usize>,
    /// (leading, trailing) buffer guards, when guarded and safe to read
    pub buffer_guards: Option<(Option<u64>, Option<u64>)>,
    /// Per-slot lines; `None` when the error makes the buffer unsafe to read
    pub slots: Option<Vec<SlotLine>>,
}

// =============================================================================
// Sink configuration
// =============================================================================

/// Dump format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Human,
    Json,
}

/// Parsed form of `GUARDSTACK_DUMP`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkSpec {
    Off,
    Stderr(DumpFormat),
    File(DumpFormat, PathBuf),
}

impl SinkSpec {
    /// Parse a `GUARDSTACK_DUMP` value. Returns `None` for unrecognized input.
    pub fn parse(value: &str) -> Option<SinkSpec> {
        match value {
            "" | "1" => Some(SinkSpec::Stderr(DumpFormat::Human)),
            "0" => Some(SinkSpec::Off),
            "json" => Some(SinkSpec::Stderr(DumpFormat::Json)),
            s if s.starts_with("json:") && s.len() > 5 => {
                Some(SinkSpec::File(DumpFormat::Json, PathBuf::from(&s[5..])))
            }
            s if s.starts_with("file:") && s.len() > 5 => {
                Some(SinkSpec::File(DumpFormat::Human, PathBuf::from(&s[5..])))
            }
            _ => None,
        }
    }

    /// Read and parse `GUARDSTACK_DUMP`, falling back to stderr
    pub fn from_env() -> SinkSpec {
        let Ok(value) = std::env::var(DUMP_ENV_VAR) else {
            return SinkSpec::Stderr(DumpFormat::Human);
        };
        SinkSpec::parse(&value).unwrap_or_else(|| {
            warn!("{}='{}' not recognized, dumping to stderr", DUMP_ENV_VAR, value);
            SinkSpec::Stderr(DumpFormat::Human)
        })
    }
}

enum SinkTarget {
    Off,
    Stderr,
    File(File),
    Writer(Box<dyn Write + Send>),
}

struct DiagnosticSink {
    target: SinkTarget,
    format: DumpFormat,
}

impl DiagnosticSink {
    fn from_spec(spec: SinkSpec) -> Self {
        match spec {
            SinkSpec::Off => DiagnosticSink {
                target: SinkTarget::Off,
                format: DumpFormat::Human,
            },
            SinkSpec::Stderr(format) => DiagnosticSink {
                target: SinkTarget::Stderr,
                format,
            },
            SinkSpec::File(format, path) => match File::create(&path) {
                Ok(file) => DiagnosticSink {
                    target: SinkTarget::File(file),
                    format,
                },
                Err(e) => {
                    warn!("could not open dump file {}: {}, using stderr", path.display(), e);
                    DiagnosticSink {
                        target: SinkTarget::Stderr,
                        format,
                    }
                }
            },
        }
    }

    fn write(&mut self, text: &str) {
        let _ = match &mut self.target {
            SinkTarget::Off => Ok(()),
            SinkTarget::Stderr => std::io::stderr().lock().write_all(text.as_bytes()),
            SinkTarget::File(file) => file.write_all(text.as_bytes()).and_then(|()| file.flush()),
            SinkTarget::Writer(writer) => {
                writer.write_all(text.as_bytes()).and_then(|()| writer.flush())
            }
        };
    }
}

static SINK: OnceLock<Mutex<DiagnosticSink>> = OnceLock::new();

fn sink() -> MutexGuard<'static, DiagnosticSink> {
    SINK.get_or_init(|| Mutex::new(DiagnosticSink::from_spec(SinkSpec::from_env())))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Send dumps to a file, truncating it
///
/// Keeps the current dump format. Fails with
/// [`StackError::OpeningFileError`] if the file cannot be opened for writing;
/// the previous sink stays in place.
pub fn configure_diagnostic_sink(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        warn!("could not open dump file {}: {}", path.display(), e);
        StackError::OpeningFileError
    })?;
    sink().target = SinkTarget::File(file);
    Ok(())
}

/// Send dumps to an arbitrary writer
pub fn set_diagnostic_writer(writer: Box<dyn Write + Send>) {
    sink().target = SinkTarget::Writer(writer);
}

/// Select the dump format for subsequent dumps
pub fn set_dump_format(format: DumpFormat) {
    sink().format = format;
}

/// Back to human-readable dumps on stderr
pub fn reset_diagnostic_sink() {
    *sink() = DiagnosticSink::from_spec(SinkSpec::Stderr(DumpFormat::Human));
}

/// Re-read `GUARDSTACK_DUMP` and replace the current sink
pub fn configure_from_env() {
    *sink() = DiagnosticSink::from_spec(SinkSpec::from_env());
}

// =============================================================================
// Emit
// =============================================================================

/// Render and write a dump
pub(crate) fn emit(snapshot: &StackSnapshot) {
    let mut sink = sink();
    let text = match sink.format {
        DumpFormat::Human => render_human(snapshot),
        DumpFormat::Json => render_json(snapshot),
    };
    sink.write(&text);
}

/// Report a failure that happened before a stack existed
pub(crate) fn report_failure(error: StackError, site: &Location<'_>, capacity: usize) {
    tracing::error!(code = error.code(), capacity, "stack initialization failed at {}", site);
    let text = format!(
        "{SEPARATOR}\nstack initialization at {}:{}:{} failed\n\t\t\t  ERROR CODE: {} ({})\n\t *requested capacity = {}\n",
        site.file(),
        site.line(),
        site.column(),
        error.code(),
        error.symbol(),
        capacity
    );
    sink().write(&text);
}

// =============================================================================
// Formatting
// =============================================================================

fn format_guard(guard: Option<u64>) -> String {
    match guard {
        Some(value) => format!("{:#x}", value),
        None => "<missing>".to_string(),
    }
}

/// Human-readable dump text
pub fn render_human(snapshot: &StackSnapshot) -> String {
    let mut out = String::new();
    out.push_str(SEPARATOR);
    out.push('\n');
    out.push_str(&format!(
        "stack[{:#x}] was initialized at {}\n",
        snapshot.stack_address, snapshot.origin
    ));
    out.push_str(&format!("\tcalled from {}:\n", snapshot.site));
    out.push_str(&format!(
        "\t\t\t  ERROR CODE: {} ({})\n",
        snapshot.error_code, snapshot.error_symbol
    ));

    if let Some((leading, _)) = snapshot.structure_guards {
        out.push_str(&format!("\t *leading guard: {:#x}\n", leading));
    }
    out.push_str(&format!("\t *size = {}\n", snapshot.size));
    out.push_str(&format!("\t *capacity = {}\n", snapshot.capacity));
    match snapshot.buffer_address {
        Some(address) => out.push_str(&format!("\t *data[{:#x}]:\n", address)),
        None => out.push_str("\t *data[null]\n"),
    }

    if let Some((leading, _)) = snapshot.buffer_guards {
        out.push_str(&format!("\t\t leading guard: {}\n", format_guard(leading)));
    }
    if let Some(slots) = &snapshot.slots {
        let width = snapshot.capacity.max(1).to_string().len();
        for slot in slots {
            let marker = if slot.cursor {
                '>'
            } else if slot.poisoned {
                'O'
            } else {
                '@'
            };
            let value = if slot.poisoned {
                "POISON".to_string()
            } else {
                slot.value.to_string()
            };
            let tail = if slot.cursor { " <" } else { "" };
            out.push_str(&format!(
                "\t\t{} data[{:0width$}] = {}{}\n",
                marker,
                slot.index,
                value,
                tail,
                width = width
            ));
        }
    }
    if let Some((_, trailing)) = snapshot.buffer_guards {
        out.push_str(&format!("\t\t trailing guard: {}\n", format_guard(trailing)));
    }

    if let Some((_, trailing)) = snapshot.structure_guards {
        out.push_str(&format!("\t *trailing guard: {:#x}\n", trailing));
    }
    out
}

/// Single-line JSON dump
#[cfg(feature = "dump-json")]
pub fn render_json(snapshot: &StackSnapshot) -> String {
    let mut line = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string());
    line.push('\n');
    line
}

#[cfg(not(feature = "dump-json"))]
pub fn render_json(snapshot: &StackSnapshot) -> String {
    warn!("JSON dumps require the 'dump-json' feature, falling back to human format");
    render_human(snapshot)
}

// =============================================================================
// Test support
// =============================================================================
