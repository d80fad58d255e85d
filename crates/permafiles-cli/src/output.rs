use permafiles_core::domain::{FileEntry, SyncStatus};
use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &Value);
}

/// Human-readable output with checkmarks and indentation
pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {message}");
        }
    }
    fn print_json(&self, _value: &Value) {}
}

/// One JSON document per call on stdout
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}

/// One listing line: kind marker, size, status and name
pub fn entry_line(entry: &FileEntry) -> String {
    let kind = if entry.is_folder { 'd' } else { '-' };
    let size = match (entry.is_folder, entry.size) {
        (false, Some(bytes)) => human_size(bytes),
        _ => "-".to_string(),
    };
    let status = match entry.sync_status {
        SyncStatus::Synced => String::new(),
        other => format!(" [{}]", other.name()),
    };
    let suffix = if entry.is_folder { "/" } else { "" };
    format!("{kind} {size:>9}  {}{suffix}{status}", entry.name)
}

/// Listing entry as JSON, with the fields scripts care about
pub fn entry_json(entry: &FileEntry) -> Value {
    json!({
        "name": entry.name,
        "type": if entry.is_folder { "folder" } else { "file" },
        "status": entry.sync_status.name(),
        "size": entry.size,
        "record_id": entry.record_id.map(|id| id.get()),
        "folder_id": entry.folder_id.map(|id| id.get()),
        "folder_link_id": entry.folder_link_id.map(|id| id.get()),
        "archive": entry.archive_number.as_str(),
        "display_date": entry.display_date.map(|d| d.to_rfc3339()),
        "permissions": entry.permissions.iter().map(|p| p.name()).collect::<Vec<_>>(),
        "queue_item_id": entry.queue_item_id.map(|id| id.to_string()),
    })
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
