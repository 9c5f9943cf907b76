//! Match-run progress reporting on stderr.
//!
//! Renders the core's [`SearchProgress`] events so users see which
//! stage is running, how far along it is, and what was filtered.
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts (`--json` result output in particular).

use std::io::Write;

use gradpath_core::progress::{NoProgress, ProgressReporter, SearchProgress};

/// Human-friendly progress on stderr:
/// `match  conditionMatch   45%  12 / 40 programs eligible`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: SearchProgress) {
        let mut line = format!(
            "match  {:<15} {:>3}%  {}",
            event.stage.as_str(),
            event.percent,
            event.message
        );
        line.push('\n');
        for detail in &event.details {
            line.push_str(&format!("       - {}\n", detail));
        }
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: SearchProgress) {
        let obj = serde_json::json!({
            "event": "progress",
            "stage": event.stage.as_str(),
            "percent": event.percent,
            "scanned": event.scanned,
            "total": event.total,
            "filtered": event.filtered,
            "matched": event.matched,
            "analyzed": event.analyzed,
            "message": event.message,
            "details": event.details,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => anyhow::bail!("Unknown progress mode: '{}'. Use off, human, or json.", other),
        }
    }

    /// Build a reporter for this mode. Caller passes it to the pipeline.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_modes() {
        assert_eq!(ProgressMode::parse("off").unwrap(), ProgressMode::Off);
        assert_eq!(ProgressMode::parse("human").unwrap(), ProgressMode::Human);
        assert_eq!(ProgressMode::parse("json").unwrap(), ProgressMode::Json);
        assert!(ProgressMode::parse("loud").is_err());
    }
}
