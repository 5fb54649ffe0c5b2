use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::protocol::command_summary;
use crate::types::{AutoControlCommand, Decision, Phase, Sample};

/// Append-only NDJSON audit trail of one controller.
pub(crate) struct SessionLogger {
    file: File,
}

impl SessionLogger {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn log_trigger(&mut self, generation: u64, sample: &Sample, di: f64) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "kind": "trigger",
            "generation": generation,
            "T": sample.temperature,
            "RH": sample.humidity,
            "di": di,
        });
        self.write_line(&entry);
    }

    pub fn log_decision(&mut self, generation: u64, decision: &Decision) {
        let body = match decision {
            Decision::Skip => json!("skip"),
            Decision::Command(cmd) => command_summary(cmd),
        };
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "kind": "decision",
            "generation": generation,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, generation: u64, stage: &str, reason: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "kind": "failure",
            "generation": generation,
            "stage": stage,
            "reason": reason,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, session_id: Uuid, command: &AutoControlCommand) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "kind": "command",
            "session": session_id.to_string(),
            "body": command_summary(command),
        });
        self.write_line(&entry);
    }

    pub fn log_transition(&mut self, generation: u64, from: Phase, to: Phase) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "kind": "transition",
            "generation": generation,
            "from": from.to_string(),
            "to": to.to_string(),
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write session log entry: {e}");
        }
    }
}
