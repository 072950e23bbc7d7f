use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::Table;
use crate::ping_executor::ProberKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Tab-delimited, one row per domain.
    #[default]
    Text,
    Json,
}

/// A finished run: the table plus the parameters that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub best_of: u32,
    pub max_in_flight: Option<usize>,
    pub prober: ProberKind,
    pub table: Table,
}

impl Report {
    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Text => Ok(render_text(&self.table)),
            OutputFormat::Json => serde_json::to_string_pretty(self),
        }
    }
}

/// Header row of provider names, then a row per domain with one cell per provider.
pub fn render_text(table: &Table) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\t{}", table.providers.join("\t"));
    for row in &table.rows {
        out.push_str(&row.domain);
        for cell in &row.cells {
            let _ = write!(out, "\t{cell}");
        }
        out.push('\n');
    }
    out
}
