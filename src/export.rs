// Foodweb Robustness Engine - Result Sinks
//
// Writes finished curves and removal logs to disk. CSV for spreadsheet-style
// analysis (one column per metric, one row per removed-count index), JSONL
// for line-oriented tooling.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde_json::json;

use crate::types::{MetricEvolution, RemovalRecord};

fn create(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Write an averaged (or single-trajectory) metric evolution as CSV.
pub fn write_csv(path: &Path, evolution: &MetricEvolution) -> io::Result<()> {
    let mut out = create(path)?;
    writeln!(out, "nodes_removed,{}", evolution.names.join(","))?;
    for i in 0..evolution.len() {
        let row: Vec<String> = evolution
            .series
            .iter()
            .map(|s| s[i].to_string())
            .collect();
        writeln!(out, "{},{}", i, row.join(","))?;
    }
    out.flush()
}

/// Write one JSON object per removed-count index.
pub fn write_jsonl(path: &Path, evolution: &MetricEvolution) -> io::Result<()> {
    let mut out = create(path)?;
    for i in 0..evolution.len() {
        let mut object = serde_json::Map::new();
        object.insert("nodes_removed".into(), json!(i));
        for (name, series) in evolution.names.iter().zip(evolution.series.iter()) {
            object.insert(name.clone(), json!(series[i]));
        }
        let line = serde_json::to_string(&object)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Write per-trajectory removal logs: which node fell at which step, and
/// whether it was the chosen victim or a cascade casualty.
pub fn write_removals_csv(path: &Path, logs: &[Vec<RemovalRecord>]) -> io::Result<()> {
    let mut out = create(path)?;
    writeln!(out, "trajectory,step,node,kind")?;
    for (trajectory, log) in logs.iter().enumerate() {
        for record in log {
            writeln!(
                out,
                "{},{},{},{}",
                trajectory,
                record.step,
                record.name,
                record.kind.as_str()
            )?;
        }
    }
    out.flush()
}
