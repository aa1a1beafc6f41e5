use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::store;

/// Records beyond this count are dropped, oldest first.
const MAX_RECORDS: usize = 1000;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub command_name: String,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct UsageStats {
    pub command_name: String,
    pub total_uses: usize,
    pub first_used: String,
    pub last_used: String,
}

// ── Record file ───────────────────────────────────────────────────────────────

/// Missing or corrupt usage files read as empty; the wrapper scripts append
/// with plain shell and may leave malformed JSON behind.
pub fn read_records(path: &Path) -> Vec<UsageRecord> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    serde_json::from_str(&content).unwrap_or_default()
}

pub fn write_records(path: &Path, records: &[UsageRecord]) -> Result<()> {
    let trimmed = if records.len() > MAX_RECORDS {
        &records[records.len() - MAX_RECORDS..]
    } else {
        records
    };
    store::write_atomic(path, &serde_json::to_string_pretty(trimmed)?)
}

pub fn clear(command_name: Option<&str>) -> Result<()> {
    let path = store::usage_file();
    match command_name {
        None => write_records(&path, &[]),
        Some(name) => {
            let records: Vec<UsageRecord> = read_records(&path)
                .into_iter()
                .filter(|r| r.command_name != name)
                .collect();
            write_records(&path, &records)
        }
    }
}

// ── Stats ─────────────────────────────────────────────────────────────────────

pub fn compute_stats(records: &[UsageRecord], filter: Option<&str>) -> Vec<UsageStats> {
    let mut grouped: BTreeMap<&str, Vec<&UsageRecord>> = BTreeMap::new();
    for record in records {
        if let Some(name) = filter {
            if record.command_name != name {
                continue;
            }
        }
        grouped.entry(&record.command_name).or_default().push(record);
    }

    let mut stats: Vec<UsageStats> = grouped
        .into_iter()
        .map(|(name, mut records)| {
            records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            UsageStats {
                command_name: name.to_string(),
                total_uses: records.len(),
                first_used: records.first().map(|r| r.timestamp.clone()).unwrap_or_default(),
                last_used: records.last().map(|r| r.timestamp.clone()).unwrap_or_default(),
            }
        })
        .collect();

    stats.sort_by(|a, b| b.total_uses.cmp(&a.total_uses));
    stats
}

fn avg_per_day(stat: &UsageStats) -> String {
    let Ok(first) = DateTime::parse_from_rfc3339(&stat.first_used) else {
        return stat.total_uses.to_string();
    };
    let days = (Utc::now().timestamp() - first.timestamp()) / 86_400;
    if days > 0 {
        format!("{:.1}", stat.total_uses as f64 / days as f64)
    } else {
        stat.total_uses.to_string()
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_clear(command_name: Option<&str>) -> Result<()> {
    clear(command_name)?;
    match command_name {
        Some(name) => println!("\n  {} Cleared usage data for '{name}'\n", "✓".green().bold()),
        None => println!("\n  {} Cleared all usage data\n", "✓".green().bold()),
    }
    Ok(())
}

pub fn cmd_stats(command_name: Option<&str>) -> Result<()> {
    let records = read_records(&store::usage_file());
    let stats = compute_stats(&records, command_name);

    if stats.is_empty() {
        println!("\n  {}\n", "No usage data yet. Start using your providers!".yellow());
        return Ok(());
    }

    println!("\n  {}\n", "Usage Statistics".bold());

    for stat in &stats {
        println!("  {} {}", "▸".cyan(), stat.command_name.bold());
        println!("    {} {}", "Total uses:".dimmed(), stat.total_uses);
        println!("    {} {}", "Last used:".dimmed(), stat.last_used);
        println!("    {} {}", "First used:".dimmed(), stat.first_used);
        println!("    {} {}", "Avg per day:".dimmed(), avg_per_day(stat));
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, ts: &str) -> UsageRecord {
        UsageRecord {
            command_name: name.to_string(),
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_records(&dir.path().join("usage.json")).is_empty());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        fs::write(&path, "{broken").unwrap();
        assert!(read_records(&path).is_empty());
    }

    #[test]
    fn stats_group_and_sort_by_total_uses() {
        let records = vec![
            record("a", "2024-01-01T00:00:00Z"),
            record("b", "2024-01-02T00:00:00Z"),
            record("b", "2024-01-03T00:00:00Z"),
            record("b", "2024-01-01T12:00:00Z"),
        ];

        let stats = compute_stats(&records, None);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].command_name, "b");
        assert_eq!(stats[0].total_uses, 3);
        assert_eq!(stats[0].first_used, "2024-01-01T12:00:00Z");
        assert_eq!(stats[0].last_used, "2024-01-03T00:00:00Z");
    }

    #[test]
    fn stats_filter_limits_to_one_command() {
        let records = vec![
            record("a", "2024-01-01T00:00:00Z"),
            record("b", "2024-01-02T00:00:00Z"),
        ];
        let stats = compute_stats(&records, Some("a"));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].command_name, "a");
    }

    #[test]
    fn write_trims_to_max_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");

        let records: Vec<UsageRecord> = (0..MAX_RECORDS + 50)
            .map(|i| record("x", &format!("2024-01-01T00:00:{:02}Z", i % 60)))
            .collect();
        write_records(&path, &records).unwrap();

        assert_eq!(read_records(&path).len(), MAX_RECORDS);
    }
}
