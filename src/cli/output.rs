//! Output formatting for CLI commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::build::BuildReport;
use crate::cli::args::{OutputFormat, PostlineArgs};
use crate::error::Result;
use crate::evaluation::RunEntry;
use crate::query::LookupStats;

/// Result structure for index creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexCreationResult {
    pub name: String,
    pub descriptor: String,
    pub compression: String,
}

/// Result structure for a build.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildResult {
    pub name: String,
    pub report: BuildReport,
    pub total_documents: u64,
    pub duration_ms: u64,
    pub docs_per_second: f64,
}

/// One ranked document.
#[derive(Debug, Serialize, Deserialize)]
pub struct RankedDocument {
    pub rank: usize,
    pub doc_id: u64,
    pub external_id: Option<String>,
    pub score: f64,
}

/// Result structure for a single query.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub tokens: Vec<String>,
    pub hits: Vec<RankedDocument>,
    pub duration_ms: u64,
    pub lookups: LookupStats,
}

/// Result structure for a query batch.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResults {
    pub queries: usize,
    pub run: Vec<RunEntry>,
    /// Metrics averaged over the judged queries.
    pub metrics: BTreeMap<String, f64>,
    pub judged_queries: usize,
    pub duration_ms: u64,
    pub lookups: LookupStats,
}

/// Index description.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub stemming: bool,
    pub keep_stopwords: bool,
    pub compression: String,
    pub k: usize,
    pub algorithm: Option<String>,
    pub scoring: Option<String>,
    pub content: String,
    pub num_docs: u64,
    pub index_rows: u64,
    pub lexicon_rows: u64,
    pub avg_doc_length: Option<f64>,
    pub index_size_bytes: Option<u64>,
}

/// Result structure for index removal.
#[derive(Debug, Serialize, Deserialize)]
pub struct RemovalResult {
    pub name: String,
}

/// Something a command prints.
pub trait CommandOutput: Serialize {
    /// Human-readable rendering; defaults to one `key: value` line per field.
    fn print_human(&self) -> Result<()> {
        output_generic_human(&serde_json::to_value(self)?);
        Ok(())
    }
}

impl CommandOutput for IndexCreationResult {}
impl CommandOutput for BuildResult {}
impl CommandOutput for RemovalResult {}

impl CommandOutput for IndexInfo {
    fn print_human(&self) -> Result<()> {
        println!("Index: {}", self.name);
        println!("════════════════");
        println!("Documents: {}", self.num_docs);
        println!("Lexicon rows: {}", self.lexicon_rows);
        println!("Index rows: {}", self.index_rows);
        println!("Doc ids: {}", self.content);
        if let Some(avg) = self.avg_doc_length {
            println!("Average length: {avg:.1}");
        }
        if let Some(size) = self.index_size_bytes {
            println!("Index size: {}", format_bytes(size));
        }
        println!();
        println!("Stemming: {}", self.stemming);
        println!("Stopwords kept: {}", self.keep_stopwords);
        println!("Compression: {}", self.compression);
        println!("k: {}", self.k);
        println!("Algorithm: {}", self.algorithm.as_deref().unwrap_or("unset"));
        println!("Scoring: {}", self.scoring.as_deref().unwrap_or("unset"));
        Ok(())
    }
}

impl CommandOutput for QueryResults {
    fn print_human(&self) -> Result<()> {
        println!("Query: {} [{}]", self.query, self.tokens.join(" "));
        println!("─────────────");
        if self.hits.is_empty() {
            println!("No results.");
        }
        for hit in &self.hits {
            println!(
                "{:>3}. {:<24} (doc {}, score {:.4})",
                hit.rank + 1,
                hit.external_id.as_deref().unwrap_or("?"),
                hit.doc_id,
                hit.score
            );
        }
        println!();
        println!("Search time: {}ms", self.duration_ms);
        println!(
            "Lookup cache: {} hits, {} misses",
            self.lookups.hits, self.lookups.misses
        );
        Ok(())
    }
}

impl CommandOutput for BatchResults {
    fn print_human(&self) -> Result<()> {
        for entry in &self.run {
            println!("{entry}");
        }
        eprintln!();
        eprintln!("Queries: {} ({}ms)", self.queries, self.duration_ms);
        if !self.metrics.is_empty() {
            eprintln!("Judged queries: {}", self.judged_queries);
            for (metric, value) in &self.metrics {
                eprintln!("{metric}: {value:.4}");
            }
        }
        Ok(())
    }
}

/// Output a result in the specified format.
pub fn output_result<T: CommandOutput>(
    message: &str,
    result: &T,
    args: &PostlineArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 1 {
                println!("{message}");
                println!();
            }
            result.print_human()
        }
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &PostlineArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

fn output_generic_human(value: &serde_json::Value) {
    if let serde_json::Value::Object(obj) = value {
        for (key, val) in obj {
            match val {
                serde_json::Value::Object(nested) => {
                    println!("{key}:");
                    for (nested_key, nested_val) in nested {
                        println!("  {nested_key}: {}", format_value(nested_val));
                    }
                }
                _ => println!("{key}: {}", format_value(val)),
            }
        }
    } else {
        println!("{}", format_value(value));
    }
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() => format!("{f:.2}"),
            _ => n.to_string(),
        },
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "unset".to_string(),
        other => other.to_string(),
    }
}

/// Format bytes in human-readable format.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&serde_json::json!(3)), "3");
        assert_eq!(format_value(&serde_json::json!(0.5)), "0.50");
        assert_eq!(format_value(&serde_json::json!(null)), "unset");
        assert_eq!(format_value(&serde_json::json!("gamma")), "gamma");
    }
}
