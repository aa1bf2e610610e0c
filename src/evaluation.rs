//! Relevance evaluation of ranked runs.
//!
//! Runs are exchanged in the TREC format, one `qid Q0 docid rank score tag`
//! line per retrieved document. Judgments (qrels) use `qid Q0 docid rel`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use ahash::AHashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PostlineError, Result};

/// One line of a TREC run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub query_id: String,
    /// External id of the retrieved document.
    pub doc_id: String,
    /// Zero-based rank.
    pub rank: usize,
    pub score: f64,
    /// Tag identifying the system that produced the run.
    pub run_name: String,
}

impl fmt::Display for RunEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Q0 {} {} {:.6} {}",
            self.query_id, self.doc_id, self.rank, self.score, self.run_name
        )
    }
}

/// Turn ranked `(external_id, score)` pairs into run entries.
pub fn trec_run_lines<S: AsRef<str>>(
    query_id: &str,
    ranked: &[(S, f64)],
    run_name: &str,
) -> Vec<RunEntry> {
    ranked
        .iter()
        .enumerate()
        .map(|(rank, (doc_id, score))| RunEntry {
            query_id: query_id.to_string(),
            doc_id: doc_id.as_ref().to_string(),
            rank,
            score: *score,
            run_name: run_name.to_string(),
        })
        .collect()
}

/// Scores a run of one query against relevance judgments.
pub trait RelevanceEvaluator {
    /// Metric name to value.
    fn evaluate(&self, run: &[RunEntry]) -> Result<BTreeMap<String, f64>>;
}

/// Graded judgments keyed by query id and document id.
#[derive(Debug, Clone, Default)]
pub struct Qrels {
    judgments: AHashMap<String, AHashMap<String, u32>>,
}

impl Qrels {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let qrels: Qrels = text.parse()?;
        debug!(
            "Loaded judgments for {} queries from {}",
            qrels.judgments.len(),
            path.as_ref().display()
        );
        Ok(qrels)
    }

    /// Relevance grade of `doc_id` for `query_id`, 0 if unjudged.
    pub fn relevance(&self, query_id: &str, doc_id: &str) -> u32 {
        self.judgments
            .get(query_id)
            .and_then(|docs| docs.get(doc_id))
            .copied()
            .unwrap_or(0)
    }

    /// Number of documents judged relevant for `query_id`.
    pub fn relevant_count(&self, query_id: &str) -> usize {
        self.judgments
            .get(query_id)
            .map_or(0, |docs| docs.values().filter(|&&rel| rel > 0).count())
    }

    pub fn contains_query(&self, query_id: &str) -> bool {
        self.judgments.contains_key(query_id)
    }
}

impl FromStr for Qrels {
    type Err = PostlineError;

    fn from_str(text: &str) -> Result<Self> {
        let mut qrels = Qrels::default();
        for (number, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            let &[query_id, _, doc_id, rel] = fields.as_slice() else {
                warn!("Skipping qrels line {}: expected 4 fields", number + 1);
                continue;
            };
            let rel: u32 = rel.parse().map_err(|_| {
                PostlineError::format(format!("invalid relevance '{rel}' on qrels line {}", number + 1))
            })?;
            qrels
                .judgments
                .entry(query_id.to_string())
                .or_default()
                .insert(doc_id.to_string(), rel);
        }
        Ok(qrels)
    }
}

/// Binary-relevance metrics at a fixed cutoff: precision, recall and
/// reciprocal rank.
#[derive(Debug, Clone)]
pub struct QrelsEvaluator {
    qrels: Qrels,
    cutoff: usize,
}

impl QrelsEvaluator {
    pub fn new(qrels: Qrels, cutoff: usize) -> Self {
        QrelsEvaluator {
            qrels,
            cutoff: cutoff.max(1),
        }
    }
}

impl RelevanceEvaluator for QrelsEvaluator {
    fn evaluate(&self, run: &[RunEntry]) -> Result<BTreeMap<String, f64>> {
        let mut metrics = BTreeMap::new();
        let Some(query_id) = run.first().map(|entry| entry.query_id.as_str()) else {
            return Ok(metrics);
        };
        if run.iter().any(|entry| entry.query_id != query_id) {
            return Err(PostlineError::invalid_argument(
                "a run passed to the evaluator must hold a single query",
            ));
        }
        if !self.qrels.contains_query(query_id) {
            debug!("No judgments for query {query_id}");
            return Ok(metrics);
        }

        let mut ranked: Vec<&RunEntry> = run.iter().collect();
        ranked.sort_by_key(|entry| entry.rank);
        let relevant: Vec<bool> = ranked
            .iter()
            .take(self.cutoff)
            .map(|entry| self.qrels.relevance(query_id, &entry.doc_id) > 0)
            .collect();
        let found = relevant.iter().filter(|&&rel| rel).count();
        let total = self.qrels.relevant_count(query_id);

        metrics.insert(format!("P@{}", self.cutoff), found as f64 / self.cutoff as f64);
        metrics.insert(
            format!("recall@{}", self.cutoff),
            if total == 0 { 0.0 } else { found as f64 / total as f64 },
        );
        metrics.insert(
            "recip_rank".to_string(),
            relevant
                .iter()
                .position(|&rel| rel)
                .map_or(0.0, |position| 1.0 / (position + 1) as f64),
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QRELS: &str = "1 Q0 d1 2\n1 Q0 d4 1\n1 Q0 d2 0\n2 Q0 d9 1\n";

    #[test]
    fn test_run_lines() {
        let lines = trec_run_lines("7", &[("d3", 2.5), ("d1", 1.25)], "bm25");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].to_string(), "7 Q0 d3 0 2.500000 bm25");
        assert_eq!(lines[1].rank, 1);
    }

    #[test]
    fn test_qrels_parsing() {
        let qrels: Qrels = QRELS.parse().unwrap();
        assert_eq!(qrels.relevance("1", "d1"), 2);
        assert_eq!(qrels.relevance("1", "d2"), 0);
        assert_eq!(qrels.relevance("3", "d1"), 0);
        assert_eq!(qrels.relevant_count("1"), 2);
        assert!("1 Q0 d1 x".parse::<Qrels>().is_err());
    }

    #[test]
    fn test_metrics() {
        let evaluator = QrelsEvaluator::new(QRELS.parse().unwrap(), 4);
        let run = trec_run_lines("1", &[("d2", 3.0), ("d1", 2.0), ("d7", 1.0), ("d4", 0.5)], "t");
        let metrics = evaluator.evaluate(&run).unwrap();
        assert_eq!(metrics["P@4"], 0.5);
        assert_eq!(metrics["recall@4"], 1.0);
        assert_eq!(metrics["recip_rank"], 0.5);

        let unjudged = trec_run_lines("5", &[("d1", 1.0)], "t");
        assert!(evaluator.evaluate(&unjudged).unwrap().is_empty());
        assert!(evaluator.evaluate(&[]).unwrap().is_empty());
    }
}
