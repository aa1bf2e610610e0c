//! Command line argument parsing for the postline CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::codec::CompressionMode;
use crate::query::{JoinAlgorithm, ScoringFunction};
use crate::search::SearchMethod;

/// postline - build and query disk-resident inverted indexes
#[derive(Parser, Debug, Clone)]
#[command(name = "postline")]
#[command(about = "Build and query disk-resident inverted indexes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct PostlineArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Directory holding index descriptors
    #[arg(short, long, env = "POSTLINE_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PostlineArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a new, empty index
    Create(CreateArgs),

    /// Index a TSV collection into an existing index
    Build(BuildArgs),

    /// Run one query or a file of queries
    Query(QueryArgs),

    /// Show the descriptor and collection statistics of an index
    Info(InfoArgs),

    /// Delete an index and its files
    Remove(RemoveArgs),
}

/// Arguments for creating an index
#[derive(Parser, Debug, Clone)]
pub struct CreateArgs {
    /// Index name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Index options file (JSON); flags below override it
    #[arg(long, value_name = "OPTIONS_FILE")]
    pub options: Option<PathBuf>,

    /// Apply stemming
    #[arg(long)]
    pub stemming: bool,

    /// Drop stopwords
    #[arg(long)]
    pub drop_stopwords: bool,

    /// Posting compression (none, unary, gamma)
    #[arg(short, long)]
    pub compression: Option<CompressionMode>,

    /// Number of results per query
    #[arg(short)]
    pub k: Option<usize>,

    /// Join algorithm (conjunctive, disjunctive)
    #[arg(short, long)]
    pub algorithm: Option<JoinAlgorithm>,

    /// Scoring function (tfidf, bm11, bm15, bm25)
    #[arg(short, long)]
    pub scoring: Option<ScoringFunction>,
}

/// Arguments for building an index
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Index name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Collection file with `<id>\t<text>` rows
    #[arg(value_name = "COLLECTION")]
    pub collection: PathBuf,

    /// Build configuration file (JSON); flags below override it
    #[arg(long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Distinct tokens per chunk (below 1 keeps everything in memory)
    #[arg(long, allow_negative_numbers = true)]
    pub chunk_threshold: Option<i64>,

    /// Stop after this many rows
    #[arg(short = 'n', long)]
    pub max_documents: Option<u64>,

    /// Number of shards built in parallel
    #[arg(short, long)]
    pub partitions: Option<usize>,

    /// Worker threads for sharded builds
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Keep chunk files after merging
    #[arg(long)]
    pub keep_chunks: bool,

    /// Keep shard indexes after merging
    #[arg(long)]
    pub keep_shards: bool,
}

/// Arguments for querying an index
#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    /// Index name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Query text
    #[arg(value_name = "QUERY", required_unless_present = "queries")]
    pub query: Option<String>,

    /// File of `<query_id>\t<text>` rows to run as a batch
    #[arg(long, value_name = "QUERIES_FILE", conflicts_with = "query")]
    pub queries: Option<PathBuf>,

    /// Query configuration file (JSON); flags below override it
    #[arg(long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Search method for lexicon and doc-stats lookups (ternary, skip)
    #[arg(short, long)]
    pub method: Option<SearchMethod>,

    /// Initial skip step in bytes
    #[arg(long)]
    pub skip_step: Option<u64>,

    /// BM k1 parameter
    #[arg(long)]
    pub k1: Option<f64>,

    /// BM b parameter
    #[arg(long)]
    pub b: Option<f64>,

    /// Keep cached document lengths across queries
    #[arg(long)]
    pub keep_doc_lengths: bool,

    /// Run tag written in TREC run lines
    #[arg(long, default_value = "postline")]
    pub run_name: String,

    /// Relevance judgments used to evaluate a query batch
    #[arg(
        long,
        value_name = "QRELS_FILE",
        requires = "queries",
        conflicts_with = "query"
    )]
    pub qrels: Option<PathBuf>,

    /// Cutoff for evaluation metrics
    #[arg(long, default_value = "10")]
    pub cutoff: usize,
}

/// Arguments for index information
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    /// Index name
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Arguments for removing an index
#[derive(Parser, Debug, Clone)]
pub struct RemoveArgs {
    /// Index name
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_command() {
        let args = PostlineArgs::try_parse_from([
            "postline",
            "--root",
            "/tmp/indexes",
            "create",
            "news",
            "--compression",
            "gamma",
            "-k",
            "20",
            "--algorithm",
            "and",
            "--scoring",
            "bm25",
            "--drop-stopwords",
        ])
        .unwrap();

        assert_eq!(args.root, PathBuf::from("/tmp/indexes"));
        if let Command::Create(create_args) = args.command {
            assert_eq!(create_args.name, "news");
            assert_eq!(create_args.compression, Some(CompressionMode::Gamma));
            assert_eq!(create_args.k, Some(20));
            assert_eq!(create_args.algorithm, Some(JoinAlgorithm::Conjunctive));
            assert_eq!(create_args.scoring, Some(ScoringFunction::Bm25));
            assert!(create_args.drop_stopwords);
            assert!(!create_args.stemming);
        } else {
            panic!("Expected Create command");
        }
    }

    #[test]
    fn test_build_command() {
        let args = PostlineArgs::try_parse_from([
            "postline",
            "build",
            "news",
            "collection.tsv",
            "--chunk-threshold",
            "-1",
            "--partitions",
            "4",
            "--keep-chunks",
        ])
        .unwrap();

        if let Command::Build(build_args) = args.command {
            assert_eq!(build_args.collection, PathBuf::from("collection.tsv"));
            assert_eq!(build_args.chunk_threshold, Some(-1));
            assert_eq!(build_args.partitions, Some(4));
            assert!(build_args.keep_chunks);
            assert!(!build_args.keep_shards);
        } else {
            panic!("Expected Build command");
        }
    }

    #[test]
    fn test_query_command() {
        let args =
            PostlineArgs::try_parse_from(["postline", "query", "news", "quick fox", "-m", "skip"])
                .unwrap();
        if let Command::Query(query_args) = args.command {
            assert_eq!(query_args.query.as_deref(), Some("quick fox"));
            assert_eq!(query_args.method, Some(SearchMethod::Skip));
        } else {
            panic!("Expected Query command");
        }

        assert!(PostlineArgs::try_parse_from(["postline", "query", "news"]).is_err());
        assert!(
            PostlineArgs::try_parse_from(["postline", "query", "news", "--qrels", "q.txt", "x"])
                .is_err()
        );

        let args = PostlineArgs::try_parse_from([
            "postline", "query", "news", "--queries", "q.tsv", "--qrels", "j.txt",
        ])
        .unwrap();
        if let Command::Query(query_args) = args.command {
            assert!(query_args.query.is_none());
            assert_eq!(query_args.qrels, Some(PathBuf::from("j.txt")));
        } else {
            panic!("Expected Query command");
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let args = PostlineArgs::try_parse_from(["postline", "info", "x"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = PostlineArgs::try_parse_from(["postline", "-vv", "info", "x"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = PostlineArgs::try_parse_from(["postline", "--quiet", "info", "x"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            PostlineArgs::try_parse_from(["postline", "--format", "json", "remove", "x"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }
}
