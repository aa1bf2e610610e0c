//! Command implementations for the postline CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use log::{info, warn};

use crate::analysis::StandardNormalizer;
use crate::build::build_index;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{BuildConfig, IndexOptions, QueryConfig};
use crate::error::{PostlineError, Result};
use crate::evaluation::{Qrels, QrelsEvaluator, RelevanceEvaluator, trec_run_lines};
use crate::index::{DocStatsFile, IndexDescriptor};
use crate::query::QueryEngine;

/// Execute a CLI command.
pub fn execute_command(args: PostlineArgs) -> Result<()> {
    match &args.command {
        Command::Create(create_args) => create_index(create_args, &args),
        Command::Build(build_args) => build(build_args, &args),
        Command::Query(query_args) => query(query_args, &args),
        Command::Info(info_args) => show_info(info_args, &args),
        Command::Remove(remove_args) => remove_index(remove_args, &args),
    }
}

/// Create a new index.
fn create_index(args: &CreateArgs, cli_args: &PostlineArgs) -> Result<()> {
    let mut options = match &args.options {
        Some(path) => IndexOptions::from_json_file(path)?,
        None => IndexOptions::default(),
    };
    if args.stemming {
        options.stemming = true;
    }
    if args.drop_stopwords {
        options.keep_stopwords = false;
    }
    if let Some(compression) = args.compression {
        options.compression = compression;
    }
    if let Some(k) = args.k {
        options.k = k;
    }
    if let Some(algorithm) = args.algorithm {
        options.algorithm = Some(algorithm);
    }
    if let Some(scoring) = args.scoring {
        options.scoring = Some(scoring);
    }

    fs::create_dir_all(&cli_args.root)?;
    let descriptor = IndexDescriptor::setup(&cli_args.root, &args.name, &options)?;

    output_result(
        "Index created successfully",
        &IndexCreationResult {
            name: descriptor.name.clone(),
            descriptor: descriptor.descriptor_path().display().to_string(),
            compression: descriptor.compression.to_string(),
        },
        cli_args,
    )
}

/// Index a collection.
fn build(args: &BuildArgs, cli_args: &PostlineArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => BuildConfig::from_json_file(path)?,
        None => BuildConfig::default(),
    };
    if let Some(threshold) = args.chunk_threshold {
        config.chunk_threshold = threshold;
    }
    if let Some(max_documents) = args.max_documents {
        config.max_documents = Some(max_documents);
    }
    if let Some(partitions) = args.partitions {
        config.partitions = partitions;
    }
    if let Some(threads) = args.threads {
        config.threads = Some(threads);
    }
    if args.keep_chunks {
        config.delete_chunks = false;
    }
    if args.keep_shards {
        config.delete_shards = false;
    }

    let descriptor = IndexDescriptor::load(&cli_args.root, &args.name)?;
    let normalizer = StandardNormalizer::new()?;

    let start_time = Instant::now();
    let (descriptor, report) = build_index(descriptor, &normalizer, &args.collection, &config)?;
    let duration = start_time.elapsed();

    output_result(
        "Build finished",
        &BuildResult {
            name: descriptor.name.clone(),
            total_documents: descriptor.num_docs,
            duration_ms: duration.as_millis() as u64,
            docs_per_second: if duration.as_secs_f64() > 0.0 {
                report.documents_indexed as f64 / duration.as_secs_f64()
            } else {
                0.0
            },
            report,
        },
        cli_args,
    )
}

fn query_config(args: &QueryArgs) -> Result<QueryConfig> {
    let mut config = match &args.config {
        Some(path) => QueryConfig::from_json_file(path)?,
        None => QueryConfig::default(),
    };
    if let Some(method) = args.method {
        config.search_method = method;
    }
    if let Some(step) = args.skip_step {
        config.skip_step = step;
    }
    if let Some(k1) = args.k1 {
        config.scoring.k1 = k1;
    }
    if let Some(b) = args.b {
        config.scoring.b = b;
    }
    if args.keep_doc_lengths {
        config.flush_doc_lengths_after_query = false;
    }
    Ok(config)
}

/// Run a single query or a batch.
fn query(args: &QueryArgs, cli_args: &PostlineArgs) -> Result<()> {
    if args.qrels.is_some() && args.queries.is_none() {
        return Err(PostlineError::query("--qrels needs a --queries file"));
    }
    let normalizer = StandardNormalizer::new()?;
    let mut engine =
        QueryEngine::open(&cli_args.root, &args.name, &normalizer, query_config(args)?)?;

    match (&args.query, &args.queries) {
        (_, Some(path)) => run_batch(&mut engine, path, args, cli_args),
        (Some(text), None) => run_single(&mut engine, text, cli_args),
        (None, None) => Err(PostlineError::query(
            "either a query or --queries is required",
        )),
    }
}

fn run_single(engine: &mut QueryEngine<'_>, text: &str, cli_args: &PostlineArgs) -> Result<()> {
    let start_time = Instant::now();
    let tokens = engine.prepare(text);
    let hits = engine.query(text)?;

    let mut ranked = Vec::with_capacity(hits.len());
    for (rank, hit) in hits.into_iter().enumerate() {
        let external_id = engine.doc_stat(hit.doc_id)?.map(|stat| stat.external_id);
        ranked.push(RankedDocument {
            rank,
            doc_id: hit.doc_id,
            external_id,
            score: hit.score,
        });
    }

    output_result(
        "Search results",
        &QueryResults {
            query: text.to_string(),
            tokens,
            hits: ranked,
            duration_ms: start_time.elapsed().as_millis() as u64,
            lookups: engine.lookup_stats(),
        },
        cli_args,
    )
}

fn run_batch(
    engine: &mut QueryEngine<'_>,
    path: &Path,
    args: &QueryArgs,
    cli_args: &PostlineArgs,
) -> Result<()> {
    let evaluator = match &args.qrels {
        Some(qrels) => Some(QrelsEvaluator::new(Qrels::load(qrels)?, args.cutoff)),
        None => None,
    };

    let text = fs::read_to_string(path)?;
    let start_time = Instant::now();
    let mut run = Vec::new();
    let mut queries = 0;
    let mut judged = 0;
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((query_id, query_text)) = line.split_once('\t') else {
            warn!("Skipping query line {}: expected `<id>\\t<text>`", number + 1);
            continue;
        };
        queries += 1;

        let hits = engine.query(query_text)?;
        let mut ranked = Vec::with_capacity(hits.len());
        for hit in hits {
            let external_id = engine
                .doc_stat(hit.doc_id)?
                .map_or_else(|| hit.doc_id.to_string(), |stat| stat.external_id);
            ranked.push((external_id, hit.score));
        }
        let entries = trec_run_lines(query_id, &ranked, &args.run_name);

        if let Some(evaluator) = &evaluator {
            let metrics = evaluator.evaluate(&entries)?;
            if !metrics.is_empty() {
                judged += 1;
                for (metric, value) in metrics {
                    *totals.entry(metric).or_insert(0.0) += value;
                }
            }
        }
        run.extend(entries);
    }

    if judged > 0 {
        for value in totals.values_mut() {
            *value /= judged as f64;
        }
    }
    info!("Ran {queries} queries, {judged} judged");

    output_result(
        "Query batch finished",
        &BatchResults {
            queries,
            run,
            metrics: totals,
            judged_queries: judged,
            duration_ms: start_time.elapsed().as_millis() as u64,
            lookups: engine.lookup_stats(),
        },
        cli_args,
    )
}

/// Describe an index.
fn show_info(args: &InfoArgs, cli_args: &PostlineArgs) -> Result<()> {
    let descriptor = IndexDescriptor::load(&cli_args.root, &args.name)?;

    let avg_doc_length = match &descriptor.stats_path {
        Some(path) if path.exists() => Some(DocStatsFile::scan_totals(path)?.avg_doc_length()),
        _ => None,
    };
    let index_size_bytes = descriptor
        .index_path
        .as_ref()
        .and_then(|path| fs::metadata(path).ok())
        .map(|metadata| metadata.len());

    output_result(
        "Index information",
        &IndexInfo {
            name: descriptor.name.clone(),
            stemming: descriptor.stemming,
            keep_stopwords: descriptor.keep_stopwords,
            compression: descriptor.compression.to_string(),
            k: descriptor.k,
            algorithm: descriptor.algorithm.map(|a| a.to_string()),
            scoring: descriptor.scoring.map(|s| s.to_string()),
            content: descriptor.content.to_string(),
            num_docs: descriptor.num_docs,
            index_rows: descriptor.index_rows,
            lexicon_rows: descriptor.lexicon_rows,
            avg_doc_length,
            index_size_bytes,
        },
        cli_args,
    )
}

/// Delete an index.
fn remove_index(args: &RemoveArgs, cli_args: &PostlineArgs) -> Result<()> {
    let descriptor = IndexDescriptor::load(&cli_args.root, &args.name)?;
    descriptor.remove()?;
    output_result(
        "Index removed",
        &RemovalResult {
            name: args.name.clone(),
        },
        cli_args,
    )
}
