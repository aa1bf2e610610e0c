//! Query evaluation against one on-disk index.
//!
//! A query runs through five steps: prepare the tokens, fetch each token's
//! postings, combine them into a candidate set, score the candidates and rank
//! the top `k`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::analysis::TextNormalizer;
use crate::cache::LookupCache;
use crate::codec::{PostingBlock, decode_posting_block};
use crate::config::QueryConfig;
use crate::error::{PostlineError, Result};
use crate::index::{CollectionTotals, DocStat, DocStatsFile, IndexDescriptor, LexiconFile};
use crate::query::posting_list::PostingList;
use crate::query::scoring::{ScoringFunction, idf};
use crate::query::{JoinAlgorithm, SearchHit};

/// Hit and miss counts of the posting cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
}

type PostingKey = (PathBuf, String);

/// Read-only query engine holding its own handles on the index files.
#[derive(Debug)]
pub struct QueryEngine<'a> {
    descriptor: IndexDescriptor,
    normalizer: &'a dyn TextNormalizer,
    config: QueryConfig,
    algorithm: JoinAlgorithm,
    scoring: ScoringFunction,
    lexicon_path: PathBuf,
    lexicon: LexiconFile,
    index: File,
    stats: DocStatsFile,
    totals: CollectionTotals,
    postings: LookupCache<PostingKey, (u64, PostingBlock)>,
    doc_lengths: AHashMap<u64, Option<u64>>,
}

impl<'a> QueryEngine<'a> {
    /// Open the index `name` under `root`.
    ///
    /// Fails if the descriptor has no join algorithm or scoring function, or
    /// lacks one of its data paths.
    pub fn open<P: AsRef<Path>>(
        root: P,
        name: &str,
        normalizer: &'a dyn TextNormalizer,
        config: QueryConfig,
    ) -> Result<Self> {
        let descriptor = IndexDescriptor::load(root, name)?;
        Self::from_descriptor(descriptor, normalizer, config)
    }

    pub fn from_descriptor(
        descriptor: IndexDescriptor,
        normalizer: &'a dyn TextNormalizer,
        config: QueryConfig,
    ) -> Result<Self> {
        config.validate()?;
        let algorithm = descriptor.algorithm.ok_or_else(|| {
            PostlineError::config(format!("index '{}' has no join algorithm", descriptor.name))
        })?;
        let scoring = descriptor.scoring.ok_or_else(|| {
            PostlineError::config(format!(
                "index '{}' has no scoring function",
                descriptor.name
            ))
        })?;

        let paths = descriptor.require_paths()?;
        let lexicon_path = paths.lexicon.to_path_buf();
        let lexicon = LexiconFile::open(paths.lexicon, paths.index)?;
        let index = File::open(paths.index)?;
        let stats = DocStatsFile::open(paths.stats)?;
        let totals = DocStatsFile::scan_totals(paths.stats)?;

        info!(
            "Opened index '{}' ({} documents, {algorithm}, {scoring})",
            descriptor.name, totals.num_docs
        );

        Ok(QueryEngine {
            postings: LookupCache::new(config.cache_capacity),
            descriptor,
            normalizer,
            config,
            algorithm,
            scoring,
            lexicon_path,
            lexicon,
            index,
            stats,
            totals,
            doc_lengths: AHashMap::new(),
        })
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn totals(&self) -> CollectionTotals {
        self.totals
    }

    pub fn lookup_stats(&self) -> LookupStats {
        LookupStats {
            hits: self.postings.hits(),
            misses: self.postings.misses(),
        }
    }

    /// Normalize `query` the way the index was built, dropping repeated
    /// tokens.
    pub fn prepare(&self, query: &str) -> Vec<String> {
        let mut tokens = self.normalizer.normalize(
            query,
            self.descriptor.stemming,
            self.descriptor.keep_stopwords,
        );
        let mut seen = AHashSet::new();
        tokens.retain(|token| seen.insert(token.clone()));
        tokens
    }

    /// Postings of `token`; empty if the token is not in the lexicon.
    pub fn fetch(&mut self, token: &str) -> Result<PostingList> {
        let key = (self.lexicon_path.clone(), token.to_string());
        if let Some((doc_freq, block)) = self.postings.get(&key) {
            trace!("Cache hit for '{token}'");
            return Ok(PostingList::new(token, doc_freq, block));
        }

        let Some(hit) = self
            .lexicon
            .lookup(token, self.config.search_method, self.config.skip_step)?
        else {
            return Ok(PostingList::empty(token));
        };

        let mut bytes = vec![0u8; (hit.block.end - hit.block.start) as usize];
        self.index.seek(SeekFrom::Start(hit.block.start))?;
        self.index.read_exact(&mut bytes)?;
        let block = decode_posting_block(&bytes, self.descriptor.compression)?;
        if block.len() as u64 != hit.doc_freq {
            return Err(PostlineError::format(format!(
                "token '{token}' has {} postings but document frequency {}",
                block.len(),
                hit.doc_freq
            )));
        }

        self.postings.insert(key, (hit.doc_freq, block.clone()));
        Ok(PostingList::new(token, hit.doc_freq, block))
    }

    /// Candidate doc ids in ascending order.
    ///
    /// Conjunctive mode intersects the non-empty lists; disjunctive mode
    /// takes their union. Cursors are rewound afterwards.
    pub fn combine(&self, lists: &mut [PostingList]) -> Vec<u64> {
        let candidates = match self.algorithm {
            JoinAlgorithm::Conjunctive => intersect(lists),
            JoinAlgorithm::Disjunctive => {
                let mut union: Vec<u64> = lists
                    .iter()
                    .flat_map(|list| list.doc_ids().iter().copied())
                    .collect();
                union.sort_unstable();
                union.dedup();
                union
            }
        };
        for list in lists.iter_mut() {
            list.move_cursor(0);
        }
        candidates
    }

    /// Accumulate the weight of every token in every candidate document.
    pub fn score(&mut self, lists: &[PostingList], candidates: &[u64]) -> Result<Vec<SearchHit>> {
        let mut scores: AHashMap<u64, f64> = AHashMap::with_capacity(candidates.len());
        let avg_doc_length = self.totals.avg_doc_length();

        for list in lists {
            let idf = idf(self.totals.num_docs, list.doc_freq());
            for (doc_id, tf) in list.iter() {
                if candidates.binary_search(&doc_id).is_err() {
                    continue;
                }
                let doc_length = if self.scoring.needs_doc_length() {
                    self.doc_length(doc_id)?
                } else {
                    None
                };
                let weight = self.scoring.weight(
                    tf,
                    idf,
                    doc_length,
                    avg_doc_length,
                    &self.config.scoring,
                );
                *scores.entry(doc_id).or_insert(0.0) += weight;
            }
        }

        Ok(scores
            .into_iter()
            .map(|(doc_id, score)| SearchHit { doc_id, score })
            .collect())
    }

    /// Sort by descending score, ties by ascending doc id, and keep the top `k`.
    pub fn rank(&self, mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        hits.truncate(self.descriptor.k);
        hits
    }

    /// Run `query` end to end.
    pub fn query(&mut self, query: &str) -> Result<Vec<SearchHit>> {
        let tokens = self.prepare(query);
        let mut lists = tokens
            .iter()
            .map(|token| self.fetch(token))
            .collect::<Result<Vec<_>>>()?;
        let candidates = self.combine(&mut lists);
        let hits = self.score(&lists, &candidates)?;
        let ranked = self.rank(hits);

        debug!(
            "Query '{query}': {} tokens, {} candidates, {} results",
            tokens.len(),
            candidates.len(),
            ranked.len()
        );
        if self.config.flush_doc_lengths_after_query {
            self.doc_lengths.clear();
        }
        Ok(ranked)
    }

    /// Stats line of `doc_id`, e.g. to report its external id.
    pub fn doc_stat(&mut self, doc_id: u64) -> Result<Option<DocStat>> {
        self.stats
            .lookup(doc_id, self.config.search_method, self.config.skip_step)
    }

    fn doc_length(&mut self, doc_id: u64) -> Result<Option<u64>> {
        if self.config.cache_doc_lengths
            && let Some(&length) = self.doc_lengths.get(&doc_id)
        {
            return Ok(length);
        }
        let length = self.doc_stat(doc_id)?.map(|stat| stat.length);
        if self.config.cache_doc_lengths {
            self.doc_lengths.insert(doc_id, length);
        }
        Ok(length)
    }
}

/// Document-at-a-time intersection of the non-empty lists, driven by the
/// shortest one.
fn intersect(lists: &mut [PostingList]) -> Vec<u64> {
    let mut active: Vec<&mut PostingList> =
        lists.iter_mut().filter(|list| !list.is_empty()).collect();
    if active.is_empty() {
        return Vec::new();
    }
    active.sort_by_key(|list| list.len());

    let (driver, others) = active.split_at_mut(1);
    let mut candidates = Vec::new();
    'docs: for doc_id in driver[0].doc_ids().to_vec() {
        for list in others.iter_mut() {
            match list.next_geq(doc_id) {
                Some((found, _)) if found == doc_id => {}
                Some(_) => continue 'docs,
                None => break 'docs,
            }
        }
        candidates.push(doc_id);
    }
    candidates
}
