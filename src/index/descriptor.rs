//! Index descriptor files.
//!
//! A descriptor is a small text file, `<root>/<name>.descriptor`, holding one
//! field per line in a fixed order. The index data lives next to it in
//! `<root>/<name>/`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::codec::CompressionMode;
use crate::config::IndexOptions;
use crate::error::{PostlineError, Result};
use crate::index::ContentIntervals;
use crate::query::{JoinAlgorithm, ScoringFunction};

const UNSET: &str = "unset";
const FIELD_COUNT: usize = 14;

/// Persistent description of one index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    pub name: String,
    pub stemming: bool,
    pub keep_stopwords: bool,
    pub compression: CompressionMode,
    /// Doc ids already ingested.
    pub content: ContentIntervals,
    pub k: usize,
    pub algorithm: Option<JoinAlgorithm>,
    pub scoring: Option<ScoringFunction>,
    pub stats_path: Option<PathBuf>,
    pub index_path: Option<PathBuf>,
    pub lexicon_path: Option<PathBuf>,
    pub num_docs: u64,
    pub index_rows: u64,
    pub lexicon_rows: u64,
    descriptor_path: PathBuf,
}

/// The three data files of a ready index.
#[derive(Debug, Clone, Copy)]
pub struct IndexPaths<'a> {
    pub stats: &'a Path,
    pub index: &'a Path,
    pub lexicon: &'a Path,
}

impl IndexDescriptor {
    /// Location of the descriptor file for `name` under `root`.
    pub fn descriptor_path_for(root: &Path, name: &str) -> PathBuf {
        root.join(format!("{name}.descriptor"))
    }

    /// Create a new index under `root` and persist its descriptor.
    pub fn setup<P: AsRef<Path>>(root: P, name: &str, options: &IndexOptions) -> Result<Self> {
        let root = root.as_ref();
        if name.is_empty() || name.contains(['/', '\\']) || name.contains('\n') {
            return Err(PostlineError::invalid_argument(format!(
                "index name '{name}' is not a plain file name"
            )));
        }

        let descriptor_path = Self::descriptor_path_for(root, name);
        if descriptor_path.exists() {
            warn!("Overwriting existing descriptor {}", descriptor_path.display());
        }

        let data_dir = root.join(name);
        fs::create_dir_all(&data_dir)?;
        let index_file = if options.compression.is_compressed() {
            "index.bin"
        } else {
            "index.txt"
        };

        let descriptor = IndexDescriptor {
            name: name.to_string(),
            stemming: options.stemming,
            keep_stopwords: options.keep_stopwords,
            compression: options.compression,
            content: ContentIntervals::new(),
            k: options.k,
            algorithm: options.algorithm,
            scoring: options.scoring,
            stats_path: Some(data_dir.join("stats.txt")),
            index_path: Some(data_dir.join(index_file)),
            lexicon_path: Some(data_dir.join("lexicon.txt")),
            num_docs: 0,
            index_rows: 0,
            lexicon_rows: 0,
            descriptor_path,
        };
        descriptor.save()?;
        info!("Created index '{name}' in {}", root.display());
        Ok(descriptor)
    }

    /// Reload the descriptor of `name` from `root`.
    ///
    /// The stored name must match `name`.
    pub fn load<P: AsRef<Path>>(root: P, name: &str) -> Result<Self> {
        let descriptor_path = Self::descriptor_path_for(root.as_ref(), name);
        let text = fs::read_to_string(&descriptor_path).map_err(|e| {
            PostlineError::index(format!(
                "cannot read descriptor {}: {e}",
                descriptor_path.display()
            ))
        })?;

        let fields: Vec<&str> = text.lines().collect();
        if fields.len() < FIELD_COUNT {
            return Err(PostlineError::format(format!(
                "descriptor {} has {} fields, expected {FIELD_COUNT}",
                descriptor_path.display(),
                fields.len()
            )));
        }

        if fields[0] != name {
            return Err(PostlineError::index(format!(
                "descriptor {} belongs to index '{}', not '{name}'",
                descriptor_path.display(),
                fields[0]
            )));
        }

        let descriptor = IndexDescriptor {
            name: fields[0].to_string(),
            stemming: parse_flag(fields[1])?,
            keep_stopwords: parse_flag(fields[2])?,
            compression: fields[3].parse()?,
            content: fields[4].parse()?,
            k: parse_number(fields[5])? as usize,
            algorithm: parse_optional(fields[6])?,
            scoring: parse_optional(fields[7])?,
            stats_path: parse_path(fields[8]),
            index_path: parse_path(fields[9]),
            lexicon_path: parse_path(fields[10]),
            num_docs: parse_number(fields[11])?,
            index_rows: parse_number(fields[12])?,
            lexicon_rows: parse_number(fields[13])?,
            descriptor_path,
        };
        debug!("Loaded descriptor for index '{name}'");
        Ok(descriptor)
    }

    /// Write the descriptor file.
    pub fn save(&self) -> Result<()> {
        let optional = |value: Option<String>| value.unwrap_or_else(|| UNSET.to_string());
        let path = |value: &Option<PathBuf>| optional(value.as_ref().map(|p| p.display().to_string()));

        let fields = [
            self.name.clone(),
            self.stemming.to_string(),
            self.keep_stopwords.to_string(),
            self.compression.to_string(),
            self.content.to_string(),
            self.k.to_string(),
            optional(self.algorithm.map(|a| a.to_string())),
            optional(self.scoring.map(|s| s.to_string())),
            path(&self.stats_path),
            path(&self.index_path),
            path(&self.lexicon_path),
            self.num_docs.to_string(),
            self.index_rows.to_string(),
            self.lexicon_rows.to_string(),
        ];

        let mut text = fields.join("\n");
        text.push('\n');
        fs::write(&self.descriptor_path, text)?;
        Ok(())
    }

    /// Delete the descriptor and the three data files.
    pub fn remove(self) -> Result<()> {
        for path in [&self.stats_path, &self.index_path, &self.lexicon_path]
            .into_iter()
            .flatten()
        {
            remove_if_exists(path)?;
        }
        remove_if_exists(&self.descriptor_path)?;

        // The data directory only goes away when nothing else was left in it.
        if let Some(dir) = self.stats_path.as_deref().and_then(Path::parent)
            && fs::remove_dir(dir).is_err()
        {
            debug!("Leaving non-empty directory {}", dir.display());
        }
        info!("Removed index '{}'", self.name);
        Ok(())
    }

    /// Whether all three data paths are set.
    pub fn is_ready(&self) -> bool {
        self.stats_path.is_some() && self.index_path.is_some() && self.lexicon_path.is_some()
    }

    /// The three data paths, or an error naming the first missing one.
    pub fn require_paths(&self) -> Result<IndexPaths<'_>> {
        let missing = |what: &str| {
            PostlineError::index(format!("index '{}' has no {what} path", self.name))
        };
        Ok(IndexPaths {
            stats: self.stats_path.as_deref().ok_or_else(|| missing("doc-stats"))?,
            index: self.index_path.as_deref().ok_or_else(|| missing("index"))?,
            lexicon: self.lexicon_path.as_deref().ok_or_else(|| missing("lexicon"))?,
        })
    }

    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    /// Directory holding chunk and shard working files.
    pub fn work_dir(&self) -> PathBuf {
        match self.stats_path.as_deref().and_then(Path::parent) {
            Some(dir) => dir.to_path_buf(),
            None => self
                .descriptor_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    /// Add the rows written by a merge to both row counters.
    pub fn record_written_lines(&mut self, written_lines: u64) {
        self.index_rows += written_lines;
        self.lexicon_rows += written_lines;
    }

    /// Options the index was created with.
    pub fn options(&self) -> IndexOptions {
        IndexOptions {
            stemming: self.stemming,
            keep_stopwords: self.keep_stopwords,
            compression: self.compression,
            k: self.k,
            algorithm: self.algorithm,
            scoring: self.scoring,
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn parse_flag(field: &str) -> Result<bool> {
    match field.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(PostlineError::format(format!("invalid flag '{other}'"))),
    }
}

fn parse_number(field: &str) -> Result<u64> {
    field
        .trim()
        .parse()
        .map_err(|_| PostlineError::format(format!("invalid counter '{field}'")))
}

fn parse_optional<T: std::str::FromStr<Err = PostlineError>>(field: &str) -> Result<Option<T>> {
    match field.trim() {
        "" | UNSET => Ok(None),
        value => value.parse().map(Some),
    }
}

fn parse_path(field: &str) -> Option<PathBuf> {
    match field.trim() {
        "" | UNSET => None,
        value => Some(PathBuf::from(value)),
    }
}
