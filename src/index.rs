//! On-disk index layout.
//!
//! An index consists of a descriptor plus three data files:
//! - the doc-stats file (`docid,external_id,length` per document),
//! - the index file (posting blocks, text or bit-packed),
//! - the lexicon (`token;doc_freq;offset` per token, sorted by token).

pub mod content;
pub mod descriptor;
pub mod doc_stats;
pub mod lexicon;

pub use content::ContentIntervals;
pub use descriptor::{IndexDescriptor, IndexPaths};
pub use doc_stats::{CollectionTotals, DocStat, DocStatsFile, DocStatsWriter};
pub use lexicon::{LexiconEntry, LexiconFile, LexiconHit};
