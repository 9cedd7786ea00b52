//! Per-corpus index ownership and lifecycle.
//!
//! [`IndexRegistry`] replaces the original module-level singletons with an
//! explicit owner: one [`Bm25Index`] per corpus, loaded from the injected
//! [`MetadataStore`] on first use and rebuilt from the [`UnitSource`] when the
//! persisted blob is missing or corrupt. Rebuilds page through the source in
//! fixed-size batches to bound peak memory.

use std::collections::HashMap;

use anyhow::Result;

use super::{unit_tokens, Bm25Index, Corpus, IndexedUnit};
use crate::segment::FlatcaseSegmenter;
use crate::storage::MetadataStore;

/// Units fetched per page during a full rebuild.
pub const REBUILD_BATCH_SIZE: usize = 5000;

/// Paginated access to the indexable units of a corpus.
pub trait UnitSource: Send {
    /// Fetch up to `limit` units starting at `offset`, in stable id order.
    fn fetch_page(&self, corpus: Corpus, offset: usize, limit: usize) -> Result<Vec<IndexedUnit>>;
}

/// Owns one BM25 index per corpus, with explicit invalidation.
pub struct IndexRegistry {
    store: Box<dyn MetadataStore>,
    source: Box<dyn UnitSource>,
    indexes: HashMap<Corpus, Bm25Index>,
    /// When present, flatcase identifiers in code units are segmented and
    /// their parts indexed alongside the originals.
    segmenter: Option<FlatcaseSegmenter>,
}

impl IndexRegistry {
    pub fn new(store: Box<dyn MetadataStore>, source: Box<dyn UnitSource>) -> Self {
        Self {
            store,
            source,
            indexes: HashMap::new(),
            segmenter: None,
        }
    }

    /// Enable flatcase segmentation during indexing.
    pub fn with_segmenter(mut self, segmenter: FlatcaseSegmenter) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    /// Get the index for a corpus, loading or rebuilding as needed.
    ///
    /// A corrupt or unparseable persisted blob is treated as a cache miss and
    /// triggers a rebuild — never an error.
    pub fn get(&mut self, corpus: Corpus) -> Result<&Bm25Index> {
        if !self.indexes.contains_key(&corpus) {
            let index = self.load_or_rebuild(corpus)?;
            self.indexes.insert(corpus, index);
        }
        Ok(&self.indexes[&corpus])
    }

    /// Incrementally index one unit and re-persist the corpus blob.
    pub fn apply_add(&mut self, corpus: Corpus, unit: &IndexedUnit) -> Result<()> {
        self.get(corpus)?;
        let tokens = self.tokens_for(corpus, unit);
        let index = self.indexes.get_mut(&corpus).expect("index loaded above");
        let raw = corpus.retains_raw_content().then_some(unit.content.as_str());
        index.add(unit.id, &tokens, raw);
        self.persist(corpus)
    }

    /// Incrementally remove one unit and re-persist the corpus blob.
    pub fn apply_remove(&mut self, corpus: Corpus, id: i64) -> Result<()> {
        self.get(corpus)?;
        let index = self.indexes.get_mut(&corpus).expect("index loaded above");
        index.remove(id);
        self.persist(corpus)
    }

    /// Drop the cached index for a corpus and delete its persisted blob.
    ///
    /// Called when the corpus was written through a path this registry cannot
    /// see. Only the named corpus is affected.
    pub fn invalidate(&mut self, corpus: Corpus) -> Result<()> {
        self.indexes.remove(&corpus);
        self.store.delete(&blob_key(corpus))?;
        tracing::debug!(corpus = %corpus, "index invalidated");
        Ok(())
    }

    /// Drop all cached indexes without touching persisted blobs.
    pub fn close(&mut self) {
        self.indexes.clear();
    }

    fn load_or_rebuild(&mut self, corpus: Corpus) -> Result<Bm25Index> {
        if let Some(blob) = self.store.get(&blob_key(corpus))? {
            match Bm25Index::from_blob(&blob) {
                Ok(index) => return Ok(index),
                Err(error) => {
                    tracing::warn!(
                        corpus = %corpus,
                        %error,
                        "persisted index blob unreadable, rebuilding"
                    );
                }
            }
        }
        let index = self.rebuild(corpus)?;
        self.store.put(&blob_key(corpus), &index.to_blob()?)?;
        Ok(index)
    }

    /// Full rebuild, paging through the unit source.
    fn rebuild(&mut self, corpus: Corpus) -> Result<Bm25Index> {
        let mut index = Bm25Index::new(corpus);
        let mut offset = 0;
        loop {
            let page = self.source.fetch_page(corpus, offset, REBUILD_BATCH_SIZE)?;
            let page_len = page.len();
            for unit in &page {
                let tokens = self.tokens_for(corpus, unit);
                let raw = corpus.retains_raw_content().then_some(unit.content.as_str());
                index.add(unit.id, &tokens, raw);
            }
            if page_len < REBUILD_BATCH_SIZE {
                break;
            }
            offset += page_len;
        }
        tracing::info!(corpus = %corpus, docs = index.total_docs(), "index rebuilt");
        Ok(index)
    }

    /// Corpus tokenization plus optional flatcase expansion.
    ///
    /// The segmenter observes every token stream it expands, so its frequency
    /// model tracks the indexed corpus.
    fn tokens_for(&mut self, corpus: Corpus, unit: &IndexedUnit) -> Vec<String> {
        let tokens = unit_tokens(corpus, unit);
        match (&mut self.segmenter, corpus) {
            (Some(segmenter), Corpus::Code) => {
                segmenter.observe_tokens(tokens.iter().map(String::as_str));
                segmenter.expand_tokens(&tokens)
            }
            _ => tokens,
        }
    }

    fn persist(&mut self, corpus: Corpus) -> Result<()> {
        let blob = self.indexes[&corpus].to_blob()?;
        self.store.put(&blob_key(corpus), &blob)
    }
}

fn blob_key(corpus: Corpus) -> String {
    format!("bm25:{corpus}")
}
