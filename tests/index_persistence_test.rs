mod helpers;

use helpers::{unit, VecUnitSource};
use mnema::index::{Bm25Index, Corpus, IndexRegistry};
use mnema::storage::{MetadataStore, SqliteMetadataStore};

fn tokens(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn index_round_trips_through_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.db");

    // Build an index, persist it through the real store, drop everything.
    {
        let store = SqliteMetadataStore::open(&path).unwrap();
        let mut registry = IndexRegistry::new(
            Box::new(store),
            Box::new(VecUnitSource {
                units: vec![
                    unit(1, "fn parse_row(input: &str) -> Row", Some("parse_row")),
                    unit(2, "fn write_batch(rows: &[Row])", Some("write_batch")),
                ],
            }),
        );
        let index = registry.get(Corpus::Code).unwrap();
        assert_eq!(index.total_docs(), 2);
    }

    // Reopen: the blob loads without touching the (now empty) source.
    let store = SqliteMetadataStore::open(&path).unwrap();
    let mut registry = IndexRegistry::new(
        Box::new(store),
        Box::new(VecUnitSource { units: vec![] }),
    );
    let index = registry.get(Corpus::Code).unwrap();
    assert_eq!(index.total_docs(), 2);

    let hits = index.search("parse_row", &tokens(&["parse_row", "parse", "row"]), 10);
    assert_eq!(hits[0].id, 1);
}

#[test]
fn corrupt_blob_rebuilds_from_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.db");

    {
        let mut store = SqliteMetadataStore::open(&path).unwrap();
        store.put("bm25:docs", b"\x00\x01 definitely not json").unwrap();
    }

    let store = SqliteMetadataStore::open(&path).unwrap();
    let mut registry = IndexRegistry::new(
        Box::new(store),
        Box::new(VecUnitSource {
            units: vec![unit(9, "rebuilt after corruption", None)],
        }),
    );
    let index = registry.get(Corpus::Docs).unwrap();
    assert_eq!(index.total_docs(), 1);
    assert!(!index.search("rebuilt", &tokens(&["rebuilt"]), 10).is_empty());
}

#[test]
fn invalidation_deletes_only_that_corpus_blob() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.db");

    {
        let store = SqliteMetadataStore::open(&path).unwrap();
        let mut registry = IndexRegistry::new(
            Box::new(store),
            Box::new(VecUnitSource {
                units: vec![unit(1, "content shared by corpora", None)],
            }),
        );
        registry.get(Corpus::Docs).unwrap();
        registry.get(Corpus::Memories).unwrap();
        registry.invalidate(Corpus::Docs).unwrap();
    }

    let store = SqliteMetadataStore::open(&path).unwrap();
    assert!(store.get("bm25:docs").unwrap().is_none());
    assert!(store.get("bm25:memories").unwrap().is_some());
}

#[test]
fn structural_round_trip_equality() {
    let mut index = Bm25Index::new(Corpus::Code);
    index.add(1, &tokens(&["alpha", "beta", "alpha"]), Some("Alpha Beta"));
    index.add(2, &tokens(&["gamma", "delta"]), Some("Gamma"));
    index.remove(1);
    index.add(3, &tokens(&["epsilon"]), Some("Epsilon"));

    let blob = index.to_blob().unwrap();
    let restored = Bm25Index::from_blob(&blob).unwrap();

    // Behavior-identical: same stats, same scores for any query.
    assert_eq!(restored.total_docs(), index.total_docs());
    assert!((restored.avg_doc_length() - index.avg_doc_length()).abs() < 1e-12);
    for term in ["alpha", "gamma", "delta", "epsilon"] {
        let a = index.search(term, &tokens(&[term]), 10);
        let b = restored.search(term, &tokens(&[term]), 10);
        assert_eq!(a, b, "scores diverge for {term}");
    }
}
