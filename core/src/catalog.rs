//! The process-wide card registry.
//!
//! A [`CatalogIndex`] owns one immutable [`CatalogSnapshot`] at a time. Readers clone the
//! snapshot `Arc` under a short read lock and then work without holding any lock; writers build
//! the next generation off to the side and swap it in.

use crate::document::CardDocument;
use crate::index::{DocId, IndexMetrics, InvertedIndex};
use crate::model::{Card, TagAssignment};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// One catalog generation.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    generation: u64,
    cards: Vec<Arc<Card>>,
    documents: Arc<Vec<CardDocument>>,
    positions: Arc<HashMap<String, DocId>>,
    index: Arc<InvertedIndex>,
    built_at: Option<OffsetDateTime>,
    build_duration: Duration,
}

impl CatalogSnapshot {
    /// Derive documents and the inverted index for `cards`. Cards without an id are skipped;
    /// of several cards sharing an id only the first is kept.
    pub fn build(cards: Vec<Card>, generation: u64) -> Self {
        let started = Instant::now();
        let mut kept: Vec<Arc<Card>> = Vec::with_capacity(cards.len());
        let mut positions: HashMap<String, DocId> = HashMap::with_capacity(cards.len());
        for card in cards {
            if card.id.is_empty() {
                tracing::warn!(name = %card.name, "skipping card without id");
                continue;
            }
            if positions.contains_key(&card.id) {
                tracing::warn!(card_id = %card.id, "duplicate card id in catalog, keeping first");
                continue;
            }
            positions.insert(card.id.clone(), kept.len() as DocId);
            kept.push(Arc::new(card));
        }

        let documents: Vec<CardDocument> =
            kept.iter().map(|c| CardDocument::from_card(c)).collect();
        let index = InvertedIndex::build(&documents);

        Self {
            generation,
            cards: kept,
            documents: Arc::new(documents),
            positions: Arc::new(positions),
            index: Arc::new(index),
            built_at: Some(OffsetDateTime::now_utc()),
            build_duration: started.elapsed(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cards(&self) -> &[Arc<Card>] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn doc_id(&self, card_id: &str) -> Option<DocId> {
        self.positions.get(card_id).copied()
    }

    pub fn card(&self, card_id: &str) -> Option<&Arc<Card>> {
        self.doc_id(card_id).map(|pos| &self.cards[pos as usize])
    }

    pub fn document(&self, card_id: &str) -> Option<&CardDocument> {
        self.doc_id(card_id).map(|pos| &self.documents[pos as usize])
    }

    pub fn document_at(&self, doc_id: DocId) -> Option<&CardDocument> {
        self.documents.get(doc_id as usize)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogMetrics {
    pub ready: bool,
    pub generation: u64,
    #[serde(flatten)]
    pub index: IndexMetrics,
    /// RFC 3339, absent before the first rebuild.
    pub last_updated: Option<String>,
    pub build_duration_ms: u64,
}

/// Multi-reader, single-writer registry around the current [`CatalogSnapshot`].
#[derive(Debug, Default)]
pub struct CatalogIndex {
    current: RwLock<Arc<CatalogSnapshot>>,
    /// Serializes rebuilds and card patches so a patch never lands on a discarded generation.
    writer: Mutex<()>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole catalog. Empty input leaves an empty, not-ready index.
    pub fn rebuild(&self, cards: Vec<Card>) {
        let _writer = self.writer.lock();
        tracing::info!(total_cards = cards.len(), "building card inverted index");
        let generation = self.current.read().generation + 1;
        let snapshot = CatalogSnapshot::build(cards, generation);
        let metrics = snapshot.index.metrics();
        let build_duration = snapshot.build_duration;
        *self.current.write() = Arc::new(snapshot);
        tracing::info!(
            generation,
            total_cards = metrics.total_documents,
            unique_terms = metrics.unique_terms,
            postings = metrics.total_postings,
            build_ms = build_duration.as_millis() as u64,
            "card inverted index built"
        );
    }

    pub fn is_ready(&self) -> bool {
        !self.current.read().is_empty()
    }

    /// The current generation. Hold on to it for as long as a query needs a consistent view.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn all_cards(&self) -> Vec<Arc<Card>> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            tracing::warn!("card index is empty, consider rebuilding it");
        }
        snapshot.cards.clone()
    }

    /// Swap one card's tag assignments without re-deriving documents or postings.
    /// Returns `false` when the card is not part of the current generation.
    pub fn update_card_tag_assignments(&self, card_id: &str, assignments: Vec<TagAssignment>) -> bool {
        let patched = self.patch_card(card_id, |card| card.tag_assignments = assignments);
        if patched {
            tracing::debug!(card_id, "updated card tag assignments");
        }
        patched
    }

    /// Set or clear one card's rating. Same contract as [`Self::update_card_tag_assignments`].
    pub fn update_card_rating(&self, card_id: &str, rating: Option<i32>) -> bool {
        let patched = self.patch_card(card_id, |card| card.my_rating = rating);
        if patched {
            tracing::debug!(card_id, ?rating, "updated card rating");
        }
        patched
    }

    // Ratings and tags are not indexed, so the documents and postings are shared with the
    // previous snapshot and the generation stays the same.
    fn patch_card(&self, card_id: &str, patch: impl FnOnce(&mut Card)) -> bool {
        let _writer = self.writer.lock();
        let mut guard = self.current.write();
        let Some(pos) = guard.doc_id(card_id) else {
            tracing::warn!(card_id, "card not found for metadata update");
            return false;
        };
        let mut next = CatalogSnapshot::clone(&guard);
        let mut card = Card::clone(&next.cards[pos as usize]);
        patch(&mut card);
        next.cards[pos as usize] = Arc::new(card);
        *guard = Arc::new(next);
        true
    }

    pub fn metrics(&self) -> CatalogMetrics {
        let snapshot = self.snapshot();
        CatalogMetrics {
            ready: !snapshot.is_empty(),
            generation: snapshot.generation,
            index: snapshot.index.metrics(),
            last_updated: snapshot.built_at.and_then(|t| t.format(&Rfc3339).ok()),
            build_duration_ms: snapshot.build_duration.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;

    fn card(id: &str, name: &str) -> Card {
        Card {
            id: id.into(),
            name: name.into(),
            type_line: "Artifact".into(),
            ..Default::default()
        }
    }

    #[test]
    fn starts_empty_and_not_ready() {
        let catalog = CatalogIndex::new();
        assert!(!catalog.is_ready());
        assert!(catalog.all_cards().is_empty());
        assert_eq!(catalog.metrics().last_updated, None);
    }

    #[test]
    fn rebuild_swaps_generation() {
        let catalog = CatalogIndex::new();
        catalog.rebuild(vec![card("1", "Sol Ring")]);
        let first = catalog.snapshot();
        catalog.rebuild(vec![card("2", "Mox Pearl"), card("3", "Black Lotus")]);

        // the old reader still sees its own generation
        assert_eq!(first.len(), 1);
        assert_eq!(first.card("1").map(|c| c.name.as_str()), Some("Sol Ring"));

        let second = catalog.snapshot();
        assert_eq!(second.generation(), first.generation() + 1);
        assert_eq!(second.len(), 2);
        assert!(second.card("1").is_none());
        assert!(catalog.metrics().last_updated.is_some());
    }

    #[test]
    fn empty_rebuild_is_not_ready() {
        let catalog = CatalogIndex::new();
        catalog.rebuild(vec![card("1", "Sol Ring")]);
        assert!(catalog.is_ready());
        catalog.rebuild(Vec::new());
        assert!(!catalog.is_ready());
        assert_eq!(catalog.metrics().index.total_documents, 0);
    }

    #[test]
    fn duplicate_and_blank_ids_are_dropped() {
        let snapshot = CatalogSnapshot::build(
            vec![card("1", "First"), card("1", "Second"), card("", "Nameless")],
            1,
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.card("1").unwrap().name, "First");
    }

    #[test]
    fn tag_patch_leaves_index_alone() {
        let catalog = CatalogIndex::new();
        catalog.rebuild(vec![card("1", "Sol Ring"), card("2", "Mana Vault")]);
        let before = catalog.snapshot();

        let assignment = TagAssignment {
            tag: Tag { id: "ramp".into(), name: "Ramp".into() },
            chain: Vec::new(),
        };
        assert!(catalog.update_card_tag_assignments("1", vec![assignment.clone()]));
        assert!(!catalog.update_card_tag_assignments("missing", Vec::new()));

        let after = catalog.snapshot();
        assert_eq!(after.card("1").unwrap().tag_assignments, vec![assignment]);
        assert!(before.card("1").unwrap().tag_assignments.is_empty());
        assert!(std::ptr::eq(before.index(), after.index()));
        assert_eq!(after.generation(), before.generation());
        assert!(Arc::ptr_eq(&before.cards()[1], &after.cards()[1]));
    }

    #[test]
    fn rating_patch_leaves_index_alone() {
        let catalog = CatalogIndex::new();
        catalog.rebuild(vec![card("1", "Sol Ring"), card("2", "Mana Vault")]);
        let before = catalog.snapshot();

        assert!(catalog.update_card_rating("1", Some(4)));
        assert!(!catalog.update_card_rating("missing", Some(1)));

        let after = catalog.snapshot();
        assert_eq!(after.card("1").unwrap().my_rating, Some(4));
        assert_eq!(before.card("1").unwrap().my_rating, None);
        assert!(std::ptr::eq(before.index(), after.index()));
        assert_eq!(after.generation(), before.generation());

        assert!(catalog.update_card_rating("1", None));
        assert_eq!(catalog.snapshot().card("1").unwrap().my_rating, None);
    }

    #[test]
    fn readers_see_whole_generations_during_rebuilds() {
        // generation n holds exactly n cards named "gen-n"
        fn generation_cards(n: usize) -> Vec<Card> {
            (0..n).map(|i| card(&i.to_string(), &format!("gen-{n}"))).collect()
        }

        let catalog = Arc::new(CatalogIndex::new());
        catalog.rebuild(generation_cards(1));

        let writer = {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || {
                for n in 2..=50 {
                    catalog.rebuild(generation_cards(n));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                std::thread::spawn(move || {
                    let mut last_generation = 0;
                    for _ in 0..200 {
                        let snapshot = catalog.snapshot();
                        let n = snapshot.len();
                        assert!(n >= 1);
                        assert_eq!(snapshot.generation(), n as u64);
                        assert!(snapshot.generation() >= last_generation);
                        last_generation = snapshot.generation();
                        let expected = format!("gen-{n}");
                        for (pos, c) in snapshot.cards().iter().enumerate() {
                            assert_eq!(c.name, expected);
                            assert_eq!(snapshot.document_at(pos as DocId).map(|d| d.card_id.as_str()), Some(c.id.as_str()));
                        }
                        assert_eq!(snapshot.index().metrics().total_documents, n);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(catalog.snapshot().generation(), 50);
        assert_eq!(catalog.snapshot().len(), 50);
    }
}
