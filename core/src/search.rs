//! The search pipeline: filter, order, paginate.

use crate::catalog::CatalogIndex;
use crate::filter::{passes, CardFilter, FilterContext, IgnoredCardSource};
use crate::model::Card;
use crate::rank::{relevance_score, Comparator, SortCriterion};
use crate::tokenizer::tokenize;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    /// Zero-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 0, page_size: DEFAULT_PAGE_SIZE }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub filter: CardFilter,
    pub sort: Vec<SortCriterion>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchPage {
    pub cards: Vec<Arc<Card>>,
    /// Number of matching cards before pagination.
    pub total_count: usize,
}

/// `items[page * page_size ..]`, at most `page_size` long. Out-of-range pages are empty.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let start = page.saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Keep the cards that pass `filter`, stably sorted by `sort`. Cards that tie on every
/// criterion keep their input order.
pub fn filter_cards(
    cards: &[Arc<Card>],
    filter: &CardFilter,
    ctx: &FilterContext,
    sort: &[SortCriterion],
) -> Vec<Arc<Card>> {
    let mut out: Vec<Arc<Card>> = cards.iter().filter(|c| passes(c, filter, ctx)).cloned().collect();
    let comparator = Comparator::new(sort, filter, ctx.today);
    if !comparator.is_empty() {
        out.sort_by(|a, b| comparator.compare(a, b));
    }
    out
}

/// Run a request against the current catalog generation. Ties on the sort chain fall back to
/// relevance, highest first, then card id.
pub fn search(
    catalog: &CatalogIndex,
    ignored: &dyn IgnoredCardSource,
    request: &SearchRequest,
) -> Result<SearchPage> {
    let started = Instant::now();
    let snapshot = catalog.snapshot();
    if snapshot.is_empty() {
        tracing::warn!("card index not ready, returning empty result");
        return Ok(SearchPage::default());
    }

    let filter = &request.filter;
    let ctx = FilterContext::resolve(filter, snapshot.cards(), ignored)?;
    let query_text = ctx
        .clauses
        .iter()
        .filter_map(|c| c.relevance_text())
        .collect::<Vec<_>>()
        .join(" ");
    let tokens = tokenize(&query_text);

    let mut hits: Vec<(&Arc<Card>, f64)> = snapshot
        .cards()
        .iter()
        .enumerate()
        .filter(|(_, card)| passes(card, filter, &ctx))
        .map(|(pos, card)| {
            let score = snapshot
                .document_at(pos as u32)
                .map_or(0.0, |doc| relevance_score(doc, &tokens, &query_text));
            (card, score)
        })
        .collect();

    let comparator = Comparator::new(&request.sort, filter, ctx.today);
    hits.sort_by(|(a, score_a), (b, score_b)| {
        comparator
            .compare(a, b)
            .then_with(|| score_b.total_cmp(score_a))
            .then_with(|| a.id.cmp(&b.id))
    });

    let total_count = hits.len();
    let Pagination { page, page_size } = request.pagination;
    let cards: Vec<Arc<Card>> = paginate(&hits, page, page_size)
        .iter()
        .map(|(card, _)| Arc::clone(card))
        .collect();

    tracing::debug!(
        generation = snapshot.generation(),
        input_cards = snapshot.len(),
        total_count,
        paged_len = cards.len(),
        tokens = tokens.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "card search completed"
    );
    Ok(SearchPage { cards, total_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FacetVote, NoIgnoredCards};
    use crate::model::{Color, Printing};
    use crate::rank::SortBy;

    fn card(id: &str, name: &str, released: &str) -> Card {
        Card {
            id: id.into(),
            name: name.into(),
            type_line: "Artifact".into(),
            printings: vec![Printing {
                set: format!("s{id}"),
                released_at: released.into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn paginate_slices_and_never_fails() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(paginate(&items, 2, 10), &items[20..25]);
        assert_eq!(paginate(&items, 0, 10), &items[0..10]);
        assert!(paginate(&items, 5, 10).is_empty());
        assert!(paginate(&items, 0, 0).is_empty());
        assert!(paginate(&items, usize::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn empty_filter_and_sort_is_identity() {
        let cards: Vec<Arc<Card>> = vec![
            Arc::new(card("3", "Zodiac", "2001-01-01")),
            Arc::new(card("1", "Aether", "2002-01-01")),
            Arc::new(card("2", "Mox", "")),
        ];
        let filter = CardFilter::default();
        let ctx = FilterContext::resolve(&filter, &cards, &NoIgnoredCards).unwrap();
        let out = filter_cards(&cards, &filter, &ctx, &[]);
        assert_eq!(out.len(), cards.len());
        assert!(out.iter().zip(&cards).all(|(a, b)| Arc::ptr_eq(a, b)));
    }

    #[test]
    fn filter_cards_sorts_stably() {
        let mut a = card("a", "Same", "");
        a.cmc = 2.0;
        let mut b = card("b", "Same", "");
        b.cmc = 1.0;
        let c = card("c", "Same", "");
        let cards: Vec<Arc<Card>> = vec![Arc::new(a), Arc::new(b), Arc::new(c)];
        let filter = CardFilter::default();
        let ctx = FilterContext::resolve(&filter, &cards, &NoIgnoredCards).unwrap();
        let ids: Vec<String> = filter_cards(&cards, &filter, &ctx, &[SortCriterion::asc(SortBy::Name)])
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn not_ready_yields_empty_page() {
        let catalog = CatalogIndex::new();
        let page = search(&catalog, &NoIgnoredCards, &SearchRequest::default()).unwrap();
        assert!(page.cards.is_empty());
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn newer_printing_wins_without_sort() {
        let catalog = CatalogIndex::new();
        catalog.rebuild(vec![
            card("old", "Timeless Relic", "2005-06-15"),
            card("new", "Timeless Relic", "2023-06-15"),
        ]);
        let page = search(&catalog, &NoIgnoredCards, &SearchRequest::default()).unwrap();
        let ids: Vec<&str> = page.cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn sort_chain_beats_relevance() {
        let catalog = CatalogIndex::new();
        catalog.rebuild(vec![
            card("1", "Goblin King", "2020-01-01"),
            card("2", "Academy Goblin", "2000-01-01"),
            card("3", "Goblin", "2010-01-01"),
        ]);
        let mut request = SearchRequest {
            filter: CardFilter { search_string: Some("goblin".into()), ..Default::default() },
            ..Default::default()
        };
        let by_relevance = search(&catalog, &NoIgnoredCards, &request).unwrap();
        assert_eq!(by_relevance.cards[0].id, "3");

        request.sort = vec![SortCriterion::asc(SortBy::Name)];
        let by_name = search(&catalog, &NoIgnoredCards, &request).unwrap();
        let names: Vec<&str> = by_name.cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Academy Goblin", "Goblin", "Goblin King"]);
    }

    #[test]
    fn paginates_with_total_count() {
        let catalog = CatalogIndex::new();
        catalog.rebuild((0..25).map(|i| card(&format!("{i:02}"), &format!("Card {i:02}"), "")).collect());
        let request = SearchRequest {
            sort: vec![SortCriterion::asc(SortBy::Name)],
            pagination: Pagination { page: 2, page_size: 10 },
            ..Default::default()
        };
        let page = search(&catalog, &NoIgnoredCards, &request).unwrap();
        assert_eq!(page.total_count, 25);
        let ids: Vec<&str> = page.cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["20", "21", "22", "23", "24"]);
    }

    #[test]
    fn facet_filters_apply_in_search() {
        let catalog = CatalogIndex::new();
        let mut red = card("r", "Shock", "");
        red.color_identity = vec![Color::Red];
        let mut blue = card("u", "Opt", "");
        blue.color_identity = vec![Color::Blue];
        catalog.rebuild(vec![red, blue]);
        let request = SearchRequest {
            filter: CardFilter { colors: vec![FacetVote::exclude(Color::Red)], ..Default::default() },
            ..Default::default()
        };
        let page = search(&catalog, &NoIgnoredCards, &request).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.cards[0].id, "u");
    }
}
