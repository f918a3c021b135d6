//! Facet filters: the structured half of a card search.

use crate::document::release_timestamp;
use crate::model::{chain_key, Card, Color, Printing, Rarity};
use crate::query::{accepts_all, parse_search, Clause};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use time::OffsetDateTime;

/// Three-state facet selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    #[serde(alias = "TRUE")]
    Include,
    #[serde(alias = "FALSE")]
    Exclude,
    #[default]
    #[serde(alias = "UNSET")]
    Unset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetVote<T> {
    pub value: T,
    #[serde(default)]
    pub vote: Vote,
}

impl<T> FacetVote<T> {
    pub fn include(value: T) -> Self {
        Self { value, vote: Vote::Include }
    }

    pub fn exclude(value: T) -> Self {
        Self { value, vote: Vote::Exclude }
    }
}

/// Includes are OR-ed, excludes are AND-NOT, unset entries are ignored.
fn passes_votes<T>(votes: &[FacetVote<T>], mut matches: impl FnMut(&T) -> bool) -> bool {
    let mut wants_include = false;
    let mut included = false;
    for entry in votes {
        match entry.vote {
            Vote::Include => {
                wants_include = true;
                if !included && matches(&entry.value) {
                    included = true;
                }
            }
            Vote::Exclude => {
                if matches(&entry.value) {
                    return false;
                }
            }
            Vote::Unset => {}
        }
    }
    !wants_include || included
}

fn has_votes<T>(votes: &[FacetVote<T>]) -> bool {
    votes.iter().any(|v| v.vote != Vote::Unset)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegalityFilter {
    pub format: String,
    /// Votes on legality statuses (`legal`, `banned`, ...) for `format`.
    pub statuses: Vec<FacetVote<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChainRef {
    pub terminal_tag_id: String,
    pub chain_tag_ids: Vec<String>,
}

impl ChainRef {
    pub fn key(&self) -> String {
        let ids: Vec<&str> = self.chain_tag_ids.iter().map(String::as_str).collect();
        chain_key(&self.terminal_tag_id, &ids)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

/// Everything a caller can constrain. The default filter lets every card through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardFilter {
    pub search_string: Option<String>,
    pub deck_id: Option<String>,
    pub hide_ignored: bool,
    pub commander: Option<String>,
    pub is_selecting_commander: bool,
    pub colors: Vec<FacetVote<Color>>,
    /// Include keeps multicolor cards only, exclude keeps mono and colorless cards.
    pub multi_color: Vote,
    pub games: Vec<FacetVote<String>>,
    pub rarities: Vec<FacetVote<Rarity>>,
    /// `"0"` to `"9"`, or `"infinite"` for anything above nine.
    pub mana_costs: Vec<FacetVote<String>>,
    pub sets: Vec<FacetVote<String>>,
    pub legalities: Vec<LegalityFilter>,
    pub card_types: Vec<FacetVote<String>>,
    pub layouts: Vec<FacetVote<String>>,
    pub tags: Vec<FacetVote<String>>,
    pub chains: Vec<FacetVote<ChainRef>>,
    pub rating: Option<RatingRange>,
    pub hide_unreleased: bool,
}

/// Deck-scoped ignore lists, owned by whatever stores decks.
pub trait IgnoredCardSource: Send + Sync {
    fn ignored_card_ids(&self, deck_id: &str) -> Result<HashSet<String>>;
}

/// For callers without decks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnoredCards;

impl IgnoredCardSource for NoIgnoredCards {
    fn ignored_card_ids(&self, _deck_id: &str) -> Result<HashSet<String>> {
        Ok(HashSet::new())
    }
}

/// In-memory deck id -> ignored card ids.
#[derive(Debug, Default)]
pub struct MemoryIgnoredCards {
    decks: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryIgnoredCards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(decks: HashMap<String, Vec<String>>) -> Self {
        let decks = decks
            .into_iter()
            .map(|(deck, ids)| (deck, ids.into_iter().collect()))
            .collect();
        Self { decks: RwLock::new(decks) }
    }

    /// Parse `{"deckId": ["cardId", ...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let decks: HashMap<String, Vec<String>> =
            serde_json::from_str(json).context("parsing ignored cards")?;
        Ok(Self::from_map(decks))
    }

    pub fn set_ignored(&self, deck_id: &str, card_ids: impl IntoIterator<Item = String>) {
        self.decks.write().insert(deck_id.to_string(), card_ids.into_iter().collect());
    }

    pub fn deck_count(&self) -> usize {
        self.decks.read().len()
    }
}

impl IgnoredCardSource for MemoryIgnoredCards {
    fn ignored_card_ids(&self, deck_id: &str) -> Result<HashSet<String>> {
        Ok(self.decks.read().get(deck_id).cloned().unwrap_or_default())
    }
}

/// Per-invocation state resolved once before cards are evaluated.
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    pub commander: Option<Arc<Card>>,
    pub ignored: HashSet<String>,
    pub clauses: Vec<Clause>,
    /// UTC midnight of the current day, as a unix timestamp.
    pub today: i64,
}

impl FilterContext {
    /// Resolve the commander among `cards`, fetch the deck's ignore list and parse the search
    /// string. An ignore-list failure aborts the whole invocation.
    pub fn resolve(
        filter: &CardFilter,
        cards: &[Arc<Card>],
        ignored: &dyn IgnoredCardSource,
    ) -> Result<Self> {
        let commander = filter.commander.as_deref().and_then(|id| {
            let found = cards.iter().find(|c| c.id == id).cloned();
            if found.is_none() {
                tracing::debug!(commander = id, "commander not among candidate cards");
            }
            found
        });

        let ignored = match (&filter.deck_id, filter.hide_ignored) {
            (Some(deck_id), true) => ignored
                .ignored_card_ids(deck_id)
                .with_context(|| format!("loading ignored cards for deck {deck_id}"))?,
            _ => HashSet::new(),
        };

        let clauses = filter.search_string.as_deref().map(parse_search).unwrap_or_default();

        Ok(Self { commander, ignored, clauses, today: today_timestamp() })
    }

    pub fn with_today(mut self, today: i64) -> Self {
        self.today = today;
        self
    }
}

pub fn today_timestamp() -> i64 {
    OffsetDateTime::now_utc().date().midnight().assume_utc().unix_timestamp()
}

/// Printings that survive the games filter. Without game votes that is every printing.
pub fn effective_printings<'a>(card: &'a Card, games: &[FacetVote<String>]) -> Vec<&'a Printing> {
    if !has_votes(games) {
        return card.printings.iter().collect();
    }
    card.printings
        .iter()
        .filter(|p| {
            games.iter().all(|g| {
                let has = p.games.iter().any(|pg| pg.eq_ignore_ascii_case(&g.value));
                match g.vote {
                    Vote::Include => has,
                    Vote::Exclude => !has,
                    Vote::Unset => true,
                }
            })
        })
        .collect()
}

pub(crate) fn is_released(printing: &Printing, today: i64) -> bool {
    release_timestamp(&printing.released_at).is_some_and(|ts| ts <= today)
}

fn passes_commander(card: &Card, commander: &Card) -> bool {
    if commander.color_identity.is_empty() {
        return true;
    }
    card.color_identity
        .iter()
        .all(|c| *c == Color::Colorless || commander.color_identity.contains(c))
}

fn is_commander_candidate(card: &Card) -> bool {
    let t = &card.type_line;
    t.contains("Legendary") && (t.contains("Creature") || t.contains("Planeswalker"))
}

fn passes_colors(card: &Card, filter: &CardFilter) -> bool {
    let count = card.color_identity.len();
    match filter.multi_color {
        Vote::Include if count <= 1 => return false,
        Vote::Exclude if count > 1 => return false,
        _ => {}
    }
    passes_votes(&filter.colors, |c| card.color_identity.contains(c))
}

fn mana_cost_matches(card: &Card, value: &str) -> bool {
    let value = value.trim();
    if value.eq_ignore_ascii_case("infinite") {
        return card.cmc > 9.0;
    }
    value.parse::<f64>().is_ok_and(|v| card.cmc == v)
}

fn legality_statuses(printings: &[&Printing], format: &str) -> HashSet<String> {
    let mut statuses = HashSet::new();
    if format.is_empty() {
        return statuses;
    }
    for p in printings {
        for (key, status) in &p.legalities {
            if key.eq_ignore_ascii_case(format) {
                let status = status.trim().to_lowercase();
                if !status.is_empty() {
                    statuses.insert(status);
                }
            }
        }
    }
    statuses
}

fn layout_matches(card: &Card, printings: &[&Printing], layout: &str) -> bool {
    printings.iter().any(|p| {
        card.layout.eq_ignore_ascii_case(layout)
            || p.card_faces
                .iter()
                .filter_map(|f| f.layout.as_deref())
                .any(|l| l.eq_ignore_ascii_case(layout))
    })
}

fn card_tag_ids(card: &Card) -> HashSet<&str> {
    let mut ids = HashSet::new();
    for a in &card.tag_assignments {
        ids.insert(a.tag.id.as_str());
        ids.extend(a.chain.iter().map(|t| t.id.as_str()));
    }
    ids
}

fn passes_rating(card: &Card, range: &RatingRange) -> bool {
    match card.my_rating {
        None => range.min.is_none(),
        Some(r) => range.min.map_or(true, |min| r >= min) && range.max.map_or(true, |max| r <= max),
    }
}

/// Evaluate every filter for one card, cheapest and most selective checks first.
pub fn passes(card: &Card, filter: &CardFilter, ctx: &FilterContext) -> bool {
    if ctx.ignored.contains(&card.id) {
        return false;
    }
    if let Some(commander) = &ctx.commander {
        if !passes_commander(card, commander) {
            return false;
        }
    }
    if filter.is_selecting_commander && !is_commander_candidate(card) {
        return false;
    }
    if !accepts_all(&ctx.clauses, card) {
        return false;
    }
    if !passes_colors(card, filter) {
        return false;
    }

    let printings = effective_printings(card, &filter.games);
    if has_votes(&filter.games) && printings.is_empty() {
        return false;
    }

    if !passes_votes(&filter.rarities, |r| printings.iter().any(|p| p.rarity == *r)) {
        return false;
    }
    if !passes_votes(&filter.mana_costs, |v| mana_cost_matches(card, v)) {
        return false;
    }
    // an excluded set removes the card even when that printing is outside the games filter
    let set_ok = passes_votes(&filter.sets, |s| printings.iter().any(|p| p.set.eq_ignore_ascii_case(s)))
        && !filter
            .sets
            .iter()
            .filter(|s| s.vote == Vote::Exclude)
            .any(|s| card.printings.iter().any(|p| p.set.eq_ignore_ascii_case(&s.value)));
    if !set_ok {
        return false;
    }
    for legality in &filter.legalities {
        let statuses = legality_statuses(&printings, &legality.format);
        if !passes_votes(&legality.statuses, |s| statuses.contains(&s.trim().to_lowercase())) {
            return false;
        }
    }
    let type_line = card.type_line.to_lowercase();
    if !passes_votes(&filter.card_types, |t| type_line.contains(&t.to_lowercase())) {
        return false;
    }
    if !passes_votes(&filter.layouts, |l| layout_matches(card, &printings, l)) {
        return false;
    }

    if !filter.tags.is_empty() {
        let tag_ids = card_tag_ids(card);
        if !passes_votes(&filter.tags, |t| tag_ids.contains(t.as_str())) {
            return false;
        }
    }
    if !filter.chains.is_empty() {
        let keys: HashSet<String> = card.tag_assignments.iter().map(|a| a.chain_key()).collect();
        if !passes_votes(&filter.chains, |c| keys.contains(&c.key())) {
            return false;
        }
    }

    if let Some(range) = &filter.rating {
        if !passes_rating(card, range) {
            return false;
        }
    }
    if filter.hide_unreleased && !printings.iter().any(|p| is_released(p, ctx.today)) {
        return false;
    }
    true
}
