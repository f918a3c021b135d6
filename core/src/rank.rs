//! Ordering of search results: the caller's sort chain and the relevance score.

use crate::document::{release_timestamp, CardDocument};
use crate::filter::{effective_printings, is_released, CardFilter, FacetVote};
use crate::model::{default_printing, Card, Printing};
use crate::tokenizer::normalize;
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::str::FromStr;

const NAME_WEIGHT: f64 = 1_000_000.0;
const ORACLE_WEIGHT: f64 = 10_000.0;
const TYPE_WEIGHT: f64 = 100.0;
const COLOR_WEIGHT: f64 = 1.0;
/// Per-tier hit counts are capped so a tier never spills into the one above it.
const TIER_CAP: u32 = 99;
const EXACT_NAME_BONUS: u32 = 50;
const NAME_SUBSTRING_BONUS: u32 = 25;
const SECONDS_PER_DAY: i64 = 86_400;
const RECENCY_DAYS_SCALE: f64 = 100_000.0;

fn tier(count: u32) -> f64 {
    f64::from(count.min(TIER_CAP))
}

/// Recency contribution, always in `[0, 1)` so it only breaks ties below the color tier.
fn recency(doc: &CardDocument) -> f64 {
    match doc.latest_release {
        Some(ts) if ts > 0 => ((ts / SECONDS_PER_DAY) as f64 / RECENCY_DAYS_SCALE).min(0.999),
        _ => 0.0,
    }
}

/// Tiered score: name hits dominate oracle hits, which dominate type-line hits, then color
/// tokens, then the latest printing date.
pub fn relevance_score(doc: &CardDocument, tokens: &[String], raw_query: &str) -> f64 {
    let raw = normalize(raw_query);
    let mut name = 0u32;
    if !raw.is_empty() {
        if doc.normalized_name == raw {
            name += EXACT_NAME_BONUS;
        } else if doc.normalized_name.contains(&raw) {
            name += NAME_SUBSTRING_BONUS;
        }
    }

    let (mut oracle, mut type_line, mut color) = (0u32, 0u32, 0u32);
    for token in tokens {
        if doc.name_tokens.contains_key(token) {
            name += 1;
        }
        if doc.oracle_tokens.contains_key(token) || doc.keyword_tokens.contains(token) {
            oracle += 1;
        }
        if doc.type_tokens.contains_key(token) {
            type_line += 1;
        }
        if doc.has_color_token(token) {
            color += 1;
        }
    }

    tier(name) * NAME_WEIGHT
        + tier(oracle) * ORACLE_WEIGHT
        + tier(type_line) * TYPE_WEIGHT
        + tier(color) * COLOR_WEIGHT
        + recency(doc)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[serde(alias = "NAME")]
    Name,
    #[serde(alias = "CMC")]
    Cmc,
    #[serde(alias = "COLOR")]
    Color,
    #[serde(alias = "RARITY")]
    Rarity,
    #[serde(alias = "TYPE")]
    Type,
    #[serde(alias = "SET")]
    Set,
    #[serde(alias = "RELEASED_AT")]
    ReleasedAt,
}

impl FromStr for SortBy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_lowercase().as_str() {
            "name" => SortBy::Name,
            "cmc" => SortBy::Cmc,
            "color" => SortBy::Color,
            "rarity" => SortBy::Rarity,
            "type" => SortBy::Type,
            "set" => SortBy::Set,
            "releasedat" | "released_at" | "released" => SortBy::ReleasedAt,
            other => bail!("unknown sort key: {other}"),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortCriterion {
    pub sort_by: SortBy,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SortCriterion {
    pub fn asc(sort_by: SortBy) -> Self {
        Self { sort_by, direction: Direction::Asc, enabled: true }
    }

    pub fn desc(sort_by: SortBy) -> Self {
        Self { sort_by, direction: Direction::Desc, enabled: true }
    }

    /// Parse `name:asc,cmc:desc`. A missing direction means ascending.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for SortCriterion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, dir) = s.split_once(':').unwrap_or((s, "asc"));
        let direction = match dir.trim().to_lowercase().as_str() {
            "asc" => Direction::Asc,
            "desc" => Direction::Desc,
            other => return Err(anyhow!("unknown sort direction: {other}")),
        };
        Ok(Self { sort_by: key.parse()?, direction, enabled: true })
    }
}

fn sort_name(name: &str) -> String {
    match name.strip_prefix("A-") {
        Some(rest) => format!("{rest}2"),
        None => name.to_string(),
    }
}

fn is_land(type_line: &str) -> bool {
    type_line.contains("Land") && !type_line.contains("//")
}

fn is_basic_land(type_line: &str) -> bool {
    type_line.contains("Basic Land") && !type_line.contains("//")
}

fn color_string(card: &Card) -> String {
    card.color_identity.iter().map(|c| c.sort_letter()).collect()
}

/// Non-lands first, then fewer colors, then WUBRG-ish order, then basics before non-basics.
fn compare_color(a: &Card, b: &Card) -> Ordering {
    is_land(&a.type_line)
        .cmp(&is_land(&b.type_line))
        .then_with(|| a.color_identity.len().cmp(&b.color_identity.len()))
        .then_with(|| color_string(a).cmp(&color_string(b)))
        .then_with(|| is_basic_land(&b.type_line).cmp(&is_basic_land(&a.type_line)))
}

fn type_ordinal(word: &str) -> u32 {
    match word {
        "Artifact" => 1,
        "Basic" => 2,
        "Battle" => 3,
        "Creature" => 4,
        "Enchantment" => 5,
        "Instant" => 6,
        "Kindred" => 7,
        "Land" => 8,
        "Legendary" => 9,
        "Planeswalker" => 10,
        "Snow" => 11,
        "Sorcery" => 12,
        _ => 0,
    }
}

fn type_value(card: &Card) -> u32 {
    let words: HashSet<&str> = card.type_line.split_whitespace().collect();
    words.into_iter().map(type_ordinal).sum()
}

/// Compares cards by an ordered chain of sort keys.
#[derive(Debug, Clone)]
pub struct Comparator<'a> {
    criteria: Vec<SortCriterion>,
    games: &'a [FacetVote<String>],
    hide_unreleased: bool,
    today: i64,
}

impl<'a> Comparator<'a> {
    /// Disabled criteria are dropped. Game votes and `hide_unreleased` from `filter` narrow the
    /// printings consulted by the rarity, set and release keys.
    pub fn new(sort: &[SortCriterion], filter: &'a CardFilter, today: i64) -> Self {
        Self {
            criteria: sort.iter().copied().filter(|c| c.enabled).collect(),
            games: &filter.games,
            hide_unreleased: filter.hide_unreleased,
            today,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// First non-equal criterion wins; `Equal` when every criterion ties.
    pub fn compare(&self, a: &Card, b: &Card) -> Ordering {
        for criterion in &self.criteria {
            let ord = self.compare_by(a, b, criterion);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn compare_by(&self, a: &Card, b: &Card, criterion: &SortCriterion) -> Ordering {
        let desc = criterion.direction == Direction::Desc;
        let ord = match criterion.sort_by {
            SortBy::Name => sort_name(&a.name).cmp(&sort_name(&b.name)),
            SortBy::Cmc => a.cmc.total_cmp(&b.cmc),
            SortBy::Color => compare_color(a, b),
            SortBy::Rarity => self.rarity(a).cmp(&self.rarity(b)),
            SortBy::Type => type_value(a).cmp(&type_value(b)),
            SortBy::Set => self.set_date(a).cmp(&self.set_date(b)),
            SortBy::ReleasedAt => self.released_at(a, desc).cmp(&self.released_at(b, desc)),
        };
        if desc {
            ord.reverse()
        } else {
            ord
        }
    }

    fn printings<'c>(&self, card: &'c Card) -> Vec<&'c Printing> {
        effective_printings(card, self.games)
    }

    fn rarity(&self, card: &Card) -> i32 {
        default_printing(self.printings(card)).map_or(0, |p| p.rarity.ordinal())
    }

    fn release_date(&self, printing: &Printing) -> Option<i64> {
        if self.hide_unreleased && !is_released(printing, self.today) {
            return None;
        }
        release_timestamp(&printing.released_at)
    }

    /// Default printing's date, or the latest released date when unreleased printings are hidden.
    fn set_date(&self, card: &Card) -> i64 {
        let printings = self.printings(card);
        if self.hide_unreleased {
            return printings.iter().filter_map(|p| self.release_date(p)).max().unwrap_or(0);
        }
        default_printing(printings)
            .and_then(|p| self.release_date(p))
            .unwrap_or(0)
    }

    /// Earliest date ascending, latest date descending.
    fn released_at(&self, card: &Card, desc: bool) -> i64 {
        let dates = self.printings(card).into_iter().filter_map(|p| self.release_date(p));
        let picked = if desc { dates.max() } else { dates.min() };
        picked.unwrap_or(0)
    }
}

/// Compare with no filter in effect.
pub fn compare(a: &Card, b: &Card, sort: &[SortCriterion]) -> Ordering {
    let filter = CardFilter::default();
    Comparator::new(sort, &filter, crate::filter::today_timestamp()).compare(a, b)
}
