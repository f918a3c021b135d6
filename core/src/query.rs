//! The search-box language.
//!
//! A search string is a `;`-separated list of clauses that must all hold. Each clause is either
//! a prefixed field query (`t:goblin`, `cmc>=3`, `c:wu`, ...) or free text. A `!` right after
//! the prefix, or in front of the whole clause, negates it.

use crate::model::{Card, Color, Rarity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmcOp {
    Eq,
    Gt,
    Lt,
    GtEq,
    LtEq,
}

impl CmcOp {
    pub fn holds(self, cmc: f64, value: i64) -> bool {
        let value = value as f64;
        match self {
            CmcOp::Eq => cmc == value,
            CmcOp::Gt => cmc > value,
            CmcOp::Lt => cmc < value,
            CmcOp::GtEq => cmc >= value,
            CmcOp::LtEq => cmc <= value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseKind {
    /// Free text over name, type line, oracle, sets, flavor and faces.
    Search(String),
    CardType(String),
    Oracle(String),
    FlavorText(String),
    Rarity(Rarity),
    Set(String),
    /// Matches when any of the colors is in the card's identity.
    Colors(Vec<Color>),
    Cmc(CmcOp, i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub negated: bool,
}

impl Clause {
    fn new(kind: ClauseKind, negated: bool) -> Self {
        Self { kind, negated }
    }

    /// Whether the card satisfies this clause, negation included.
    pub fn accepts(&self, card: &Card) -> bool {
        self.matches(card) != self.negated
    }

    /// The raw match, before negation.
    pub fn matches(&self, card: &Card) -> bool {
        match &self.kind {
            ClauseKind::Search(value) => free_text_matches(card, value),
            ClauseKind::CardType(value) => contains_ci(&card.type_line, value),
            ClauseKind::Oracle(value) => card
                .oracle_text
                .as_deref()
                .is_some_and(|text| contains_ci(text, value)),
            ClauseKind::FlavorText(value) => card
                .printings
                .iter()
                .filter_map(|p| p.flavor_text.as_deref())
                .any(|text| contains_ci(text, value)),
            ClauseKind::Rarity(rarity) => card.printings.iter().any(|p| p.rarity == *rarity),
            ClauseKind::Set(value) => card
                .printings
                .iter()
                .any(|p| p.set.eq_ignore_ascii_case(value) || p.set_name.eq_ignore_ascii_case(value)),
            ClauseKind::Colors(colors) => colors.iter().any(|c| card.color_identity.contains(c)),
            ClauseKind::Cmc(op, value) => op.holds(card.cmc, *value),
        }
    }

    /// The text to score relevance against, for free-text clauses that select cards.
    pub fn relevance_text(&self) -> Option<&str> {
        match (&self.kind, self.negated) {
            (ClauseKind::Search(value), false) if !value.is_empty() => Some(value),
            _ => None,
        }
    }
}

/// `needle` must already be lower-case.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn free_text_matches(card: &Card, needle: &str) -> bool {
    if contains_ci(&card.name, needle) || contains_ci(&card.type_line, needle) {
        return true;
    }
    if card.oracle_text.as_deref().is_some_and(|t| contains_ci(t, needle)) {
        return true;
    }
    card.printings.iter().any(|p| {
        p.set.eq_ignore_ascii_case(needle)
            || contains_ci(&p.set_name, needle)
            || p.flavor_text.as_deref().is_some_and(|t| contains_ci(t, needle))
            || p.card_faces.iter().any(|f| {
                contains_ci(&f.name, needle)
                    || f.type_line.as_deref().is_some_and(|t| contains_ci(t, needle))
                    || f.oracle_text.as_deref().is_some_and(|t| contains_ci(t, needle))
                    || f.flavor_text.as_deref().is_some_and(|t| contains_ci(t, needle))
            })
    })
}

/// Strip `prefix` and an optional `!` after it.
fn strip_prefixed<'a>(s: &'a str, prefix: &str) -> Option<(&'a str, bool)> {
    let rest = s.strip_prefix(prefix)?.trim();
    Some(match rest.strip_prefix('!') {
        Some(rest) => (rest.trim(), true),
        None => (rest, false),
    })
}

/// Checked in order, so the long forms win over their abbreviations.
const TEXT_PREFIXES: [(&str, fn(String) -> ClauseKind); 6] = [
    ("set:", ClauseKind::Set),
    ("s:", ClauseKind::Set),
    ("type:", ClauseKind::CardType),
    ("t:", ClauseKind::CardType),
    ("o:", ClauseKind::Oracle),
    ("ft:", ClauseKind::FlavorText),
];

const CMC_PREFIXES: [(&str, CmcOp); 5] = [
    ("cmc>=", CmcOp::GtEq),
    ("cmc>", CmcOp::Gt),
    ("cmc<=", CmcOp::LtEq),
    ("cmc<", CmcOp::Lt),
    ("cmc:", CmcOp::Eq),
];

/// Parse one clause. Never fails: anything unrecognised is free text.
pub fn parse_clause(text: &str) -> Clause {
    let s = text.trim().to_lowercase();
    let (body, leading_not) = match s.strip_prefix('!') {
        Some(rest) => (rest.trim_start(), true),
        None => (s.as_str(), false),
    };

    for (prefix, make) in TEXT_PREFIXES {
        if let Some((value, not)) = strip_prefixed(body, prefix) {
            return Clause::new(make(value.to_string()), leading_not || not);
        }
    }

    if let Some((value, not)) = strip_prefixed(body, "r:") {
        return Clause::new(ClauseKind::Rarity(Rarity::from_query(value)), leading_not || not);
    }

    if let Some((value, not)) = strip_prefixed(body, "c:") {
        let colors = value.chars().map(Color::from_code).collect();
        return Clause::new(ClauseKind::Colors(colors), leading_not || not);
    }

    for (prefix, op) in CMC_PREFIXES {
        if let Some((value, not)) = strip_prefixed(body, prefix) {
            match value.parse::<i64>() {
                Ok(n) => return Clause::new(ClauseKind::Cmc(op, n), leading_not || not),
                Err(_) => {
                    tracing::warn!(clause = %s, value, "invalid cmc value, treating clause as text");
                    break;
                }
            }
        }
    }

    // free text keeps the whole clause, including a failed cmc comparator
    Clause::new(ClauseKind::Search(body.trim().to_string()), leading_not)
}

/// Split a search string on `;` and parse every non-empty clause.
pub fn parse_search(text: &str) -> Vec<Clause> {
    text.split(';')
        .filter(|part| !part.trim().is_empty())
        .map(parse_clause)
        .collect()
}

/// Cards pass when every clause accepts them.
pub fn accepts_all(clauses: &[Clause], card: &Card) -> bool {
    clauses.iter().all(|c| c.accepts(card))
}
