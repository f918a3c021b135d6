//! Derives the searchable record for one card.

use crate::model::{Card, Printing};
use crate::tokenizer::{frequencies, index_terms, normalize, tokenize, TokenFrequency};
use std::collections::BTreeSet;
use time::{macros::format_description, Date};

/// Normalized, tokenized view of a card. Built once per rebuild and never mutated.
#[derive(Debug, Clone, Default)]
pub struct CardDocument {
    pub card_id: String,
    pub normalized_name: String,
    pub name_tokens: TokenFrequency,
    pub oracle_tokens: TokenFrequency,
    pub type_tokens: TokenFrequency,
    /// Color codes and color names, e.g. `["blue", "u"]`.
    pub color_tokens: Vec<String>,
    pub keyword_tokens: Vec<String>,
    pub latest_release: Option<i64>,
}

impl CardDocument {
    pub fn from_card(card: &Card) -> Self {
        let oracle_tokens = match &card.oracle_text {
            Some(text) => frequencies(index_terms(text)),
            None => TokenFrequency::new(),
        };

        Self {
            card_id: card.id.clone(),
            normalized_name: normalize(&card.name),
            name_tokens: frequencies(index_terms(&card.name)),
            oracle_tokens,
            type_tokens: frequencies(tokenize(&card.type_line)),
            color_tokens: color_tokens(card),
            keyword_tokens: unique_lower(card.keywords.iter().map(String::as_str)),
            latest_release: latest_release(&card.printings),
        }
    }

    pub fn has_color_token(&self, token: &str) -> bool {
        self.color_tokens.iter().any(|c| c == token)
    }
}

fn color_tokens(card: &Card) -> Vec<String> {
    let mut set = BTreeSet::new();
    for color in &card.color_identity {
        set.insert(color.code().to_string());
        set.insert(color.name().to_string());
    }
    set.into_iter().collect()
}

fn unique_lower<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Unix timestamp (UTC midnight) of an ISO release date, or `None` when it does not parse.
pub fn release_timestamp(released_at: &str) -> Option<i64> {
    Date::parse(released_at.trim(), format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc().unix_timestamp())
}

fn latest_release(printings: &[Printing]) -> Option<i64> {
    printings.iter().filter_map(|p| release_timestamp(&p.released_at)).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, Rarity};

    fn printing(set: &str, rarity: Rarity, released_at: &str) -> Printing {
        Printing {
            set: set.into(),
            rarity,
            released_at: released_at.into(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_tokens_per_field() {
        let card = Card {
            id: "1".into(),
            name: "Llanowar Elves".into(),
            type_line: "Creature — Elf Druid".into(),
            oracle_text: Some("{T}: Add {G}.".into()),
            color_identity: vec![Color::Green],
            printings: vec![printing("DOM", Rarity::Common, "2018-04-27")],
            ..Default::default()
        };
        let doc = CardDocument::from_card(&card);
        assert_eq!(doc.normalized_name, "llanowar elves");
        assert!(doc.name_tokens.contains_key("llanowar"));
        assert!(doc.type_tokens.contains_key("elf"));
        assert!(doc.oracle_tokens.contains_key("add"));
        assert!(!doc.oracle_tokens.contains_key("g"));
        assert_eq!(doc.color_tokens, vec!["g", "green"]);
    }

    #[test]
    fn unparsable_dates_are_skipped() {
        let card = Card {
            id: "2".into(),
            printings: vec![
                printing("a", Rarity::Rare, "not-a-date"),
                printing("b", Rarity::Rare, "2001-10-01"),
                printing("c", Rarity::Mythic, "1999-01-15"),
            ],
            ..Default::default()
        };
        let doc = CardDocument::from_card(&card);
        assert_eq!(doc.latest_release, release_timestamp("2001-10-01"));
    }

    #[test]
    fn card_without_printings_has_no_dates() {
        let doc = CardDocument::from_card(&Card { id: "3".into(), ..Default::default() });
        assert_eq!(doc.latest_release, None);
    }
}
