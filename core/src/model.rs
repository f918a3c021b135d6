//! Card catalog types as delivered by the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "W", alias = "w")]
    White,
    #[serde(rename = "U", alias = "u")]
    Blue,
    #[serde(rename = "B", alias = "b")]
    Black,
    #[serde(rename = "R", alias = "r")]
    Red,
    #[serde(rename = "G", alias = "g")]
    Green,
    #[serde(rename = "C", alias = "c")]
    Colorless,
}

impl Color {
    /// Maps one search-box character to a color. Anything unrecognised is colorless.
    pub fn from_code(code: char) -> Self {
        match code.to_ascii_lowercase() {
            'w' => Color::White,
            'u' => Color::Blue,
            'b' => Color::Black,
            'r' => Color::Red,
            'g' => Color::Green,
            _ => Color::Colorless,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Color::White => "w",
            Color::Blue => "u",
            Color::Black => "b",
            Color::Red => "r",
            Color::Green => "g",
            Color::Colorless => "c",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Blue => "blue",
            Color::Black => "black",
            Color::Red => "red",
            Color::Green => "green",
            Color::Colorless => "colorless",
        }
    }

    /// Sort letter used by the color ordering: colorless < white < blue < red < black < green.
    pub fn sort_letter(self) -> char {
        match self {
            Color::Colorless => 'A',
            Color::White => 'B',
            Color::Blue => 'C',
            Color::Red => 'D',
            Color::Black => 'E',
            Color::Green => 'F',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Mythic,
    #[serde(other)]
    Other,
}

impl Rarity {
    /// Accepts the long form or the single-letter abbreviation; unknown input is common.
    pub fn from_query(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "uncommon" | "u" => Rarity::Uncommon,
            "rare" | "r" => Rarity::Rare,
            "mythic" | "m" => Rarity::Mythic,
            _ => Rarity::Common,
        }
    }

    pub fn ordinal(self) -> i32 {
        match self {
            Rarity::Common | Rarity::Other => 0,
            Rarity::Uncommon => 1,
            Rarity::Rare => 2,
            Rarity::Mythic => 3,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Mythic => "mythic",
            Rarity::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardFace {
    pub name: String,
    pub type_line: Option<String>,
    pub oracle_text: Option<String>,
    pub flavor_text: Option<String>,
    pub layout: Option<String>,
}

/// One physical or digital release of a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Printing {
    pub set: String,
    pub set_name: String,
    pub rarity: Rarity,
    /// ISO `YYYY-MM-DD`; may be empty or malformed in upstream data.
    pub released_at: String,
    pub legalities: HashMap<String, String>,
    pub games: Vec<String>,
    pub flavor_text: Option<String>,
    pub is_default: bool,
    pub card_faces: Vec<CardFace>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A tag attached to a card, with the meta-tag chain it was reached through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssignment {
    pub tag: Tag,
    #[serde(default)]
    pub chain: Vec<Tag>,
}

impl TagAssignment {
    /// `terminal:chain1,chain2` with chain ids sorted, so equal chains compare equal.
    pub fn chain_key(&self) -> String {
        let ids: Vec<&str> = self.chain.iter().map(|t| t.id.as_str()).collect();
        chain_key(&self.tag.id, &ids)
    }
}

pub fn chain_key(terminal_tag_id: &str, chain_tag_ids: &[&str]) -> String {
    let mut ids = chain_tag_ids.to_vec();
    ids.sort_unstable();
    format!("{}:{}", terminal_tag_id, ids.join(","))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Card {
    #[serde(alias = "_key")]
    pub id: String,
    pub name: String,
    pub type_line: String,
    pub oracle_text: Option<String>,
    pub cmc: f64,
    pub color_identity: Vec<Color>,
    pub keywords: Vec<String>,
    pub layout: String,
    #[serde(alias = "versions")]
    pub printings: Vec<Printing>,
    pub tag_assignments: Vec<TagAssignment>,
    /// The viewing user's own rating, joined in by the caller.
    pub my_rating: Option<i32>,
}

impl Card {
    /// The printing flagged as default, or the first one.
    pub fn default_printing(&self) -> Option<&Printing> {
        default_printing(self.printings.iter())
    }
}

pub(crate) fn default_printing<'a, I>(printings: I) -> Option<&'a Printing>
where
    I: IntoIterator<Item = &'a Printing>,
{
    let mut first = None;
    for p in printings {
        if p.is_default {
            return Some(p);
        }
        first.get_or_insert(p);
    }
    first
}
