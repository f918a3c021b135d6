//! Reading catalog snapshots and ignore lists from disk.

use crate::filter::MemoryIgnoredCards;
use crate::model::Card;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `.json` and `.jsonl` files under `path`, or `path` itself when it is a file.
/// Directory entries are returned in path order so loads are reproducible.
pub fn catalog_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if !p.is_file() {
                continue;
            }
            if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                if matches!(ext, "json" | "jsonl") {
                    files.push(p.to_path_buf());
                }
            }
        }
        files.sort();
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        anyhow::bail!("catalog path {} does not exist", path.display());
    }
    Ok(files)
}

/// Load every card found under `path`. JSON files may hold an array of cards or a single card;
/// JSONL files hold one card per line.
pub fn load_cards(path: &Path) -> Result<Vec<Card>> {
    let mut cards = Vec::new();
    for file in catalog_files(path)? {
        let before = cards.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut cards)?;
        } else {
            read_json(&file, &mut cards)?;
        }
        tracing::debug!(file = %file.display(), cards = cards.len() - before, "read catalog file");
    }
    tracing::info!(path = %path.display(), total_cards = cards.len(), "loaded card catalog");
    Ok(cards)
}

fn read_jsonl(file: &Path, cards: &mut Vec<Card>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", file.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let card: Card = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid card", file.display(), line_no + 1))?;
        cards.push(card);
    }
    Ok(())
}

fn read_json(file: &Path, cards: &mut Vec<Card>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value =
        serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let card: Card = serde_json::from_value(v)
                    .with_context(|| format!("{}: invalid card", file.display()))?;
                cards.push(card);
            }
        }
        serde_json::Value::Object(_) => {
            let card: Card = serde_json::from_value(json)
                .with_context(|| format!("{}: invalid card", file.display()))?;
            cards.push(card);
        }
        _ => tracing::warn!(file = %file.display(), "ignoring catalog file without cards"),
    }
    Ok(())
}

/// Load a `{"deckId": ["cardId", ...]}` file.
pub fn load_ignored_cards(path: &Path) -> Result<MemoryIgnoredCards> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let ignored = MemoryIgnoredCards::from_json(&json)
        .with_context(|| format!("loading ignored cards from {}", path.display()))?;
    tracing::info!(decks = ignored.deck_count(), "loaded ignored cards");
    Ok(ignored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::IgnoredCardSource;
    use std::io::Write;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_array_object_and_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", r#"[{"id": "1", "name": "Sol Ring"}, {"id": "2", "name": "Mox"}]"#);
        write(dir.path(), "b.json", r#"{"_key": "3", "name": "Lotus"}"#);
        write(dir.path(), "c.jsonl", "{\"id\": \"4\", \"name\": \"Opt\"}\n\n{\"id\": \"5\", \"name\": \"Ponder\"}\n");
        write(dir.path(), "notes.txt", "ignored");

        let cards = load_cards(dir.path()).unwrap();
        let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn single_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "one.jsonl", r#"{"id": "x", "name": "Shock"}"#);
        assert_eq!(load_cards(&path).unwrap().len(), 1);
    }

    #[test]
    fn bad_line_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.jsonl", "{\"id\": \"1\"}\nnot json\n");
        let err = load_cards(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.jsonl:2"));
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_cards(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn ignored_cards_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "ignored.json", r#"{"deck-1": ["a", "b"]}"#);
        let ignored = load_ignored_cards(&path).unwrap();
        let ids = ignored.ignored_card_ids("deck-1").unwrap();
        assert!(ids.contains("a") && ids.contains("b"));
        assert!(ignored.ignored_card_ids("other").unwrap().is_empty());
    }
}
