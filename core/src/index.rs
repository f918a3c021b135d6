use crate::document::CardDocument;
use crate::tokenizer::TokenFrequency;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub type TermId = u32;
/// Position of a card inside its catalog generation.
pub type DocId = u32;

/// Term namespaces. The same surface word in two fields is two distinct terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Oracle,
    TypeLine,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Name, Field::Oracle, Field::TypeLine];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub frequency: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexMetrics {
    pub total_documents: usize,
    pub unique_terms: usize,
    pub total_postings: usize,
}

#[derive(Debug, Default)]
pub struct InvertedIndex {
    pub dictionary: HashMap<String, TermId>,
    /// Document frequency per term id, summed over fields.
    pub df: Vec<u32>,
    /// Postings sorted by descending frequency, then doc id.
    pub postings: HashMap<(Field, TermId), Vec<Posting>>,
    pub num_docs: u32,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single pass over the documents of one generation. `documents[i]` gets doc id `i`.
    pub fn build(documents: &[CardDocument]) -> Self {
        let mut index = Self::new();
        for (doc_id, doc) in documents.iter().enumerate() {
            let doc_id = doc_id as DocId;
            let mut seen_in_doc: HashSet<TermId> = HashSet::new();
            index.add_field(Field::Name, &doc.name_tokens, doc_id, &mut seen_in_doc);
            index.add_field(Field::Oracle, &doc.oracle_tokens, doc_id, &mut seen_in_doc);
            index.add_field(Field::TypeLine, &doc.type_tokens, doc_id, &mut seen_in_doc);
        }
        index.num_docs = documents.len() as u32;
        for list in index.postings.values_mut() {
            list.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.doc_id.cmp(&b.doc_id)));
        }
        index
    }

    fn add_field(
        &mut self,
        field: Field,
        freq: &TokenFrequency,
        doc_id: DocId,
        seen_in_doc: &mut HashSet<TermId>,
    ) {
        for (term, count) in freq {
            let next_id = self.dictionary.len() as TermId;
            let tid = *self.dictionary.entry(term.clone()).or_insert(next_id);
            if self.df.len() <= tid as usize {
                self.df.resize(tid as usize + 1, 0);
            }
            if seen_in_doc.insert(tid) {
                self.df[tid as usize] += 1;
            }
            self.postings.entry((field, tid)).or_default().push(Posting {
                doc_id,
                frequency: u32::from(*count),
            });
        }
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    /// Exact-token lookup in one field.
    pub fn lookup(&self, field: Field, term: &str) -> &[Posting] {
        self.term_id(term)
            .and_then(|tid| self.postings.get(&(field, tid)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.term_id(term)
            .and_then(|tid| self.df.get(tid as usize).copied())
            .unwrap_or(0)
    }

    /// Docs containing every token, each token matched in at least one of `fields`.
    /// Returned in ascending doc id order.
    pub fn matching_all(&self, fields: &[Field], tokens: &[String]) -> Vec<DocId> {
        let mut acc: Option<HashSet<DocId>> = None;
        for token in tokens {
            let mut hits: HashSet<DocId> = HashSet::new();
            for field in fields {
                hits.extend(self.lookup(*field, token).iter().map(|p| p.doc_id));
            }
            acc = Some(match acc {
                None => hits,
                Some(prev) => prev.intersection(&hits).copied().collect(),
            });
            if acc.as_ref().is_some_and(HashSet::is_empty) {
                break;
            }
        }
        let mut out: Vec<DocId> = acc.unwrap_or_default().into_iter().collect();
        out.sort_unstable();
        out
    }

    pub fn metrics(&self) -> IndexMetrics {
        IndexMetrics {
            total_documents: self.num_docs as usize,
            unique_terms: self.dictionary.len(),
            total_postings: self.postings.values().map(Vec::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Card;

    fn doc(id: &str, name: &str, type_line: &str, oracle: &str) -> CardDocument {
        CardDocument::from_card(&Card {
            id: id.into(),
            name: name.into(),
            type_line: type_line.into(),
            oracle_text: Some(oracle.into()),
            ..Default::default()
        })
    }

    fn corpus() -> Vec<CardDocument> {
        vec![
            doc("a", "Goblin Guide", "Creature — Goblin Scout", "Haste"),
            doc("b", "Goblin Bombardment", "Enchantment", "Sacrifice a creature: deal damage"),
            doc("c", "Shock", "Instant", "Shock deals 2 damage to any target"),
        ]
    }

    #[test]
    fn fields_are_separate_term_spaces() {
        let index = InvertedIndex::build(&corpus());
        let name: Vec<DocId> = index.lookup(Field::Name, "goblin").iter().map(|p| p.doc_id).collect();
        assert_eq!(name.len(), 2);
        let type_line: Vec<DocId> =
            index.lookup(Field::TypeLine, "goblin").iter().map(|p| p.doc_id).collect();
        assert_eq!(type_line, vec![0]);
        assert!(index.lookup(Field::Oracle, "goblin").is_empty());
    }

    #[test]
    fn matching_all_requires_every_token() {
        let index = InvertedIndex::build(&corpus());
        let both = index.matching_all(&Field::ALL, &["goblin".into(), "creature".into()]);
        assert_eq!(both, vec![0, 1]);
        let none = index.matching_all(&Field::ALL, &["goblin".into(), "instant".into()]);
        assert!(none.is_empty());
        let oracle_only = index.matching_all(&[Field::Oracle], &["damage".into()]);
        assert_eq!(oracle_only, vec![1, 2]);
    }

    #[test]
    fn document_frequency_counts_each_doc_once() {
        let index = InvertedIndex::build(&corpus());
        // "shock" is in both name and oracle of the same card
        assert_eq!(index.document_frequency("shock"), 1);
        assert_eq!(index.document_frequency("goblin"), 2);
        assert_eq!(index.document_frequency("missing"), 0);
    }

    #[test]
    fn metrics_reflect_build() {
        let index = InvertedIndex::build(&corpus());
        let m = index.metrics();
        assert_eq!(m.total_documents, 3);
        assert!(m.unique_terms > 0);
        assert!(m.total_postings >= m.unique_terms);
    }
}
