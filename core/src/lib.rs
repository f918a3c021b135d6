pub mod catalog;
pub mod document;
pub mod filter;
pub mod index;
pub mod load;
pub mod model;
pub mod query;
pub mod rank;
pub mod search;
pub mod tokenizer;

pub use catalog::{CatalogIndex, CatalogMetrics, CatalogSnapshot};
pub use document::CardDocument;
pub use filter::{
    CardFilter, FacetVote, FilterContext, IgnoredCardSource, MemoryIgnoredCards, NoIgnoredCards, Vote,
};
pub use index::{DocId, Field, IndexMetrics, InvertedIndex, Posting, TermId};
pub use model::{Card, CardFace, Color, Printing, Rarity, Tag, TagAssignment};
pub use query::{parse_clause, parse_search, Clause, ClauseKind, CmcOp};
pub use rank::{compare, relevance_score, Comparator, Direction, SortBy, SortCriterion};
pub use search::{filter_cards, paginate, search, Pagination, SearchPage, SearchRequest};
