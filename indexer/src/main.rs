use anyhow::Result;
use cardsearch::load::load_cards;
use cardsearch::tokenizer::{normalize, tokenize};
use cardsearch::{search, CardFilter, CatalogIndex, Field, NoIgnoredCards, Pagination, SearchRequest, SortCriterion};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Inspect and query card catalog snapshots offline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a catalog, build the index and print its metrics
    Stats {
        /// Input path (file or directory of .json/.jsonl files)
        #[arg(long)]
        input: PathBuf,
    },
    /// Run one search against a catalog
    Search {
        #[arg(long)]
        input: PathBuf,
        /// Search-box query, e.g. "t:goblin;cmc<=2"
        #[arg(long, default_value = "")]
        query: String,
        /// Sort chain, e.g. "name:asc,cmc:desc"
        #[arg(long, default_value = "")]
        sort: String,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
        /// Print cards as JSON instead of one line each
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show document frequency and postings for one term
    Term {
        #[arg(long)]
        input: PathBuf,
        /// A single term, or several words to list the cards containing all of them
        #[arg(long)]
        term: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { input } => stats(&input),
        Commands::Search { input, query, sort, page, page_size, json } => {
            run_search(&input, query, &sort, Pagination { page, page_size }, json)
        }
        Commands::Term { input, term } => term_info(&input, &term),
    }
}

fn build_catalog(input: &Path) -> Result<CatalogIndex> {
    let cards = load_cards(input)?;
    let catalog = CatalogIndex::new();
    catalog.rebuild(cards);
    if !catalog.is_ready() {
        tracing::warn!(input = %input.display(), "catalog is empty");
    }
    Ok(catalog)
}

fn stats(input: &Path) -> Result<()> {
    let catalog = build_catalog(input)?;
    println!("{}", serde_json::to_string_pretty(&catalog.metrics())?);
    Ok(())
}

fn run_search(input: &Path, query: String, sort: &str, pagination: Pagination, json: bool) -> Result<()> {
    let catalog = build_catalog(input)?;
    let request = SearchRequest {
        filter: CardFilter {
            search_string: (!query.trim().is_empty()).then_some(query),
            ..Default::default()
        },
        sort: SortCriterion::parse_list(sort)?,
        pagination,
    };
    let page = search(&catalog, &NoIgnoredCards, &request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }
    for card in &page.cards {
        println!("{:<40} {:<40} cmc={}", card.name, card.type_line, card.cmc);
    }
    println!("-- {} of {} matching cards", page.cards.len(), page.total_count);
    Ok(())
}

#[derive(Serialize)]
struct TermReport {
    term: String,
    document_frequency: u32,
    fields: Vec<FieldReport>,
    /// Cards holding every token of a multi-word term, in any field.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    matching_all: Vec<String>,
}

#[derive(Serialize)]
struct FieldReport {
    field: Field,
    cards: Vec<String>,
}

fn term_info(input: &Path, term: &str) -> Result<()> {
    let catalog = build_catalog(input)?;
    let snapshot = catalog.snapshot();
    let index = snapshot.index();
    let term = normalize(term);

    let fields = Field::ALL
        .iter()
        .map(|field| FieldReport {
            field: *field,
            cards: index
                .lookup(*field, &term)
                .iter()
                .filter_map(|p| snapshot.document_at(p.doc_id))
                .map(|doc| doc.card_id.clone())
                .collect(),
        })
        .filter(|r| !r.cards.is_empty())
        .collect();
    let tokens = tokenize(&term);
    let matching_all = if tokens.len() > 1 {
        index
            .matching_all(&Field::ALL, &tokens)
            .into_iter()
            .filter_map(|doc_id| snapshot.document_at(doc_id))
            .map(|doc| doc.card_id.clone())
            .collect()
    } else {
        Vec::new()
    };
    let report = TermReport { document_frequency: index.document_frequency(&term), term, fields, matching_all };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
