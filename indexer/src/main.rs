use anyhow::Result;
use clap::{Parser, Subcommand};
use search_core::{load_catalog, Algorithm, CorpusStats, SearchConfig, SearchEngine, SearchError, SearchHit, SkippedRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a BM25 index over a product catalog and query it", long_about = None)]
struct Cli {
    /// Optional JSON file with ranking parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the catalog and print corpus statistics
    Stats {
        /// Catalog path (file or directory)
        #[arg(long)]
        catalog: PathBuf,
        /// How many of the most widespread terms to list
        #[arg(long, default_value_t = 20)]
        top_terms: usize,
    },
    /// Index the catalog and run one query
    Search {
        /// Catalog path (file or directory)
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long, short)]
        query: String,
        /// bm25 or hybrid
        #[arg(long, default_value = "bm25")]
        algorithm: Algorithm,
        /// Number of results (defaults to the configured top-k)
        #[arg(short)]
        k: Option<usize>,
    },
}

#[derive(Serialize)]
struct StatsReport<'a> {
    stats: CorpusStats,
    top_terms: Vec<TermDf<'a>>,
    skipped: &'a [SkippedRecord],
}

#[derive(Serialize)]
struct TermDf<'a> {
    term: &'a str,
    df: u32,
}

#[derive(Serialize)]
struct SearchReport {
    query: String,
    algorithm: Algorithm,
    total_hits: usize,
    results: Vec<SearchHit<String>>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = SearchConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Stats { catalog, top_terms } => stats(&catalog, config, top_terms),
        Commands::Search { catalog, query, algorithm, k } => search(&catalog, config, query, algorithm, k),
    }
}

fn index_catalog(catalog: &Path, config: SearchConfig) -> Result<(SearchEngine<String>, Vec<SkippedRecord>)> {
    let engine = SearchEngine::from_config(config)?;
    let loaded = load_catalog(catalog)?;
    engine.build_index(Arc::new(loaded.corpus));
    Ok((engine, loaded.skipped))
}

fn stats(catalog: &Path, config: SearchConfig, top_terms: usize) -> Result<()> {
    let (engine, skipped) = index_catalog(catalog, config)?;
    let snapshot = engine.snapshot().ok_or(SearchError::IndexNotBuilt)?;
    let report = StatsReport {
        stats: snapshot.stats,
        top_terms: snapshot.index.top_terms(top_terms).into_iter().map(|(term, df)| TermDf { term, df }).collect(),
        skipped: &skipped,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn search(catalog: &Path, config: SearchConfig, query: String, algorithm: Algorithm, k: Option<usize>) -> Result<()> {
    let (engine, _) = index_catalog(catalog, config)?;
    let k = k.unwrap_or(engine.config().default_top_k);
    let page = engine.search_hits(&query, algorithm, k)?;
    tracing::info!(total_hits = page.total_hits, shown = page.hits.len(), "search complete");
    let report = SearchReport { query, algorithm, total_hits: page.total_hits, results: page.hits };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
