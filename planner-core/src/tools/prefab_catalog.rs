//! Local prefab catalog and fuzzy matcher backing `search_prefabs` (always
//! available, spec §4.3 table) and `prefab_recommend`'s no-vector-service
//! fallback suggestion.
//!
//! A prefab in the distilled system is normally served by a vector index; the
//! core's job is only to degrade gracefully when that service is absent, so a
//! small embedded catalog plus a word-overlap scorer stands in for it here —
//! no external dependency, no network call, matching "always available".

use crate::context::PrefabMatch;

/// One entry in the local catalog.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<&'static str>,
    pub author: &'static str,
}

/// A small built-in catalog covering common planning-agent building blocks.
/// Real deployments would back this with the same data the vector service
/// indexes; this crate has no durable catalog store of its own (spec §1 "Out
/// of scope... the embedding/vector service").
pub fn builtin_catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            id: "speech-to-text".into(),
            version: "1.2.0".into(),
            name: "Speech-to-Text Transcriber".into(),
            description: "Streams audio and returns incremental transcripts with speaker tags.".into(),
            tags: vec!["audio", "speech", "transcription"],
            author: "prefab-audio-team",
        },
        CatalogEntry {
            id: "pdf-extractor".into(),
            version: "2.0.1".into(),
            name: "PDF Text & Table Extractor".into(),
            description: "Extracts text, tables, and embedded images from PDF documents.".into(),
            tags: vec!["pdf", "document", "extraction"],
            author: "prefab-docs-team",
        },
        CatalogEntry {
            id: "auth-oauth2".into(),
            version: "3.1.0".into(),
            name: "OAuth2 Login Flow".into(),
            description: "Drop-in OAuth2 authorization-code login flow with refresh token handling.".into(),
            tags: vec!["auth", "oauth2", "login"],
            author: "prefab-identity-team",
        },
        CatalogEntry {
            id: "vector-search".into(),
            version: "1.0.4".into(),
            name: "Vector Similarity Search".into(),
            description: "Embeds documents and serves k-nearest-neighbor similarity search.".into(),
            tags: vec!["search", "embeddings", "vector"],
            author: "prefab-search-team",
        },
        CatalogEntry {
            id: "payments-stripe".into(),
            version: "4.2.0".into(),
            name: "Stripe Payments Integration".into(),
            description: "Checkout sessions, subscriptions, and webhook handling via Stripe.".into(),
            tags: vec!["payments", "billing", "stripe"],
            author: "prefab-commerce-team",
        },
        CatalogEntry {
            id: "email-sender".into(),
            version: "1.5.2".into(),
            name: "Transactional Email Sender".into(),
            description: "Templated transactional email delivery with retry and bounce handling.".into(),
            tags: vec!["email", "notifications"],
            author: "prefab-comms-team",
        },
    ]
}

/// Scores `entry` against a free-text query by counting overlapping
/// lowercased words between the query and the entry's name/description/tags.
/// Not a full fuzzy-matching library — a plain word-overlap score is
/// sufficient for ranking a small local catalog and keeps this dependency-free.
fn score(entry: &CatalogEntry, query: &str) -> f64 {
    if query.trim().is_empty() {
        return 0.0;
    }
    let query_words: Vec<String> = query.to_lowercase().split_whitespace().map(String::from).collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let haystack = format!(
        "{} {} {}",
        entry.name.to_lowercase(),
        entry.description.to_lowercase(),
        entry.tags.join(" ").to_lowercase()
    );
    let hits = query_words.iter().filter(|w| haystack.contains(w.as_str())).count();
    hits as f64 / query_words.len() as f64
}

/// Matches `query` (optionally filtered by `tags`/`author`) against the
/// catalog, returning the top `limit` by score descending. Entries scoring
/// zero are excluded unless `query` is empty (a plain filter-only listing).
pub fn search(query: Option<&str>, tags: &[String], author: Option<&str>, limit: usize) -> Vec<PrefabMatch> {
    let catalog = builtin_catalog();
    let mut scored: Vec<(f64, &CatalogEntry)> = catalog
        .iter()
        .filter(|e| author.map(|a| e.author.eq_ignore_ascii_case(a)).unwrap_or(true))
        .filter(|e| tags.is_empty() || tags.iter().any(|t| e.tags.iter().any(|et| et.eq_ignore_ascii_case(t))))
        .map(|e| (query.map(|q| score(e, q)).unwrap_or(1.0), e))
        .filter(|(s, _)| query.is_none() || *s > 0.0)
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(limit)
        .map(|(score, e)| PrefabMatch {
            id: e.id.clone(),
            version: e.version.clone(),
            name: e.name.clone(),
            description: e.description.clone(),
            score,
            tags: e.tags.iter().map(|t| t.to_string()).collect(),
        })
        .collect()
}
