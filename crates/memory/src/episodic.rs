//! Episodic memory: reflections and learned patterns from earlier sessions.
//!
//! Episodic records hold JSON written by the store's episodic strategy. Two
//! shapes are recognised:
//! - reflections: `{"title", "use_cases", "hints"}`, cross-session insights
//!   stored under the actor namespace
//! - learned patterns: `{"situation", "intent", "reflection"}`, per-episode
//!   lessons stored under the session namespace
//!
//! Anything else is rendered as a plain memory line.

use crate::block::{BlockKind, ContextBlock};
use crate::namespace::Namespace;
use crate::strategy::{StrategyKind, StrategyLocator};
use memoria_core::error::RetrievalError;
use memoria_core::memory::{EpisodicConfig, MemoryRecord, MemoryService};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

const HEADER: &str = "\n## EPISODIC MEMORIES (Learned Patterns & Insights):";

/// Only the first queries are searched; each one costs up to two round trips.
const MAX_QUERIES: usize = 2;

/// Parsed content of an episodic record.
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodicContent {
    Reflection {
        title: Option<String>,
        use_cases: String,
        hints: String,
    },
    LearnedPattern {
        situation: String,
        intent: String,
        reflection: String,
    },
    /// Valid JSON with no recognised shape
    Unknown { raw: String },
    /// Not JSON at all
    Text { raw: String },
}

/// Classify raw record text. Reflection wins over LearnedPattern when an
/// object carries both sets of keys.
pub fn classify(raw: &str) -> EpisodicContent {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return EpisodicContent::Text { raw: raw.into() },
    };

    let Some(obj) = value.as_object() else {
        return EpisodicContent::Unknown { raw: raw.into() };
    };

    if obj.contains_key("use_cases") && obj.contains_key("title") {
        EpisodicContent::Reflection {
            title: obj.get("title").map(value_text),
            use_cases: field_text(obj, "use_cases"),
            hints: field_text(obj, "hints"),
        }
    } else if obj.contains_key("situation") && obj.contains_key("intent") {
        EpisodicContent::LearnedPattern {
            situation: field_text(obj, "situation"),
            intent: field_text(obj, "intent"),
            reflection: field_text(obj, "reflection"),
        }
    } else {
        EpisodicContent::Unknown { raw: raw.into() }
    }
}

/// Strings as-is, empty values as `""`, anything else as compact JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(a) if a.is_empty() => String::new(),
        Value::Object(o) if o.is_empty() => String::new(),
        other => other.to_string(),
    }
}

fn field_text(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).map(value_text).unwrap_or_default()
}

/// A record that passed the relevance filter.
#[derive(Debug, Clone)]
pub struct ScoredEpisode {
    pub record_id: String,
    pub score: f64,
    pub content: EpisodicContent,
}

/// Keep records scoring at least `min_score`, best first. Ties keep their
/// retrieval order.
pub fn filter_and_rank(records: &[MemoryRecord], min_score: f64) -> Vec<ScoredEpisode> {
    let mut episodes: Vec<ScoredEpisode> = records
        .iter()
        .filter(|r| r.effective_score() >= min_score)
        .map(|r| ScoredEpisode {
            record_id: r.memory_record_id.clone(),
            score: r.effective_score(),
            content: classify(r.text()),
        })
        .collect();

    debug!(kept = episodes.len(), total = records.len(), min_score, "Filtered episodic records");
    episodes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    episodes
}

fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn format_line(content: &EpisodicContent) -> String {
    match content {
        EpisodicContent::Reflection {
            title,
            use_cases,
            hints,
        } => {
            let title = title.as_deref().unwrap_or("Untitled");
            let mut line = format!("- [Insight] {title}: {}", truncate_chars(use_cases, 150));
            if !hints.is_empty() {
                line.push_str(&format!(" (Hint: {})", truncate_chars(hints, 50)));
            }
            line
        }
        EpisodicContent::LearnedPattern {
            situation,
            intent,
            reflection,
        } => format!(
            "- [Pattern] Situation: {}... Intent: {}... Lesson: {}",
            truncate_chars(situation, 100),
            truncate_chars(intent, 100),
            truncate_chars(reflection, 100)
        ),
        EpisodicContent::Unknown { raw } | EpisodicContent::Text { raw } => {
            format!("- [Memory] {}", truncate_chars(raw, 150))
        }
    }
}

/// Render episodes under the episodic header within `max_chars` characters.
///
/// The budget covers the header, every line and every newline including the
/// trailing one. The header is always emitted; lines stop at the first one
/// that would not fit.
pub fn format_episodes(episodes: &[ScoredEpisode], max_chars: usize) -> String {
    if episodes.is_empty() {
        return String::new();
    }

    let mut out = String::from(HEADER);
    let mut used = HEADER.chars().count() + 1;

    for episode in episodes {
        let line = format_line(&episode.content);
        let cost = line.chars().count() + 1;
        if used + cost > max_chars {
            break;
        }
        out.push('\n');
        out.push_str(&line);
        used += cost;
    }

    out.push('\n');
    out
}

/// Search the episodic namespaces for up to the first two `queries` and
/// render what survives filtering.
pub async fn fetch_episodic(
    service: &dyn MemoryService,
    locator: &StrategyLocator,
    actor_id: &str,
    session_id: &str,
    queries: &[String],
    config: &EpisodicConfig,
) -> Result<ContextBlock, RetrievalError> {
    if queries.is_empty() {
        return Ok(ContextBlock::empty(BlockKind::Episodic));
    }

    let Some(strategy) = locator.find(StrategyKind::Episodic).await else {
        debug!("No episodic strategy found, skipping episodic recall");
        return Ok(ContextBlock::empty(BlockKind::Episodic));
    };

    let actor_ns = Namespace::actor(&strategy, actor_id);
    let session_ns =
        (!session_id.is_empty()).then(|| Namespace::session(&strategy, actor_id, session_id));

    let mut seen = HashSet::new();
    let mut collected: Vec<MemoryRecord> = Vec::new();

    for query in queries.iter().take(MAX_QUERIES) {
        let actor_search = search_namespace(service, query, &actor_ns, config);
        let session_search = async {
            match &session_ns {
                Some(ns) => search_namespace(service, query, ns, config).await,
                None => Vec::new(),
            }
        };
        let (actor_hits, session_hits) = tokio::join!(actor_search, session_search);

        for record in actor_hits.into_iter().chain(session_hits) {
            if record.memory_record_id.is_empty() {
                continue;
            }
            if seen.insert(record.memory_record_id.clone()) {
                collected.push(record);
            }
        }

        if collected.len() >= config.total_max_results {
            break;
        }
    }

    debug!(unique = collected.len(), strategy_id = %strategy, "Episodic search complete");
    if collected.is_empty() {
        return Ok(ContextBlock::empty(BlockKind::Episodic));
    }

    let mut episodes = filter_and_rank(&collected, config.min_relevance_score);
    episodes.truncate(config.total_max_results);
    Ok(ContextBlock::new(
        BlockKind::Episodic,
        format_episodes(&episodes, config.max_context_chars),
    ))
}

/// One namespace search. Failures are logged and count as no results.
async fn search_namespace(
    service: &dyn MemoryService,
    query: &str,
    namespace: &Namespace,
    config: &EpisodicConfig,
) -> Vec<MemoryRecord> {
    match service
        .search_long_term_memories(query, namespace.as_str(), config.max_results_per_namespace)
        .await
    {
        Ok(records) => records,
        Err(e) => {
            let preview: String = query.chars().take(30).collect();
            warn!(namespace = %namespace, query = %preview, error = %e, "Episodic search failed");
            Vec::new()
        }
    }
}
