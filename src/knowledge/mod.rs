//! Knowledge collaborator: contextual snippets retrieved per query, plus the
//! best-effort "learn from this interaction" notification fired after each
//! completed exchange.

use crate::error::KnowledgeError;
use async_trait::async_trait;
use tracing::debug;

/// Maximum snippets handed to the orchestrator per query.
const MAX_SNIPPETS: usize = 3;

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Up to three relevance-ranked snippets for the query.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, KnowledgeError>;

    /// Best-effort notification; callers log failures and move on.
    async fn learn(&self, query: &str, response: &str) -> Result<(), KnowledgeError>;
}

struct Entry {
    text: &'static str,
    tags: &'static [&'static str],
    importance: f64,
}

/// Fixed in-process corpus with keyword-overlap retrieval.
///
/// Ranking is by static importance descending; the sort is stable, so ties
/// keep corpus order. A vector store would replace this wholesale without
/// touching the trait.
pub struct StaticKnowledgeBase {
    entries: Vec<Entry>,
}

impl StaticKnowledgeBase {
    pub fn new() -> Self {
        Self {
            entries: vec![
                Entry {
                    text: "Shqipëria shpalli pavarësinë e saj më 28 nëntor 1912.",
                    tags: &["histori", "shqipëri", "pavarësi"],
                    importance: 0.9,
                },
                Entry {
                    text: "Gjuha shqipe është një ndër gjuhët më të vjetra të Evropës dhe formon një degë të veçantë në familjen e gjuhëve indo-evropiane.",
                    tags: &["gjuhë", "shqipe", "indo-evropiane"],
                    importance: 0.8,
                },
                Entry {
                    text: "Tirana është kryeqyteti dhe qyteti më i madh i Shqipërisë, me një popullsi prej rreth 800,000 banorësh.",
                    tags: &["tiranë", "kryeqytet", "qytet", "shqipëri"],
                    importance: 0.7,
                },
                Entry {
                    text: "Alfabeti shqip u standardizua në Kongresin e Manastirit në vitin 1908 dhe përbëhet nga 36 shkronja.",
                    tags: &["alfabet", "shqip", "kongres", "manastir"],
                    importance: 0.8,
                },
                Entry {
                    text: "Kultura shqiptare është ndikuar nga civilizime të ndryshme përgjatë historisë, duke përfshirë ilirët, grekët, romakët, bizantinët dhe osmanët.",
                    tags: &["kulturë", "shqiptare", "histori", "ndikim"],
                    importance: 0.75,
                },
            ],
        }
    }

    fn matches(entry: &Entry, query_lower: &str) -> bool {
        let text = entry.text.to_lowercase();
        let word_hit = query_lower
            .split_whitespace()
            .filter(|word| word.chars().count() > 3)
            .any(|word| text.contains(word));
        word_hit || entry.tags.iter().any(|tag| query_lower.contains(tag))
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, KnowledgeError> {
        let query_lower = query.to_lowercase();

        let mut relevant: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|entry| Self::matches(entry, &query_lower))
            .collect();
        relevant.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        Ok(relevant
            .into_iter()
            .take(MAX_SNIPPETS)
            .map(|entry| entry.text.to_string())
            .collect())
    }

    async fn learn(&self, query: &str, _response: &str) -> Result<(), KnowledgeError> {
        // Static corpus has nowhere to store new facts; acknowledge and drop.
        debug!(query_len = query.len(), "learn notification received");
        Ok(())
    }
}

/// Render retrieved snippets as the numbered context block the persona
/// prompt refers to.
pub fn format_snippets(snippets: &[String]) -> String {
    snippets
        .iter()
        .enumerate()
        .map(|(i, text)| format!("NJOHURI {}:\n{}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retrieves_by_word_overlap() {
        let kb = StaticKnowledgeBase::new();
        let snippets = kb.retrieve("Kur u shpall pavarësia?").await.unwrap();

        assert!(!snippets.is_empty());
        assert!(snippets[0].contains("pavarësinë"));
    }

    #[tokio::test]
    async fn retrieves_by_tag_containment() {
        let kb = StaticKnowledgeBase::new();
        let snippets = kb.retrieve("me trego per alfabetin: alfabet").await.unwrap();

        assert!(snippets.iter().any(|s| s.contains("36 shkronja")));
    }

    #[tokio::test]
    async fn caps_results_at_three_ranked_by_importance() {
        let kb = StaticKnowledgeBase::new();
        // "histori shqipëri gjuhë" overlaps nearly the whole corpus.
        let snippets = kb
            .retrieve("histori shqipëri gjuhë kulturë alfabet")
            .await
            .unwrap();

        assert_eq!(snippets.len(), 3);
        // Highest-importance entry leads.
        assert!(snippets[0].contains("pavarësinë"));
    }

    #[tokio::test]
    async fn equal_importance_keeps_corpus_order() {
        let kb = StaticKnowledgeBase::new();
        let snippets = kb.retrieve("gjuhë alfabet").await.unwrap();

        // Both 0.8-importance entries match; language entry precedes the
        // alphabet entry in the corpus.
        let lang = snippets.iter().position(|s| s.contains("indo-evropiane"));
        let alphabet = snippets.iter().position(|s| s.contains("Manastirit"));
        assert!(lang.unwrap() < alphabet.unwrap());
    }

    #[tokio::test]
    async fn unrelated_query_yields_nothing() {
        let kb = StaticKnowledgeBase::new();
        let snippets = kb.retrieve("qwzx").await.unwrap();
        assert!(snippets.is_empty());
    }

    #[tokio::test]
    async fn learn_is_accepted() {
        let kb = StaticKnowledgeBase::new();
        kb.learn("pyetje", "përgjigje").await.unwrap();
    }

    #[test]
    fn format_numbers_snippets() {
        let formatted = format_snippets(&["one".into(), "two".into()]);
        assert!(formatted.starts_with("NJOHURI 1:\none"));
        assert!(formatted.contains("NJOHURI 2:\ntwo"));
    }
}
