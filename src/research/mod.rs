//! Research collaborator: topical findings consumed only when triage flags
//! a query as research-needing.

use crate::error::ResearchError;
use async_trait::async_trait;

/// Findings included in the upstream context per query.
const MAX_FINDINGS: usize = 3;

/// Fixed string rendered when a search produced nothing usable.
pub const NO_FINDINGS: &str = "Nuk u gjetën informacione të rëndësishme.";

#[derive(Debug, Clone)]
pub struct ResearchFinding {
    pub title: String,
    pub content: String,
    pub source: String,
    pub relevance: f64,
}

#[async_trait]
pub trait ResearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<ResearchFinding>, ResearchError>;
}

/// Canned topical routing standing in for a real search API: history and
/// language queries get curated results, everything else a general entry.
pub struct CannedResearch;

impl CannedResearch {
    pub fn new() -> Self {
        Self
    }

    fn finding(title: &str, content: &str, source: &str, relevance: f64) -> ResearchFinding {
        ResearchFinding {
            title: title.to_string(),
            content: content.to_string(),
            source: source.to_string(),
            relevance,
        }
    }
}

#[async_trait]
impl ResearchProvider for CannedResearch {
    async fn search(&self, query: &str) -> Result<Vec<ResearchFinding>, ResearchError> {
        let lower = query.to_lowercase();

        if lower.contains("history") || lower.contains("histori") {
            return Ok(vec![
                Self::finding(
                    "Historia e Shqipërisë",
                    "Shqipëria ka një histori të pasur që daton që nga koha e Ilirisë. Ilirët ishin banorët e lashtë të Ballkanit perëndimor, të cilët u vendosën në këto toka rreth vitit 1000 p.e.s. Gjatë historisë, Shqipëria ka qenë nën sundimin e Perandorisë Romake, Perandorisë Bizantine, dhe Perandorisë Osmane.",
                    "Enciklopedia Shqiptare",
                    0.95,
                ),
                Self::finding(
                    "Skënderbeu - Heroi Kombëtar",
                    "Gjergj Kastrioti, i njohur si Skënderbeu, është heroi kombëtar i Shqipërisë. Ai udhëhoqi rezistencën kundër Perandorisë Osmane në shekullin XV dhe mbrojti me sukses vendin për më shumë se dy dekada.",
                    "Historia e Ballkanit",
                    0.85,
                ),
            ]);
        }

        if lower.contains("language") || lower.contains("gjuh") || lower.contains("speak") {
            return Ok(vec![
                Self::finding(
                    "Gjuha Shqipe",
                    "Gjuha shqipe është një gjuhë indo-evropiane që formon një degë të veçantë në këtë familje gjuhësore. Ajo flitet nga rreth 7.5 milionë njerëz, kryesisht në Shqipëri, Kosovë, Maqedoni të Veriut, Serbi, Mal të Zi dhe nga diaspora shqiptare në mbarë botën.",
                    "Studime Gjuhësore Shqiptare",
                    0.98,
                ),
                Self::finding(
                    "Alfabeti Shqip",
                    "Alfabeti shqip përbëhet nga 36 shkronja. Ai u standardizua në vitin 1908 në Kongresin e Manastirit dhe bazohet kryesisht në alfabetin latin, me disa shkronja shtesë për të përfaqësuar tinguj specifikë të gjuhës shqipe.",
                    "Akademia e Shkencave e Shqipërisë",
                    0.82,
                ),
            ]);
        }

        Ok(vec![Self::finding(
            "Republika e Shqipërisë",
            "Shqipëria është një vend në Evropën Juglindore me një popullsi prej rreth 2.8 milionë banorësh. Kryeqyteti i saj është Tirana. Vendi kufizohet me Malin e Zi në veri, Kosovën në verilindje, Maqedoninë e Veriut në lindje dhe Greqinë në jug.",
            "Enciklopedia Botërore",
            0.75,
        )])
    }
}

/// Sort by relevance descending, keep the top three, and render the fixed
/// `INFORMACION n:` context block.
pub fn format_findings(findings: &[ResearchFinding]) -> String {
    if findings.is_empty() {
        return NO_FINDINGS.to_string();
    }

    let mut sorted: Vec<&ResearchFinding> = findings.iter().collect();
    sorted.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    sorted
        .iter()
        .take(MAX_FINDINGS)
        .enumerate()
        .map(|(i, f)| {
            format!(
                "INFORMACION {}:\nTitulli: {}\nPërmbajtja: {}\nBurimi: {}",
                i + 1,
                f.title,
                f.content,
                f.source
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_queries_route_to_history_findings() {
        let research = CannedResearch::new();
        let findings = research.search("kërko histori shqiptare").await.unwrap();

        assert_eq!(findings.len(), 2);
        assert!(findings[0].title.contains("Historia"));
    }

    #[tokio::test]
    async fn language_queries_route_to_language_findings() {
        let research = CannedResearch::new();
        let findings = research.search("what language do they speak?").await.unwrap();

        assert!(findings.iter().any(|f| f.title.contains("Gjuha")));
    }

    #[tokio::test]
    async fn other_queries_get_default_finding() {
        let research = CannedResearch::new();
        let findings = research.search("lajme ekonomike").await.unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Republika e Shqipërisë");
    }

    #[test]
    fn format_sorts_by_relevance_and_caps_at_three() {
        let findings = vec![
            ResearchFinding {
                title: "low".into(),
                content: "c".into(),
                source: "s".into(),
                relevance: 0.1,
            },
            ResearchFinding {
                title: "high".into(),
                content: "c".into(),
                source: "s".into(),
                relevance: 0.9,
            },
            ResearchFinding {
                title: "mid".into(),
                content: "c".into(),
                source: "s".into(),
                relevance: 0.5,
            },
            ResearchFinding {
                title: "mid2".into(),
                content: "c".into(),
                source: "s".into(),
                relevance: 0.4,
            },
        ];

        let block = format_findings(&findings);

        assert!(block.starts_with("INFORMACION 1:\nTitulli: high"));
        assert!(block.contains("INFORMACION 2:\nTitulli: mid"));
        assert!(block.contains("INFORMACION 3:\nTitulli: mid2"));
        assert!(!block.contains("low"));
    }

    #[test]
    fn format_empty_yields_fixed_string() {
        assert_eq!(format_findings(&[]), NO_FINDINGS);
    }
}
