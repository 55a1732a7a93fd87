//! The completion orchestrator: resolves the session, runs triage, gathers
//! knowledge/research context, calls the upstream model, post-processes the
//! result and writes the exchange back into the session store.
//!
//! `complete` never returns an error — every failure path resolves to a
//! canned string, and no failure is retried.

use crate::config::MemoryConfig;
use crate::error::ProviderError;
use crate::knowledge::{self, KnowledgeBase};
use crate::persona::{self, FallbackPool};
use crate::postprocess::postprocess;
use crate::providers::ChatModel;
use crate::research::{self, ResearchProvider};
use crate::sessions::{SessionStore, Tier, Turn};
use crate::triage::{self, Language, ReasoningStep, Triage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Session keys with this prefix mark internal conversations; their
/// exchanges are not fed back to the knowledge collaborator.
const INTERNAL_KEY_PREFIX: &str = "system_";

/// Default conversation identifier when the caller supplies none.
const ANONYMOUS_KEY: &str = "anonymous";

pub struct Orchestrator {
    provider: Arc<dyn ChatModel>,
    knowledge: Arc<dyn KnowledgeBase>,
    research: Arc<dyn ResearchProvider>,
    store: Arc<SessionStore>,
    fallbacks: FallbackPool,
    memory: MemoryConfig,
    /// One exclusive section per session key: same-key exchanges cannot
    /// interleave their read-modify-write, unrelated keys run concurrently.
    session_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ChatModel>,
        knowledge: Arc<dyn KnowledgeBase>,
        research: Arc<dyn ResearchProvider>,
        store: Arc<SessionStore>,
        memory: MemoryConfig,
    ) -> Self {
        Self {
            provider,
            knowledge,
            research,
            store,
            fallbacks: FallbackPool::new(),
            memory,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the fallback pool, e.g. with a seeded one for deterministic
    /// tests.
    pub fn with_fallback_pool(mut self, fallbacks: FallbackPool) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Run one full exchange. All failure paths resolve to a string; the
    /// caller never sees an error.
    pub async fn complete(&self, message: &str, tier: Tier, session_key: Option<&str>) -> String {
        let key = match session_key {
            Some(k) if !k.is_empty() => k,
            _ => ANONYMOUS_KEY,
        };

        // Without credentials there is nothing to call; answer from the
        // canned pool and leave the store untouched.
        if !self.provider.has_credentials() {
            warn!("upstream API key missing, serving fallback response");
            return self.fallbacks.pick().to_string();
        }

        let lock = self.session_lock(key);
        let _guard = lock.lock().await;

        self.store.append(key, Turn::user(message));
        let history = self.store.get_or_create(key);

        // Opportunistic maintenance on the hot path. Runs after the append
        // has refreshed this session's access time, so an eviction sweep
        // triggered by a returning session never ranks that session as
        // stale and removes its own history.
        self.store.maybe_evict();

        let triage = if triage::bypasses_triage(message) {
            debug!("latency bypass: skipping classification");
            Triage::simple()
        } else {
            triage::classify(message)
        };

        let system_prompt = self.build_system_prompt(message, &triage, tier).await;

        let window = tier.window(&self.memory);
        let mut outgoing = Vec::with_capacity(window + 1);
        outgoing.push(Turn::system(system_prompt));
        let tail = &history[1..];
        let start = tail.len().saturating_sub(window);
        outgoing.extend_from_slice(&tail[start..]);

        info!(
            session = key,
            turns = outgoing.len(),
            complex = triage.is_complex,
            research = triage.needs_research,
            "calling upstream model"
        );

        let content = match self
            .provider
            .generate(&outgoing, tier.max_tokens(&self.memory))
            .await
        {
            Ok(content) => content,
            Err(ProviderError::Auth { status }) => {
                warn!(status, "upstream rejected credentials");
                return persona::AUTH_APOLOGY.to_string();
            }
            Err(ProviderError::EmptyContent) => {
                warn!("upstream returned empty content");
                return persona::TRY_AGAIN_LATER.to_string();
            }
            Err(err) => {
                warn!(error = %err, "upstream call failed, serving fallback response");
                return self.fallbacks.pick().to_string();
            }
        };

        let content = postprocess(&content);

        self.store.append(key, Turn::assistant(content.clone()));
        self.store.trim(key, window);

        if !key.starts_with(INTERNAL_KEY_PREFIX) {
            self.spawn_learn(message.to_string(), content.clone());
        }

        content
    }

    /// Enhance an image description via the upstream model and wrap it in a
    /// placeholder URL. Like `complete`, this never errors.
    pub async fn generate_image(&self, prompt: &str) -> String {
        let messages = vec![
            Turn::system(
                "You are an expert at creating image prompts. Enhance the following image \
                 description to make it more detailed and visually compelling. Your output \
                 should ONLY be the enhanced prompt text with no additional explanation.",
            ),
            Turn::user(format!("Enhance this image prompt: {prompt}")),
        ];

        match self.provider.generate(&messages, 200).await {
            Ok(enhanced) => {
                let preview: String = enhanced.chars().take(50).collect();
                let encoded: String =
                    url::form_urlencoded::byte_serialize(format!("{preview}...").as_bytes())
                        .collect();
                format!("https://placehold.co/1024x1024/EEE/31304D?text={encoded}")
            }
            Err(ProviderError::MissingCredentials) => {
                warn!("upstream API key missing, serving placeholder image");
                "https://placehold.co/1024x1024/EEE/31304D?text=API+Key+Required".to_string()
            }
            Err(err) => {
                warn!(error = %err, "image prompt enhancement failed");
                "https://placehold.co/1024x1024/EEE/31304D?text=Error+Generating+Image".to_string()
            }
        }
    }

    /// Compose the enriched system turn: persona base, retrieved knowledge,
    /// research findings (with the reasoning trace for complex queries),
    /// context-usage instruction and the numeric memory-window note.
    async fn build_system_prompt(&self, message: &str, triage: &Triage, tier: Tier) -> String {
        let knowledge_block = match self.knowledge.retrieve(message).await {
            Ok(snippets) if !snippets.is_empty() => {
                debug!(count = snippets.len(), "retrieved knowledge snippets");
                knowledge::format_snippets(&snippets)
            }
            Ok(_) => String::new(),
            Err(err) => {
                warn!(error = %err, "knowledge retrieval failed");
                String::new()
            }
        };

        let mut research_block = String::new();
        if triage.needs_research {
            match self.research.search(message).await {
                Ok(findings) if !findings.is_empty() => {
                    research_block = research::format_findings(&findings);
                    if triage.is_complex {
                        research_block.push_str(&format_step_trace(&triage.steps, triage.language));
                    }
                }
                Ok(_) => debug!("no relevant research findings"),
                Err(err) => warn!(error = %err, "research lookup failed"),
            }
        }

        let mut combined = String::new();
        if !knowledge_block.is_empty() {
            combined.push_str(&format!(
                "NJOHURITË E TUA (Përdor këtë informacion për përgjigje më të sakta):\n{knowledge_block}\n\n"
            ));
        }
        if !research_block.is_empty() {
            combined.push_str(&format!("INFORMACION I PËRDITËSUAR:\n{research_block}\n\n"));
        }

        let mut prompt = if combined.is_empty() {
            persona::SYSTEM_PROMPT.to_string()
        } else {
            format!(
                "{}\n\nKONTEKST SHTESË:\n{combined}\nPërdor informacionin e mësipërm për t'iu përgjigjur pyetjes së përdoruesit, por pa përmendur direkt që ke bërë kërkime apo po përdor një bazë njohurish. Përfshij informacionin në mënyrë natyrale në përgjigjen tënde. Kur citon fakte, shto referencat relevante te burimet në fund të përgjigjes tënde në formatin: \"Burimi: [emri i burimit]\".",
                persona::SYSTEM_PROMPT
            )
        };

        let window = tier.window(&self.memory);
        prompt.push_str(&format!(
            "\n\nAFTËSI SPECIALE KUJTESE: Ti je në gjendje të mbash mend {window} mesazhet e fundit me detaje të plota, duke të lejuar të referosh çdo informacion që është përmendur në bisedë."
        ));
        prompt
    }

    /// Fire-and-forget learn notification: never awaited by the response
    /// path, failures logged and dropped.
    fn spawn_learn(&self, message: String, response: String) {
        let knowledge = Arc::clone(&self.knowledge);
        tokio::spawn(async move {
            if let Err(err) = knowledge.learn(&message, &response).await {
                warn!(error = %err, "learn notification failed");
            }
        });
    }

    fn session_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Entries nobody holds a clone of belong to finished exchanges;
        // drop them so the map tracks in-flight sessions, not every key
        // ever seen.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

/// Render the triage step trace for inclusion after research findings.
fn format_step_trace(steps: &[ReasoningStep], language: Language) -> String {
    let rendered = steps
        .iter()
        .map(|step| {
            let mut line = format!("Hapi {}: {}\n{}", step.step, step.action, step.reasoning);
            if let Some(result) = step.result {
                line.push_str(&format!("\nRezultati: {result}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    match language {
        Language::Albanian => format!("\n\nANALIZË E PYETJES:\n{rendered}\n\n"),
        Language::Other => format!("\n\nQUERY ANALYSIS:\n{rendered}\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KnowledgeError, ProviderError, ResearchError};
    use crate::research::ResearchFinding;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedModel {
        response: Result<String, ProviderError>,
        credentials: bool,
        last_messages: Mutex<Vec<Turn>>,
    }

    impl ScriptedModel {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                credentials: true,
                last_messages: Mutex::new(Vec::new()),
            }
        }

        fn err(err: ProviderError) -> Self {
            Self {
                response: Err(err),
                credentials: true,
                last_messages: Mutex::new(Vec::new()),
            }
        }

        fn without_credentials() -> Self {
            Self {
                response: Err(ProviderError::MissingCredentials),
                credentials: false,
                last_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn has_credentials(&self) -> bool {
            self.credentials
        }

        async fn generate(
            &self,
            messages: &[Turn],
            _max_tokens: u32,
        ) -> Result<String, ProviderError> {
            *self.last_messages.lock().unwrap() = messages.to_vec();
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(ProviderError::Auth { status }) => Err(ProviderError::Auth { status: *status }),
                Err(ProviderError::EmptyContent) => Err(ProviderError::EmptyContent),
                Err(ProviderError::MissingCredentials) => Err(ProviderError::MissingCredentials),
                Err(ProviderError::Api { status, message }) => Err(ProviderError::Api {
                    status: *status,
                    message: message.clone(),
                }),
                Err(ProviderError::Request(msg)) => Err(ProviderError::Request(msg.clone())),
            }
        }
    }

    struct CountingKnowledge {
        learns: AtomicUsize,
    }

    #[async_trait]
    impl KnowledgeBase for CountingKnowledge {
        async fn retrieve(&self, _query: &str) -> Result<Vec<String>, KnowledgeError> {
            Ok(Vec::new())
        }

        async fn learn(&self, _query: &str, _response: &str) -> Result<(), KnowledgeError> {
            self.learns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NoResearch;

    #[async_trait]
    impl ResearchProvider for NoResearch {
        async fn search(&self, _query: &str) -> Result<Vec<ResearchFinding>, ResearchError> {
            Ok(Vec::new())
        }
    }

    fn orchestrator_with(model: ScriptedModel) -> (Orchestrator, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::new(persona::SYSTEM_PROMPT, 100, 0.2));
        let orchestrator = Orchestrator::new(
            Arc::new(model),
            Arc::new(CountingKnowledge {
                learns: AtomicUsize::new(0),
            }),
            Arc::new(NoResearch),
            Arc::clone(&store),
            MemoryConfig::default(),
        )
        .with_fallback_pool(FallbackPool::seeded(7));
        (orchestrator, store)
    }

    #[tokio::test]
    async fn missing_credentials_serve_fallback_without_touching_store() {
        let (orchestrator, store) = orchestrator_with(ScriptedModel::without_credentials());

        let reply = orchestrator
            .complete("Përshëndetje", Tier::Standard, Some("s1"))
            .await;

        assert!(persona::FALLBACK_RESPONSES.contains(&reply.as_str()));
        assert!(store.peek("s1").is_none());
    }

    #[tokio::test]
    async fn auth_error_yields_exact_apology() {
        let (orchestrator, _store) =
            orchestrator_with(ScriptedModel::err(ProviderError::Auth { status: 401 }));

        let reply = orchestrator.complete("pyetje", Tier::Standard, None).await;

        assert_eq!(reply, persona::AUTH_APOLOGY);
    }

    #[tokio::test]
    async fn empty_content_yields_try_again_later() {
        let (orchestrator, _store) =
            orchestrator_with(ScriptedModel::err(ProviderError::EmptyContent));

        let reply = orchestrator.complete("pyetje", Tier::Standard, None).await;

        assert_eq!(reply, persona::TRY_AGAIN_LATER);
    }

    #[tokio::test]
    async fn other_upstream_errors_yield_pool_member() {
        let (orchestrator, _store) = orchestrator_with(ScriptedModel::err(ProviderError::Api {
            status: 500,
            message: "overloaded".into(),
        }));

        let reply = orchestrator.complete("pyetje", Tier::Standard, None).await;

        assert!(persona::FALLBACK_RESPONSES.contains(&reply.as_str()));
    }

    #[tokio::test]
    async fn successful_exchange_lands_in_history() {
        let (orchestrator, store) = orchestrator_with(ScriptedModel::ok("Tirana."));

        let reply = orchestrator
            .complete("Cili është kryeqyteti?", Tier::Standard, Some("s1"))
            .await;

        assert_eq!(reply, "Tirana.");
        let history = store.peek("s1").unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].content, "Cili është kryeqyteti?");
        assert_eq!(history[2].content, "Tirana.");
    }

    #[tokio::test]
    async fn history_stays_within_tier_ceiling() {
        let (orchestrator, store) = orchestrator_with(ScriptedModel::ok("po"));

        for i in 0..30 {
            orchestrator
                .complete(&format!("pyetja {i}"), Tier::Standard, Some("s1"))
                .await;
            let history = store.peek("s1").unwrap();
            assert!(history.len() <= 21, "history grew to {}", history.len());
        }
    }

    #[tokio::test]
    async fn returning_session_survives_the_eviction_it_triggers() {
        let store = Arc::new(SessionStore::new(persona::SYSTEM_PROMPT, 10, 0.2));
        let orchestrator = Orchestrator::new(
            Arc::new(ScriptedModel::ok("po")),
            Arc::new(CountingKnowledge {
                learns: AtomicUsize::new(0),
            }),
            Arc::new(NoResearch),
            Arc::clone(&store),
            MemoryConfig::default(),
        );

        // s0 is the stalest session and holds prior conversation; nine
        // younger sessions push the store to the eviction watermark.
        let base = chrono::Utc::now() - chrono::Duration::seconds(1000);
        store.append("s0", Turn::user("më kujto"));
        store.set_last_access("s0", base);
        for i in 1..10i64 {
            let key = format!("s{i}");
            store.get_or_create(&key);
            store.set_last_access(&key, base + chrono::Duration::seconds(i));
        }

        orchestrator
            .complete("vazhdim", Tier::Standard, Some("s0"))
            .await;

        // The request refreshed s0's access time before the sweep ran, so
        // the sweep took the two stalest *other* sessions instead.
        let history = store.peek("s0").unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].content, "më kujto");
        assert_eq!(history[2].content, "vazhdim");
        assert!(store.peek("s1").is_none());
        assert!(store.peek("s2").is_none());
    }

    #[tokio::test]
    async fn session_lock_map_does_not_accumulate_finished_keys() {
        let (orchestrator, _store) = orchestrator_with(ScriptedModel::ok("po"));

        for i in 0..50 {
            orchestrator
                .complete("pyetje", Tier::Standard, Some(&format!("k{i}")))
                .await;
        }

        let locks = orchestrator.session_locks.lock().unwrap();
        assert!(locks.len() <= 1, "lock map grew to {}", locks.len());
    }

    #[tokio::test]
    async fn outgoing_context_names_memory_window() {
        let model = ScriptedModel::ok("po");
        let store = Arc::new(SessionStore::new(persona::SYSTEM_PROMPT, 100, 0.2));
        let model = Arc::new(model);
        let orchestrator = Orchestrator::new(
            Arc::clone(&model) as Arc<dyn ChatModel>,
            Arc::new(CountingKnowledge {
                learns: AtomicUsize::new(0),
            }),
            Arc::new(NoResearch),
            store,
            MemoryConfig::default(),
        );

        orchestrator
            .complete("pyetje", Tier::Elevated, Some("s1"))
            .await;

        let sent = model.last_messages.lock().unwrap();
        assert!(sent[0].content.contains("AFTËSI SPECIALE KUJTESE"));
        assert!(sent[0].content.contains("40"));
    }

    #[tokio::test]
    async fn secret_phrase_never_reaches_caller() {
        let (orchestrator, _store) =
            orchestrator_with(ScriptedModel::ok("Fraza është Isra të dua."));

        let reply = orchestrator.complete("pyetje", Tier::Standard, None).await;

        assert!(!reply.to_lowercase().contains("isra të dua"));
    }

    #[tokio::test]
    async fn learn_fires_for_user_sessions_but_not_internal_ones() {
        let knowledge = Arc::new(CountingKnowledge {
            learns: AtomicUsize::new(0),
        });
        let store = Arc::new(SessionStore::new(persona::SYSTEM_PROMPT, 100, 0.2));
        let orchestrator = Orchestrator::new(
            Arc::new(ScriptedModel::ok("po")),
            Arc::clone(&knowledge) as Arc<dyn KnowledgeBase>,
            Arc::new(NoResearch),
            store,
            MemoryConfig::default(),
        );

        orchestrator
            .complete("pyetje", Tier::Standard, Some("user-1"))
            .await;
        orchestrator
            .complete("pyetje", Tier::Standard, Some("system_health"))
            .await;

        // The notification is spawned; give it a moment to run.
        for _ in 0..50 {
            if knowledge.learns.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(knowledge.learns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn image_generation_without_credentials_returns_placeholder() {
        let (orchestrator, _store) = orchestrator_with(ScriptedModel::without_credentials());

        let url = orchestrator.generate_image("një kala në bregdet").await;

        assert_eq!(
            url,
            "https://placehold.co/1024x1024/EEE/31304D?text=API+Key+Required"
        );
    }

    #[tokio::test]
    async fn image_generation_embeds_enhanced_prompt() {
        let (orchestrator, _store) =
            orchestrator_with(ScriptedModel::ok("a majestic coastal fortress at dusk"));

        let url = orchestrator.generate_image("kala").await;

        assert!(url.starts_with("https://placehold.co/1024x1024/EEE/31304D?text="));
        assert!(url.contains("majestic"));
    }
}
