use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::{DetectionConfig, TranslationConfig};
use crate::detect::LanguageIdentifier;
use crate::error::{Result, TrilingoError};
use crate::inference::InferenceProvider;
use crate::language::Language;
use crate::loader::{LoadOutcome, ModelLoader, StatusSender};
use super::prompt::build_chat_request;
use super::response::{parse_sentence_response, parse_word_response};
use super::{is_word_only, target_languages, TranslationReport, TranslationRequest, TranslationResult};

/// Observable lifecycle of one orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    LoadingModel,
    Detecting,
    /// Index into the target list currently being translated
    Translating(usize),
    Error,
}

/// Clears the busy flag and returns to Idle on every exit path
struct BusyGuard<'a> {
    orchestrator: &'a TranslationOrchestrator,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.set_state(OrchestratorState::Idle);
        self.orchestrator.busy.store(false, Ordering::Release);
    }
}

/// Detects the source language and translates into the other two, one at a time
pub struct TranslationOrchestrator {
    provider: Arc<dyn InferenceProvider>,
    loader: ModelLoader,
    identifier: LanguageIdentifier,
    config: TranslationConfig,
    busy: AtomicBool,
    state: Mutex<OrchestratorState>,
    loaded_model: Mutex<Option<String>>,
}

impl TranslationOrchestrator {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        loader: ModelLoader,
        detection: DetectionConfig,
        config: TranslationConfig,
    ) -> Self {
        Self {
            provider,
            loader,
            identifier: LanguageIdentifier::new(detection),
            config,
            busy: AtomicBool::new(false),
            state: Mutex::new(OrchestratorState::Idle),
            loaded_model: Mutex::new(None),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        *lock(&self.state)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn loaded_model(&self) -> Option<String> {
        lock(&self.loaded_model).clone()
    }

    fn set_state(&self, state: OrchestratorState) {
        debug!("Orchestrator state -> {:?}", state);
        *lock(&self.state) = state;
    }

    /// Claim the busy flag. `None` means another operation is in flight.
    fn try_begin(&self, state: OrchestratorState) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.set_state(state);
        Some(BusyGuard { orchestrator: self })
    }

    /// Load a model. Returns `Ok(None)` without doing anything while busy.
    pub async fn load_model(&self, model: &str, status: Option<StatusSender>) -> Result<Option<LoadOutcome>> {
        let Some(_guard) = self.try_begin(OrchestratorState::LoadingModel) else {
            debug!("Ignoring load of {}: operation already in flight", model);
            return Ok(None);
        };

        match self.loader.load(model, status).await {
            Ok(outcome) => {
                *lock(&self.loaded_model) = Some(outcome.model.clone());
                Ok(Some(outcome))
            }
            Err(e) => {
                self.set_state(OrchestratorState::Error);
                warn!("Failed to load {}: {}", model, e);
                Err(e)
            }
        }
    }

    /// Translate `text` into both other languages.
    ///
    /// Returns `Ok(None)` when the text is blank, when another operation is in
    /// flight, or when no model has been loaded yet. Any failure aborts the whole
    /// call; partial results are never returned.
    pub async fn translate(&self, text: &str) -> Result<Option<TranslationReport>> {
        let input = text.trim();
        if input.is_empty() {
            debug!("Ignoring empty translation request");
            return Ok(None);
        }

        let Some(_guard) = self.try_begin(OrchestratorState::Detecting) else {
            debug!("Ignoring translation request: operation already in flight");
            return Ok(None);
        };

        if self.loaded_model().is_none() {
            debug!("Ignoring translation request: no model loaded");
            return Ok(None);
        }

        match self.run(input).await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                self.set_state(OrchestratorState::Error);
                warn!("Error during translation: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, input: &str) -> Result<TranslationReport> {
        let detection = self.identifier.detect(input, Some(self.provider.as_ref())).await;
        info!("Detected {} ({})", detection.language, detection.method);

        let targets = target_languages(detection.language);
        let is_single_word = is_word_only(input);

        let mut results = Vec::with_capacity(targets.len());
        for (index, target) in targets.into_iter().enumerate() {
            self.set_state(OrchestratorState::Translating(index));

            let request = TranslationRequest {
                source_text: input.to_string(),
                source_language: detection.language,
                target_language: target,
                is_single_word,
            };
            results.push(self.translate_one(&request).await?);
        }

        Ok(TranslationReport {
            source_text: input.to_string(),
            detection,
            is_single_word,
            results,
        })
    }

    async fn translate_one(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let chat = build_chat_request(request, &self.config);
        let completion = self.provider.complete(&chat).await.map_err(|e| {
            TrilingoError::Translation(format!("{} translation failed: {}", request.target_language, e))
        })?;

        let raw = completion
            .first_text()
            .ok_or_else(|| TrilingoError::Translation(format!(
                "Engine returned no choices for {}", request.target_language
            )))?
            .trim();
        debug!("Raw {} response: {}", request.target_language, raw);

        Ok(parse_result(request.target_language, raw, request.is_single_word))
    }
}

fn parse_result(target: Language, raw: &str, is_single_word: bool) -> TranslationResult {
    if is_single_word {
        let parsed = parse_word_response(raw);
        TranslationResult {
            target_language: target,
            translation_text: parsed.translation_text,
            example_sentence: parsed.example_sentence,
        }
    } else {
        TranslationResult {
            target_language: target,
            translation_text: parse_sentence_response(raw),
            example_sentence: None,
        }
    }
}

// State is plain data; a poisoned lock still holds a usable value
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::config::Config;
    use crate::inference::{ChatCompletion, ChatRequest, MockInferenceProvider, ProgressSender};
    use crate::language::DetectionMethod;
    use crate::registry::ModelCacheRegistry;
    use crate::store::MemoryStore;

    fn orchestrator(provider: Arc<dyn InferenceProvider>) -> TranslationOrchestrator {
        let config = Config::default();
        let registry = ModelCacheRegistry::new(Arc::new(MemoryStore::new()));
        let loader = ModelLoader::new(provider.clone(), registry);
        TranslationOrchestrator::new(provider, loader, config.detection, config.translation)
    }

    fn expect_load(provider: &mut MockInferenceProvider) {
        provider.expect_load_model().returning(|_, _| Ok(()));
    }

    fn user_prompt(req: &ChatRequest) -> &str {
        &req.messages.last().unwrap().content
    }

    #[tokio::test]
    async fn test_end_to_end_english_sentence() {
        let mut provider = MockInferenceProvider::new();
        expect_load(&mut provider);
        provider
            .expect_complete()
            .withf(|req| user_prompt(req).starts_with("What language is this text?"))
            .times(1)
            .returning(|_| Ok(ChatCompletion::from_text("I am not sure")));
        provider
            .expect_complete()
            .withf(|req| user_prompt(req).starts_with("Translate this English text to Persian:"))
            .times(1)
            .returning(|_| Ok(ChatCompletion::from_text("\"گربه سیاه مال کیست؟\"")));
        provider
            .expect_complete()
            .withf(|req| user_prompt(req).starts_with("Translate this English text to German:"))
            .times(1)
            .returning(|_| Ok(ChatCompletion::from_text("Translation: Wem gehört die schwarze Katze?")));

        let orchestrator = orchestrator(Arc::new(provider));
        orchestrator.load_model("llama3.2:1b", None).await.unwrap();

        let report = orchestrator
            .translate("The black cat belongs to who?")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.detection.language, Language::English);
        assert_eq!(report.detection.method, DetectionMethod::WordScoreFallback);
        assert!(!report.is_single_word);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].target_language, Language::Persian);
        assert_eq!(report.results[0].translation_text, "گربه سیاه مال کیست؟");
        assert_eq!(report.results[1].target_language, Language::German);
        assert_eq!(report.results[1].translation_text, "Wem gehört die schwarze Katze?");
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_word_mode_collects_examples() {
        let mut provider = MockInferenceProvider::new();
        expect_load(&mut provider);
        provider
            .expect_complete()
            .withf(|req| user_prompt(req).contains("Translate the Persian word \"گربه\" to English."))
            .returning(|_| Ok(ChatCompletion::from_text("Translation: cat\nExample: The cat sleeps.")));
        provider
            .expect_complete()
            .withf(|req| user_prompt(req).contains("Translate the Persian word \"گربه\" to German."))
            .returning(|_| Ok(ChatCompletion::from_text("Katze")));

        let orchestrator = orchestrator(Arc::new(provider));
        orchestrator.load_model("llama3.2:1b", None).await.unwrap();

        let report = orchestrator.translate("  گربه ").await.unwrap().unwrap();
        assert_eq!(report.detection.method, DetectionMethod::CharacterPattern);
        assert!(report.is_single_word);
        assert_eq!(
            report.results,
            vec![
                TranslationResult {
                    target_language: Language::English,
                    translation_text: "cat".to_string(),
                    example_sentence: Some("The cat sleeps.".to_string()),
                },
                TranslationResult {
                    target_language: Language::German,
                    translation_text: "Katze".to_string(),
                    example_sentence: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_input_and_unloaded_engine_are_no_ops() {
        let mut provider = MockInferenceProvider::new();
        provider.expect_complete().never();

        let orchestrator = orchestrator(Arc::new(provider));
        assert!(orchestrator.translate("   ").await.unwrap().is_none());
        assert!(orchestrator.translate("hello").await.unwrap().is_none());
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_failure_aborts_without_partial_results() {
        let mut provider = MockInferenceProvider::new();
        expect_load(&mut provider);
        provider
            .expect_complete()
            .withf(|req| user_prompt(req).contains("to English"))
            .returning(|_| Ok(ChatCompletion::from_text("cat")));
        provider
            .expect_complete()
            .withf(|req| user_prompt(req).contains("to German"))
            .returning(|_| Err(TrilingoError::Inference("engine crashed".to_string())));

        let orchestrator = orchestrator(Arc::new(provider));
        orchestrator.load_model("llama3.2:1b", None).await.unwrap();

        let err = orchestrator.translate("گربه").await.unwrap_err();
        assert!(matches!(&err, TrilingoError::Translation(msg) if msg.contains("engine crashed")));
        assert!(!orchestrator.is_busy());
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_empty_choices_is_translation_error() {
        let mut provider = MockInferenceProvider::new();
        expect_load(&mut provider);
        provider.expect_complete().returning(|_| Ok(ChatCompletion::default()));

        let orchestrator = orchestrator(Arc::new(provider));
        orchestrator.load_model("llama3.2:1b", None).await.unwrap();

        let err = orchestrator.translate("Straße").await.unwrap_err();
        assert!(matches!(err, TrilingoError::Translation(_)));
    }

    #[tokio::test]
    async fn test_failed_load_allows_retry() {
        let mut provider = MockInferenceProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_load_model()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(TrilingoError::ModelLoad("network down".to_string())));
        provider
            .expect_load_model()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let orchestrator = orchestrator(Arc::new(provider));
        assert!(orchestrator.load_model("gemma2:2b", None).await.is_err());
        assert_eq!(orchestrator.loaded_model(), None);
        assert!(!orchestrator.is_busy());

        let outcome = orchestrator.load_model("gemma2:2b", None).await.unwrap().unwrap();
        assert_eq!(outcome.model, "gemma2:2b");
        assert_eq!(orchestrator.loaded_model().as_deref(), Some("gemma2:2b"));
    }

    /// Provider whose loads and completions block until released
    struct GatedProvider {
        gate: Semaphore,
        calls: AtomicUsize,
        load_gate: Semaphore,
        loads: AtomicUsize,
    }

    fn gated(load_permits: usize) -> Arc<GatedProvider> {
        Arc::new(GatedProvider {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            load_gate: Semaphore::new(load_permits),
            loads: AtomicUsize::new(0),
        })
    }

    #[async_trait]
    impl InferenceProvider for GatedProvider {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn load_model(&self, _model: &str, _progress: Option<ProgressSender>) -> Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let permit = self.load_gate.acquire().await
                .map_err(|e| TrilingoError::ModelLoad(e.to_string()))?;
            permit.forget();
            Ok(())
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<ChatCompletion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await
                .map_err(|e| TrilingoError::Inference(e.to_string()))?;
            permit.forget();
            Ok(ChatCompletion::from_text("Katze"))
        }
    }

    #[tokio::test]
    async fn test_second_translate_while_in_flight_is_dropped() {
        let provider = gated(1);
        let orchestrator = orchestrator(provider.clone());
        orchestrator.load_model("llama3.2:1b", None).await.unwrap();

        let first = orchestrator.translate("cat");
        let second = async {
            // `first` has claimed the busy flag and is parked inside the provider
            let dropped = orchestrator.translate("dog").await.unwrap();
            let calls_while_busy = provider.calls.load(Ordering::SeqCst);
            // one permit per call: detection, then two targets
            provider.gate.add_permits(3);
            (dropped, calls_while_busy)
        };

        let (first, (dropped, calls_while_busy)) = tokio::join!(first, second);

        assert!(dropped.is_none());
        assert_eq!(calls_while_busy, 1);
        let report = first.unwrap().unwrap();
        assert_eq!(report.source_text, "cat");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_load_while_translating_is_dropped() {
        let provider = gated(1);
        let orchestrator = orchestrator(provider.clone());
        orchestrator.load_model("llama3.2:1b", None).await.unwrap();

        let translating = orchestrator.translate("cat");
        let load_attempt = async {
            let dropped = orchestrator.load_model("gemma2:2b", None).await.unwrap();
            let loads_while_busy = provider.loads.load(Ordering::SeqCst);
            provider.gate.add_permits(3);
            (dropped, loads_while_busy)
        };

        let (report, (dropped, loads_while_busy)) = tokio::join!(translating, load_attempt);

        assert!(dropped.is_none());
        assert_eq!(loads_while_busy, 1);
        assert!(report.unwrap().is_some());
        assert_eq!(orchestrator.loaded_model().as_deref(), Some("llama3.2:1b"));
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_translate_while_loading_is_dropped() {
        let provider = gated(0);
        let orchestrator = orchestrator(provider.clone());

        let loading = orchestrator.load_model("llama3.2:1b", None);
        let translate_attempt = async {
            assert_eq!(orchestrator.state(), OrchestratorState::LoadingModel);
            let dropped = orchestrator.translate("cat").await.unwrap();
            let calls_while_busy = provider.calls.load(Ordering::SeqCst);
            provider.load_gate.add_permits(1);
            (dropped, calls_while_busy)
        };

        let (outcome, (dropped, calls_while_busy)) = tokio::join!(loading, translate_attempt);

        assert!(dropped.is_none());
        assert_eq!(calls_while_busy, 0);
        assert_eq!(outcome.unwrap().unwrap().model, "llama3.2:1b");
        assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }
}
