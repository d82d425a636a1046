//! The request mediator between a caller and the generative backend.
//!
//! One call to [`FatwaRequestHandler::handle`] is one request:
//! 1. Validate the question (no backend call on failure)
//! 2. Build the fixed instruction prompt
//! 3. Call the backend once, bounded by the configured timeout
//! 4. Normalise, parse and schema-check the reply
//!
//! Every failure is terminal. There is no retry, no cache and no state
//! shared between requests, so one handler can serve any number of
//! concurrent requests behind an `Arc`.

use std::sync::Arc;
use std::time::Instant;

use fatwa_core::{parse_reply, prompt::build_prompt, FatwaResult, Question, ReplyError};
use tokio_util::sync::CancellationToken;

use crate::config::HandlerConfig;
use crate::error::{ErrorKind, HandlerError, RequestStage};
use crate::providers::{Completion, LlmProvider};

/// Mediates one question into one validated [`FatwaResult`].
pub struct FatwaRequestHandler {
    /// `None` when no credential was available at startup
    provider: Option<Arc<dyn LlmProvider>>,
    config: HandlerConfig,
}

impl std::fmt::Debug for FatwaRequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FatwaRequestHandler")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

impl FatwaRequestHandler {
    /// Create a handler backed by a configured provider.
    pub fn new(provider: Arc<dyn LlmProvider>, config: HandlerConfig) -> Self {
        Self {
            provider: Some(provider),
            config,
        }
    }

    /// Create a handler with no backend; every valid request fails with
    /// [`ErrorKind::Misconfigured`].
    pub fn unconfigured(config: HandlerConfig) -> Self {
        Self {
            provider: None,
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Answer a question.
    pub async fn handle(&self, question: &str) -> Result<FatwaResult, HandlerError> {
        self.handle_with_cancellation(question, CancellationToken::new())
            .await
    }

    /// Answer a question, abandoning the backend call if `cancellation`
    /// fires first.
    pub async fn handle_with_cancellation(
        &self,
        question: &str,
        cancellation: CancellationToken,
    ) -> Result<FatwaResult, HandlerError> {
        let started = Instant::now();
        enter(RequestStage::Received);

        let result = self.process(question, &cancellation, started).await;

        if let Err(e) = &result {
            enter(RequestStage::Failed(e.kind()));
            log_failure(e, started.elapsed().as_millis() as u64);
        }

        result
    }

    async fn process(
        &self,
        raw_question: &str,
        cancellation: &CancellationToken,
        started: Instant,
    ) -> Result<FatwaResult, HandlerError> {
        enter(RequestStage::Validating);
        let question = Question::parse(raw_question)?;
        let provider = self.provider.as_deref().ok_or(HandlerError::Misconfigured)?;

        let prompt = build_prompt(&question);

        enter(RequestStage::AwaitingBackend);
        let completion = self.call_backend(provider, &prompt, cancellation).await?;
        tracing::debug!(
            provider = provider.name(),
            stop_reason = ?completion.stop_reason,
            chars = completion.text.chars().count(),
            "Backend replied"
        );

        enter(RequestStage::ParsingReply);
        let mut result = parse_reply(&completion.text).map_err(|reason| {
            if matches!(reason, ReplyError::Schema(_) | ReplyError::Shape(_)) {
                enter(RequestStage::ValidatingSchema);
            }
            HandlerError::MalformedResponse {
                reason,
                raw: completion.text.clone(),
            }
        })?;
        enter(RequestStage::ValidatingSchema);

        // The backend's echo wins when present; the caller's text fills the gap.
        if !result.has_question() {
            result.question = question.into_inner();
        }

        enter(RequestStage::Succeeded);
        tracing::info!(
            model = %completion.model,
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            total_tokens = completion.usage.total(),
            rulings = result.opinions().filter(|(_, o)| o.ruling.is_some()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fatwa request succeeded"
        );

        Ok(result)
    }

    async fn call_backend(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
        cancellation: &CancellationToken,
    ) -> Result<Completion, HandlerError> {
        let completion_config = self.config.completion();
        let call = tokio::time::timeout(
            self.config.timeout,
            provider.complete(prompt, &completion_config),
        );

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(HandlerError::Cancelled),
            outcome = call => match outcome {
                Ok(Ok(completion)) => Ok(completion),
                Ok(Err(e)) => Err(HandlerError::from(e)),
                Err(_) => Err(HandlerError::Timeout(self.config.timeout)),
            },
        }
    }
}

fn enter(stage: RequestStage) {
    tracing::debug!(stage = ?stage, "Request stage");
}

fn log_failure(error: &HandlerError, elapsed_ms: u64) {
    let kind = error.kind();
    match kind {
        ErrorKind::InvalidInput => {
            tracing::debug!(%kind, elapsed_ms, "Rejected invalid question");
        }
        ErrorKind::Misconfigured => {
            tracing::error!(%kind, "Backend credential not configured");
        }
        ErrorKind::MalformedResponse => {
            tracing::warn!(
                %kind,
                error = %error,
                raw = error.raw_reply().unwrap_or_default(),
                elapsed_ms,
                "Backend reply failed validation"
            );
        }
        ErrorKind::Cancelled => {
            tracing::debug!(%kind, elapsed_ms, "Caller went away, backend call abandoned");
        }
        _ => {
            tracing::warn!(
                %kind,
                status = ?error.backend_status(),
                error = %error,
                elapsed_ms,
                "Backend call failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionConfig, ProviderError, TokenUsage};
    use async_trait::async_trait;
    use fatwa_core::School;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    type Responder = Box<dyn Fn() -> Result<String, ProviderError> + Send + Sync>;

    /// Scripted backend that records every prompt it receives.
    struct FakeProvider {
        respond: Responder,
        delay: Duration,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn replying(text: &str) -> Arc<Self> {
            let text = text.to_string();
            Self::with(Box::new(move || Ok(text.clone())))
        }

        fn failing(make: fn() -> ProviderError) -> Arc<Self> {
            Self::with(Box::new(move || Err(make())))
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                respond: Box::new(|| Ok(full_reply())),
                delay,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn with(respond: Responder) -> Arc<Self> {
            Arc::new(Self {
                respond,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        async fn complete(
            &self,
            prompt: &str,
            _config: &CompletionConfig,
        ) -> Result<Completion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.respond)().map(|text| Completion {
                text,
                model: "fake".to_string(),
                stop_reason: Some("end_turn".to_string()),
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    const JAMAAH: &str = "ما حكم صلاة الجماعة؟";

    fn full_reply() -> String {
        serde_json::json!({
            "question": JAMAAH,
            "hanafi": { "ruling": "سنة مؤكدة", "explanation": "قريبة من الواجب", "evidence": "صلاة الجماعة أفضل من صلاة الفذ بسبع وعشرين درجة" },
            "maliki": { "ruling": "سنة مؤكدة", "explanation": "فرض كفاية في البلد", "evidence": "الحديث السابق" },
            "shafii": { "ruling": "فرض كفاية", "explanation": "لإظهار الشعيرة", "evidence": "ما من ثلاثة في قرية لا تقام فيهم الصلاة" },
            "hanbali": { "ruling": "واجبة", "explanation": "على الرجال القادرين", "evidence": "وإذا كنت فيهم فأقمت لهم الصلاة" },
            "consensus": "اتفقوا على مشروعيتها وفضلها",
            "note": "ينبغي الحرص عليها"
        })
        .to_string()
    }

    fn handler(provider: Arc<FakeProvider>) -> FatwaRequestHandler {
        FatwaRequestHandler::new(provider, HandlerConfig::default())
    }

    #[tokio::test]
    async fn test_full_reply_returned_exactly() {
        let provider = FakeProvider::replying(&full_reply());
        let result = handler(provider.clone()).handle(JAMAAH).await.unwrap();

        let expected: FatwaResult = serde_json::from_str(&full_reply()).unwrap();
        assert_eq!(result, expected);
        assert_eq!(result.consensus.as_deref(), Some("اتفقوا على مشروعيتها وفضلها"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_prompt_embeds_question() {
        let provider = FakeProvider::replying(&full_reply());
        handler(provider.clone()).handle(&format!("  {}  ", JAMAAH)).await.unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], build_prompt(&Question::parse(JAMAAH).unwrap()));
    }

    #[tokio::test]
    async fn test_fenced_reply_accepted() {
        let provider = FakeProvider::replying(&format!("```json\n{}\n```", full_reply()));
        let result = handler(provider).handle(JAMAAH).await.unwrap();
        for (_, opinion) in result.opinions() {
            assert!(opinion.ruling.is_some());
        }
    }

    #[tokio::test]
    async fn test_empty_question_makes_no_backend_call() {
        let provider = FakeProvider::replying(&full_reply());
        let handler = handler(provider.clone());

        let err = handler.handle("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = handler.handle("   \n\t").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_handler() {
        let handler = FatwaRequestHandler::unconfigured(HandlerConfig::default());
        assert!(!handler.is_configured());

        let err = handler.handle(JAMAAH).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Misconfigured);

        // Input is still validated first.
        let err = handler.handle("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_missing_school_is_malformed() {
        let mut reply: serde_json::Value = serde_json::from_str(&full_reply()).unwrap();
        reply.as_object_mut().unwrap().remove("maliki");
        let provider = FakeProvider::replying(&reply.to_string());

        let err = handler(provider).handle(JAMAAH).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(matches!(
            err,
            HandlerError::MalformedResponse { reason: ReplyError::Schema(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_prose_reply_is_malformed() {
        let prose = "صلاة الجماعة سنة مؤكدة عند الحنفية والمالكية.";
        let provider = FakeProvider::replying(prose);

        let err = handler(provider).handle(JAMAAH).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert_eq!(err.raw_reply(), Some(prose));
    }

    #[tokio::test]
    async fn test_schema_failure_keeps_reply_out_of_display() {
        let reply = r#"{"hanafi": "الحكم عند الحنفية الجواز", "maliki": {}, "shafii": {}, "hanbali": {}}"#;
        let err = handler(FakeProvider::replying(reply)).handle(JAMAAH).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(!err.to_string().contains("الحكم عند الحنفية الجواز"));
        assert_eq!(err.raw_reply(), Some(reply));
    }

    #[tokio::test]
    async fn test_non_string_field_is_malformed() {
        let reply = r#"{"hanafi": {"ruling": ["a", "b"]}, "maliki": {}, "shafii": {}, "hanbali": {}}"#;
        let err = handler(FakeProvider::replying(reply)).handle(JAMAAH).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_missing_subfields_tolerated() {
        let reply = r#"{"hanafi": {"ruling": "جائز"}, "maliki": {}, "shafii": {"evidence": null}, "hanbali": {}}"#;
        let result = handler(FakeProvider::replying(reply)).handle(JAMAAH).await.unwrap();
        assert_eq!(result.opinion(School::Hanafi).ruling.as_deref(), Some("جائز"));
        assert_eq!(result.opinion(School::Shafii).evidence, None);
        assert_eq!(result.note, None);
    }

    #[tokio::test]
    async fn test_backend_question_echo_kept() {
        let reply = r#"{"question": "حكم صلاة الجماعة", "hanafi": {}, "maliki": {}, "shafii": {}, "hanbali": {}}"#;
        let result = handler(FakeProvider::replying(reply)).handle(JAMAAH).await.unwrap();
        assert_eq!(result.question, "حكم صلاة الجماعة");
    }

    #[tokio::test]
    async fn test_missing_question_echo_filled_from_caller() {
        let reply = r#"{"hanafi": {}, "maliki": {}, "shafii": {}, "hanbali": {}}"#;
        let result = handler(FakeProvider::replying(reply))
            .handle(&format!("{}\n", JAMAAH))
            .await
            .unwrap();
        assert_eq!(result.question, JAMAAH);
    }

    #[tokio::test]
    async fn test_rate_limit_is_rejected() {
        let provider = FakeProvider::failing(|| ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(10)),
        });
        let err = handler(provider.clone()).handle(JAMAAH).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendRejected);
        assert_eq!(err.backend_status(), Some(429));
        assert_eq!(provider.calls(), 1, "no retry");
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let provider = FakeProvider::failing(|| ProviderError::Status {
            status: 503,
            message: "overloaded".to_string(),
        });
        let err = handler(provider.clone()).handle(JAMAAH).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(err.backend_status(), Some(503));
        assert_eq!(provider.calls(), 1, "no retry");
    }

    #[tokio::test]
    async fn test_protocol_error_surfaces() {
        let provider =
            FakeProvider::failing(|| ProviderError::Protocol("no text content".to_string()));
        let err = handler(provider).handle(JAMAAH).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendProtocolError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_backend_times_out() {
        let provider = FakeProvider::slow(Duration::from_secs(600));
        let handler = FatwaRequestHandler::new(
            provider,
            HandlerConfig::default().with_timeout(Duration::from_secs(30)),
        );

        let err = handler.handle(JAMAAH).await.unwrap_err();
        assert!(matches!(err, HandlerError::Timeout(d) if d == Duration::from_secs(30)));
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_backend_call() {
        let provider = FakeProvider::slow(Duration::from_secs(50));
        let handler = handler(provider.clone());
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let err = handler
            .handle_with_cancellation(JAMAAH, token)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_reaches_backend() {
        let provider = FakeProvider::replying(&full_reply());
        let token = CancellationToken::new();
        token.cancel();

        let err = handler(provider.clone())
            .handle_with_cancellation(JAMAAH, token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let provider = FakeProvider::replying(&full_reply());
        let handler = Arc::new(handler(provider.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let question = if i % 2 == 0 { JAMAAH.to_string() } else { String::new() };
                    handler.handle(&question).await
                })
            })
            .collect();

        let mut ok = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 4);
        assert_eq!(provider.calls(), 4);
    }

    proptest! {
        #[test]
        fn prop_blank_questions_never_reach_backend(q in "[ \t\r\n\u{00A0}\u{3000}]{0,16}") {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let provider = FakeProvider::replying(&full_reply());
            let handler = handler(provider.clone());

            let err = runtime.block_on(handler.handle(&q)).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::InvalidInput);
            prop_assert_eq!(provider.calls(), 0);
        }
    }
}
