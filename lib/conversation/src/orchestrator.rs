//! Conversation orchestrator.
//!
//! One exchange turns one user message into one assistant reply:
//! 1. Take the session's lock and read its history
//! 2. Ask the model, offering the whole tool catalog
//! 3. If the first part of the answer is a function call, dispatch it, append
//!    the call and its result to the contents and ask again
//! 4. Append the user turn and the reply to the session
//!
//! At most one tool call is served per exchange. Failures are classified and
//! handed to the configured [`ErrorPolicy`].

use crate::dispatch::Dispatcher;
use crate::error::{ExchangeError, ExchangeErrorKind};
use crate::message::Turn;
use crate::policy::{ErrorOutcome, ErrorPolicy, ErrorPolicyKind, ExchangeFailure};
use crate::prompt::{SYSTEM_INSTRUCTION, reply_or_clarification};
use crate::session::SessionStore;
use rootcause::Report;
use serde::Deserialize;
use serde_json::json;
use skycast_ai::{Content, FunctionDeclaration, ModelBackend, ModelRequest, ModelResponse};
use skycast_core::{ExchangeId, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

/// Exchange settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Sampling temperature for both model calls.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Deadline for a whole exchange, both model calls and the tool call included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How failures are surfaced.
    #[serde(default)]
    pub error_policy: ErrorPolicyKind,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    90
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            error_policy: ErrorPolicyKind::default(),
        }
    }
}

/// An inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// User text.
    pub message: String,
    /// Conversation to continue; a new one is started when absent or unknown.
    pub session_id: Option<SessionId>,
}

impl ChatRequest {
    /// Creates a request that starts a new conversation.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
        }
    }

    /// Continues an existing conversation.
    #[must_use]
    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// The result of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    /// Session the exchange ran in.
    pub session_id: SessionId,
    /// Exchange identifier, for log correlation.
    pub exchange_id: ExchangeId,
    /// Reply text.
    pub response: String,
    /// The session's history after the exchange.
    pub history: Vec<Turn>,
    /// Turns this exchange appended; empty when the reply was not recorded.
    pub appended: Vec<Turn>,
    /// Failure kind when the reply came from the error policy.
    pub error_kind: Option<ExchangeErrorKind>,
}

/// Drives exchanges against the model, the dispatcher and the session store.
pub struct Orchestrator {
    backend: Arc<dyn ModelBackend>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn SessionStore>,
    policy: Arc<dyn ErrorPolicy>,
    tools: Vec<FunctionDeclaration>,
    temperature: f32,
    timeout: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.backend.model())
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn SessionStore>,
        config: &ExchangeConfig,
    ) -> Self {
        let tools = dispatcher.registry().declarations();
        Self {
            backend,
            dispatcher,
            store,
            policy: config.error_policy.build(),
            tools,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Replaces the error policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ErrorPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the exchange deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The session store exchanges write to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Runs one exchange.
    ///
    /// Exchanges on the same session are serialised; exchanges on different
    /// sessions run concurrently.
    ///
    /// # Errors
    ///
    /// Returns `Aborted` when the error policy aborts, leaving history
    /// untouched, and `Storage` when the session store fails.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, Report<ExchangeError>> {
        let requested = request.session_id;
        let (session_id, _) = self
            .store
            .get_or_create(requested)
            .await
            .map_err(|report| {
                report.context(ExchangeError::Storage {
                    session_id: requested,
                })
            })?;

        let created = requested != Some(session_id);
        let exchange_id = ExchangeId::new();
        let span = info_span!("exchange", %session_id, %exchange_id);
        self.exchange(session_id, exchange_id, created, request.message)
            .instrument(span)
            .await
    }

    async fn exchange(
        &self,
        session_id: SessionId,
        exchange_id: ExchangeId,
        created: bool,
        message: String,
    ) -> Result<ChatResponse, Report<ExchangeError>> {
        let storage = |report: Report<crate::error::SessionError>| {
            report.context(ExchangeError::Storage {
                session_id: Some(session_id),
            })
        };

        let _guard = self.store.lock(session_id).await;
        let mut history = self.store.history(session_id).await.map_err(storage)?;
        history.push(Turn::user(message));

        let outcome = match tokio::time::timeout(self.timeout, self.respond(&history)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout = ?self.timeout, "exchange timed out");
                Err(ExchangeFailure::new(
                    ExchangeErrorKind::TimedOut,
                    format!("no reply within {:?}", self.timeout),
                ))
            }
        };

        let (response, error_kind, persist) = match outcome {
            Ok(reply) => (reply, None, true),
            Err(failure) => match self.policy.decide(&failure) {
                ErrorOutcome::Persist { reply } => (reply, Some(failure.kind), true),
                ErrorOutcome::Reply { reply } => (reply, Some(failure.kind), false),
                ErrorOutcome::Abort => {
                    warn!(error_kind = %failure.kind, error = %failure.message, "exchange aborted");
                    if created {
                        // The caller never learns this id; drop the empty session.
                        self.store.remove(session_id).await.map_err(storage)?;
                    }
                    return Err(ExchangeError::Aborted {
                        kind: failure.kind,
                        reason: failure.message,
                    }
                    .into());
                }
            },
        };

        let appended = if persist {
            history.push(Turn::assistant(response.clone()));
            let appended = history[history.len() - 2..].to_vec();
            self.store
                .append(session_id, appended.clone())
                .await
                .map_err(storage)?;
            appended
        } else {
            history.pop();
            Vec::new()
        };

        info!(
            turns = history.len(),
            persisted = persist,
            error_kind = ?error_kind,
            "exchange complete"
        );
        Ok(ChatResponse {
            session_id,
            exchange_id,
            response,
            history,
            appended,
            error_kind,
        })
    }

    /// Runs the two-phase model protocol over `history` and returns the reply.
    ///
    /// `history` must end with the user turn being answered. Nothing is
    /// written to the session store.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the model call or the tool call.
    #[instrument(skip_all, fields(turns = history.len()))]
    pub async fn respond(&self, history: &[Turn]) -> Result<String, ExchangeFailure> {
        let contents = history.iter().map(Turn::to_content).collect();
        let mut request = ModelRequest::new(contents)
            .with_system_instruction(SYSTEM_INSTRUCTION)
            .with_tools(self.tools.clone())
            .with_temperature(self.temperature);

        let first = self.generate(&request).await?;
        let Some(call) = first.function_call().cloned() else {
            debug!("no tool requested");
            return Ok(reply_or_clarification(first.text()));
        };

        let result = self
            .dispatcher
            .dispatch(&call.name, &call.args)
            .await
            .map_err(|report| {
                let error = report.current_context();
                ExchangeFailure::new(error.kind(), error.to_string())
            })?;

        request.contents.push(first.content);
        request
            .contents
            .push(Content::function_response(call.name, json!({"result": result})));

        let second = self.generate(&request).await?;
        if second.function_call().is_some() {
            warn!("model asked for a second tool call, which is not served");
        }
        Ok(reply_or_clarification(second.text()))
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ExchangeFailure> {
        let response = self.backend.generate(request).await.map_err(|report| {
            let error = report.current_context();
            warn!(kind = "model", %error, "model call failed");
            ExchangeFailure::new(ExchangeErrorKind::ModelCall, error.to_string())
        })?;
        debug!(
            model = %response.model,
            tokens = response.usage.total(),
            "model responded"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TurnRole;
    use crate::policy::{CONTRACT_REPLY, NOT_FOUND_REPLY, TranscriptErrorPolicy};
    use crate::session::{InMemorySessionStore, SessionConfig};
    use crate::tool::{GET_WEATHER, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::Value as JsonValue;
    use skycast_ai::testing::ScriptedBackend;
    use skycast_ai::{FunctionCall, ModelError};
    use skycast_weather::testing::ScriptedSource;
    use skycast_weather::{WEATHER_FOLLOW_UP, WeatherConfig, WeatherService};
    use tokio::sync::Barrier;

    struct Harness {
        orchestrator: Orchestrator,
        store: Arc<InMemorySessionStore>,
    }

    fn harness(backend: Arc<dyn ModelBackend>, source: ScriptedSource) -> Harness {
        harness_with(backend, source, &SessionConfig::default())
    }

    fn harness_with(
        backend: Arc<dyn ModelBackend>,
        source: ScriptedSource,
        sessions: &SessionConfig,
    ) -> Harness {
        let service = WeatherService::new(Arc::new(source), WeatherConfig::new("test-key"));
        let dispatcher = Dispatcher::weather(Arc::new(ToolRegistry::weather()), Arc::new(service))
            .expect("weather bindings cover the catalog");
        let store = Arc::new(InMemorySessionStore::new(sessions));
        let orchestrator = Orchestrator::new(
            backend,
            Arc::new(dispatcher),
            store.clone(),
            &ExchangeConfig::default(),
        );
        Harness {
            orchestrator,
            store,
        }
    }

    fn berlin() -> JsonValue {
        json!([{"name": "Berlin", "lat": 52.52, "lon": 13.405, "country": "DE"}])
    }

    fn overcast() -> JsonValue {
        json!({"weather": [{"description": "overcast clouds"}], "main": {"temp": 9.11}})
    }

    /// Replies "re: <last user text>" after a short pause.
    struct EchoBackend {
        delay: Duration,
    }

    #[async_trait]
    impl ModelBackend for EchoBackend {
        async fn generate(
            &self,
            request: &ModelRequest,
        ) -> Result<ModelResponse, Report<ModelError>> {
            tokio::time::sleep(self.delay).await;
            let last = request.contents.last().map(Content::text).unwrap_or_default();
            Ok(ModelResponse::new(Content::model_text(format!("re: {last}")), "echo"))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    /// Replies only once `parties` calls are in flight together.
    struct BarrierBackend {
        barrier: Barrier,
    }

    #[async_trait]
    impl ModelBackend for BarrierBackend {
        async fn generate(
            &self,
            _request: &ModelRequest,
        ) -> Result<ModelResponse, Report<ModelError>> {
            self.barrier.wait().await;
            Ok(ModelResponse::new(Content::model_text("together"), "barrier"))
        }

        fn model(&self) -> &str {
            "barrier"
        }
    }

    #[tokio::test]
    async fn plain_reply_without_tool_call() {
        let backend = Arc::new(ScriptedBackend::new().text("Hi! Ask me about the weather."));
        let h = harness(backend.clone(), ScriptedSource::new());

        let response = h
            .orchestrator
            .chat(ChatRequest::new("Hello"))
            .await
            .expect("chat");

        assert_eq!(response.response, "Hi! Ask me about the weather.");
        assert_eq!(response.error_kind, None);
        assert_eq!(response.history.len(), 2);
        assert_eq!(response.appended, response.history);

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tools.len(), 5);
        assert_eq!(requests[0].system_instruction.as_deref(), Some(SYSTEM_INSTRUCTION));
        assert_eq!(requests[0].temperature, Some(0.7));
        assert_eq!(requests[0].contents, vec![Content::user_text("Hello")]);
    }

    #[tokio::test]
    async fn empty_reply_becomes_clarification() {
        let backend = Arc::new(ScriptedBackend::new().text(""));
        let h = harness(backend, ScriptedSource::new());

        let response = h
            .orchestrator
            .chat(ChatRequest::new("hmm"))
            .await
            .expect("chat");

        assert_eq!(response.response, "Could you please rephrase your question?");
    }

    #[tokio::test]
    async fn second_call_extends_first_call_contents() {
        let args = json!({"location": "Berlin", "units": "C"});
        let backend = Arc::new(
            ScriptedBackend::new()
                .call(GET_WEATHER, args.clone())
                .text("It's overcast in Berlin at 9°C."),
        );
        let h = harness(
            backend.clone(),
            ScriptedSource::new().reply(berlin()).reply(overcast()),
        );

        let response = h
            .orchestrator
            .chat(ChatRequest::new("Weather in Berlin?"))
            .await
            .expect("chat");

        assert_eq!(response.response, "It's overcast in Berlin at 9°C.");
        let requests = backend.requests();
        assert_eq!(requests.len(), 2);

        let JsonValue::Object(args) = args else {
            unreachable!()
        };
        let mut expected = requests[0].contents.clone();
        expected.push(Content::function_call(FunctionCall::new(GET_WEATHER, args)));
        expected.push(Content::function_response(
            GET_WEATHER,
            json!({"result": {
                "weather": "Berlin: Overcast clouds, 9C",
                "followups": WEATHER_FOLLOW_UP,
            }}),
        ));
        assert_eq!(requests[1].contents, expected);
        assert_eq!(requests[1].tools, requests[0].tools);

        // Only the user turn and the final reply are recorded.
        let history = h.store.history(response.session_id).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "It's overcast in Berlin at 9°C.");
    }

    #[tokio::test]
    async fn each_exchange_appends_two_turns() {
        let backend = Arc::new(EchoBackend {
            delay: Duration::ZERO,
        });
        let h = harness(backend, ScriptedSource::new());

        let first = h
            .orchestrator
            .chat(ChatRequest::new("one"))
            .await
            .expect("chat");
        let session_id = first.session_id;
        for message in ["two", "three"] {
            h.orchestrator
                .chat(ChatRequest::new(message).in_session(session_id))
                .await
                .expect("chat");
        }

        let history = h.store.history(session_id).await.expect("history");
        let contents: Vec<_> = history.iter().map(|turn| turn.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["one", "re: one", "two", "re: two", "three", "re: three"]
        );
        for (index, turn) in history.iter().enumerate() {
            let expected = if index % 2 == 0 {
                TurnRole::User
            } else {
                TurnRole::Assistant
            };
            assert_eq!(turn.role, expected);
        }
    }

    #[tokio::test]
    async fn unknown_session_starts_fresh() {
        let backend = Arc::new(ScriptedBackend::new().text("Hello"));
        let h = harness(backend, ScriptedSource::new());
        let stale = SessionId::new();

        let response = h
            .orchestrator
            .chat(ChatRequest::new("Hi").in_session(stale))
            .await
            .expect("chat");

        assert_ne!(response.session_id, stale);
        assert_eq!(response.history.len(), 2);
    }

    #[tokio::test]
    async fn same_session_exchanges_do_not_interleave() {
        let backend = Arc::new(EchoBackend {
            delay: Duration::from_millis(20),
        });
        let h = harness(backend, ScriptedSource::new());
        let (session_id, _) = h.store.get_or_create(None).await.expect("create");

        let (a, b) = tokio::join!(
            h.orchestrator
                .chat(ChatRequest::new("a").in_session(session_id)),
            h.orchestrator
                .chat(ChatRequest::new("b").in_session(session_id)),
        );
        a.expect("chat a");
        b.expect("chat b");

        let history = h.store.history(session_id).await.expect("history");
        assert_eq!(history.len(), 4);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, TurnRole::User);
            assert_eq!(pair[1].content, format!("re: {}", pair[0].content));
        }
        let mut users = vec![history[0].content.as_str(), history[2].content.as_str()];
        users.sort_unstable();
        assert_eq!(users, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn different_sessions_run_concurrently() {
        let backend = Arc::new(BarrierBackend {
            barrier: Barrier::new(2),
        });
        let h = harness(backend, ScriptedSource::new());

        // Each model call waits for the other; serialising them would hang.
        let both = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(
                h.orchestrator.chat(ChatRequest::new("first")),
                h.orchestrator.chat(ChatRequest::new("second")),
            )
        })
        .await
        .expect("sessions must not block each other");

        let (first, second) = (both.0.expect("first"), both.1.expect("second"));
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(first.response, "together");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_recorded() {
        let backend = Arc::new(
            ScriptedBackend::new().call("get_forcast", json!({"location": "Berlin", "units": "C"})),
        );
        let h = harness(backend.clone(), ScriptedSource::new());

        let response = h
            .orchestrator
            .chat(ChatRequest::new("Forecast for Berlin?"))
            .await
            .expect("chat");

        assert_eq!(response.response, CONTRACT_REPLY);
        assert_eq!(response.error_kind, Some(ExchangeErrorKind::UnknownTool));
        assert!(response.appended.is_empty());
        assert!(response.history.is_empty());
        assert_eq!(backend.requests().len(), 1);
        let history = h.store.history(response.session_id).await.expect("history");
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn missing_location_is_apologised_for_and_recorded() {
        let backend = Arc::new(
            ScriptedBackend::new().call(GET_WEATHER, json!({"location": "Atlantis", "units": "C"})),
        );
        let h = harness(backend, ScriptedSource::new().reply(json!([])));

        let response = h
            .orchestrator
            .chat(ChatRequest::new("Weather in Atlantis?"))
            .await
            .expect("chat");

        assert_eq!(response.response, NOT_FOUND_REPLY);
        assert_eq!(response.error_kind, Some(ExchangeErrorKind::NotFound));
        assert_eq!(response.appended.len(), 2);
        assert_eq!(response.appended[1].content, NOT_FOUND_REPLY);
    }

    #[tokio::test]
    async fn model_failure_aborts_and_leaves_history() {
        let backend = Arc::new(ScriptedBackend::new().fail(ModelError::RateLimited {
            retry_after_secs: Some(30),
        }));
        let h = harness(backend, ScriptedSource::new());
        let (session_id, _) = h.store.get_or_create(None).await.expect("create");

        let report = h
            .orchestrator
            .chat(ChatRequest::new("Hello").in_session(session_id))
            .await
            .expect_err("model failed");

        assert_eq!(report.current_context().kind(), Some(ExchangeErrorKind::ModelCall));
        let history = h.store.history(session_id).await.expect("history");
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn aborted_first_exchange_leaves_no_session() {
        let backend = Arc::new(ScriptedBackend::new().fail(ModelError::Timeout));
        let h = harness(backend, ScriptedSource::new());

        h.orchestrator
            .chat(ChatRequest::new("Hello"))
            .await
            .expect_err("model failed");

        assert!(h.store.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn running_exchange_survives_a_full_store() {
        let backend = Arc::new(EchoBackend {
            delay: Duration::from_millis(200),
        });
        let h = harness_with(
            backend,
            ScriptedSource::new(),
            &SessionConfig {
                max_sessions: 1,
                ..SessionConfig::default()
            },
        );

        let (first, second) = tokio::join!(
            h.orchestrator.chat(ChatRequest::new("first")),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                h.orchestrator.chat(ChatRequest::new("second")).await
            },
        );

        let first = first.expect("first exchange keeps its session");
        let second = second.expect("second");
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(first.history.len(), 2);
        assert_eq!(first.response, "re: first");
    }

    #[tokio::test]
    async fn transcript_policy_records_the_error() {
        let backend = Arc::new(ScriptedBackend::new().fail(ModelError::Timeout));
        let h = harness(backend, ScriptedSource::new());
        let orchestrator = h.orchestrator.with_policy(Arc::new(TranscriptErrorPolicy));

        let response = orchestrator
            .chat(ChatRequest::new("Hello"))
            .await
            .expect("chat");

        assert!(response.response.starts_with("An error occurred: "));
        assert_eq!(response.error_kind, Some(ExchangeErrorKind::ModelCall));
        assert_eq!(response.appended.len(), 2);
        let history = h.store.history(response.session_id).await.expect("history");
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn slow_exchange_times_out() {
        let backend = Arc::new(EchoBackend {
            delay: Duration::from_secs(5),
        });
        let h = harness(backend, ScriptedSource::new());
        let orchestrator = h.orchestrator.with_timeout(Duration::from_millis(50));

        let report = orchestrator
            .chat(ChatRequest::new("Hello"))
            .await
            .expect_err("deadline passed");

        assert_eq!(report.current_context().kind(), Some(ExchangeErrorKind::TimedOut));
    }
}
