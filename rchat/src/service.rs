//! Chat service for one-shot turns, streamed turns and searches.
//!
//! Every operation runs the same admission sequence before any upstream work: request
//! validation, rate limiting by user, then the quota gate. Attachments and history are
//! read next, so an unreadable file never reaches the network.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Instant, SystemTime};

use futures_core::Stream;
use rcommon::{GenerationOptions, SessionId, TraceId, UserId};
use rgateway::{
    GatewayClient, Message, MessageContent, ModelRequest, ModelResponse, Role, StreamEvent,
    StreamHandle, TokenUsage, ToolDeclaration, ToolInvocation,
};
use rtooling::{
    ToolExecutionContext, ToolExecutor, ToolRuntime, ToolSet, builtin_registry, render_outcomes,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::prompt::{
    SEARCH_SYSTEM_PROMPT, assemble_messages, load_attachments, search_prompt, user_content,
};
use crate::types::new_id;
use crate::{
    ChatError, ChatErrorKind, ChatEvent, ChatEventStream, ChatHooks, ChatOperation,
    ChatTurnRequest, ChatTurnResult, HistoryStore, InMemoryHistoryStore, InMemorySearchLog,
    NoopChatHooks, QuotaGate, QuotaKind, QuotaTicket, RateLimiter, SearchLog, SearchOutcome,
    SearchRequest, Turn, UnlimitedRateLimiter,
};

pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Capacity of the channel between a streamed turn's task and its consumer.
const CHAT_EVENT_BUFFER: usize = 16;

/// Model, sampling and prompt settings applied to every upstream request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPolicy {
    pub model: String,
    pub options: GenerationOptions,
    /// Falls back to the built-in prompt when unset or blank.
    pub system_prompt: Option<String>,
    /// Number of most recent turns replayed into each request.
    pub history_window: usize,
    pub tool_set: ToolSet,
    pub search_tool_set: ToolSet,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            options: GenerationOptions::default()
                .with_temperature(0.7)
                .with_max_tokens(4096)
                .with_top_p(1.0)
                .with_frequency_penalty(0.0)
                .with_presence_penalty(0.0),
            system_prompt: None,
            history_window: DEFAULT_HISTORY_WINDOW,
            tool_set: ToolSet::Chat,
            search_tool_set: ToolSet::Search,
        }
    }
}

impl ChatPolicy {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    pub fn with_tool_set(mut self, tool_set: ToolSet) -> Self {
        self.tool_set = tool_set;
        self
    }

    pub fn with_search_tool_set(mut self, tool_set: ToolSet) -> Self {
        self.search_tool_set = tool_set;
        self
    }
}

/// Answer to [`ChatService::respond`], shaped by the request's `want_stream` flag.
pub enum ChatReply {
    Complete(ChatTurnResult),
    Stream(ChatEventStream<'static>),
}

#[derive(Clone)]
pub struct ChatService {
    gateway: Arc<dyn GatewayClient>,
    history: Arc<dyn HistoryStore>,
    tools: Arc<dyn ToolRuntime>,
    quota: Option<QuotaGate>,
    limiter: Arc<dyn RateLimiter>,
    search_log: Arc<dyn SearchLog>,
    hooks: Arc<dyn ChatHooks>,
    policy: ChatPolicy,
}

pub struct ChatServiceBuilder {
    gateway: Arc<dyn GatewayClient>,
    history: Option<Arc<dyn HistoryStore>>,
    tools: Option<Arc<dyn ToolRuntime>>,
    quota: Option<QuotaGate>,
    limiter: Option<Arc<dyn RateLimiter>>,
    search_log: Option<Arc<dyn SearchLog>>,
    hooks: Option<Arc<dyn ChatHooks>>,
    policy: ChatPolicy,
}

impl ChatServiceBuilder {
    pub fn new(gateway: Arc<dyn GatewayClient>) -> Self {
        Self {
            gateway,
            history: None,
            tools: None,
            quota: None,
            limiter: None,
            search_log: None,
            hooks: None,
            policy: ChatPolicy::default(),
        }
    }

    pub fn history_store(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn tools(mut self, tools: Arc<dyn ToolRuntime>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Without a gate every request is admitted and nothing is charged.
    pub fn quota(mut self, quota: QuotaGate) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn search_log(mut self, search_log: Arc<dyn SearchLog>) -> Self {
        self.search_log = Some(search_log);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ChatHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Unset collaborators default to in-memory stores, the built-in tools, no rate
    /// limit and no-op hooks.
    pub fn build(self) -> Result<ChatService, ChatError> {
        let tools = match self.tools {
            Some(tools) => tools,
            None => {
                let registry = builtin_registry().map_err(|error| {
                    ChatError::new(
                        ChatErrorKind::InvalidRequest,
                        format!("failed to register built-in tools: {error}"),
                    )
                })?;
                Arc::new(ToolExecutor::new(Arc::new(registry)))
            }
        };

        Ok(ChatService {
            gateway: self.gateway,
            history: self
                .history
                .unwrap_or_else(|| Arc::new(InMemoryHistoryStore::new())),
            tools,
            quota: self.quota,
            limiter: self.limiter.unwrap_or_else(|| Arc::new(UnlimitedRateLimiter)),
            search_log: self
                .search_log
                .unwrap_or_else(|| Arc::new(InMemorySearchLog::new())),
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoopChatHooks)),
            policy: self.policy,
        })
    }
}

impl ChatService {
    pub fn builder(gateway: Arc<dyn GatewayClient>) -> ChatServiceBuilder {
        ChatServiceBuilder::new(gateway)
    }

    pub fn policy(&self) -> &ChatPolicy {
        &self.policy
    }

    /// Routes the request to [`Self::run_turn`] or [`Self::stream_turn`] by its
    /// `want_stream` flag.
    pub async fn respond(
        &self,
        request: ChatTurnRequest,
        cancel: CancellationToken,
    ) -> Result<ChatReply, ChatError> {
        if request.want_stream {
            self.stream_turn(request, cancel)
                .await
                .map(ChatReply::Stream)
        } else {
            self.run_turn(request).await.map(ChatReply::Complete)
        }
    }

    pub async fn run_turn(&self, request: ChatTurnRequest) -> Result<ChatTurnResult, ChatError> {
        if request.want_stream {
            return Err(ChatError::invalid_request(
                "use stream_turn for streaming requests",
            ));
        }

        let started = Instant::now();
        let user_id = request.user_id.clone();
        self.hooks.on_turn_start(ChatOperation::Turn, &user_id);

        let result = self.complete_turn(request).await;
        self.report(
            ChatOperation::Turn,
            &user_id,
            result.as_ref().map(|turn| turn.token_cost),
            started,
        );
        result
    }

    /// Starts a streamed turn. Admission and assembly failures are returned directly;
    /// once the upstream call starts, every outcome arrives on the stream. Dropping the
    /// stream cancels the upstream call.
    pub async fn stream_turn(
        &self,
        request: ChatTurnRequest,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream<'static>, ChatError> {
        let started = Instant::now();
        let user_id = request.user_id.clone();
        self.hooks.on_turn_start(ChatOperation::StreamTurn, &user_id);

        let (prepared, ticket) = match self.open_turn(request).await {
            Ok(opened) => opened,
            Err(error) => {
                self.report(ChatOperation::StreamTurn, &user_id, Err(&error), started);
                return Err(error);
            }
        };

        let turn_cancel = cancel.child_token();
        let handle = self
            .gateway
            .stream(prepared.model_request.clone(), turn_cancel.clone());
        let (events_tx, events) = mpsc::channel(CHAT_EVENT_BUFFER);

        let service = self.clone();
        let relay_cancel = turn_cancel.clone();
        tokio::spawn(async move {
            service
                .relay_turn(prepared, ticket, handle, relay_cancel, events_tx, started)
                .await;
        });

        Ok(Box::pin(ChatEventReceiver {
            events,
            _cancel_on_drop: turn_cancel.drop_guard(),
        }))
    }

    pub async fn run_search(&self, request: SearchRequest) -> Result<SearchOutcome, ChatError> {
        let started = Instant::now();
        let user_id = request.user_id.clone();
        self.hooks.on_turn_start(ChatOperation::Search, &user_id);

        let result = self.search(request).await;
        self.report(
            ChatOperation::Search,
            &user_id,
            result.as_ref().map(|outcome| outcome.token_cost),
            started,
        );
        result
    }

    /// Most recent searches of a user, newest first.
    pub async fn recent_searches(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<SearchOutcome>, ChatError> {
        self.search_log.recent(user_id, limit).await
    }

    async fn complete_turn(&self, request: ChatTurnRequest) -> Result<ChatTurnResult, ChatError> {
        let (prepared, ticket) = self.open_turn(request).await?;

        let answered = self.answer_turn(&prepared).await;
        let (response, text) = match answered {
            Ok(answered) => answered,
            Err(error) => {
                self.release(ticket).await;
                return Err(error);
            }
        };

        self.settle(ticket, true).await?;

        let token_cost = response.total_tokens().unwrap_or(0);
        let (user, assistant) = prepared.exchange(text, token_cost);
        let result = ChatTurnResult {
            id: assistant.id.clone(),
            session_id: prepared.session_id.clone(),
            text: assistant.content.flatten_text(),
            token_cost,
            upstream_id: Some(response.id).filter(|id| !id.is_empty()),
            created_at: assistant.created_at,
        };

        self.history.append_exchange(user, assistant).await?;
        Ok(result)
    }

    async fn answer_turn(
        &self,
        prepared: &PreparedTurn,
    ) -> Result<(ModelResponse, String), ChatError> {
        let response = self
            .gateway
            .complete(prepared.model_request.clone())
            .await?;
        let text = self
            .reply_text(ChatOperation::Turn, &prepared.user_id, &response, prepared.tool_context())
            .await?;
        Ok((response, text))
    }

    /// Admission followed by assembly. A failed assembly returns the admitted quota.
    async fn open_turn(
        &self,
        request: ChatTurnRequest,
    ) -> Result<(PreparedTurn, Option<QuotaTicket>), ChatError> {
        if request.session_id.as_str().trim().is_empty() {
            return Err(ChatError::invalid_request("session_id must not be empty"));
        }

        if request.text.trim().is_empty() && request.attachments.is_empty() {
            return Err(ChatError::invalid_request("text must not be empty"));
        }

        self.check_rate(&request.user_id)?;
        let ticket = self.admit(&request.user_id, QuotaKind::Chat).await?;

        match self.prepare_turn(request).await {
            Ok(prepared) => Ok((prepared, ticket)),
            Err(error) => {
                self.release(ticket).await;
                Err(error)
            }
        }
    }

    async fn prepare_turn(&self, request: ChatTurnRequest) -> Result<PreparedTurn, ChatError> {
        let ChatTurnRequest {
            session_id,
            user_id,
            text,
            attachments,
            want_stream: _,
        } = request;

        let parts = load_attachments(&attachments).await?;
        let content = user_content(&text, parts);
        let history = self
            .history
            .replay_history(&session_id, self.policy.history_window)
            .await?;

        let messages = assemble_messages(
            self.policy.system_prompt.as_deref(),
            &history,
            content.clone(),
        );
        let model_request = ModelRequest::new(self.policy.model.clone(), messages)
            .with_options(self.policy.options.clone())
            .with_tools(self.policy.tool_set.declarations());
        model_request
            .validate()
            .map_err(|error| ChatError::invalid_request(error.message))?;

        Ok(PreparedTurn {
            session_id,
            user_id,
            trace_id: TraceId::from(new_id()),
            content,
            model_request,
        })
    }

    async fn relay_turn(
        self,
        prepared: PreparedTurn,
        ticket: Option<QuotaTicket>,
        mut handle: StreamHandle,
        cancel: CancellationToken,
        events: mpsc::Sender<ChatEvent>,
        started: Instant,
    ) {
        let mut text = String::new();
        let mut usage = None::<TokenUsage>;
        let mut invocations = Vec::<ToolInvocation>::new();

        let failure = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = handle.events.recv() => Some(event),
            };

            let Some(event) = next else {
                break Some(ChatError::cancelled("turn cancelled"));
            };

            match event {
                Some(StreamEvent::TextDelta(fragment)) => {
                    text.push_str(&fragment);
                    self.hooks.on_fragment(&prepared.user_id, fragment.len());
                    if events.send(ChatEvent::Fragment(fragment)).await.is_err() {
                        cancel.cancel();
                        break Some(ChatError::cancelled("stream receiver dropped"));
                    }
                }
                Some(StreamEvent::ToolCalls(calls)) => invocations.extend(calls),
                Some(StreamEvent::Usage(reported)) => usage = Some(reported),
                None => break handle.errors.recv().await.map(ChatError::from),
            }
        };

        let token_cost = usage.map(|usage| usage.total_tokens).unwrap_or(0);
        match failure {
            None => {
                self.complete_stream(
                    prepared,
                    ticket,
                    text,
                    invocations,
                    token_cost,
                    &events,
                    started,
                )
                .await
            }
            Some(error) => {
                self.fail_stream(prepared, ticket, text, token_cost, error, &events, started)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn complete_stream(
        &self,
        prepared: PreparedTurn,
        ticket: Option<QuotaTicket>,
        mut text: String,
        invocations: Vec<ToolInvocation>,
        token_cost: u32,
        events: &mpsc::Sender<ChatEvent>,
        started: Instant,
    ) {
        if !invocations.is_empty() {
            let rendered = self
                .run_tools(
                    ChatOperation::StreamTurn,
                    &prepared.user_id,
                    invocations,
                    prepared.tool_context(),
                )
                .await;
            let fragment = tool_fragment(&text, rendered);

            text.push_str(&fragment);
            self.hooks.on_fragment(&prepared.user_id, fragment.len());
            let _ = events.send(ChatEvent::Fragment(fragment)).await;
        }

        let (user, assistant) = prepared.exchange(text, token_cost);
        let result = ChatTurnResult {
            id: assistant.id.clone(),
            session_id: prepared.session_id.clone(),
            text: assistant.content.flatten_text(),
            token_cost,
            upstream_id: None,
            created_at: assistant.created_at,
        };

        let outcome: Result<ChatTurnResult, ChatError> = async {
            self.settle(ticket, true).await?;
            self.history
                .append_exchange(user, assistant)
                .await
                .inspect_err(|error| {
                    tracing::warn!(session_id = %prepared.session_id, %error, "failed to persist streamed turn");
                })?;
            Ok(result)
        }
        .await;

        self.report(
            ChatOperation::StreamTurn,
            &prepared.user_id,
            outcome.as_ref().map(|_| token_cost),
            started,
        );

        let terminal = match outcome {
            Ok(result) => ChatEvent::Completed(result),
            Err(error) => ChatEvent::Failed(error),
        };
        let _ = events.send(terminal).await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn fail_stream(
        &self,
        prepared: PreparedTurn,
        ticket: Option<QuotaTicket>,
        text: String,
        token_cost: u32,
        error: ChatError,
        events: &mpsc::Sender<ChatEvent>,
        started: Instant,
    ) {
        self.release(ticket).await;
        self.report(ChatOperation::StreamTurn, &prepared.user_id, Err(&error), started);
        let _ = events.send(ChatEvent::Failed(error)).await;

        if text.is_empty() {
            return;
        }

        let session_id = prepared.session_id.clone();
        let (user, assistant) = prepared.exchange(text, token_cost);
        if let Err(error) = self.history.append_exchange(user, assistant).await {
            tracing::warn!(%session_id, %error, "failed to persist partial streamed turn");
            let _ = events.send(ChatEvent::Failed(error)).await;
        }
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchOutcome, ChatError> {
        if request.query.trim().is_empty() {
            return Err(ChatError::invalid_request("query must not be empty"));
        }

        self.check_rate(&request.user_id)?;
        let ticket = self.admit(&request.user_id, QuotaKind::Search).await?;

        let id = new_id();
        let (text, token_cost) = match self.answer_search(&id, &request).await {
            Ok(answered) => answered,
            Err(error) => {
                self.release(ticket).await;
                return Err(error);
            }
        };

        self.settle(ticket, true).await?;

        let outcome = SearchOutcome {
            id,
            user_id: request.user_id,
            query: request.query,
            text,
            token_cost,
            created_at: SystemTime::now(),
        };
        self.search_log.record(outcome.clone()).await?;
        Ok(outcome)
    }

    async fn answer_search(
        &self,
        trace_id: &str,
        request: &SearchRequest,
    ) -> Result<(String, u32), ChatError> {
        let messages = vec![
            Message::system(SEARCH_SYSTEM_PROMPT),
            Message::user(search_prompt(&request.query)),
        ];
        let model_request = ModelRequest::new(self.policy.model.clone(), messages)
            .with_options(self.policy.options.clone())
            .with_tools(search_declarations(
                self.policy.search_tool_set,
                request.limit,
            ));

        let response = self.gateway.complete(model_request).await?;
        let context = ToolExecutionContext::new(format!("search:{}", request.user_id))
            .with_user_id(request.user_id.clone())
            .with_trace_id(trace_id);
        let text = self
            .reply_text(ChatOperation::Search, &request.user_id, &response, context)
            .await?;

        Ok((text, response.total_tokens().unwrap_or(1)))
    }

    /// Text of the first choice, followed by the rendered tool output when the choice
    /// requests tools.
    async fn reply_text(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        response: &ModelResponse,
        context: ToolExecutionContext,
    ) -> Result<String, ChatError> {
        let choice = response.first_choice().ok_or_else(ChatError::no_response)?;
        if choice.tool_invocations.is_empty() {
            return Ok(choice.text.clone());
        }

        let rendered = self
            .run_tools(operation, user_id, choice.tool_invocations.clone(), context)
            .await;
        Ok(format!(
            "{}{}",
            choice.text,
            tool_fragment(&choice.text, rendered)
        ))
    }

    async fn run_tools(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        invocations: Vec<ToolInvocation>,
        context: ToolExecutionContext,
    ) -> String {
        self.hooks.on_tool_calls(operation, user_id, invocations.len());
        tracing::debug!(
            operation = operation.as_str(),
            count = invocations.len(),
            "executing tool calls"
        );

        let outcomes = self.tools.execute_all(invocations, context).await;
        render_outcomes(&outcomes)
    }

    fn check_rate(&self, user_id: &UserId) -> Result<(), ChatError> {
        if user_id.as_str().trim().is_empty() {
            return Err(ChatError::invalid_request("user_id must not be empty"));
        }

        if self.limiter.try_acquire(user_id.as_str()) {
            Ok(())
        } else {
            Err(ChatError::rate_limited(format!(
                "rate limit exceeded for user {user_id}"
            )))
        }
    }

    async fn admit(
        &self,
        user_id: &UserId,
        kind: QuotaKind,
    ) -> Result<Option<QuotaTicket>, ChatError> {
        match &self.quota {
            Some(gate) => gate.admit(user_id, kind).await.map(Some),
            None => Ok(None),
        }
    }

    async fn settle(&self, ticket: Option<QuotaTicket>, succeeded: bool) -> Result<(), ChatError> {
        match (&self.quota, ticket) {
            (Some(gate), Some(ticket)) => gate.settle(ticket, succeeded).await,
            _ => Ok(()),
        }
    }

    /// Settles a failed operation. Errors are logged; the operation's own error wins.
    async fn release(&self, ticket: Option<QuotaTicket>) {
        if let Err(error) = self.settle(ticket, false).await {
            tracing::warn!(%error, "failed to release quota");
        }
    }

    fn report(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        outcome: Result<u32, &ChatError>,
        started: Instant,
    ) {
        let elapsed = started.elapsed();
        match outcome {
            Ok(token_cost) => {
                tracing::debug!(
                    operation = operation.as_str(),
                    %user_id,
                    token_cost,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "chat operation completed"
                );
                self.hooks
                    .on_turn_complete(operation, user_id, token_cost, elapsed);
            }
            Err(error) => {
                if error.is_user_error() {
                    tracing::debug!(operation = operation.as_str(), %user_id, %error, "chat operation rejected");
                } else {
                    tracing::warn!(operation = operation.as_str(), %user_id, %error, "chat operation failed");
                }
                self.hooks
                    .on_turn_failure(operation, user_id, error, elapsed);
            }
        }
    }
}

struct PreparedTurn {
    session_id: SessionId,
    user_id: UserId,
    trace_id: TraceId,
    content: MessageContent,
    model_request: ModelRequest,
}

impl PreparedTurn {
    fn tool_context(&self) -> ToolExecutionContext {
        ToolExecutionContext::new(self.session_id.clone())
            .with_user_id(self.user_id.clone())
            .with_trace_id(self.trace_id.clone())
    }

    fn exchange(&self, text: String, token_cost: u32) -> (Turn, Turn) {
        (
            Turn::new(self.session_id.clone(), Role::User, self.content.clone(), 0),
            Turn::new(self.session_id.clone(), Role::Assistant, text, token_cost),
        )
    }
}

/// Tool output as it follows `text`: separated by a blank line unless nothing precedes
/// it. Shared by the one-shot and streamed paths.
fn tool_fragment(text: &str, rendered: String) -> String {
    if text.is_empty() {
        rendered
    } else {
        format!("\n\n{rendered}")
    }
}

/// Declarations for a search call. `limit` replaces the advertised `num_results`
/// default.
fn search_declarations(tool_set: ToolSet, limit: Option<u32>) -> Vec<ToolDeclaration> {
    let mut declarations = tool_set.declarations();
    if let Some(limit) = limit {
        for declaration in &mut declarations {
            if let Some(num_results) = declaration
                .parameters
                .pointer_mut("/properties/num_results")
                .and_then(Value::as_object_mut)
            {
                num_results.insert("default".to_string(), Value::from(limit));
            }
        }
    }
    declarations
}

struct ChatEventReceiver {
    events: mpsc::Receiver<ChatEvent>,
    _cancel_on_drop: DropGuard,
}

impl Stream for ChatEventReceiver {
    type Item = ChatEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}
