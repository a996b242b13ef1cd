use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, instrument};

use super::reply_parts::{
    build_turn_request, collect_completion, execute_tool_calls, response_fragments, synthesize,
    FollowUp,
};
use crate::accumulator::{Accumulated, DeltaAccumulator};
use crate::errors::AgentError;
use crate::message::Message;
use crate::providers::base::{Completion, FragmentStream, Provider};
use crate::providers::errors::ProviderError;
use crate::providers::Fragment;
use crate::session::{Session, SessionHandle};
use crate::tools::ToolRegistry;

/// Stored when the model answers a turn with neither text nor tool calls
pub const EMPTY_REPLY_FALLBACK: &str = "I couldn't generate a response.";

pub const DEFAULT_HISTORY_WINDOW: usize = 5;
pub const DEFAULT_FOLLOW_UP_WINDOW: usize = 3;
pub const DEFAULT_STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Prior messages sent with the first call of a turn
    pub history_window: usize,
    /// Prior messages sent with the follow-up call
    pub follow_up_window: usize,
    /// Capacity of the channel behind a streamed reply
    pub stream_buffer: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            follow_up_window: DEFAULT_FOLLOW_UP_WINDOW,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

/// One incoming chat message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }
}

/// Text fragments of a turn in arrival order. An `Err` item is always the
/// last one and means the turn was aborted.
pub type ReplyStream = ReceiverStream<Result<String, AgentError>>;

#[derive(Debug)]
pub enum Reply {
    /// The session after the turn finished
    Complete(Session),
    Stream(ReplyStream),
}

/// Drives chat turns against a provider and a tool registry
pub struct ChatAgent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl ChatAgent {
    pub fn new(provider: Arc<dyn Provider>, tools: ToolRegistry) -> Self {
        Self {
            provider,
            tools: Arc::new(tools),
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one chat turn on `session`.
    ///
    /// Every turn runs in its own task. Non-streaming requests wait for it and
    /// return once the assistant message is stored; a caller that stops waiting
    /// does not cancel the turn. Streaming requests return right away and the
    /// task writes to the returned stream.
    ///
    /// # Errors
    /// `InvalidInput` for blank text and `Busy` while another turn is running,
    /// both without touching the session. `Backend` when a non-streaming turn
    /// fails, `Interrupted` when its task panics; streaming failures arrive
    /// inside the stream instead.
    pub async fn handle_message(
        &self,
        session: &SessionHandle,
        request: ChatRequest,
    ) -> Result<Reply, AgentError> {
        let text = request.message.trim();
        if text.is_empty() {
            return Err(AgentError::InvalidInput("message must not be empty".to_string()));
        }

        let user = Message::user(text);
        let model = request.model.as_deref();
        let started = session.try_update(|s| s.begin_turn(user, model)).await?;
        info!(
            session_id = %started.session_id,
            model = %started.model,
            messages = started.messages.len(),
            "turn started"
        );

        let turn = Turn {
            provider: Arc::clone(&self.provider),
            tools: Arc::clone(&self.tools),
            config: self.config.clone(),
            session: session.clone(),
        };

        if request.stream.unwrap_or(false) {
            let (tx, rx) = mpsc::channel(self.config.stream_buffer.max(1));
            tokio::spawn(turn.supervise(Output::channel(tx)));
            return Ok(Reply::Stream(ReceiverStream::new(rx)));
        }

        tokio::spawn(turn.supervise(Output::Discard))
            .await
            .map_err(|e| AgentError::Interrupted(e.to_string()))??;
        Ok(Reply::Complete(session.snapshot().await))
    }
}

/// Where a turn's text goes besides the session
enum Output {
    Discard,
    Channel {
        tx: mpsc::Sender<Result<String, AgentError>>,
        open: bool,
    },
}

impl Output {
    fn channel(tx: mpsc::Sender<Result<String, AgentError>>) -> Self {
        Output::Channel { tx, open: true }
    }

    fn is_streaming(&self) -> bool {
        matches!(self, Output::Channel { .. })
    }

    async fn send(&mut self, text: String) {
        if let Output::Channel { tx, open } = self {
            if *open && tx.send(Ok(text)).await.is_err() {
                debug!("reply consumer went away, no longer forwarding");
                *open = false;
            }
        }
    }

    /// A second handle on the same consumer
    fn fork(&self) -> Self {
        match self {
            Output::Discard => Output::Discard,
            Output::Channel { tx, open } => Output::Channel {
                tx: tx.clone(),
                open: *open,
            },
        }
    }

    /// Hand a turn failure to the consumer. A stream carries it as its last
    /// item; without one it goes back to the caller.
    async fn fail(&mut self, error: AgentError) -> Result<(), AgentError> {
        match self {
            Output::Discard => Err(error),
            Output::Channel { tx, open } => {
                if *open {
                    let _ = tx.send(Err(error)).await;
                }
                Ok(())
            }
        }
    }
}

/// State a running turn needs, detached from the agent so it can be spawned
struct Turn {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    session: SessionHandle,
}

impl Turn {
    /// Run the turn in a task of its own and clean up if that task dies.
    ///
    /// A panic anywhere in the turn still leaves the session idle, and a
    /// streamed reply still ends with an `Err` item.
    async fn supervise(self, mut output: Output) -> Result<(), AgentError> {
        let session = self.session.clone();
        let mut fallback = output.fork();
        let task = tokio::spawn(async move {
            match self.run(&mut output).await {
                Ok(()) => Ok(()),
                Err(e) => output.fail(e).await,
            }
        });

        match task.await {
            Ok(result) => result,
            Err(join_error) => {
                session.update(Session::abort_turn).await;
                error!(error = %join_error, "turn task died");
                fallback
                    .fail(AgentError::Interrupted(join_error.to_string()))
                    .await
            }
        }
    }

    async fn run(&self, output: &mut Output) -> Result<(), AgentError> {
        let result = self.drive(output).await;
        if let Err(e) = &result {
            self.session.update(Session::abort_turn).await;
            error!(error = %e, "turn aborted");
        }
        result.map_err(AgentError::from)
    }

    #[instrument(name = "turn", skip_all)]
    async fn drive(&self, output: &mut Output) -> Result<(), ProviderError> {
        let snapshot = self.session.snapshot().await;
        let streaming = output.is_streaming();
        let request = build_turn_request(
            &snapshot,
            self.config.history_window,
            self.tools.definitions(),
            streaming,
        );

        let completion = self.provider.complete(request).await?;
        let accumulated = if streaming {
            self.forward(completion, output).await?
        } else {
            collect_completion(completion).await?
        };

        if accumulated.tool_calls.is_empty() {
            let text = if accumulated.text.is_empty() {
                debug!("empty answer, storing fallback");
                output.send(EMPTY_REPLY_FALLBACK.to_string()).await;
                EMPTY_REPLY_FALLBACK.to_string()
            } else {
                accumulated.text
            };
            self.session
                .update(|s| s.finish_turn(Message::assistant(text)))
                .await;
            info!(session_id = %snapshot.session_id, "turn finished");
            return Ok(());
        }

        info!(
            session_id = %snapshot.session_id,
            tool_calls = accumulated.tool_calls.len(),
            "processing tool calls"
        );
        self.session.update(Session::discard_stream).await;

        let executed = execute_tool_calls(&self.tools, &accumulated.tool_calls).await;
        let user_message = snapshot
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let answer = synthesize(
            self.provider.as_ref(),
            FollowUp {
                model: &snapshot.model,
                system_prompt: &snapshot.system_prompt,
                history: snapshot.prior_messages(self.config.follow_up_window),
                user_message,
                requested: &accumulated.tool_calls,
                executed: &executed,
            },
        )
        .await?;

        let message = Message::assistant(answer.clone()).with_tool_calls(executed);
        self.session.update(|s| s.finish_turn(message)).await;
        output.send(answer).await;
        info!(session_id = %snapshot.session_id, "turn finished after tool calls");
        Ok(())
    }

    /// Apply each fragment to the session, forward its text, and reduce the lot
    async fn forward(
        &self,
        completion: Completion,
        output: &mut Output,
    ) -> Result<Accumulated, ProviderError> {
        let mut fragments: FragmentStream = match completion {
            Completion::Stream(stream) => stream,
            Completion::Full(response) => {
                futures::stream::iter(response_fragments(response).into_iter().map(Ok)).boxed()
            }
        };

        self.session.update(Session::start_streaming).await;
        let mut accumulator = DeltaAccumulator::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if let Fragment::Text(text) = &fragment {
                self.session.update(|s| s.append_stream_text(text)).await;
                output.send(text.clone()).await;
            }
            accumulator.push(fragment);
        }
        debug!(fragments = accumulator.fragment_count(), "stream finished");
        Ok(accumulator.finish())
    }
}
