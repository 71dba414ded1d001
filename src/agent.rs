//! Agent capability, per-agent inbox, and the run-loop that drives it.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::lock;
use crate::core::router::{Delivery, Router};
use crate::error::{Error, Result};
use crate::protocol::{Collaboration, Envelope, Payload, TaskRequest, TaskResponse};

/// Behaviour of an agent. The run-loop owns dispatch; implementors only
/// supply handlers.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Unique name used as the routing key.
    fn name(&self) -> &str;

    /// Process a task and return its result. The result is sent back to the
    /// requester as a `task_response`; an error is sent back as an error
    /// response instead.
    async fn process_task(&self, ctx: &AgentContext, task: TaskRequest) -> Result<Value>;

    /// React to a collaboration request.
    async fn handle_collaboration_request(
        &self,
        _ctx: &AgentContext,
        _envelope: &Envelope,
        _request: Collaboration,
    ) -> Result<()> {
        Ok(())
    }

    /// Any other message kind.
    async fn handle_other(&self, _ctx: &AgentContext, _envelope: &Envelope) -> Result<()> {
        Ok(())
    }
}

/// What a handler can see of its surroundings.
#[derive(Clone)]
pub struct AgentContext {
    name: String,
    router: Option<Arc<Router>>,
}

impl AgentContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn router(&self) -> Option<&Arc<Router>> {
        self.router.as_ref()
    }

    /// Send a message stamped with this agent's name.
    pub fn send_message(&self, recipient: &str, payload: Payload) -> Result<Delivery> {
        let envelope = Envelope::new(&self.name, recipient, payload);
        match &self.router {
            Some(router) => router.route(envelope),
            None => {
                tracing::warn!(
                    agent = %self.name,
                    to = recipient,
                    kind = %envelope.kind(),
                    "Dropping message from detached agent"
                );
                Err(Error::Detached(self.name.clone()))
            }
        }
    }
}

struct RunState {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// An agent together with its inbox and lifecycle.
///
/// The inbox survives stop/start: messages that arrive while the agent is
/// stopped are processed after the next start.
pub struct AgentHandle {
    name: String,
    agent: Arc<dyn Agent>,
    inbox_tx: mpsc::UnboundedSender<Envelope>,
    inbox_rx: AsyncMutex<mpsc::UnboundedReceiver<Envelope>>,
    queued: AtomicUsize,
    router: RwLock<Weak<Router>>,
    run: Mutex<Option<RunState>>,
}

impl AgentHandle {
    /// Wrap an agent. The handle starts detached from any router.
    pub fn new(agent: impl Agent) -> Arc<Self> {
        Self::from_arc(Arc::new(agent))
    }

    pub fn from_arc(agent: Arc<dyn Agent>) -> Arc<Self> {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            name: agent.name().to_string(),
            agent,
            inbox_tx,
            inbox_rx: AsyncMutex::new(inbox_rx),
            queued: AtomicUsize::new(0),
            router: RwLock::new(Weak::new()),
            run: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    /// The router this agent is registered with, if it is still alive.
    pub fn router(&self) -> Option<Arc<Router>> {
        self.router
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .upgrade()
    }

    pub(crate) fn attach(&self, router: &Arc<Router>) {
        *self
            .router
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::downgrade(router);
    }

    pub(crate) fn detach(&self) {
        *self
            .router
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Weak::new();
    }

    pub fn context(&self) -> AgentContext {
        AgentContext {
            name: self.name.clone(),
            router: self.router(),
        }
    }

    /// Push an envelope onto the inbox.
    pub fn deliver(&self, envelope: Envelope) -> Result<()> {
        // Count first so the run-loop never decrements below zero.
        self.queued.fetch_add(1, Ordering::SeqCst);
        self.inbox_tx.send(envelope).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            Error::InboxClosed(self.name.clone())
        })
    }

    /// Number of envelopes waiting in the inbox.
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Send a message on behalf of this agent.
    pub fn send_message(&self, recipient: &str, payload: Payload) -> Result<Delivery> {
        self.context().send_message(recipient, payload)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.run)
            .as_ref()
            .map_or(false, |state| !state.task.is_finished())
    }

    /// Spawn the run-loop. Does not wait for anything.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut run = lock(&self.run);
        if let Some(state) = run.as_ref() {
            if !state.task.is_finished() {
                return Err(Error::AlreadyRunning(self.name.clone()));
            }
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(run_loop(Arc::clone(self), token.clone()));
        *run = Some(RunState { token, task });

        tracing::info!(agent = %self.name, "Agent started");
        Ok(())
    }

    /// Stop the run-loop. A handler that is already running finishes before
    /// this returns; queued envelopes stay in the inbox.
    pub async fn stop(&self) {
        let state = lock(&self.run).take();
        let Some(RunState { token, task }) = state else {
            return;
        };

        token.cancel();
        if let Err(e) = task.await {
            tracing::error!(agent = %self.name, "Run-loop ended abnormally: {}", e);
        }

        tracing::info!(agent = %self.name, "Agent stopped");
    }

    async fn handle(&self, envelope: Envelope) {
        tracing::debug!(
            agent = %self.name,
            from = envelope.sender(),
            kind = %envelope.kind(),
            id = envelope.id(),
            "Received message"
        );

        let ctx = self.context();
        let agent = Arc::clone(&self.agent);
        let request = envelope.clone();

        // Run the handler on its own task so a panic is contained as a
        // JoinError instead of unwinding through the loop.
        let outcome = tokio::spawn({
            let ctx = ctx.clone();
            async move { dispatch(agent.as_ref(), &ctx, envelope).await }
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    agent = %self.name,
                    id = request.id(),
                    kind = %request.kind(),
                    "Handler failed: {}", e
                );
            }
            Err(e) => {
                tracing::error!(
                    agent = %self.name,
                    id = request.id(),
                    kind = %request.kind(),
                    "Handler panicked: {}", e
                );
                if let Payload::TaskRequest(_) = request.payload() {
                    let response = TaskResponse::failure(request.id(), "handler panicked");
                    if let Err(e) =
                        ctx.send_message(request.sender(), Payload::TaskResponse(response))
                    {
                        tracing::warn!(agent = %self.name, "Could not report panic: {}", e);
                    }
                }
            }
        }
    }
}

async fn run_loop(handle: Arc<AgentHandle>, token: CancellationToken) {
    let mut inbox = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        guard = handle.inbox_rx.lock() => guard,
    };

    loop {
        let envelope = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            received = inbox.recv() => match received {
                Some(envelope) => envelope,
                None => break,
            },
        };
        handle.queued.fetch_sub(1, Ordering::SeqCst);

        // Not raced against the token: a started handler always completes.
        handle.handle(envelope).await;
    }

    tracing::debug!(agent = %handle.name, "Run-loop exited");
}

async fn dispatch(agent: &dyn Agent, ctx: &AgentContext, envelope: Envelope) -> Result<()> {
    match envelope.payload() {
        Payload::TaskRequest(task) => {
            let response = match agent.process_task(ctx, task.clone()).await {
                Ok(result) => TaskResponse::success(envelope.id(), result),
                Err(e) => {
                    tracing::warn!(agent = ctx.name(), task = %task.id, "Task failed: {}", e);
                    TaskResponse::failure(envelope.id(), e.to_string())
                }
            };
            ctx.send_message(envelope.sender(), Payload::TaskResponse(response))?;
            Ok(())
        }
        Payload::CollaborationRequest(request) => {
            agent
                .handle_collaboration_request(ctx, &envelope, request.clone())
                .await
        }
        _ => agent.handle_other(ctx, &envelope).await,
    }
}
