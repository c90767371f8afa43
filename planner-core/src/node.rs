//! Subflow runtime: the `prep → exec → post` node lifecycle and a small flow
//! composer chaining nodes by action label.
//!
//! Grounded on the teacher's `Node<S>` trait (`loom/src/graph/node.rs`), split
//! into two type parameters: an interface with three methods plus a generic
//! wrapper, instead of the teacher's duck-typed node base. `exec`/`post` both
//! take `prep_result` by reference so a single owned value serves every phase
//! without cloning or type-erasure tricks.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::stream::StreamingSession;
use stream_event::event::ProtocolEvent;

/// Action returned by `post`, selecting the next node in a [`flow::Flow`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// A named transition; [`flow::Flow`] looks this up against its edges.
    Named(String),
    /// No successor; the flow run stops here.
    Terminal,
}

impl Action {
    pub fn named(s: impl Into<String>) -> Self {
        Action::Named(s.into())
    }
}

/// One step of a subflow: `prep(shared) -> exec(&prep_result) -> post(shared, &prep_result, exec_result) -> next_action`.
///
/// `Shared` is the caller's working state type (e.g. a tool's private scratch
/// struct); `Prep`/`Exec` are intermediate results threaded between phases.
#[async_trait]
pub trait Node<Shared>: Send + Sync
where
    Shared: Send + Sync,
{
    type Prep: Send + Sync;
    type Exec: Send;

    /// Unique id within a flow, used in `processing_status` events.
    fn id(&self) -> &str;

    async fn prep(&self, shared: &Shared) -> Result<Self::Prep, AgentError>;
    async fn exec(&self, prep_result: &Self::Prep) -> Result<Self::Exec, AgentError>;
    async fn post(
        &self,
        shared: &mut Shared,
        prep_result: &Self::Prep,
        exec_result: Self::Exec,
    ) -> Result<Action, AgentError>;

    /// Runs the full lifecycle, emitting `processing_status` at each phase
    /// boundary and recording+emitting `error` on failure.
    async fn run(&self, shared: &mut Shared, session: Option<&StreamingSession>) -> Result<Action, AgentError> {
        emit_status(session, self.id(), "prep").await;
        let prep = match self.prep(shared).await {
            Ok(p) => p,
            Err(e) => {
                emit_error(session, &e).await;
                return Err(e);
            }
        };

        emit_status(session, self.id(), "exec").await;
        let exec = match self.exec(&prep).await {
            Ok(e) => e,
            Err(e) => {
                emit_error(session, &e).await;
                return Err(e);
            }
        };

        emit_status(session, self.id(), "post").await;
        match self.post(shared, &prep, exec).await {
            Ok(action) => Ok(action),
            Err(e) => {
                emit_error(session, &e).await;
                Err(e)
            }
        }
    }
}

async fn emit_status(session: Option<&StreamingSession>, stage: &str, detail: &str) {
    if let Some(session) = session {
        session
            .emit(ProtocolEvent::ProcessingStatus {
                stage: stage.to_string(),
                detail: Some(detail.to_string()),
            })
            .await;
    }
}

async fn emit_error(session: Option<&StreamingSession>, err: &AgentError) {
    if let Some(session) = session {
        session
            .emit(ProtocolEvent::Error {
                kind: err.kind().wire_name().to_string(),
                message: err.to_string(),
                recoverable: err.kind().is_retryable(),
            })
            .await;
    }
}

pub mod flow {
    //! A minimal directed flow: nodes linked by [`super::Action`] labels,
    //! walked from a start node until a terminal action or missing edge.

    use std::collections::HashMap;

    use super::{Action, AgentError, Node, StreamingSession};
    use async_trait::async_trait;

    /// Type-erased single-node step used by [`Flow`], since a flow may chain
    /// nodes with different `Prep`/`Exec` types.
    #[async_trait]
    pub trait FlowStep<Shared>: Send + Sync
    where
        Shared: Send + Sync,
    {
        fn id(&self) -> &str;
        async fn run(&self, shared: &mut Shared, session: Option<&StreamingSession>) -> Result<Action, AgentError>;
    }

    #[async_trait]
    impl<Shared, N> FlowStep<Shared> for N
    where
        Shared: Send + Sync,
        N: Node<Shared>,
    {
        fn id(&self) -> &str {
            Node::id(self)
        }

        async fn run(&self, shared: &mut Shared, session: Option<&StreamingSession>) -> Result<Action, AgentError> {
            Node::run(self, shared, session).await
        }
    }

    /// A directed graph of [`FlowStep`]s keyed by id, walked from a start node.
    pub struct Flow<Shared> {
        start: String,
        steps: HashMap<String, Box<dyn FlowStep<Shared>>>,
        edges: HashMap<(String, String), String>,
    }

    impl<Shared: Send + Sync> Flow<Shared> {
        pub fn new(start: impl Into<String>) -> Self {
            Self {
                start: start.into(),
                steps: HashMap::new(),
                edges: HashMap::new(),
            }
        }

        pub fn add_step(mut self, step: Box<dyn FlowStep<Shared>>) -> Self {
            self.steps.insert(step.id().to_string(), step);
            self
        }

        /// Links `from` --action--> `to`.
        pub fn edge(mut self, from: impl Into<String>, action: impl Into<String>, to: impl Into<String>) -> Self {
            self.edges.insert((from.into(), action.into()), to.into());
            self
        }

        /// Walks the graph from the start node until a terminal action or a
        /// missing edge (no successor registered for the current action).
        pub async fn run(&self, shared: &mut Shared, session: Option<&StreamingSession>) -> Result<(), AgentError> {
            let mut current = self.start.clone();
            loop {
                let step = self
                    .steps
                    .get(&current)
                    .ok_or_else(|| AgentError::Other(format!("flow: unknown node '{current}'")))?;
                let action = step.run(shared, session).await?;
                match action {
                    Action::Terminal => return Ok(()),
                    Action::Named(label) => match self.edges.get(&(current.clone(), label.clone())) {
                        Some(next) => current = next.clone(),
                        None => return Ok(()),
                    },
                }
            }
        }
    }

}
