use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::graph::{
    ExpandRequest, Expansion, GraphSnapshot, LoadError, LoadRequest, NodeKey, expand_neighborhood,
    load_neighborhood,
};
use crate::store::GraphStore;

/// Identifies one request. A completion is applied only while its token is
/// still the latest one handed out for the current generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken {
    /// Bumped whenever focus, scope or attribute inclusion change.
    pub generation: u64,
    pub sequence: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobKind {
    Load,
    Expand { around: NodeKey },
}

#[derive(Debug)]
pub enum JobOutput {
    Loaded(GraphSnapshot),
    Expanded(Expansion),
}

pub type JobResult = Result<JobOutput, LoadError>;

pub struct PendingJob {
    pub token: RequestToken,
    pub kind: JobKind,
    rx: Receiver<JobResult>,
}

impl PendingJob {
    pub fn spawn_load(
        store: Arc<dyn GraphStore>,
        token: RequestToken,
        request: LoadRequest,
    ) -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_neighborhood(store.as_ref(), &request).map(JobOutput::Loaded);
            let _ = tx.send(result);
        });

        Self {
            token,
            kind: JobKind::Load,
            rx,
        }
    }

    pub fn spawn_expand(
        store: Arc<dyn GraphStore>,
        token: RequestToken,
        base: GraphSnapshot,
        request: ExpandRequest,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let around = request.around;

        thread::spawn(move || {
            let result =
                expand_neighborhood(store.as_ref(), &base, &request).map(JobOutput::Expanded);
            let _ = tx.send(result);
        });

        Self {
            token,
            kind: JobKind::Expand { around },
            rx,
        }
    }

    /// Non-blocking check for a result. A worker that went away without
    /// sending one reports [`LoadError::WorkerDisconnected`].
    pub fn poll(&self) -> Option<JobResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LoadError::WorkerDisconnected)),
        }
    }
}

impl std::fmt::Debug for PendingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingJob")
            .field("token", &self.token)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
