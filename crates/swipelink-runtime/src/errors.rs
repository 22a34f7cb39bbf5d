//! Runtime error types.

/// Errors talking to the synchronizer task.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// The command channel is closed; the task was shut down.
    #[error("sync channel closed")]
    ChannelClosed,

    /// The task exited before answering.
    #[error("sync worker exited before replying")]
    WorkerExited,
}
