use super::Loop;

/// Failures raised by the builder API while assembling a structured program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    /// An unlabelled `break`/`continue` was added to a block with no
    /// enclosing loop anywhere in its parent chain.
    #[error("break/continue has no enclosing loop")]
    NoEnclosingLoop,
    /// A labelled `break`/`continue` named a loop that does not enclose the
    /// block the jump was added to.
    #[error("loop {0:?} does not enclose this block")]
    LoopNotEnclosing(Loop),
}
