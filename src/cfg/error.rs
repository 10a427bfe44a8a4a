use crate::structured::Loop;

/// Failures raised while lowering a structured program to a CFG.
///
/// Both variants are defensive: a structured program built exclusively
/// through the builder API (§4.1) can never trigger either one. They exist
/// to surface a corrupted input or a library-internal bug as a `Result`
/// rather than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    /// A `continue`/`break` named a loop absent from the active loop map.
    #[error("jump references loop {0:?}, which is not currently active")]
    InvalidLoopTarget(Loop),
    /// A structured-model item of unrecognised kind was encountered.
    #[error("encountered a structured-program item of unrecognized kind")]
    UnknownConstruct,
}
