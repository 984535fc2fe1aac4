use thiserror::Error;

/// Terminal outcome of a failed script execution.
///
/// Lock contention is deliberately *not* represented here — an unavailable
/// lock is an expected concurrency signal, never an execution failure.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The script text failed to compile; carries the interpreter diagnostic.
    #[error("Error compiling script: {0}")]
    Compile(String),

    /// The script compiled but defines no `main` entry point (or one with
    /// the wrong arity — `main` must accept exactly the parameter map).
    #[error("There must be a function called 'main'.")]
    MissingEntryPoint,

    /// The entry point raised; carries the interpreter diagnostic.
    #[error("Error executing script: {0}")]
    Runtime(String),

    /// The execution was forcibly cancelled at its deadline (dry-run only).
    #[error("The execution was cancelled")]
    Cancelled,

    /// A capability backend (config store, event sink) failed durably.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Catch-all for unclassified failures, e.g. a worker panic.
    #[error("Unknown error executing script ({kind}): {message}")]
    Unknown { kind: String, message: String },
}

pub type Result<T> = std::result::Result<T, SandboxError>;
