//! `clockwork-sandbox` — the sandboxed interpreter boundary.
//!
//! # Overview
//!
//! Scripts are compiled and invoked through the [`ScriptEngine`] /
//! [`Invocable`] trait pair so the scheduler never depends on a concrete
//! interpreter. The shipped implementation ([`interpreter::RhaiScriptEngine`])
//! embeds [Rhai](https://rhai.rs); swapping engines means implementing two
//! traits.
//!
//! Every execution receives a [`context::ScriptContext`] carrying the
//! injected capabilities scripts may call:
//!
//! | Script function            | Capability                                |
//! |----------------------------|-------------------------------------------|
//! | `log_debug/info/warn/error`| per-task append-only log stream           |
//! | `config_get` / `config_set`| project-scoped, task-prefixed K/V storage |
//! | `emit`                     | event pipeline to the downstream store    |
//!
//! The entry point is always a function called `main` taking a single map of
//! parameter name → value.

pub mod context;
pub mod engine;
pub mod error;
pub mod interpreter;

pub use context::{
    BufferLogger, ConfigStore, EventMapper, EventSink, MappedSink, MemoryConfigStore,
    MemoryEventStore, ScopedConfig, ScriptContext, ScriptLogger,
};
pub use engine::{param_bag, Invocable, ParamBag, ScriptEngine, ENTRY_POINT};
pub use error::{Result, SandboxError};
pub use interpreter::RhaiScriptEngine;
