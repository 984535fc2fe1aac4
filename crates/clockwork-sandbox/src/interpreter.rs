//! Rhai-backed [`ScriptEngine`] implementation.
//!
//! A fresh `rhai::Engine` is built per invocation so the registered
//! capability functions close over exactly that execution's context. The
//! compiled AST is engine-independent and reusable.

use std::sync::Arc;
use std::time::Instant;

use rhai::{Dynamic, Engine, EvalAltResult, Map, Scope, AST};

use clockwork_core::types::Event;

use crate::context::ScriptContext;
use crate::engine::{Invocable, ParamBag, ScriptEngine};
use crate::error::{Result, SandboxError};

/// The shipped embedded interpreter.
#[derive(Default)]
pub struct RhaiScriptEngine;

impl RhaiScriptEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine for RhaiScriptEngine {
    fn compile(&self, source: &str) -> Result<Box<dyn Invocable>> {
        let ast = Engine::new()
            .compile(source)
            .map_err(|e| SandboxError::Compile(e.to_string()))?;
        Ok(Box::new(CompiledScript { ast }))
    }
}

struct CompiledScript {
    ast: AST,
}

impl Invocable for CompiledScript {
    fn invoke(&self, entry: &str, args: &ParamBag, ctx: &ScriptContext) -> Result<()> {
        let engine = build_engine(ctx);

        let mut params = Map::new();
        for (name, value) in args {
            params.insert(name.as_str().into(), Dynamic::from(value.clone()));
        }

        let mut scope = Scope::new();
        match engine.call_fn::<Dynamic>(&mut scope, &self.ast, entry, (params,)) {
            Ok(_) => Ok(()),
            Err(err) => Err(classify(entry, &err)),
        }
    }
}

/// Build an engine with this execution's capabilities registered and the
/// deadline interrupt installed.
fn build_engine(ctx: &ScriptContext) -> Engine {
    let mut engine = Engine::new();

    let logger = Arc::clone(&ctx.logger);
    engine.register_fn("log_debug", move |msg: &str| logger.debug(msg));
    let logger = Arc::clone(&ctx.logger);
    engine.register_fn("log_info", move |msg: &str| logger.info(msg));
    let logger = Arc::clone(&ctx.logger);
    engine.register_fn("log_warn", move |msg: &str| logger.warn(msg));
    let logger = Arc::clone(&ctx.logger);
    engine.register_fn("log_error", move |msg: &str| logger.error(msg));

    let configs = ctx.configs.clone();
    engine.register_fn(
        "config_get",
        move |key: &str| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
            match configs.get(key) {
                Ok(Some(value)) => rhai::serde::to_dynamic(&value),
                Ok(None) => Ok(Dynamic::UNIT),
                Err(e) => Err(e.to_string().into()),
            }
        },
    );

    let configs = ctx.configs.clone();
    engine.register_fn(
        "config_set",
        move |key: &str, value: Dynamic| -> std::result::Result<(), Box<EvalAltResult>> {
            let value: serde_json::Value = rhai::serde::from_dynamic(&value)?;
            configs
                .set(key, value)
                .map_err(|e| -> Box<EvalAltResult> { e.to_string().into() })
        },
    );

    let events = Arc::clone(&ctx.events);
    engine.register_fn(
        "emit",
        move |collection: &str, properties: Map| -> std::result::Result<(), Box<EvalAltResult>> {
            let properties: serde_json::Value =
                rhai::serde::from_dynamic(&Dynamic::from(properties))?;
            events
                .emit(vec![Event {
                    collection: collection.to_string(),
                    properties,
                }])
                .map_err(|e| -> Box<EvalAltResult> { e.to_string().into() })
        },
    );

    if let Some(deadline) = ctx.deadline {
        engine.on_progress(move |_| {
            if Instant::now() >= deadline {
                // Any token interrupts evaluation with ErrorTerminated.
                Some(Dynamic::UNIT)
            } else {
                None
            }
        });
    }

    engine
}

/// Map an interpreter failure onto the execution error taxonomy.
fn classify(entry: &str, err: &EvalAltResult) -> SandboxError {
    match root_cause(err) {
        EvalAltResult::ErrorFunctionNotFound(signature, _) if is_entry(signature, entry) => {
            SandboxError::MissingEntryPoint
        }
        EvalAltResult::ErrorTerminated(..) => SandboxError::Cancelled,
        _ => SandboxError::Runtime(err.to_string()),
    }
}

/// Unwrap `ErrorInFunctionCall` nesting so termination and not-found
/// conditions inside called functions are classified correctly.
fn root_cause(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => root_cause(inner),
        other => other,
    }
}

/// Rhai reports the full signature (e.g. `main (Map)`), not just the name.
fn is_entry(signature: &str, entry: &str) -> bool {
    signature == entry || signature.starts_with(&format!("{entry} ("))
}
