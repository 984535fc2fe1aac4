use std::collections::HashMap;

use clockwork_core::types::Parameter;

use crate::context::ScriptContext;
use crate::error::Result;

/// Name of the function every script must define.
pub const ENTRY_POINT: &str = "main";

/// Flattened parameter map passed to the entry point: declared parameters
/// with their value, or an empty string when no value was supplied.
pub type ParamBag = HashMap<String, String>;

/// Build the argument map for an execution from the task's declared
/// parameters.
pub fn param_bag(parameters: &HashMap<String, Parameter>) -> ParamBag {
    parameters
        .iter()
        .map(|(name, p)| (name.clone(), p.value.clone().unwrap_or_default()))
        .collect()
}

/// A compiled script, ready to be invoked any number of times.
pub trait Invocable: Send + Sync {
    /// Call `entry` with the parameter bag inside `ctx`. Returns `Ok(())` on
    /// normal return; every failure mode maps onto a [`crate::SandboxError`]
    /// variant. Honors `ctx.deadline` where the interpreter supports
    /// interruption.
    fn invoke(&self, entry: &str, args: &ParamBag, ctx: &ScriptContext) -> Result<()>;
}

impl std::fmt::Debug for dyn Invocable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Invocable")
    }
}

/// An embedded interpreter that turns script text into an [`Invocable`].
///
/// The scheduler only ever sees this trait — interpreter-specific types stay
/// behind it.
pub trait ScriptEngine: Send + Sync {
    fn compile(&self, source: &str) -> Result<Box<dyn Invocable>>;
}
