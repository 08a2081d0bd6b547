//! QuickJS embedding: application scripts drive the bridge through a `bridge` global.

mod host;
mod runtime;

pub use host::ScriptHost;
pub use runtime::ScriptEngine;
