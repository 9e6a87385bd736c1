//! Safe construction of script calls from untrusted argument data.
//!
//! [`sanitize`] turns one [`ScriptArgument`] into a literal fragment and
//! [`ScriptCall::build`] composes a complete call expression from them.

mod call;
mod sanitize;

pub use call::ScriptCall;
pub use sanitize::{sanitize, ScriptArgument};
