pub mod ast;
pub mod interpreter;
pub mod parser;
pub mod span;
mod stack;
pub mod tokenizer;

pub use interpreter::{object::Object, scope::ScopeRef, Interpreter, RuntimeError};

use ast::Module;
use interpreter::scope::Scope;
use parser::ParseErrors;

/// Tokenizes and parses `source`. Any syntax error rejects the whole module.
pub fn compile(source: &str) -> Result<Module, ParseErrors> {
    let tokens = tokenizer::tokens(source);
    let module = parser::module(&tokens)?;
    tracing::debug!(
        tokens = tokens.len(),
        statements = module.0.len(),
        "compiled module"
    );
    Ok(module)
}

/// A parentless scope for top-level evaluation. A REPL keeps one across lines.
pub fn new_root_environment() -> ScopeRef {
    Scope::boxed(None)
}
