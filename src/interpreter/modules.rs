use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    rc::Rc,
};

use rustc_hash::FxHashMap;

use crate::ast::Module;

use super::RuntimeError;

/// One strategy for turning a module name into source text.
pub trait ModuleResolver {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Reads `<root>/<name>`, falling back to `<root>/<name>.geo`.
#[derive(Debug, Clone)]
pub struct FileResolver {
    root: PathBuf,
}

impl FileResolver {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ModuleResolver for FileResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        [self.root.join(name), self.root.join(format!("{name}.geo"))]
            .into_iter()
            .filter(|path| path.is_file())
            .find_map(|path| std::fs::read_to_string(path).ok())
    }
}

/// Serves sources registered in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    sources: FxHashMap<String, String>,
}

impl MemoryResolver {
    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }
}

impl ModuleResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        self.sources.get(name).cloned()
    }
}

/// Compiled modules by name, backed by resolvers tried in registration
/// order. A name is resolved and parsed at most once.
#[derive(Default)]
pub struct ModuleRegistry {
    resolvers: Vec<Box<dyn ModuleResolver>>,
    cache: FxHashMap<String, Rc<Module>>,
}

impl Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut cached = self.cache.keys().collect::<Vec<_>>();
        cached.sort();
        f.debug_struct("ModuleRegistry")
            .field("resolvers", &self.resolvers.len())
            .field("cached", &cached)
            .finish()
    }
}

impl ModuleRegistry {
    pub fn with_resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.add_resolver(resolver);
        self
    }

    pub fn add_resolver(&mut self, resolver: impl ModuleResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    pub fn load(&mut self, name: &str) -> Result<Rc<Module>, RuntimeError> {
        if let Some(module) = self.cache.get(name) {
            tracing::trace!(module = name, "module cache hit");
            return Ok(module.clone());
        }

        let source = self
            .resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(name))
            .ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))?;

        let module = crate::compile(&source).map_err(|errors| RuntimeError::ModuleCompile {
            name: name.to_string(),
            errors,
        })?;

        tracing::debug!(module = name, statements = module.0.len(), "loaded module");
        let module = Rc::new(module);
        self.cache.insert(name.to_string(), module.clone());
        Ok(module)
    }
}
