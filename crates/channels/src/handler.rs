use std::{collections::HashMap, sync::Arc};

use {async_trait::async_trait, courier_routing::SessionContext, courier_skills::SkillTable};

/// Something that acts on an accepted message.
///
/// Errors are logged by the dispatcher and never stop the stream.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &SessionContext) -> anyhow::Result<()>;
}

/// Handler names, as referenced by skill tables, bound to implementations.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(name.into(), handler);
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.register(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Handler names the table references that nothing is bound to.
    pub fn unbound<'a>(&self, table: &'a SkillTable) -> Vec<&'a str> {
        table
            .handler_names()
            .into_iter()
            .filter(|name| !self.handlers.contains_key(*name))
            .collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
