//! Template engine for repoforge: a MiniJinja environment per compiled
//! template, a content-addressed LRU cache, and the helper function
//! vocabulary shared by every template.

pub mod builtin;
pub mod cache;
pub mod functions;

pub use builtin::{builtin_source, BUILTIN_TEMPLATES};
pub use cache::{CacheStats, CompiledTemplate, TemplateCache, TemplateKey};
