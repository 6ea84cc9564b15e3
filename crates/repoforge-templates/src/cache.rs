//! Compiled-template cache with content addressing and LRU eviction.
//!
//! Entries are keyed by template name plus a SHA-256 of the source text, so
//! replacing a template's content produces a new entry instead of silently
//! reusing a stale compilation. The cache guarantees at most one stored
//! compilation per distinct content, bounded by a fixed capacity; under
//! pressure the entry with the oldest last-use timestamp is evicted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use minijinja::Environment;
use parking_lot::RwLock;
use repoforge_core::{ForgeError, Result};
use sha2::{Digest, Sha256};

/// Cache key: template name plus content hash. The same name with changed
/// content yields a different key; the stale entry ages out via LRU.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub name: String,
    pub content_hash: String,
}

impl TemplateKey {
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            content_hash: format!("{:x}", Sha256::digest(content.as_bytes())),
        }
    }
}

/// A template compiled into its own owned environment, with the helper
/// vocabulary registered.
#[derive(Debug)]
pub struct CompiledTemplate {
    name: String,
    env: Environment<'static>,
}

impl CompiledTemplate {
    fn compile(name: &str, content: &str) -> Result<Self> {
        let mut env = Environment::new();
        crate::functions::register(&mut env);
        env.add_template_owned(name.to_string(), content.to_string())
            .map_err(|e| ForgeError::Compile {
                template: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            name: name.to_string(),
            env,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render with any serializable context
    pub fn render<S: serde::Serialize>(&self, context: &S) -> Result<String> {
        let template = self
            .env
            .get_template(&self.name)
            .map_err(|e| ForgeError::Render {
                template: self.name.clone(),
                message: e.to_string(),
            })?;
        template.render(context).map_err(|e| ForgeError::Render {
            template: self.name.clone(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug)]
struct CacheEntry {
    template: Arc<CompiledTemplate>,
    last_used: Instant,
    use_count: u64,
}

/// Snapshot of cache counters
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub total_compile_time: Duration,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe compiled-template cache
#[derive(Debug)]
pub struct TemplateCache {
    entries: RwLock<HashMap<TemplateKey, CacheEntry>>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    compile_nanos: AtomicU64,
}

impl TemplateCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compile_nanos: AtomicU64::new(0),
        }
    }

    /// Fetch the compiled form of `content`, compiling on first use.
    ///
    /// Hits bump the entry's last-use stamp under a short exclusive lock.
    /// Two concurrent misses on the same key may both compile, but only the
    /// first install wins; the loser adopts the stored entry.
    pub fn get(&self, name: &str, content: &str) -> Result<Arc<CompiledTemplate>> {
        let key = TemplateKey::new(name, content);

        {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get_mut(&key) {
                entry.last_used = Instant::now();
                entry.use_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(template = %name, "template cache hit");
                return Ok(entry.template.clone());
            }
        }

        // Compile outside the lock so slow templates do not serialize the
        // whole pool.
        let started = Instant::now();
        let compiled = Arc::new(CompiledTemplate::compile(name, content)?);
        self.compile_nanos
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(template = %name, "compiled template");

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(&key) {
            // Lost the install race; keep the stored compilation.
            entry.last_used = Instant::now();
            entry.use_count += 1;
            return Ok(entry.template.clone());
        }
        if entries.len() >= self.max_size {
            evict_oldest(&mut entries);
        }
        entries.insert(
            key,
            CacheEntry {
                template: compiled.clone(),
                last_used: Instant::now(),
                use_count: 1,
            },
        );
        Ok(compiled)
    }

    /// Render a compiled template. Present for symmetry with `get`; the
    /// compiled handle renders directly as well.
    pub fn execute<S: serde::Serialize>(
        &self,
        template: &CompiledTemplate,
        context: &S,
    ) -> Result<String> {
        template.render(context)
    }

    /// Warm the cache from a name-to-content mapping
    pub fn precompile<'a, I>(&self, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, content) in sources {
            self.get(name, content)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.read().len(),
            max_size: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            total_compile_time: Duration::from_nanos(self.compile_nanos.load(Ordering::Relaxed)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn evict_oldest(entries: &mut HashMap<TemplateKey, CacheEntry>) {
    let oldest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        tracing::debug!(template = %key.name, "evicting least recently used template");
        entries.remove(&key);
    }
}
