//! Built-in template sources, embedded at compile time.
//!
//! A file named `<name>.tmpl` in the configured template directory replaces
//! the built-in of the same name wholesale; there is no partial override.

/// All built-in templates as `(name, source)` pairs, in precompile order
pub const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("model", include_str!("../templates/model.tmpl")),
    ("interface", include_str!("../templates/interface.tmpl")),
    (
        "implementation",
        include_str!("../templates/implementation.tmpl"),
    ),
    (
        "mock_testify",
        include_str!("../templates/mock_testify.tmpl"),
    ),
    ("mock_gomock", include_str!("../templates/mock_gomock.tmpl")),
    ("test", include_str!("../templates/test.tmpl")),
    (
        "migration_goose",
        include_str!("../templates/migration_goose.tmpl"),
    ),
];

/// Look up a built-in template source by name
pub fn builtin_source(name: &str) -> Option<&'static str> {
    BUILTIN_TEMPLATES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, source)| *source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TemplateCache;

    #[test]
    fn every_builtin_compiles() {
        let cache = TemplateCache::new(BUILTIN_TEMPLATES.len());
        for (name, source) in BUILTIN_TEMPLATES {
            cache
                .get(name, source)
                .unwrap_or_else(|e| panic!("builtin template '{}' failed: {}", name, e));
        }
    }

    #[test]
    fn lookup_by_name() {
        assert!(builtin_source("model").is_some());
        assert!(builtin_source("migration_goose").is_some());
        assert!(builtin_source("nope").is_none());
    }
}
