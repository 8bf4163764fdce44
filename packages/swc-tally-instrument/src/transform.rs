use std::{fmt, sync::Arc};

/// Source-to-source step applied to a file before it is instrumented.
pub trait Transform: Send + Sync {
    fn transform(&self, source: &str, path: &str) -> String;
}

impl<F> Transform for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn transform(&self, source: &str, path: &str) -> String {
        self(source, path)
    }
}

/// Transform registered for every file whose path ends with `extension`.
/// `None` leaves the text unchanged.
#[derive(Clone)]
pub struct TransformEntry {
    pub extension: String,
    pub transform: Option<Arc<dyn Transform>>,
}

impl TransformEntry {
    pub fn new<T: Transform + 'static>(extension: &str, transform: T) -> TransformEntry {
        TransformEntry {
            extension: extension.to_string(),
            transform: Some(Arc::new(transform)),
        }
    }

    pub fn identity(extension: &str) -> TransformEntry {
        TransformEntry {
            extension: extension.to_string(),
            transform: None,
        }
    }
}

impl fmt::Debug for TransformEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformEntry")
            .field("extension", &self.extension)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Ordered transforms keyed by extension. `.js` is always present.
#[derive(Clone, Debug)]
pub struct TransformPipeline {
    entries: Vec<TransformEntry>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        TransformPipeline {
            entries: vec![TransformEntry::identity(".js")],
        }
    }
}

impl TransformPipeline {
    pub fn new() -> TransformPipeline {
        Default::default()
    }

    /// A `.js` entry replaces the default one, anything else is appended.
    pub fn register(&mut self, entry: TransformEntry) {
        if entry.extension == ".js" {
            self.entries[0] = entry;
        } else {
            self.entries.push(entry);
        }
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.extension.as_str())
    }

    pub fn handles(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Run the last registered transform whose extension matches `path`.
    pub fn apply(&self, source: &str, path: &str) -> String {
        match self.find(path).and_then(|e| e.transform.as_ref()) {
            Some(transform) => transform.transform(source, path),
            None => source.to_string(),
        }
    }

    fn find(&self, path: &str) -> Option<&TransformEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| path.ends_with(e.extension.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_pipeline_is_identity_for_js() {
        let pipeline = TransformPipeline::new();

        assert!(pipeline.handles("/p/a.js"));
        assert!(!pipeline.handles("/p/a.ts"));
        assert_eq!(pipeline.apply("a();", "/p/a.js"), "a();");
    }

    #[test]
    fn js_transform_replaces_default() {
        let mut pipeline = TransformPipeline::new();
        pipeline.register(TransformEntry::new(".js", |s: &str, _: &str| {
            s.replace("let", "var")
        }));

        assert_eq!(pipeline.extensions().collect::<Vec<_>>(), vec![".js"]);
        assert_eq!(pipeline.apply("let a;", "/p/a.js"), "var a;");
    }

    #[test]
    fn last_matching_entry_wins() {
        let mut pipeline = TransformPipeline::new();
        pipeline.register(TransformEntry::new(".ts", |_: &str, _: &str| "ts".to_string()));
        pipeline.register(TransformEntry::new(".d.ts", |_: &str, p: &str| p.to_string()));

        assert_eq!(pipeline.apply("", "/p/a.ts"), "ts");
        assert_eq!(pipeline.apply("", "/p/a.d.ts"), "/p/a.d.ts");
        assert_eq!(
            pipeline.extensions().collect::<Vec<_>>(),
            vec![".js", ".ts", ".d.ts"]
        );
    }
}
