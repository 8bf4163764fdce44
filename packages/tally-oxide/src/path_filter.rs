use regex::Regex;
use thiserror::Error;
use typed_path::Utf8TypedPath;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid coverage path pattern `{pattern}`: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Normalize a file path to use forward slashes for consistent matching
pub fn normalize_path(path: &str) -> String {
    let typed_path = Utf8TypedPath::derive(path);
    if typed_path.is_windows() {
        typed_path.with_unix_encoding().to_string()
    } else if path.contains('\\') {
        // Fallback: if the path contains backslashes but wasn't detected as Windows,
        // still normalize it by replacing backslashes with forward slashes
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}

/// Include / exclude rule compiled into a path matcher.
///
/// The inclusion root is anchored at the start of the path. Exclusions are
/// sub-paths of the root: a path is rejected when the segments right after the
/// root start with an excluded sub-path, on a segment boundary.
#[derive(Clone, Debug)]
pub struct PathFilter {
    root: Regex,
    exclude: Option<Regex>,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(root: &str, exclude: &[S]) -> Result<PathFilter, PatternError> {
        let root = normalize_path(root);
        let excludes = exclude
            .iter()
            .map(|e| relativize_exclude(&root, &normalize_path(e.as_ref())))
            .filter(|e| !e.is_empty())
            .collect::<Vec<_>>();

        let mut root_pattern = format!("^{}", regex::escape(&root));
        if !excludes.is_empty() && !root.is_empty() && !root.ends_with('/') {
            root_pattern.push('/');
        }

        let exclude = if excludes.is_empty() {
            None
        } else {
            let pattern = format!(
                "^(?:{})(?:/|$)",
                excludes
                    .iter()
                    .map(|e| regex::escape(e))
                    .collect::<Vec<_>>()
                    .join("|")
            );
            Some(compile(pattern)?)
        };

        Ok(PathFilter {
            root: compile(root_pattern)?,
            exclude,
        })
    }

    /// Test a forward-slash normalized path.
    pub fn matches(&self, path: &str) -> bool {
        let Some(found) = self.root.find(path) else {
            return false;
        };

        match &self.exclude {
            Some(exclude) => {
                let rest = &path[found.end()..];
                let rest = rest.strip_prefix('/').unwrap_or(rest);
                !exclude.is_match(rest)
            }
            None => true,
        }
    }
}

fn compile(pattern: String) -> Result<Regex, PatternError> {
    Regex::new(&pattern).map_err(|source| PatternError::Invalid { pattern, source })
}

fn relativize_exclude(root: &str, exclude: &str) -> String {
    let relative = match exclude.strip_prefix(root) {
        Some(rest) if root.is_empty() || root.ends_with('/') || rest.starts_with('/') => rest,
        _ => exclude,
    };
    relative.trim_start_matches('/').to_string()
}

/// Every filter registered so far, newest first. A path matches if any filter does.
#[derive(Clone, Debug, Default)]
pub struct PathMatcher {
    filters: Vec<PathFilter>,
}

impl PathMatcher {
    pub fn new() -> PathMatcher {
        Default::default()
    }

    pub fn add(&mut self, filter: PathFilter) {
        self.filters.insert(0, filter);
    }

    pub fn matches(&self, path: &str) -> bool {
        self.filters.iter().any(|f| f.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_anchored_at_start() {
        let filter = PathFilter::new::<&str>("/proj/lib", &[]).unwrap();

        assert!(filter.matches("/proj/lib/a.js"));
        assert!(!filter.matches("/other/proj/lib/a.js"));
    }

    #[test]
    fn root_metacharacters_are_escaped() {
        let filter = PathFilter::new::<&str>("/proj/v1.0+(x)", &[]).unwrap();

        assert!(filter.matches("/proj/v1.0+(x)/a.js"));
        assert!(!filter.matches("/proj/v1x0+(x)/a.js"));
    }

    #[test]
    fn exclusion_rejects_whole_segments_only() {
        let filter = PathFilter::new("/a", &["b"]).unwrap();

        assert!(!filter.matches("/a/b"));
        assert!(!filter.matches("/a/b/c.js"));
        assert!(filter.matches("/a/bc/c.js"));
        assert!(filter.matches("/a/c/b/c.js"));
    }

    #[test]
    fn exclusion_given_under_root_is_relativized() {
        let filter = PathFilter::new("/a", &["/a/b"]).unwrap();

        assert!(!filter.matches("/a/b/c.js"));
        assert!(filter.matches("/a/bc.js"));

        let filter = PathFilter::new("", &["/a/b"]).unwrap();
        assert!(!filter.matches("/a/b/c.js"));
        assert!(filter.matches("/a/bc/c.js"));
    }

    #[test]
    fn trailing_separator_on_root_is_not_doubled() {
        let filter = PathFilter::new("/a/", &["node_modules", "test"]).unwrap();

        assert!(filter.matches("/a/lib/x.js"));
        assert!(!filter.matches("/a/node_modules/x/index.js"));
        assert!(!filter.matches("/a/test/x.js"));
    }

    #[test]
    fn windows_paths_are_normalized() {
        let filter = PathFilter::new(r"C:\proj", &[r"C:\proj\test"]).unwrap();

        assert!(filter.matches(&normalize_path(r"C:\proj\lib\a.js")));
        assert!(!filter.matches(&normalize_path(r"C:\proj\test\a.js")));
    }

    #[test]
    fn oversized_root_is_rejected_at_construction() {
        let root = format!("/{}", "a".repeat(16 << 20));

        assert!(matches!(
            PathFilter::new::<&str>(&root, &[]),
            Err(PatternError::Invalid { .. })
        ));
    }

    #[test]
    fn matcher_accepts_any_registered_filter() {
        let mut matcher = PathMatcher::new();
        assert!(!matcher.matches("/a/x.js"));

        matcher.add(PathFilter::new::<&str>("/a", &[]).unwrap());
        matcher.add(PathFilter::new::<&str>("/b", &[]).unwrap());

        assert!(matcher.matches("/a/x.js"));
        assert!(matcher.matches("/b/x.js"));
        assert!(!matcher.matches("/c/x.js"));
    }
}
