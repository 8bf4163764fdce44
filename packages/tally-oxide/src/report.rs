use std::{cmp::Ordering, collections::BTreeMap};

use serde::{Deserialize, Serialize};

/// Why a chunk of a missed line is not fully covered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMiss {
    /// Only the truthy outcome was observed.
    True,
    /// Only the falsy outcome was observed.
    False,
    /// Never evaluated.
    Never,
}

/// A contiguous run of columns sharing one verdict. `miss: None` is covered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miss: Option<ChunkMiss>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineReport {
    pub source: String,
    /// Raw line counter, absent for untracked lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<u64>,
    pub miss: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<Chunk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_line: Option<u32>,
}

impl LineReport {
    pub fn new(source: String) -> LineReport {
        LineReport {
            source,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub filename: String,
    pub percent: f64,
    pub hits: u32,
    pub misses: u32,
    pub sloc: u32,
    /// Set when some line maps to a different original position.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sourcemaps: bool,
    pub source: BTreeMap<u32, LineReport>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub sloc: u32,
    pub hits: u32,
    pub misses: u32,
    pub percent: f64,
    pub files: Vec<CoverageReport>,
}

impl AggregateReport {
    pub fn push(&mut self, file: CoverageReport) {
        self.sloc += file.sloc;
        self.hits += file.hits;
        self.misses += file.misses;
        self.files.push(file);
    }

    /// Sort files by directory structure and compute the total percentage.
    pub fn finish(&mut self) {
        self.files
            .sort_by(|a, b| compare_paths(&a.filename, &b.filename));
        self.percent = crate::percent(self.hits, self.sloc);
    }
}

/// Order paths segment by segment; at the first differing segment a path ending there
/// sorts before one that continues into a directory.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    let segments_a = a.split('/').collect::<Vec<_>>();
    let segments_b = b.split('/').collect::<Vec<_>>();

    for (i, (sa, sb)) in segments_a.iter().zip(segments_b.iter()).enumerate() {
        if sa == sb {
            continue;
        }

        let last_a = i + 1 == segments_a.len();
        let last_b = i + 1 == segments_b.len();
        if last_a != last_b {
            return if last_a {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        return sa.cmp(sb);
    }

    segments_a.len().cmp(&segments_b.len())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sorted(paths: &[&str]) -> Vec<String> {
        let mut report = AggregateReport::default();
        for path in paths {
            report.push(CoverageReport {
                filename: path.to_string(),
                ..Default::default()
            });
        }
        report.finish();
        report.files.into_iter().map(|f| f.filename).collect()
    }

    #[test]
    fn shallower_path_sorts_first_at_divergence() {
        assert_eq!(
            sorted(&["a/b.js", "a.js", "a/c/d.js"]),
            vec!["a.js", "a/b.js", "a/c/d.js"]
        );
    }

    #[test]
    fn files_sort_before_sibling_directories() {
        assert_eq!(
            sorted(&["lib/z/x.js", "lib/y.js", "lib/a/b.js", "index.js"]),
            vec!["index.js", "lib/y.js", "lib/a/b.js", "lib/z/x.js"]
        );
    }

    #[test]
    fn prefix_path_sorts_first() {
        assert_eq!(compare_paths("a/b", "a/b/c"), Ordering::Less);
        assert_eq!(compare_paths("a/b/c", "a/b"), Ordering::Greater);
    }

    #[test]
    fn empty_report_has_zero_percent() {
        let mut report = AggregateReport::default();
        report.finish();
        assert_eq!(report.percent, 0.0);
    }

    #[test]
    fn chunk_serializes_verdict_in_lowercase() {
        let chunk = Chunk {
            source: "b".to_string(),
            miss: Some(ChunkMiss::Never),
        };
        assert_eq!(
            serde_json::to_string(&chunk).unwrap(),
            r#"{"source":"b","miss":"never"}"#
        );

        let covered = Chunk {
            source: "a && ".to_string(),
            miss: None,
        };
        assert_eq!(
            serde_json::to_string(&covered).unwrap(),
            r#"{"source":"a && "}"#
        );
    }
}
