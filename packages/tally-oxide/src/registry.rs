use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Range, Truthy};

/// A sub-expression whose evaluation is recorded by a statement call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchStatement {
    pub id: u32,
    /// Line of the expression declaring the branch, which keys the record.
    pub line: u32,
    pub loc: Range,
    /// Whether true and false outcomes are scored separately.
    pub outcome_scored: bool,
}

/// Coverage layout of one instrumented file, as produced by a single instrumentation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSchema {
    pub path: String,
    pub lines: Vec<u32>,
    pub statements: Vec<BranchStatement>,
}

impl FileSchema {
    pub fn new(path: String) -> FileSchema {
        FileSchema {
            path,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct StatementRecord {
    hit_true: AtomicBool,
    hit_false: AtomicBool,
    outcome_scored: bool,
    loc: Range,
}

impl StatementRecord {
    fn mark(&self, truthy: bool) {
        if !self.outcome_scored {
            self.hit_true.store(true, Ordering::Relaxed);
            self.hit_false.store(true, Ordering::Relaxed);
        } else if truthy {
            self.hit_true.store(true, Ordering::Relaxed);
        } else {
            self.hit_false.store(true, Ordering::Relaxed);
        }
    }
}

/// Live counters of one file. The layout is fixed at registration, only the atomics change.
#[derive(Debug, Default)]
struct FileRecord {
    lines: BTreeMap<u32, AtomicU64>,
    statements: BTreeMap<u32, BTreeMap<u32, StatementRecord>>,
}

impl FileRecord {
    fn from_schema(schema: &FileSchema) -> FileRecord {
        let mut record = FileRecord::default();
        for line in &schema.lines {
            record.lines.entry(*line).or_insert_with(|| AtomicU64::new(0));
        }

        for statement in &schema.statements {
            record.statements.entry(statement.line).or_default().insert(
                statement.id,
                StatementRecord {
                    hit_true: AtomicBool::new(false),
                    hit_false: AtomicBool::new(false),
                    outcome_scored: statement.outcome_scored,
                    loc: statement.loc,
                },
            );
        }

        record
    }

    fn from_snapshot(snapshot: &FileSnapshot) -> FileRecord {
        FileRecord {
            lines: snapshot
                .lines
                .iter()
                .map(|(line, count)| (*line, AtomicU64::new(*count)))
                .collect(),
            statements: snapshot
                .statements
                .iter()
                .map(|(line, records)| {
                    let records = records
                        .iter()
                        .map(|(id, s)| {
                            (
                                *id,
                                StatementRecord {
                                    hit_true: AtomicBool::new(s.hit.truthy),
                                    hit_false: AtomicBool::new(s.hit.falsy),
                                    outcome_scored: s.outcome_scored,
                                    loc: s.loc,
                                },
                            )
                        })
                        .collect();
                    (*line, records)
                })
                .collect(),
        }
    }

    fn has_hits(&self) -> bool {
        self.lines.values().any(|c| c.load(Ordering::Relaxed) > 0)
            || self.statements.values().flat_map(|s| s.values()).any(|s| {
                s.hit_true.load(Ordering::Relaxed) || s.hit_false.load(Ordering::Relaxed)
            })
    }

    fn snapshot(&self) -> FileSnapshot {
        FileSnapshot {
            lines: self
                .lines
                .iter()
                .map(|(line, count)| (*line, count.load(Ordering::Relaxed)))
                .collect(),
            statements: self
                .statements
                .iter()
                .map(|(line, records)| {
                    let records = records
                        .iter()
                        .map(|(id, s)| {
                            (
                                *id,
                                StatementSnapshot {
                                    hit: Hit {
                                        truthy: s.hit_true.load(Ordering::Relaxed),
                                        falsy: s.hit_false.load(Ordering::Relaxed),
                                    },
                                    outcome_scored: s.outcome_scored,
                                    loc: s.loc,
                                },
                            )
                        })
                        .collect();
                    (*line, records)
                })
                .collect(),
        }
    }
}

/// Coverage context shared by the instrumenter and the tracking calls of running code.
///
/// Counters are independent atomics: no ordering is guaranteed across distinct counters.
#[derive(Debug, Default)]
pub struct Registry {
    files: RwLock<IndexMap<String, Arc<FileRecord>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Default::default()
    }

    /// Seed a registry from counters dumped by a host.
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Registry {
        let files = snapshot
            .files
            .iter()
            .map(|(path, file)| (path.clone(), Arc::new(FileRecord::from_snapshot(file))))
            .collect();

        Registry {
            files: RwLock::new(files),
        }
    }

    /// Install a zeroed record for the schema's file, replacing any previous one.
    pub fn register(&self, schema: &FileSchema) {
        let record = Arc::new(FileRecord::from_schema(schema));
        let previous = self.write().insert(schema.path.clone(), record);

        if let Some(previous) = previous {
            if previous.has_hits() {
                warn!(
                    file = schema.path.as_str(),
                    "file instrumented again, previously recorded hits are discarded"
                );
            }
        }

        debug!(
            file = schema.path.as_str(),
            lines = schema.lines.len(),
            statements = schema.statements.len(),
            "registered coverage schema"
        );
    }

    pub fn contains(&self, file: &str) -> bool {
        self.read().contains_key(file)
    }

    pub fn files(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Line call: count one execution of the statement starting on `line`.
    pub fn line(&self, file: &str, line: u32) {
        let counter = self.file(file).and_then(|record| {
            record
                .lines
                .get(&line)
                .map(|count| count.fetch_add(1, Ordering::Relaxed))
        });

        if counter.is_none() {
            debug!(file, line, "line call for an unregistered line");
        }
    }

    /// Statement call: record the outcome of `value` and hand it back unchanged.
    pub fn statement<V: Truthy>(&self, file: &str, id: u32, line: u32, value: V) -> V {
        let marked = self.file(file).map(|record| {
            match record.statements.get(&line).and_then(|s| s.get(&id)) {
                Some(statement) => {
                    statement.mark(value.is_truthy());
                    true
                }
                None => false,
            }
        });

        if marked != Some(true) {
            debug!(file, id, line, "statement call for an unregistered branch");
        }

        value
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let files = self
            .read()
            .iter()
            .map(|(path, record)| (path.clone(), record.snapshot()))
            .collect();

        RegistrySnapshot { files }
    }

    /// Drop every record at the end of a run.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn file(&self, file: &str) -> Option<Arc<FileRecord>> {
        self.read().get(file).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Arc<FileRecord>>> {
        self.files.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Arc<FileRecord>>> {
        self.files.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Observed outcomes of a branch statement.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "true", default, skip_serializing_if = "is_false")]
    pub truthy: bool,
    #[serde(rename = "false", default, skip_serializing_if = "is_false")]
    pub falsy: bool,
}

impl Hit {
    pub fn is_covered(&self) -> bool {
        self.truthy && self.falsy
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSnapshot {
    #[serde(default)]
    pub hit: Hit,
    #[serde(rename = "bool", default)]
    pub outcome_scored: bool,
    pub loc: Range,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    #[serde(default)]
    pub lines: BTreeMap<u32, u64>,
    #[serde(default)]
    pub statements: BTreeMap<u32, BTreeMap<u32, StatementSnapshot>>,
}

/// Serializable image of a [`Registry`]: `files[path] = {lines, statements}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub files: IndexMap<String, FileSnapshot>,
}
