use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    percent, AggregateReport, Chunk, ChunkMiss, CoverageReport, FileSnapshot, LineReport,
    PathFilter, PatternError, PositionMapper, Range, RegistrySnapshot, StatementSnapshot,
};

/// Original source lines keyed by normalized file path.
pub type SourceLines = IndexMap<String, Vec<String>>;

type PendingStatements = BTreeMap<u32, BTreeMap<u32, StatementSnapshot>>;

/// Split text into lines, treating `\r\n`, `\n` and `\r` alike.
pub fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(|l| l.to_string())
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeConfig {
    pub coverage_path: String,
    pub coverage_exclude: Vec<String>,
    /// Map each line back through the position mapper, if one is given.
    pub source_maps: bool,
    pub base_dir: Option<String>,
}

/// Build the report for every file under `config.coverage_path`.
pub fn analyze(
    config: &AnalyzeConfig,
    snapshot: &RegistrySnapshot,
    sources: &SourceLines,
    position_mapper: Option<&dyn PositionMapper>,
) -> Result<AggregateReport, PatternError> {
    let filter = PathFilter::new(&config.coverage_path, &config.coverage_exclude)?;
    let mut analyzer = Analyzer::new(&filter, sources);

    if config.source_maps {
        if let Some(mapper) = position_mapper {
            analyzer = analyzer.with_position_mapper(mapper);
        }
    }
    if let Some(base_dir) = &config.base_dir {
        analyzer = analyzer.with_base_dir(base_dir);
    }

    Ok(analyzer.analyze(snapshot))
}

/// Turns registry counters and original sources into an [`AggregateReport`].
pub struct Analyzer<'a> {
    filter: &'a PathFilter,
    sources: &'a SourceLines,
    position_mapper: Option<&'a dyn PositionMapper>,
    base_dir: Option<String>,
}

impl<'a> Analyzer<'a> {
    pub fn new(filter: &'a PathFilter, sources: &'a SourceLines) -> Analyzer<'a> {
        Analyzer {
            filter,
            sources,
            position_mapper: None,
            base_dir: None,
        }
    }

    pub fn with_position_mapper(mut self, mapper: &'a dyn PositionMapper) -> Analyzer<'a> {
        self.position_mapper = Some(mapper);
        self
    }

    /// Report file names relative to `base_dir`.
    pub fn with_base_dir(mut self, base_dir: &str) -> Analyzer<'a> {
        let base_dir = crate::normalize_path(base_dir);
        self.base_dir = Some(if base_dir.ends_with('/') {
            base_dir
        } else {
            format!("{}/", base_dir)
        });
        self
    }

    #[instrument(skip_all)]
    pub fn analyze(&self, snapshot: &RegistrySnapshot) -> AggregateReport {
        let mut report = AggregateReport::default();

        for (filename, data) in snapshot.files.iter() {
            if self.filter.matches(filename) {
                report.push(self.file(filename, Some(data)));
            }
        }

        // In scope but never loaded at run time.
        for filename in self.sources.keys() {
            if !snapshot.files.contains_key(filename) && self.filter.matches(filename) {
                report.push(self.file(filename, None));
            }
        }

        report.finish();
        report
    }

    fn relative(&self, filename: &str) -> String {
        match &self.base_dir {
            Some(base_dir) => filename
                .strip_prefix(base_dir.as_str())
                .unwrap_or(filename)
                .to_string(),
            None => filename.to_string(),
        }
    }

    #[instrument(skip(self, data), fields(loaded = data.is_some()))]
    fn file(&self, filename: &str, data: Option<&FileSnapshot>) -> CoverageReport {
        let mut ret = CoverageReport {
            filename: self.relative(filename),
            ..Default::default()
        };

        let lines = self
            .sources
            .get(filename)
            .map(|l| l.as_slice())
            .unwrap_or_default();
        let mut statements = data.map(|d| d.statements.clone()).unwrap_or_default();

        for (index, line) in lines.iter().enumerate() {
            let num = index as u32 + 1;
            let mut record = LineReport::new(line.clone());

            if let Some(mapper) = self.position_mapper {
                self.add_original_position(&mut ret, &mut record, mapper, filename, num);
            }

            let Some(data) = data else {
                if !line.is_empty() {
                    record.miss = true;
                    ret.misses += 1;
                    ret.sloc += 1;
                }
                ret.source.insert(num, record);
                continue;
            };

            let count = data.lines.get(&num).copied();
            if count == Some(0) {
                record.miss = true;
                ret.misses += 1;
                ret.sloc += 1;
            } else if !line.is_empty() {
                match statements.remove(&num) {
                    Some(line_statements) => {
                        ret.sloc += 1;
                        match paint_line(line, num, line_statements, &mut statements) {
                            Some(chunks) => {
                                record.miss = true;
                                record.chunks = Some(chunks);
                                ret.misses += 1;
                            }
                            None => ret.hits += 1,
                        }
                    }
                    None if count.is_some() => {
                        ret.sloc += 1;
                        ret.hits += 1;
                    }
                    None => {}
                }
            }

            record.hits = count;
            ret.source.insert(num, record);
        }

        ret.percent = percent(ret.hits, ret.sloc);
        debug!(
            sloc = ret.sloc,
            hits = ret.hits,
            misses = ret.misses,
            "analyzed file"
        );
        ret
    }

    fn add_original_position(
        &self,
        ret: &mut CoverageReport,
        record: &mut LineReport,
        mapper: &dyn PositionMapper,
        filename: &str,
        num: u32,
    ) {
        match mapper.original_position(filename, num) {
            Some(original) if original.source != filename || original.line != num => {
                record.original_filename = Some(self.relative(&crate::normalize_path(
                    &original.source,
                )));
                record.original_line = Some(original.line);
                ret.sourcemaps = true;
            }
            _ => {
                record.original_filename = Some(ret.filename.clone());
                record.original_line = Some(num);
            }
        }
    }
}

/// Paint the verdict of every partially covered statement on the line and collapse the
/// mask into chunks. Returns `None` when the line is fully covered.
///
/// Records starting on another line are moved there; records ending on another line
/// leave a continuation behind on their end line.
fn paint_line(
    line: &str,
    num: u32,
    line_statements: BTreeMap<u32, StatementSnapshot>,
    pending: &mut PendingStatements,
) -> Option<Vec<Chunk>> {
    let chars = line.chars().collect::<Vec<_>>();
    let mut mask: Vec<Option<ChunkMiss>> = vec![None; chars.len()];
    let mut is_miss = false;

    for (id, mut statement) in line_statements {
        if statement.hit.is_covered() {
            continue;
        }

        if statement.loc.start.line != num {
            pending
                .entry(statement.loc.start.line)
                .or_default()
                .insert(id, statement);
            continue;
        }

        if !statement.loc.is_single_line() {
            let end = statement.loc.end;
            pending.entry(end.line).or_default().insert(
                id,
                StatementSnapshot {
                    hit: statement.hit,
                    outcome_scored: statement.outcome_scored,
                    loc: Range::new(end.line, 0, end.line, end.column),
                },
            );
            statement.loc.end.column = chars.len() as u32;
        }

        is_miss = true;
        let verdict = if statement.hit.truthy {
            ChunkMiss::True
        } else if statement.hit.falsy {
            ChunkMiss::False
        } else {
            ChunkMiss::Never
        };

        let from = (statement.loc.start.column as usize).min(mask.len());
        let to = (statement.loc.end.column as usize).min(mask.len());
        if from < to {
            mask[from..to].fill(Some(verdict));
        }
    }

    if !is_miss {
        return None;
    }

    Some(collapse(&chars, &mask))
}

fn collapse(chars: &[char], mask: &[Option<ChunkMiss>]) -> Vec<Chunk> {
    let mut chunks = vec![];
    let mut from = 0;

    for a in 1..mask.len() {
        if mask[a] != mask[a - 1] {
            chunks.push(Chunk {
                source: chars[from..a].iter().collect(),
                miss: mask[a - 1],
            });
            from = a;
        }
    }

    chunks.push(Chunk {
        source: chars[from..].iter().collect(),
        miss: mask.get(from).copied().flatten(),
    });

    chunks
}
