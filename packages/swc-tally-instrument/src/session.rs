use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tally_oxide::{
    normalize_path, split_lines, AggregateReport, AnalyzeConfig, PathFilter, PathMatcher,
    PatternError, PositionMapper, Registry, SourceLines,
};
use tracing::{debug, instrument, warn};

use crate::{
    instrument_source, strip_shebang, InstrumentError, InstrumentOptions, Instrumented,
    TransformEntry, TransformPipeline,
};

/// Files to instrument, and how to turn them into JavaScript first.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstrumentConfig {
    pub coverage_path: String,
    pub coverage_exclude: Vec<String>,
    #[serde(skip)]
    pub transforms: Vec<TransformEntry>,
}

/// Result of loading one file through the session.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadedSource {
    Instrumented(String),
    /// The file is out of scope or could not be instrumented.
    Original(String),
}

impl LoadedSource {
    pub fn is_instrumented(&self) -> bool {
        matches!(self, LoadedSource::Instrumented(_))
    }

    pub fn code(&self) -> &str {
        match self {
            LoadedSource::Instrumented(code) | LoadedSource::Original(code) => code,
        }
    }
}

/// Coverage context of one run: path patterns, transforms, original sources and the
/// [`Registry`] the instrumented code reports into.
#[derive(Debug, Default)]
pub struct CoverageSession {
    options: InstrumentOptions,
    base_dir: Option<String>,
    patterns: PathMatcher,
    transforms: TransformPipeline,
    sources: SourceLines,
    transformed: HashMap<String, String>,
    registry: Arc<Registry>,
}

impl CoverageSession {
    pub fn new(options: InstrumentOptions) -> CoverageSession {
        CoverageSession {
            options,
            ..Default::default()
        }
    }

    /// Directory report and cache file names are relative to.
    pub fn with_base_dir(mut self, base_dir: &str) -> CoverageSession {
        let base_dir = normalize_path(base_dir);
        self.base_dir = Some(if base_dir.ends_with('/') {
            base_dir
        } else {
            format!("{}/", base_dir)
        });
        self
    }

    /// Start intercepting files under `config.coverage_path`.
    #[instrument(skip_all, fields(coverage_path = config.coverage_path.as_str()))]
    pub fn instrument(&mut self, config: InstrumentConfig) -> Result<(), PatternError> {
        let filter = PathFilter::new(&config.coverage_path, &config.coverage_exclude)?;
        self.patterns.add(filter);

        for entry in config.transforms {
            debug!(extension = entry.extension.as_str(), "registered transform");
            self.transforms.register(entry);
        }

        Ok(())
    }

    /// Whether files with this extension go through the load hook.
    pub fn handles_extension(&self, extension: &str) -> bool {
        self.transforms.extensions().any(|e| e == extension)
    }

    pub fn load(&mut self, path: &str) -> Result<LoadedSource, InstrumentError> {
        let text = std::fs::read_to_string(path).map_err(|source| InstrumentError::Io {
            path: path.to_string(),
            source,
        })?;

        Ok(self.load_source(path, &text))
    }

    /// Load hook: instrument `text` if `path` is in scope, otherwise hand it back.
    #[instrument(skip(self, text))]
    pub fn load_source(&mut self, path: &str, text: &str) -> LoadedSource {
        let path = normalize_path(path);
        if !self.transforms.handles(&path) || !self.patterns.matches(&path) {
            return LoadedSource::Original(text.to_string());
        }

        let transformed = self.transforms.apply(strip_shebang(text), &path);
        let relative = self.relative(&path).to_string();
        self.transformed.insert(relative, transformed.clone());

        match instrument_source(&path, &transformed, &self.options) {
            Ok(Instrumented { code, schema }) => {
                self.sources.insert(path, split_lines(text));
                self.registry.register(&schema);
                LoadedSource::Instrumented(code)
            }
            Err(err) => {
                warn!(error = %err, "serving file without coverage");
                LoadedSource::Original(text.to_string())
            }
        }
    }

    /// Tracking surface called by instrumented code.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Text of a loaded file after its transform, by file name relative to the base directory.
    pub fn transformed_source(&self, filename: &str) -> Option<&str> {
        self.transformed.get(filename).map(|s| s.as_str())
    }

    pub fn analyze(&self, config: &AnalyzeConfig) -> Result<AggregateReport, PatternError> {
        self.analyze_with_mapper(config, None)
    }

    pub fn analyze_with_mapper(
        &self,
        config: &AnalyzeConfig,
        position_mapper: Option<&dyn PositionMapper>,
    ) -> Result<AggregateReport, PatternError> {
        let mut config = config.clone();
        if config.base_dir.is_none() {
            config.base_dir = self.base_dir.clone();
        }

        tally_oxide::analyze(
            &config,
            &self.registry.snapshot(),
            &self.sources,
            position_mapper,
        )
    }

    /// Forget every loaded file and recorded hit.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.sources.clear();
        self.transformed.clear();
    }

    fn relative<'p>(&self, path: &'p str) -> &'p str {
        match &self.base_dir {
            Some(base_dir) => path.strip_prefix(base_dir.as_str()).unwrap_or(path),
            None => path,
        }
    }
}
