use swc_core::{
    common::{
        comments::{Comment, SingleThreadedComments},
        sync::Lrc,
        FileName, SourceMap, Spanned,
    },
    ecma::{
        ast::EsVersion,
        parser::{parse_file_as_program, EsSyntax, Syntax},
        visit::VisitWith,
    },
};
use tally_oxide::FileSchema;
use tracing::{debug, instrument};

use crate::{utils::hint_comments::BypassRanges, CoverageVisitor, InstrumentError, InstrumentOptions};

/// Instrumented code of one file and the coverage layout to register for it.
#[derive(Clone, Debug, PartialEq)]
pub struct Instrumented {
    pub code: String,
    pub schema: FileSchema,
}

/// Blank out a leading `#!` line, keeping its newline so line numbers do not shift.
pub fn strip_shebang(source: &str) -> &str {
    if !source.starts_with("#!") {
        return source;
    }

    match source.find(['\n', '\r']) {
        Some(end) => &source[end..],
        None => "",
    }
}

/// Rewrite `source` so that running it reports line and branch coverage of `filename`.
#[instrument(skip(source, options))]
pub fn instrument_source(
    filename: &str,
    source: &str,
    options: &InstrumentOptions,
) -> Result<Instrumented, InstrumentError> {
    let source = strip_shebang(source);
    let source_map: Lrc<SourceMap> = Default::default();
    let fm = source_map.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let comments = SingleThreadedComments::default();
    let mut recovered = vec![];
    let parse_error = |err: swc_core::ecma::parser::error::Error| {
        let line = source_map.lookup_char_pos(err.span().lo).line;
        InstrumentError::Parse {
            file: filename.to_string(),
            message: format!("{} (line {})", err.kind().msg(), line),
        }
    };

    let program = parse_file_as_program(
        &fm,
        Syntax::Es(EsSyntax::default()),
        EsVersion::EsNext,
        Some(&comments),
        &mut recovered,
    )
    .map_err(&parse_error)?;

    if let Some(err) = recovered.into_iter().next() {
        return Err(parse_error(err));
    }

    let bypass = BypassRanges::from_comments(&sorted_comments(comments), fm.start_pos, source.len());
    if !bypass.is_empty() {
        debug!(ranges = ?bypass.ranges(), "coverage bypass ranges");
    }

    let mut visitor =
        CoverageVisitor::new(&source_map, fm.start_pos, source, bypass, options, filename);
    program.visit_with(&mut visitor);
    let (code, schema) = visitor.finish();

    debug!(
        lines = schema.lines.len(),
        statements = schema.statements.len(),
        "instrumented file"
    );
    Ok(Instrumented { code, schema })
}

fn sorted_comments(comments: SingleThreadedComments) -> Vec<Comment> {
    let (leading, trailing) = comments.take_all();
    let mut all = leading
        .borrow()
        .values()
        .chain(trailing.borrow().values())
        .flatten()
        .cloned()
        .collect::<Vec<_>>();

    // a comment may be attached both as trailing and leading
    all.sort_by_key(|c| c.span.lo);
    all.dedup_by_key(|c| c.span.lo);
    all
}
