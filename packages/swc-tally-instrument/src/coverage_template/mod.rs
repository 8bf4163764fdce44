//! Text of the tracking calls spliced into instrumented code.

/// Quote a file name as a JavaScript string literal.
pub fn create_file_literal(filename: &str) -> String {
    // JSON string syntax is a subset of JavaScript's.
    serde_json::Value::String(filename.to_string()).to_string()
}

/// `cov._line("file",line);`, prepended to a statement.
pub fn create_line_call(coverage_variable: &str, file_literal: &str, line: u32) -> String {
    format!("{}._line({},{});", coverage_variable, file_literal, line)
}

/// `cov._statement("file",id,line,expr)`, evaluating to `expr`.
pub fn create_statement_call(
    coverage_variable: &str,
    file_literal: &str,
    id: u32,
    line: u32,
    expr: &str,
) -> String {
    format!(
        "{}._statement({},{},{},{})",
        coverage_variable, file_literal, id, line, expr
    )
}
