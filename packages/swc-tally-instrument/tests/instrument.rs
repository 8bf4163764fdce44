use pretty_assertions::assert_eq;
use swc_tally_instrument::{instrument_source, InstrumentError, InstrumentOptions, Instrumented};
use tally_oxide::{BranchStatement, Range};

fn options() -> InstrumentOptions {
    InstrumentOptions {
        coverage_variable: "$c".to_string(),
        ..Default::default()
    }
}

fn instrument(source: &str) -> Instrumented {
    instrument_source("a.js", source, &options()).unwrap()
}

fn code(source: &str) -> String {
    instrument(source).code
}

#[test]
fn if_test_is_wrapped_and_body_braced() {
    assert_eq!(
        code("if (a) b();"),
        r#"$c._line("a.js",1);if ($c._statement("a.js",1,1,a)) {$c._line("a.js",1);b();}"#
    );
}

#[test]
fn else_branch_is_braced() {
    assert_eq!(
        code("if (a) {\n  b();\n} else c();"),
        "$c._line(\"a.js\",1);if ($c._statement(\"a.js\",1,1,a)) {\n  $c._line(\"a.js\",2);b();\n} else {$c._line(\"a.js\",3);c();}"
    );
}

#[test]
fn ternary_branches_are_recorded() {
    let Instrumented { code, schema } = instrument("x = c ? 1 : 2;");

    assert_eq!(
        code,
        r#"$c._line("a.js",1);x = ($c._statement("a.js",1,1,c)? $c._statement("a.js",2,1,1) : $c._statement("a.js",3,1,2));"#
    );
    assert_eq!(
        schema.statements,
        vec![
            BranchStatement {
                id: 1,
                line: 1,
                loc: Range::new(1, 4, 1, 5),
                outcome_scored: true,
            },
            BranchStatement {
                id: 2,
                line: 1,
                loc: Range::new(1, 8, 1, 9),
                outcome_scored: false,
            },
            BranchStatement {
                id: 3,
                line: 1,
                loc: Range::new(1, 12, 1, 13),
                outcome_scored: false,
            },
        ]
    );
}

#[test]
fn logical_test_is_covered_as_logical() {
    assert_eq!(
        code("if (a && b) f();"),
        r#"$c._line("a.js",1);if (($c._statement("a.js",1,1,a)&&$c._statement("a.js",2,1,b))) {$c._line("a.js",1);f();}"#
    );
}

#[test]
fn right_operand_is_scored_only_when_nested() {
    let Instrumented { code, schema } = instrument("x = a && b || c;");

    assert_eq!(
        code,
        r#"$c._line("a.js",1);x = ($c._statement("a.js",3,1,($c._statement("a.js",1,1,a)&&$c._statement("a.js",2,1,b)))||$c._statement("a.js",4,1,c));"#
    );
    assert_eq!(
        schema
            .statements
            .iter()
            .map(|s| (s.id, s.outcome_scored))
            .collect::<Vec<_>>(),
        vec![(1, true), (2, true), (3, false), (4, false)]
    );
}

#[test]
fn parentheses_are_transparent_for_scoring() {
    let schema = instrument("x = ((a || b)) ?? c;").schema;

    // `(a || b)` is nested through its parentheses, and composite on the left of `??`
    assert_eq!(
        schema
            .statements
            .iter()
            .map(|s| (s.id, s.outcome_scored))
            .collect::<Vec<_>>(),
        vec![(1, true), (2, true), (3, false), (4, false)]
    );
    assert_eq!(schema.statements[2].loc, Range::new(1, 6, 1, 12));
}

#[test]
fn loop_bodies_are_braced() {
    assert_eq!(
        code("while (x) x--;"),
        r#"$c._line("a.js",1);while ($c._statement("a.js",1,1,x)) {$c._line("a.js",1);x--;}"#
    );
    assert_eq!(
        code("for (var i = 0; i < n; i++) f(i);"),
        r#"$c._line("a.js",1);for (var i = 0; $c._statement("a.js",1,1,i < n); i++) {$c._line("a.js",1);f(i);}"#
    );
    assert_eq!(
        code("do x--; while (x);"),
        r#"$c._line("a.js",1);do {$c._line("a.js",1);x--;} while ($c._statement("a.js",1,1,x));"#
    );
}

#[test]
fn loop_head_declarations_are_not_tracked() {
    let Instrumented { code, schema } = instrument("for (const k in o) {}");

    assert_eq!(code, r#"$c._line("a.js",1);for (const k in o) {}"#);
    assert_eq!(schema.lines, vec![1]);
}

#[test]
fn switch_case_tests_are_left_alone() {
    let Instrumented { code, schema } = instrument("switch (x) {\n  case 1:\n    break;\n}");

    assert_eq!(
        code,
        "$c._line(\"a.js\",1);switch (x) {\n  case 1:\n    $c._line(\"a.js\",3);break;\n}"
    );
    assert!(schema.statements.is_empty());
}

#[test]
fn labeled_statement_keeps_label_after_line_call() {
    assert_eq!(
        code("outer: for (;;) break outer;"),
        r#"$c._line("a.js",1);outer: for (;;) {$c._line("a.js",1);break outer;}"#
    );
}

#[test]
fn exported_declarations_are_tracked_before_export() {
    let Instrumented { code, schema } =
        instrument("export const a = 1;\nexport function f() {\n  return a;\n}");

    assert_eq!(
        code,
        "$c._line(\"a.js\",1);export const a = 1;\n$c._line(\"a.js\",2);export function f() {\n  $c._line(\"a.js\",3);return a;\n}"
    );
    assert_eq!(schema.lines, vec![1, 3, 2]);
}

#[test]
fn directive_prologue_is_not_prefixed() {
    assert_eq!(
        code("'use strict';\nf();"),
        "'use strict';\n$c._line(\"a.js\",2);f();"
    );
}

#[test]
fn bypassed_region_is_not_instrumented() {
    let source = "// $tally:coverage:off$\nif (a) b();\n// $tally:coverage:on$\nc();";
    let Instrumented { code, schema } = instrument(source);

    assert_eq!(
        code,
        "// $tally:coverage:off$\nif (a) b();\n// $tally:coverage:on$\n$c._line(\"a.js\",4);c();"
    );
    assert_eq!(schema.lines, vec![4]);
    assert!(schema.statements.is_empty());
}

#[test]
fn repeated_off_directive_keeps_first_start() {
    let source = "/* $tally:coverage:off$ */ a();\n/* $tally:coverage:off$ */ b();\n/* $tally:coverage:on$ */ c();";
    let schema = instrument(source).schema;

    assert_eq!(schema.lines, vec![3]);
}

#[test]
fn trailing_off_directive_bypasses_rest_of_file() {
    let schema = instrument("a();\n// $tally:coverage:off$\nb();\nc ? d : e;").schema;

    assert_eq!(schema.lines, vec![1]);
    assert!(schema.statements.is_empty());
}

#[test]
fn shebang_is_removed_without_shifting_lines() {
    assert_eq!(
        code("#!/usr/bin/env node\nf();"),
        "\n$c._line(\"a.js\",2);f();"
    );
}

#[test]
fn default_coverage_variable() {
    let out = instrument_source("/p/a\"b.js", "f();", &Default::default()).unwrap();

    assert_eq!(out.code, r#"__$$tally._line("/p/a\"b.js",1);f();"#);
    assert_eq!(out.schema.path, "/p/a\"b.js");
}

#[test]
fn parse_error_is_reported() {
    let err = instrument_source("a.js", "if (", &options()).unwrap_err();

    match err {
        InstrumentError::Parse { file, .. } => assert_eq!(file, "a.js"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn nested_functions_are_tracked() {
    let Instrumented { code, schema } = instrument("const f = () => {\n  return x ? 1 : 2;\n};");

    assert_eq!(
        code,
        "$c._line(\"a.js\",1);const f = () => {\n  $c._line(\"a.js\",2);return ($c._statement(\"a.js\",1,2,x)? $c._statement(\"a.js\",2,2,1) : $c._statement(\"a.js\",3,2,2));\n};"
    );
    assert_eq!(schema.lines, vec![2, 1]);
}

#[test]
fn sequence_tests_stay_one_argument() {
    assert_eq!(
        code("if (x, y) f();"),
        r#"$c._line("a.js",1);if ($c._statement("a.js",1,1,(x, y))) {$c._line("a.js",1);f();}"#
    );
    assert_eq!(
        code("while (n++, n < 3) ;"),
        r#"$c._line("a.js",1);while ($c._statement("a.js",1,1,(n++, n < 3))) {;}"#
    );
}

#[test]
fn parenthesized_sequence_is_not_wrapped_twice() {
    assert_eq!(
        code("x = c ? (a, b) : d;"),
        r#"$c._line("a.js",1);x = ($c._statement("a.js",1,1,c)? $c._statement("a.js",2,1,(a, b)) : $c._statement("a.js",3,1,d));"#
    );
}
