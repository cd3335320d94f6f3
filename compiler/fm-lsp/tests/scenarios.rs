// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Workspace scenarios run through the real parser and synthesizer.

use std::sync::Arc;

use fm_db::position::offset_to_position;
use fm_db::{Analyzer, Definition, Position, Report, Severity, Uri};
use fm_lsp::FormalityEngine;

const BOOL_URI: &str = "file:///ws/Bool.fm";
const BOOL: &str = "type Bool {\n  true,\n  false,\n}\n";

fn analyzer() -> Analyzer<FormalityEngine> {
    Analyzer::new(Arc::new(FormalityEngine))
}

fn files(list: &[(&str, &str)]) -> Vec<(Uri, String)> {
    list.iter()
        .map(|(uri, text)| (Uri::from(*uri), text.to_string()))
        .collect()
}

fn messages(report: &Report, uri: &str) -> Vec<String> {
    report
        .records
        .iter()
        .filter(|r| &*r.file == uri)
        .map(|r| r.message.clone())
        .collect()
}

#[test]
fn undefined_lowercase_type_is_reported_once() {
    let id = "file:///ws/id.fm";
    let id_text = "id(b: bool): Bool\n  Bool.true\n";
    let mut analyzer = analyzer();
    let report = analyzer
        .startup(files(&[(BOOL_URI, BOOL), (id, id_text)]))
        .expect("startup");

    assert!(messages(&report, BOOL_URI).is_empty());
    assert_eq!(report.records.len(), 1);

    let record = &report.records[0];
    assert_eq!(&*record.file, id);
    assert_eq!(record.message, "Undefined reference: bool\n");
    assert_eq!(record.severity, Severity::Error);
    assert_eq!(&id_text[record.from as usize..record.upto as usize], "bool");
    assert_eq!((record.from, record.upto), (6, 10));

    let map = report.reconcile(|uri, offset| {
        let text = if uri == id { id_text } else { BOOL };
        offset_to_position(text, offset)
    });
    assert!(map[BOOL_URI].is_empty());
    let diagnostics = &map[id];
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].range.start, Position::new(0, 6));
    assert_eq!(diagnostics[0].range.end, Position::new(0, 10));
}

#[test]
fn mismatch_lists_expected_detected_and_context() {
    let both = "file:///ws/Bool/both.fm";
    let both_text = "Bool.both(a: Bool, b: Bool): bool a\n";
    let mut analyzer = analyzer();
    let report = analyzer
        .startup(files(&[(BOOL_URI, BOOL), (both, both_text)]))
        .expect("startup");

    assert_eq!(
        messages(&report, both),
        vec![
            "Undefined reference: bool\n".to_string(),
            "Type mismatch.\n- Expected: bool\n- Detected: Bool\nWith context:\n- a: Bool\n- b: Bool\n"
                .to_string(),
        ]
    );
    let mismatch = &report.records[1];
    assert_eq!((mismatch.from, mismatch.upto), (34, 35));
    assert_eq!(&both_text[34..35], "a");
}

#[test]
fn definition_moved_to_another_file_leaves_no_stale_collision() {
    let id = "file:///ws/id.fm";
    let main = "file:///ws/main.fm";
    let other = "file:///ws/other.fm";
    let mut analyzer = analyzer();
    let report = analyzer
        .startup(files(&[
            (BOOL_URI, BOOL),
            (id, "id(b: Bool): Bool b\n"),
            (main, "main: Bool id(Bool.true)\n"),
        ]))
        .expect("startup");
    assert!(report.records.is_empty(), "{:?}", report.records);

    let report = analyzer.analyze(id, "").expect("delete id");
    assert_eq!(messages(&report, main), vec!["Undefined reference: id\n"]);
    assert!(!analyzer.store().global().contains("id"));

    let report = analyzer
        .analyze(other, "id(c: Bool): Bool Bool.false\n")
        .expect("reintroduce id");
    assert!(report.records.is_empty(), "{:?}", report.records);
    assert!(!report
        .records
        .iter()
        .any(|r| r.severity == Severity::Warning));
    assert_eq!(analyzer.store().global().owner("id"), Some(other));
    assert!(report.files.contains(id));
    assert!(report.files.contains(main));
}

#[test]
fn fixing_an_error_clears_its_file() {
    let not = "file:///ws/Bool/not.fm";
    let mut analyzer = analyzer();
    let report = analyzer
        .startup(files(&[
            (BOOL_URI, BOOL),
            (not, "Bool.not(a: Boll): Bool\n  case a {\n    true: false,\n    false: true,\n  }\n"),
        ]))
        .expect("startup");
    assert_eq!(messages(&report, not), vec!["Undefined reference: Boll\n"]);

    let report = analyzer
        .analyze(
            not,
            "Bool.not(a: Bool): Bool\n  case a {\n    true: false,\n    false: true,\n  }\n",
        )
        .expect("fix");
    let map = report.reconcile(|_, _| Position::default());
    assert!(map[not].is_empty());
    assert!(map[BOOL_URI].is_empty());
}

#[test]
fn parse_error_is_positioned_and_keeps_definitions() {
    let main = "file:///ws/main.fm";
    let mut analyzer = analyzer();
    analyzer
        .startup(files(&[(BOOL_URI, BOOL), (main, "main: Bool Bool.true\n")]))
        .expect("startup");

    let broken = "type Bool {";
    let report = analyzer.analyze(BOOL_URI, broken).expect("pass");
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!((record.from, record.upto), (11, 11));
    assert!(record.message.contains("end of file"), "{}", record.message);

    // The last good definitions stay in use.
    assert!(analyzer.store().global().contains("Bool.true"));
    assert!(analyzer.diagnostics(main).is_empty());
}

#[test]
fn queries_see_synthesized_definitions() {
    let not = "file:///ws/Bool/not.fm";
    let not_text = "Bool.not(a: Bool): Bool\n  case a {\n    true: false,\n    false: true,\n  }\n";
    let mut analyzer = analyzer();
    analyzer
        .startup(files(&[(BOOL_URI, BOOL), (not, not_text)]))
        .expect("startup");

    assert_eq!(
        analyzer.hover(not, not_text, 2).as_deref(),
        Some("Bool.not(a: Bool): Bool")
    );
    // `a` inside the body is a parameter.
    let a = not_text.find("case a").map(|i| i as u32 + 5).expect("case");
    assert_eq!(analyzer.hover(not, not_text, a).as_deref(), Some("a: Bool"));

    let def = analyzer.definition(not_text, 13).expect("Bool");
    assert_eq!(def.file(), BOOL_URI);
    assert_eq!(&BOOL[def.origin().as_range()], "Bool");

    let names: Vec<&str> = analyzer.completions().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["Bool", "Bool.false", "Bool.not", "Bool.true"]);
}

#[test]
fn deeply_nested_file_is_a_parse_failure() {
    let a = "file:///ws/a.fm";
    let nested = format!("x: Bool {}y{}", "f(".repeat(50_000), ")".repeat(50_000));
    let mut analyzer = analyzer();
    let report = analyzer
        .startup(files(&[(BOOL_URI, BOOL), (a, &nested)]))
        .expect("startup");

    let failures: Vec<_> = report.records.iter().filter(|r| &*r.file == a).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!((failures[0].from, failures[0].upto), (520, 520));
    assert!(failures[0].message.contains("nested"), "{}", failures[0].message);
    assert!(!analyzer.store().global().contains("x"));
    assert!(analyzer.diagnostics(BOOL_URI).is_empty());
}

#[test]
fn overridden_definition_warns_and_keeps_its_errors_for_later() {
    let a = "file:///ws/a.fm";
    let b = "file:///ws/b.fm";
    let mut analyzer = analyzer();
    let report = analyzer
        .startup(files(&[(BOOL_URI, BOOL), (a, "x: Bool q\n")]))
        .expect("startup");
    assert_eq!(messages(&report, a), vec!["Undefined reference: q\n"]);

    let report = analyzer
        .analyze(b, "x: Bool Bool.true\n")
        .expect("second x");
    let shown = analyzer.diagnostics(a);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].severity, Severity::Warning);
    assert_eq!(shown[0].message, format!("`x` is already defined in {b}\n"));
    assert_eq!((shown[0].from, shown[0].upto), (0, 1));
    assert!(report.files.contains(a));
    assert!(messages(&report, b).is_empty());

    let report = analyzer.analyze(b, "").expect("drop second x");
    assert_eq!(messages(&report, a), vec!["Undefined reference: q\n"]);
    assert_eq!(analyzer.store().global().owner("x"), Some(a));
}
