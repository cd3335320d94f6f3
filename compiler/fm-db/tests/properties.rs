// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Property-based tests for diagnostic reconciliation and positions.
//!
//! - Every known file gets exactly one list, and only known files do
//! - Reconciling the same report twice gives the same result
//! - Offsets and positions convert back and forth

use std::collections::BTreeSet;
use std::sync::Arc;

use fm_ast::span::Span;
use fm_db::position::{offset_to_position, position_to_offset, LineIndex, Position};
use fm_db::{reconcile, DiagnosticRecord, Uri};
use proptest::prelude::*;

fn uri(i: u8) -> Uri {
    Arc::from(format!("file:///ws/f{i}.fm"))
}

fn record_strategy() -> impl Strategy<Value = DiagnosticRecord> {
    (0u8..8, 0u32..200, 0u32..50, "[a-z ]{0,12}").prop_map(|(file, from, len, message)| {
        DiagnosticRecord::error(uri(file), Span::new(from, from + len), message)
    })
}

fn column(_: &str, offset: u32) -> Position {
    Position::new(offset / 40, offset % 40)
}

mod reconcile_properties {
    use super::*;

    proptest! {
        #[test]
        fn every_known_file_gets_exactly_one_list(
            report in prop::collection::vec(record_strategy(), 0..40),
            known in prop::collection::btree_set(0u8..8, 0..8),
        ) {
            let known: BTreeSet<Uri> = known.into_iter().map(uri).collect();
            let out = reconcile(&report, &known, column);

            let keys: BTreeSet<Uri> = out.keys().cloned().collect();
            prop_assert_eq!(&keys, &known);

            for (file, list) in &out {
                let expected = report.iter().filter(|r| &r.file == file).count();
                prop_assert_eq!(list.len(), expected);
            }
        }

        #[test]
        fn reconcile_is_idempotent(
            report in prop::collection::vec(record_strategy(), 0..40),
            known in prop::collection::btree_set(0u8..8, 0..8),
        ) {
            let known: BTreeSet<Uri> = known.into_iter().map(uri).collect();
            let first = reconcile(&report, &known, column);
            let second = reconcile(&report, &known, column);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn messages_keep_report_order(
            report in prop::collection::vec(record_strategy(), 0..40),
        ) {
            let known: BTreeSet<Uri> = (0u8..8).map(uri).collect();
            let out = reconcile(&report, &known, column);
            for (file, list) in &out {
                let expected: Vec<&str> = report
                    .iter()
                    .filter(|r| &r.file == file)
                    .map(|r| r.message.as_str())
                    .collect();
                let actual: Vec<&str> = list.iter().map(|d| d.message.as_str()).collect();
                prop_assert_eq!(actual, expected);
            }
        }
    }
}

mod position_properties {
    use super::*;

    proptest! {
        #[test]
        fn ascii_positions_round_trip(
            lines in prop::collection::vec("[a-zA-Z0-9 (){}:,.]{0,30}", 1..12),
            line_pick in any::<prop::sample::Index>(),
            column_pick in any::<prop::sample::Index>(),
        ) {
            let text = lines.join("\n");
            let line = line_pick.index(lines.len());
            let character = column_pick.index(lines[line].len() + 1);
            let position = Position::new(line as u32, character as u32);

            let offset = position_to_offset(&text, position);
            prop_assert_eq!(offset_to_position(&text, offset), position);
        }

        #[test]
        fn char_boundary_offsets_round_trip(text in "[a-z\u{e9}\u{1d539} \r\n]{0,40}") {
            let index = LineIndex::new(&text);
            for (offset, _) in text.char_indices() {
                let position = index.position(offset as u32);
                let back = index.offset(position);
                // A `\n` after `\r` belongs to the same line break.
                if text[..offset].ends_with('\r') && text[offset..].starts_with('\n') {
                    continue;
                }
                prop_assert_eq!(back as usize, offset);
            }
        }

        #[test]
        fn offsets_past_the_end_clamp(text in "[a-z\n]{0,40}", extra in 0u32..100) {
            let end = offset_to_position(&text, text.len() as u32);
            prop_assert_eq!(offset_to_position(&text, text.len() as u32 + extra), end);
        }
    }
}
