//! Property tests over the dotenv parse/render pair.

use std::collections::HashMap;

use envlock::core::document::parse_dotenv_document;
use envlock::core::dotenv::{parse_dotenv, render_dotenv, render_dotenv_ordered};
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = String> {
    "[A-Z_][A-Z0-9_]{0,12}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    // Covers quoting triggers: spaces, comments, both quote kinds,
    // backslashes, and escaped control characters.
    proptest::collection::vec(
        prop_oneof![
            proptest::char::range('a', 'z'),
            proptest::char::range('0', '9'),
            Just(' '),
            Just('#'),
            Just('"'),
            Just('\''),
            Just('\\'),
            Just('\n'),
            Just('\t'),
            Just('.'),
            Just('-'),
        ],
        0..24,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn env_map_strategy() -> impl Strategy<Value = HashMap<String, String>> {
    proptest::collection::hash_map(key_strategy(), value_strategy(), 0..12)
}

proptest! {
    #[test]
    fn render_then_parse_preserves_values(map in env_map_strategy()) {
        let rendered = render_dotenv(&map);
        let (parsed, issues) = parse_dotenv(&rendered);
        prop_assert!(
            issues.is_empty(),
            "rendering produced unparseable output: {issues:?}\n{rendered}"
        );
        prop_assert_eq!(parsed.values, map);
    }

    #[test]
    fn ordered_render_preserves_values_and_order(map in env_map_strategy()) {
        let mut order: Vec<String> = map.keys().cloned().collect();
        order.sort_unstable();
        order.reverse();

        let rendered = render_dotenv_ordered(&map, &order);
        let (parsed, issues) = parse_dotenv(&rendered);
        prop_assert!(issues.is_empty());
        prop_assert_eq!(&parsed.values, &map);
        prop_assert_eq!(parsed.order, order);
    }

    #[test]
    fn document_render_is_idempotent(input in "[ -~\t]{0,200}") {
        let (doc, _) = parse_dotenv_document(&input);
        let once = doc.render();
        let (doc2, _) = parse_dotenv_document(&once);
        prop_assert_eq!(doc2.render(), once);
    }

    #[test]
    fn document_keeps_every_input_line(input in "[ -~]{0,200}") {
        let (doc, _) = parse_dotenv_document(&input);
        prop_assert_eq!(doc.lines.len(), input.lines().count());
    }

    #[test]
    fn value_and_document_parsers_agree_on_values(map in env_map_strategy()) {
        let rendered = render_dotenv(&map);
        let (doc, _) = parse_dotenv_document(&rendered);
        let (flat, _) = parse_dotenv(&rendered);

        let mut from_doc = HashMap::new();
        for line in &doc.lines {
            if let envlock::core::document::DotenvLine::Key { key, value, .. } = line {
                from_doc.insert(key.clone(), value.clone());
            }
        }
        prop_assert_eq!(from_doc, flat.values);
    }
}
