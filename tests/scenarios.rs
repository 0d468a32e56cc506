//! End-to-end scenarios exercising `CoreString` the way a caller actually
//! would: construct, compare, format, and mutate, rather than poking at one
//! collaborator module in isolation.

use corestring::compare::CompareOptions;
use corestring::construct::ConstructOptions;
use corestring::encoding::Encoding;
use corestring::format::{format_with_args, FormatArgument, ObjectDescription};
use corestring::locale::DefaultCollator;
use corestring::oracle::DefaultOracle;
use corestring::range::CharRange;
use corestring::string::CoreString;

fn utf8(text: &str) -> CoreString {
    CoreString::with_bytes(text.as_bytes(), Encoding::Utf8, ConstructOptions::default()).unwrap()
}

fn units(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

// RUST_LOG=corestring=debug cargo test to see per-scenario diagnostics.
fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn composed_and_decomposed_accents_compare_equal_when_diacritic_insensitive() {
    init();
    let composed = utf8("café");
    let decomposed = utf8("cafe\u{0301}");
    let ord = composed.compare_with_options_and_locale(
        &decomposed,
        CompareOptions::DIACRITIC_INSENSITIVE,
        None,
        &DefaultOracle,
        &DefaultCollator,
    );
    assert_eq!(ord, std::cmp::Ordering::Equal);
}

#[test]
fn ligature_is_not_folded_away_by_case_and_width_insensitivity() {
    init();
    let a = utf8("Encyclopædia");
    let b = utf8("encyclopaedia");
    let ord = a.compare_with_options_and_locale(
        &b,
        CompareOptions::CASE_INSENSITIVE | CompareOptions::WIDTH_INSENSITIVE,
        None,
        &DefaultOracle,
        &DefaultCollator,
    );
    assert_ne!(ord, std::cmp::Ordering::Equal);
}

#[test]
fn german_sharp_s_folds_to_double_s_under_case_insensitive_compare() {
    init();
    let a = utf8("STRASSE");
    let b = utf8("straße");
    let ord = a.compare_with_options_and_locale(&b, CompareOptions::CASE_INSENSITIVE, None, &DefaultOracle, &DefaultCollator);
    assert_eq!(ord, std::cmp::Ordering::Equal);
}

#[test]
fn numeric_comparison_orders_by_magnitude_not_lexically() {
    init();
    let a = utf8("File 9.txt");
    let b = utf8("File 10.txt");
    let ord = a.compare_with_options_and_locale(&b, CompareOptions::NUMERICALLY, None, &DefaultOracle, &DefaultCollator);
    assert_eq!(ord, std::cmp::Ordering::Less);
}

#[test]
fn family_emoji_is_one_grapheme_cluster() {
    init();
    let v = utf8("\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}");
    assert_eq!(v.length(), 8);
    let r = v.range_of_character_cluster_at(0, corestring::cluster::ClusterType::Grapheme, &DefaultOracle);
    assert_eq!(r, CharRange::new(0, 8));
}

struct Answer;
impl ObjectDescription for Answer {
    fn describe(&self) -> String {
        "answer".to_string()
    }
}

#[test]
fn format_reorders_arguments_and_reports_replacement_metadata() {
    init();
    let template = units("%2$@ = %1$d");
    let answer = Answer;
    let args = [FormatArgument::Int(42), FormatArgument::Object(&answer)];
    let (out, records) = format_with_args(&template, &args, None, true).unwrap();
    assert_eq!(String::from_utf16_lossy(&out), "answer = 42");

    assert_eq!(records.len(), 2);
    // %2$@ appears first in the template (spec offset 0, length 3) and
    // renders "answer" at the start of the output.
    assert_eq!(records[0].spec_offset, 0);
    assert_eq!(records[0].spec_len, 3);
    assert_eq!(records[0].output_offset, 0);
    assert_eq!(records[0].output_len, 6);
    // %1$d follows the " = " literal (spec offset 6, length 4) and renders
    // "42" starting after "answer = ".
    assert_eq!(records[1].spec_offset, 6);
    assert_eq!(records[1].spec_len, 4);
    assert_eq!(records[1].output_offset, 9);
    assert_eq!(records[1].output_len, 2);
}

#[test]
fn mutable_string_appends_then_replaces_a_range() {
    init();
    let mut v = CoreString::mutable_empty(0);
    v.append(&units("α")).unwrap();
    v.append(&units("β")).unwrap();
    v.replace(CharRange::new(0, 1), &units("γδ")).unwrap();

    assert_eq!(v.length(), 3);
    assert!(v.is_unicode());
    assert_eq!(v.to_string_lossy(), "γδβ");
}

#[test]
fn case_insensitive_compare_does_not_stop_at_an_embedded_nul() {
    init();
    let a = CoreString::with_characters(&[b'a' as u16, b'b' as u16, b'c' as u16, 0, b'd' as u16, b'e' as u16, b'f' as u16]).unwrap();
    let b = CoreString::with_characters(&[b'A' as u16, b'B' as u16, b'C' as u16, 0, b'D' as u16, b'E' as u16, b'F' as u16]).unwrap();
    let ord = a.compare_with_options_and_locale(&b, CompareOptions::CASE_INSENSITIVE, None, &DefaultOracle, &DefaultCollator);
    assert_eq!(ord, std::cmp::Ordering::Equal);
}
