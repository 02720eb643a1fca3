/*!
 * Tests for the output sanitizer as seen by callers: determinism,
 * idempotence and preservation of legitimate document content.
 */

use mdtranslate::translation::sanitizer::{IssueKind, OutputSanitizer, SanitizeStatus, SanitizerConfig};
use crate::common;

fn zh_to_en() -> OutputSanitizer {
    OutputSanitizer::new(SanitizerConfig::default())
        .with_languages("zh", "en")
        .unwrap()
}

/// Test that a chatty, reasoning-laden response reduces to the document
#[test]
fn test_sanitize_withPrefixAndReasoning_shouldReturnDocumentOnly() {
    let raw = format!(
        "Here is the translation:\n\n<think>\nThe heading should stay a heading.\n</think>\n\n{}",
        common::ENGLISH_DOC
    );
    let out = zh_to_en().sanitize(&raw, Some(common::CHINESE_DOC));

    assert_eq!(out.cleaned_text, common::ENGLISH_DOC);
    assert_eq!(out.status, SanitizeStatus::Cleaned);
    assert!(out.forced_removal_applied);
    assert!(out.residual_measured);
    assert_eq!(out.residual_ratio, 0.0);
}

/// Test that sanitizing cleaned text again changes nothing
#[test]
fn test_sanitize_appliedTwice_shouldBeIdempotent() {
    let raw = format!(
        "Sure, here is the translated document:\n\n<think>\nplanning\n</think>\n{}",
        common::ENGLISH_DOC
    );
    let sanitizer = zh_to_en();
    let first = sanitizer.sanitize(&raw, None);
    let second = sanitizer.sanitize(&first.cleaned_text, None);

    assert_eq!(second.cleaned_text, first.cleaned_text);
    assert_eq!(second.status, SanitizeStatus::Clean);
    assert!(second.removed_sections.is_empty());
}

/// Test that identical input always yields identical output
#[test]
fn test_sanitize_withSameInput_shouldBeDeterministic() {
    let raw = "好的，这是翻译：\n\nTERMINOLOGY:\n- 缓存: cache\n\n# Cache\nNodes share data.";
    let sanitizer = zh_to_en();
    let runs: Vec<_> = (0..5).map(|_| sanitizer.sanitize(raw, None)).collect();

    assert!(runs.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(runs[0].cleaned_text, "# Cache\nNodes share data.");
}

/// Test that Markdown structure of a clean translation is kept verbatim
#[test]
fn test_sanitize_withRichMarkdown_shouldPreserveEveryLine() {
    let doc = "# Deployment\n\n| Key | Value |\n| --- | ----- |\n| port | 8080 |\n\n```bash\ncargo run --release\n```\n\n> Note: restart the service afterwards.\n\n- [Docs](https://example.com/docs)\n- Second item";
    let out = zh_to_en().sanitize(doc, None);

    assert_eq!(out.cleaned_text, doc);
    assert_eq!(out.status, SanitizeStatus::Clean);
    assert!(!out.has_fatal_errors());
}

/// Test that an untranslated answer is flagged as the source document
#[test]
fn test_sanitize_withEchoedSource_shouldReportFatalUnchangedSource() {
    let out = zh_to_en().sanitize(common::CHINESE_DOC, Some(common::CHINESE_DOC));

    assert!(out.has_fatal_errors());
    assert!(out.validation_errors.iter().any(|e| e.kind == IssueKind::UnchangedSource));
    assert!(out.residual_ratio > 0.95);
}

/// Test that a partial translation reports a residual ratio between the extremes
#[test]
fn test_sanitize_withPartialTranslation_shouldReportIntermediateRatio() {
    let out = zh_to_en().sanitize(
        "# System Design\n\nThis document describes the cache. 缓存节点通过一致性哈希分配数据。",
        Some(common::CHINESE_DOC),
    );
    assert!(out.residual_ratio > 0.1 && out.residual_ratio < 0.6, "ratio {}", out.residual_ratio);
}

/// Test that languages sharing a script leave the residual unmeasured
#[test]
fn test_sanitize_withSharedScript_shouldRecordNotMeasurable() {
    let sanitizer = OutputSanitizer::default().with_languages("de", "en").unwrap();
    let out = sanitizer.sanitize("# Title\nSome text", None);

    assert!(!out.residual_measured);
    assert!(out
        .validation_errors
        .iter()
        .any(|e| e.kind == IssueKind::ResidualNotMeasurable && !e.fatal));
    assert!(!sanitizer.residual_measurable());
}

/// Test that output serializes with kebab-case status names
#[test]
fn test_sanitized_output_serialization_shouldUseKebabCaseStatus() {
    let out = zh_to_en().sanitize("Here is the translation:\n# Doc\nThe body of the document goes here in full.", None);
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["status"], "cleaned");
    assert_eq!(json["removed_sections"][0]["kind"], "prefix");
}
