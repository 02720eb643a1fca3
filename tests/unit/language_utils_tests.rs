/*!
 * Tests for language code utilities and script detection
 */

use mdtranslate::language_utils::{
    self, LanguageCodeType, Script, get_language_name, language_codes_match, normalize_to_part1_or_part2t,
    normalize_to_part2t, validate_language_code,
};

/// Test validation of ISO 639-1 and 639-2 codes
#[test]
fn test_validate_language_code_withKnownCodes_shouldReturnType() {
    assert_eq!(validate_language_code("zh").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code(" EN ").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code("zho").unwrap(), LanguageCodeType::Part2T);
    assert_eq!(validate_language_code("chi").unwrap(), LanguageCodeType::Part2B);
}

/// Test rejection of malformed codes
#[test]
fn test_validate_language_code_withInvalidCodes_shouldFail() {
    for code in ["xyz", "123", "e", "", "english"] {
        assert!(validate_language_code(code).is_err(), "{} should be rejected", code);
    }
}

/// Test normalization across code families
#[test]
fn test_normalize_shouldConvergeOnCanonicalCodes() {
    assert_eq!(normalize_to_part2t("zh").unwrap(), "zho");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert_eq!(normalize_to_part1_or_part2t("fra").unwrap(), "fr");
    assert_eq!(normalize_to_part1_or_part2t("fre").unwrap(), "fr");
}

/// Test that equivalent codes match
#[test]
fn test_language_codes_match_withEquivalentCodes_shouldReturnTrue() {
    assert!(language_codes_match("zh", "chi"));
    assert!(language_codes_match("en", "eng"));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("en", "xyz"));
}

/// Test language names used in prompts
#[test]
fn test_get_language_name_shouldReturnEnglishName() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("de").unwrap(), "German");
    assert!(get_language_name("xx").is_err());
}

/// Test script lookup for language pairs used by the residual measurement
#[test]
fn test_scripts_for_language_shouldSeparateDistinctWritingSystems() {
    assert_eq!(language_utils::scripts_for_language("zh").unwrap(), vec![Script::Han]);
    assert_eq!(language_utils::scripts_for_language("ru").unwrap(), vec![Script::Cyrillic]);
    assert_eq!(language_utils::scripts_for_language("fr").unwrap(), vec![Script::Latin]);
}

/// Test the residual ratio on a partially translated document
#[test]
fn test_script_ratio_withPartialTranslation_shouldReflectLeftover() {
    let ratio = language_utils::script_ratio("Cache 缓存", &[Script::Han]);
    assert!((ratio - 2.0 / 7.0).abs() < 1e-9);
    assert_eq!(language_utils::script_ratio("Cache", &[Script::Han]), 0.0);
}
