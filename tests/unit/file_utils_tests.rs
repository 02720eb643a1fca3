/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::path::Path;
use mdtranslate::file_utils::{FileManager, FileType};
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "notes.md", "# Notes")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path()));

    Ok(())
}

/// Test that generate_output_path appends the target language before `.md`
#[test]
fn test_generate_output_path_withValidInputs_shouldCreateCorrectPath() {
    let output_path = FileManager::generate_output_path(
        Path::new("/tmp/input/design.md"),
        Path::new("/tmp/output"),
        "en",
    );

    assert_eq!(output_path, Path::new("/tmp/output/design.en.md"));
}

/// Test that plain text inputs still produce Markdown outputs
#[test]
fn test_generate_output_path_withTextInput_shouldUseMarkdownExtension() {
    let output_path = FileManager::generate_output_path(Path::new("notes.txt"), Path::new("out"), "fr");
    assert_eq!(output_path, Path::new("out/notes.fr.md"));
}

/// Test document type detection by extension
#[test]
fn test_detect_file_type_shouldClassifyByExtension() {
    assert_eq!(FileManager::detect_file_type("a.md"), FileType::Markdown);
    assert_eq!(FileManager::detect_file_type("a.MARKDOWN"), FileType::Markdown);
    assert_eq!(FileManager::detect_file_type("a.txt"), FileType::PlainText);
    assert_eq!(FileManager::detect_file_type("a.srt"), FileType::Unknown);
    assert_eq!(FileManager::detect_file_type("README"), FileType::Unknown);
}

/// Test that earlier outputs are recognized for the same target language only
#[test]
fn test_is_translation_output_shouldMatchTargetSuffix() {
    assert!(FileManager::is_translation_output("design.en.md", "en"));
    assert!(FileManager::is_translation_output("design.EN.md", "en"));
    assert!(!FileManager::is_translation_output("design.en.md", "fr"));
    assert!(!FileManager::is_translation_output("design.md", "en"));
}

/// Test that find_documents walks subdirectories and skips earlier outputs
#[test]
fn test_find_documents_withNestedTree_shouldReturnSortedSources() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "b.md", "b")?;
    common::create_test_file(temp_dir.path(), "a.txt", "a")?;
    common::create_test_file(temp_dir.path(), "a.en.md", "a")?;
    common::create_test_file(temp_dir.path(), "image.png", "")?;
    common::create_test_file(temp_dir.path(), "guide/intro.markdown", "intro")?;

    let documents = FileManager::find_documents(temp_dir.path(), "en")?;
    let names: Vec<String> = documents
        .iter()
        .map(|p| p.strip_prefix(temp_dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();

    assert_eq!(names, vec!["a.txt", "b.md", "guide/intro.markdown"]);
    Ok(())
}

/// Test that write_to_file creates missing parent directories
#[test]
fn test_write_to_file_withMissingParent_shouldCreateIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let target = temp_dir.path().join("nested/dir/out.en.md");

    FileManager::write_to_file(&target, "# Out")?;

    assert_eq!(FileManager::read_to_string(&target)?, "# Out");
    Ok(())
}

/// Test that reading a missing file reports the path
#[test]
fn test_read_to_string_withMissingFile_shouldFail() {
    let err = FileManager::read_to_string("definitely_missing.md").unwrap_err();
    assert!(err.to_string().contains("definitely_missing.md"));
}
