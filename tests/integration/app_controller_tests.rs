/*!
 * Integration tests for translating files through the application controller
 */

use anyhow::Result;
use mdtranslate::app_config::{Config, TranslationProvider};
use mdtranslate::app_controller::{Controller, FileOutcome};
use mdtranslate::file_utils::FileManager;
use mdtranslate::providers::mock::MOCK_TRANSLATION;
use crate::common;

fn mock_config() -> Config {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Mock;
    config
}

/// Test translating one file next to its source
#[tokio::test]
async fn test_run_withMockProvider_shouldWriteTranslation() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "design.md", common::CHINESE_DOC)?;
    let controller = Controller::with_config(mock_config())?;

    let outcome = controller.run(input, None, false).await?;

    let expected = temp_dir.path().join("design.en.md");
    assert_eq!(
        outcome,
        FileOutcome::Translated {
            output: expected.clone(),
            warnings: 0
        }
    );
    assert_eq!(FileManager::read_to_string(&expected)?, MOCK_TRANSLATION);
    Ok(())
}

/// Test that an existing translation is kept unless overwriting is forced
#[tokio::test]
async fn test_run_withExistingOutput_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "design.md", common::CHINESE_DOC)?;
    let output = common::create_test_file(temp_dir.path(), "out/design.md", "old")?;
    let controller = Controller::with_config(mock_config())?;

    let skipped = controller.run(input.clone(), Some(output.clone()), false).await?;
    assert_eq!(skipped, FileOutcome::Skipped { output: output.clone() });
    assert_eq!(FileManager::read_to_string(&output)?, "old");

    let forced = controller.run(input, Some(output.clone()), true).await?;
    assert!(matches!(forced, FileOutcome::Translated { .. }));
    assert_eq!(FileManager::read_to_string(&output)?, MOCK_TRANSLATION);
    Ok(())
}

/// Test that a missing input file is reported
#[tokio::test]
async fn test_run_withMissingInput_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = Controller::with_config(mock_config())?;

    let result = controller.run(temp_dir.path().join("missing.md"), None, false).await;

    assert!(result.is_err());
    Ok(())
}

/// Test that an empty document fails the run before any output is written
#[tokio::test]
async fn test_run_withEmptyDocument_shouldFailWithoutOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "empty.md", "\n  \n")?;
    let controller = Controller::with_config(mock_config())?;

    let err = controller.run(input, None, false).await.unwrap_err();

    assert!(err.to_string().contains("empty"));
    assert!(!temp_dir.path().join("empty.en.md").exists());
    Ok(())
}

/// Test that an invalid glossary file fails every job of the run
#[tokio::test]
async fn test_run_withInvalidGlossaryFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "design.md", common::CHINESE_DOC)?;
    let glossary = common::create_test_file(temp_dir.path(), "glossary.json", r#"{"缓存": ["cache"]}"#)?;
    let controller = Controller::with_config(mock_config())?.with_glossary_file(&glossary)?;

    assert!(controller.run(input, None, false).await.is_err());
    Ok(())
}

/// Test translating a folder, then skipping everything on the second run
#[tokio::test]
async fn test_run_folder_shouldTranslateThenSkip() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "a.md", common::CHINESE_DOC)?;
    common::create_test_file(temp_dir.path(), "docs/b.txt", common::CHINESE_DOC)?;
    let controller = Controller::with_config(mock_config())?;

    let first = controller.run_folder(temp_dir.path().to_path_buf(), false).await?;
    assert_eq!(first.translated, 2);
    assert_eq!(first.failed, 0);
    assert!(temp_dir.path().join("a.en.md").exists());
    assert!(temp_dir.path().join("docs/b.en.md").exists());

    let second = controller.run_folder(temp_dir.path().to_path_buf(), false).await?;
    assert_eq!(second.skipped, 2);
    assert_eq!(second.translated, 0);
    assert_eq!(controller.manager().list().len(), 2);
    Ok(())
}
