/*!
 * # mdtranslate - Markdown document translation with interchangeable LLM backends
 *
 * A Rust library for translating long-form technical Markdown documents between
 * natural languages using generative language models.
 *
 * ## Features
 *
 * - Translate documents using various AI providers:
 *   - Ollama (local LLM)
 *   - OpenAI API and OpenAI-compatible services (LM Studio, DeepSeek, Qwen, MiMo)
 *   - Anthropic API
 * - Model capability profiles selecting prompt shape and retry budget
 * - Deterministic cleanup of raw model output (reasoning blocks, echoed
 *   instructions, chatty prefixes) that never discards translated content
 * - Residual source-language detection with escalating retries
 * - Enforced glossary terminology
 * - Observable, cancellable translation jobs
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `translation`: The translation pipeline:
 *   - `translation::profile`: Model capability profiles
 *   - `translation::prompts`: Prompt templates and renderer
 *   - `translation::sanitizer`: Output contract sanitizer
 *   - `translation::retry`: Retry orchestrator
 *   - `translation::glossary`: Glossary mapping and loader
 *   - `translation::pipeline`: Invocation adapter and progress phases
 * - `jobs`: Job state machine, job store and lifecycle events
 * - `providers`: Client implementations for various LLM providers
 * - `app_controller`: CLI controller translating files and folders
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code and writing system utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod jobs;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{ErrorCode, JobFailure, PipelineError, ProviderError};
pub use jobs::{JobManager, JobSnapshot, JobSpec, JobStatus};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use translation::{OutputSanitizer, SanitizedOutput};
