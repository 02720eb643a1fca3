/*!
 * Translation execution for Markdown documents.
 *
 * - `profile`: capability table mapping (provider, model) to a behavioral profile
 * - `prompts`: profile-specific prompt templates and the renderer
 * - `glossary`: validated source → target terminology
 * - `sanitizer`: deterministic cleanup and validation of raw model output
 * - `retry`: acceptance, escalation and fallback across attempts
 * - `pipeline`: invocation adapter and weighted progress
 */

pub mod glossary;
pub mod pipeline;
pub mod profile;
pub mod prompts;
pub mod retry;
pub mod sanitizer;

// Re-export main types for easier usage
pub use self::glossary::{GlossaryLoader, GlossaryMapping, GlossaryTerm};
pub use self::pipeline::{InvocationAdapter, PipelinePhase, PipelineProgress, RawModelResponse};
pub use self::profile::{CapabilityRule, CapabilityTable, ModelMatch, ModelProfile, ProfileKind, TemplateId};
pub use self::prompts::{PromptRenderer, PromptTemplate, RenderedPrompt};
pub use self::retry::{AcceptedTranslation, AttemptObserver, RetryConfig, RetryOrchestrator, RetryOutcome};
pub use self::sanitizer::{OutputSanitizer, SanitizeStatus, SanitizedOutput, SanitizerConfig};
