/*!
 * Prompt rendering for document translation.
 *
 * This module provides:
 * - Instruction templates for each capability profile
 * - Glossary term lists placed inside the instruction region
 * - Escalated variants used after a rejected attempt
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptRenderer, PromptTemplate, RenderedPrompt};
