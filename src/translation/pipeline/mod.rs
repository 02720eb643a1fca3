/*!
 * Translation pipeline plumbing.
 *
 * A job moves through four weighted phases per attempt:
 * 1. **Validation**: input size, glossary and provider availability
 * 2. **Prompt construction**: profile-specific prompt rendering
 * 3. **Invocation**: one call to the backend through the adapter
 * 4. **Cleaning**: sanitizing and evaluating the raw response
 */

pub mod adapter;
pub mod progress;

// Re-export types used externally
pub use adapter::{InvocationAdapter, RawModelResponse};
pub use progress::{PipelinePhase, PipelineProgress};
