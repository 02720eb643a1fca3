/*!
 * Prompt templates for document translation.
 *
 * One template per capability profile. Templates only carry instructions;
 * the document body is appended after rendering so that text inside the
 * document can never be mistaken for a placeholder.
 */

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::language_utils;
use crate::translation::glossary::GlossaryMapping;
use crate::translation::profile::TemplateId;

/// Instruction template with `{source_language}`, `{target_language}` and
/// `{terminology}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    /// Output-only framing for models that narrate their reasoning
    pub const REASONING_STRICT: &'static str = r#"You are a professional translator. Translate the {source_language} Markdown document below into {target_language}.

CRITICAL OUTPUT REQUIREMENTS:
- Output ONLY the translated document.
- Do not show your reasoning, analysis, notes or explanations.
- Preserve all Markdown formatting, code blocks, links and line breaks.
- Do not translate code, URLs or file paths.
{terminology}
---
"#;

    /// Minimal instruction for dedicated translation models
    pub const DIRECT_MINIMAL: &'static str = r#"Translate the following {source_language} text into {target_language}.
{terminology}
"#;

    /// Delimited instructions for general chat models
    pub const CHAT_DELIMITED: &'static str = r#"<<<INSTRUCTIONS>>>
Translate the {source_language} Markdown document between <<<DOCUMENT>>> and <<<END DOCUMENT>>> into {target_language}.
Rules:
- Output only the translated document, without these instructions and without the delimiter lines.
- Keep every heading, list, table, link and code block in place.
- Leave code blocks, inline code and URLs unchanged.
{terminology}<<<END INSTRUCTIONS>>>
<<<DOCUMENT>>>
"#;

    /// Term-list header of each template; echoes of these are stripped from answers
    pub const TERM_LIST_HEADERS: [&'static str; 3] = [
        "Terminology (use exactly):",
        "Use these translations for specific terms:",
        "TERMINOLOGY:",
    ];

    /// Header and pair separator of the term list of a template
    pub fn term_list_format(id: TemplateId) -> (&'static str, &'static str) {
        match id {
            TemplateId::ReasoningStrict => (Self::TERM_LIST_HEADERS[0], " → "),
            TemplateId::DirectMinimal => (Self::TERM_LIST_HEADERS[1], ": "),
            TemplateId::ChatDelimited => (Self::TERM_LIST_HEADERS[2], " → "),
        }
    }

    pub fn for_id(id: TemplateId) -> Self {
        let template = match id {
            TemplateId::ReasoningStrict => Self::REASONING_STRICT,
            TemplateId::DirectMinimal => Self::DIRECT_MINIMAL,
            TemplateId::ChatDelimited => Self::CHAT_DELIMITED,
        };
        Self { template }
    }

    /// Render the instruction part of the template
    pub fn render(&self, source_language: &str, target_language: &str, terminology: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
            .replace("{terminology}", terminology)
    }
}

/// Final prompt text for one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub template: TemplateId,
    /// 0 for the first attempt, incremented on every rejected attempt
    pub escalation: usize,
    pub text: String,
}

/// Builds prompts for one job: fixed language pair and glossary
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    source_language: String,
    target_language: String,
    glossary: GlossaryMapping,
}

impl PromptRenderer {
    /// Create a renderer from ISO 639 language codes
    pub fn new(source_language: &str, target_language: &str) -> Result<Self> {
        Ok(Self {
            source_language: language_utils::get_language_name(source_language)?,
            target_language: language_utils::get_language_name(target_language)?,
            glossary: GlossaryMapping::new(),
        })
    }

    /// Thread a validated glossary into the instructions
    pub fn with_glossary(mut self, glossary: GlossaryMapping) -> Self {
        self.glossary = glossary;
        self
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Render the prompt for a template, document body and escalation level
    pub fn render(&self, template: TemplateId, document: &str, escalation: usize) -> RenderedPrompt {
        let terminology = self.terminology_block(template);
        let instructions = PromptTemplate::for_id(template).render(
            &self.source_language,
            &self.target_language,
            &terminology,
        );

        let mut text = String::with_capacity(instructions.len() + document.len() + 256);
        if escalation > 0 {
            text.push_str(&self.escalation_preamble(escalation));
            text.push_str("\n\n");
        }
        text.push_str(&instructions);
        text.push_str(document.trim_end());
        if template == TemplateId::ChatDelimited {
            text.push_str("\n<<<END DOCUMENT>>>");
        }

        RenderedPrompt {
            template,
            escalation,
            text,
        }
    }

    /// Term list placed inside the instruction region only
    fn terminology_block(&self, template: TemplateId) -> String {
        if self.glossary.is_empty() {
            return String::new();
        }
        let (header, separator) = PromptTemplate::term_list_format(template);
        let mut block = String::from(header);
        block.push('\n');
        for term in self.glossary.iter() {
            block.push_str(&format!("- {}{}{}\n", term.source, separator, term.target));
        }
        block
    }

    fn escalation_preamble(&self, escalation: usize) -> String {
        let mut preamble = format!(
            "IMPORTANT: The previous answer was rejected because it was not a complete {tgt} translation. \
             Every sentence must be written in {tgt}. Do not copy the original {src} text.",
            src = self.source_language,
            tgt = self.target_language,
        );
        if escalation >= 2 {
            preamble.push_str(" Return nothing but the translated document.");
        }
        preamble
    }
}
