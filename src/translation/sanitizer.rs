/*!
 * Output contract sanitizer for raw model responses.
 *
 * Backend models wrap translations in chatter, echo instructions, leak
 * reasoning or restate the glossary. The sanitizer turns a raw response into
 * document text through a fixed sequence of bounded, line-oriented steps:
 *
 * 1. Strip a leading run of known introductory phrases
 * 2. Strip complete reasoning blocks (`<think>…</think>` and friends)
 * 3. Strip forced sections: restated instructions, term-list echoes, directives
 * 4. Strip instruction echo at the very start (first lines only)
 * 5. Cut everything up to an explicit content label such as `Translation:`
 * 6. Measure the residual source-language ratio
 * 7. Fall back to minimal cleanup when too much was removed
 *
 * The sanitizer is pure and never fails: its worst outcome is an `invalid`
 * status, which the retry orchestrator treats as a rejected attempt.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::language_utils::{self, Script};
use crate::translation::glossary::GlossaryMapping;
use crate::translation::prompts::PromptTemplate;

/// Thresholds steering the sanitizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// Fraction of the raw length steps 1-5 may remove before falling back
    #[serde(default = "default_max_length_loss")]
    pub max_length_loss: f64,

    /// Minimal cleanup is abandoned for the raw text when it keeps less than this
    #[serde(default = "default_min_retained_fraction")]
    pub min_retained_fraction: f64,

    /// Maximum non-blank lines a single forced section may swallow
    #[serde(default = "default_forced_section_line_cap")]
    pub forced_section_line_cap: usize,

    /// Lines examined by the leading instruction scan
    #[serde(default = "default_leading_scan_lines")]
    pub leading_scan_lines: usize,

    /// A plain line longer than this counts as content
    #[serde(default = "default_content_line_min_chars")]
    pub content_line_min_chars: usize,

    /// A line carrying markup counts as content above this length
    #[serde(default = "default_markup_line_min_chars")]
    pub markup_line_min_chars: usize,
}

fn default_max_length_loss() -> f64 {
    0.70
}

fn default_min_retained_fraction() -> f64 {
    0.20
}

fn default_forced_section_line_cap() -> usize {
    20
}

fn default_leading_scan_lines() -> usize {
    50
}

fn default_content_line_min_chars() -> usize {
    30
}

fn default_markup_line_min_chars() -> usize {
    20
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            max_length_loss: default_max_length_loss(),
            min_retained_fraction: default_min_retained_fraction(),
            forced_section_line_cap: default_forced_section_line_cap(),
            leading_scan_lines: default_leading_scan_lines(),
            content_line_min_chars: default_content_line_min_chars(),
            markup_line_min_chars: default_markup_line_min_chars(),
        }
    }
}

impl SanitizerConfig {
    /// Check that every fraction is within 0..=1
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("max_length_loss", self.max_length_loss),
            ("min_retained_fraction", self.min_retained_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow::anyhow!("{} must be between 0 and 1, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Outcome tag of a sanitizer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SanitizeStatus {
    /// Nothing had to be removed
    Clean,
    /// Non-content sections were removed
    Cleaned,
    /// Too much was removed; only trimming and one prefix strip were kept
    FallbackMinimal,
    /// Even minimal cleanup lost too much; the raw text is returned trimmed
    FallbackOriginal,
    /// Nothing usable remained; the raw text is returned verbatim
    Invalid,
}

/// What kind of non-content a removed section was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalKind {
    Prefix,
    ReasoningBlock,
    AnswerWrapper,
    ForcedSection,
    DelimiterEcho,
    DirectiveLine,
    GlossaryEcho,
    LeadingInstructions,
    ContentLabel,
}

impl RemovalKind {
    /// Forced removals are unconditional and exempt from the length-loss fallback
    pub fn is_forced(&self) -> bool {
        matches!(
            self,
            Self::ReasoningBlock
                | Self::ForcedSection
                | Self::DelimiterEcho
                | Self::DirectiveLine
                | Self::GlossaryEcho
        )
    }
}

/// Descriptor of one removed region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedSection {
    pub kind: RemovalKind,
    pub lines: usize,
    pub chars: usize,
    /// First non-blank line of the region, shortened
    pub preview: String,
}

impl RemovedSection {
    fn from_lines(kind: RemovalKind, lines: &[&str]) -> Self {
        let chars = lines.iter().map(|l| l.chars().count()).sum();
        let preview = lines
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map(|l| l.chars().take(60).collect())
            .unwrap_or_default();
        debug!("Sanitizer removed {:?} ({} lines): {}", kind, lines.len(), preview);
        Self {
            kind,
            lines: lines.len(),
            chars,
            preview,
        }
    }

    fn from_text(kind: RemovalKind, text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        Self::from_lines(kind, &lines)
    }
}

/// Category of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnterminatedReasoningBlock,
    ForcedRemovalCapExceeded,
    ExcessiveLengthLoss,
    EmptyOutput,
    UnchangedSource,
    ResidualNotMeasurable,
}

/// A validation finding; fatal findings make the attempt unacceptable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub fatal: bool,
    pub message: String,
}

impl ValidationIssue {
    fn fatal(kind: IssueKind, message: impl Into<String>) -> Self {
        Self { kind, fatal: true, message: message.into() }
    }

    fn notice(kind: IssueKind, message: impl Into<String>) -> Self {
        Self { kind, fatal: false, message: message.into() }
    }
}

/// Cleaned document text plus everything the sanitizer did to produce it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedOutput {
    pub cleaned_text: String,
    pub status: SanitizeStatus,
    pub removed_sections: Vec<RemovedSection>,
    /// Fraction of letters in `cleaned_text` written in the source script
    pub residual_ratio: f64,
    /// False when source and target share a script or the scripts are unknown
    pub residual_measured: bool,
    pub validation_errors: Vec<ValidationIssue>,
    pub forced_removal_applied: bool,
}

impl SanitizedOutput {
    pub fn has_fatal_errors(&self) -> bool {
        self.validation_errors.iter().any(|e| e.fatal)
    }
}

static PREFIX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^(?:sure|certainly|of course|okay|ok|absolutely)[,.!]?$",
        r"^(?:sure|certainly|of course|okay|absolutely)[,.!]?\s+here(?:'s| is| are)\b.{0,100}$",
        r"^here(?:'s| is| are)\s+(?:the|your|my|a)\b.{0,80}?\btranslat(?:ion|ed)\b.{0,60}?[:：.]?$",
        r"^here(?:'s| is| are)\s+(?:the|your|my|a)\b.{0,80}[:：]$",
        r"^(?:below|following) is (?:the|your|my)\b.{0,80}?\btranslat(?:ion|ed)\b.{0,60}?[:：.]?$",
        r"^i(?:'ve| have) translated\b.{0,120}[:：.]$",
        r"^(?:the )?translated (?:version|text|document|content|markdown)\b.{0,60}[:：]$",
        r"^(?:以下是|下面是|这是|好的，这是|这是您提供的).{0,40}(?:翻译|译文).{0,20}[:：。]?$",
        r"^(?:好的|当然|没问题)[，,。！!]?$",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect()
});

const REASONING_TAGS: [&str; 5] = ["think", "thinking", "reasoning", "analysis", "reflection"];

struct ReasoningTag {
    /// Opening tag at the very start of the remaining text
    leading_open: Regex,
    close: Regex,
    /// Closing tag ending a line
    line_close: Regex,
}

static REASONING_PATTERNS: Lazy<Vec<ReasoningTag>> = Lazy::new(|| {
    REASONING_TAGS
        .iter()
        .map(|tag| ReasoningTag {
            leading_open: Regex::new(&format!(r"(?i)\A<{tag}>")).unwrap(),
            close: Regex::new(&format!(r"(?i)</{tag}>")).unwrap(),
            line_close: Regex::new(&format!(r"(?i)</{tag}>\z")).unwrap(),
        })
        .collect()
});

static ANSWER_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<answer>(.*?)</answer>").unwrap());

static ANSWER_ARTIFACT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:</?answer>|assistant>)\s*$").unwrap());

static DELIMITER_ECHO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:<<<\s*(?:end\s+)?(?:instructions|document)\s*>>>|translation task end|={3,}\s*(?:translation|output|document)\b[^=]*={3,})$")
        .unwrap()
});

static CONTENT_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:[a-z]+ )?translation(?: result)?|translated (?:content|text|document)|译文|翻译|翻译如下|翻译结果|以下是翻译)\s*[:：]$")
        .unwrap()
});

const FORCED_MARKERS: [&str; 9] = [
    "critical output requirements",
    "important requirements",
    "translation task start",
    "glossary:",
    "terminology:",
    "terminology constraints",
    "术语表",
    "use these translations for specific terms",
    "<<<instructions",
];

static TERM_LIST_MARKERS: Lazy<Vec<String>> = Lazy::new(|| {
    PromptTemplate::TERM_LIST_HEADERS
        .iter()
        .map(|h| h.to_lowercase())
        .collect()
});

const DIRECTIVE_PREFIXES: [&str; 12] = [
    "you must",
    "you should",
    "do not",
    "don't",
    "never",
    "remember",
    "note that",
    "make sure",
    "ensure",
    "translate the following",
    "you are a professional translator",
    "output only",
];

const INSTRUCTION_VOCABULARY: [&str; 12] = [
    "translat",
    "output",
    "markdown",
    "original",
    "glossary",
    "terminolog",
    "the document",
    "source text",
    "target language",
    "formatting",
    "chinese",
    "english",
];

const INSTRUCTION_PHRASES: [&str; 22] = [
    "you are a professional translator",
    "you are a translator",
    "translate all",
    "translate the following",
    "translate this document",
    "important requirements",
    "preserve all markdown formatting",
    "preserve the markdown",
    "terminology constraints",
    "do not translate",
    "output only",
    "i will translate",
    "let me translate",
    "translation strategy",
    "here is my plan",
    "step 1:",
    "step 2:",
    "这是您提供的",
    "以下是翻译后的内容",
    "好的，这是",
    "请翻译",
    "翻译以下",
];

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].chars().next().is_none_or(char::is_whitespace)
}

fn is_fence(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

fn is_prefix_line(line: &str) -> bool {
    PREFIX_PATTERNS.iter().any(|re| re.is_match(line))
}

fn is_content_label(line: &str) -> bool {
    CONTENT_LABEL.is_match(strip_decoration(line))
}

/// Drop emphasis and quote decoration around a line
fn strip_decoration(line: &str) -> &str {
    line.trim_matches(|c: char| c == '*' || c == '_' || c == '>' || c.is_whitespace())
}

fn is_forced_marker(line: &str) -> bool {
    if is_heading(line) || char_len(line) > 100 {
        return false;
    }
    let normalized = strip_decoration(line).to_lowercase();
    FORCED_MARKERS.iter().any(|m| normalized.starts_with(m))
        || TERM_LIST_MARKERS.iter().any(|m| normalized.starts_with(m.as_str()))
}

fn is_directive_line(line: &str) -> bool {
    if char_len(line) > 200 {
        return false;
    }
    let lower = strip_decoration(line)
        .trim_start_matches(['-', '*', '•', ' '])
        .to_lowercase();
    DIRECTIVE_PREFIXES.iter().any(|p| lower.starts_with(p))
        && INSTRUCTION_VOCABULARY.iter().any(|v| lower.contains(v))
}

fn is_instruction_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    INSTRUCTION_PHRASES.iter().any(|p| lower.contains(p)) || is_directive_line(line)
}

fn in_inline_code(line: &str, at: usize) -> bool {
    line[..at].matches('`').count() % 2 == 1
}

/// Byte offset just past a closing reasoning tag that ends a line ahead of
/// the first heading, outside code fences and inline code
fn orphan_close_end(text: &str) -> Option<usize> {
    let mut offset = 0;
    let mut in_fence = false;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if is_fence(trimmed) {
            in_fence = !in_fence;
        } else if !in_fence {
            if is_heading(trimmed) {
                return None;
            }
            let closes = REASONING_PATTERNS
                .iter()
                .filter_map(|tag| tag.line_close.find(trimmed))
                .any(|m| !in_inline_code(trimmed, m.start()));
            if closes {
                return Some(offset + line.len());
            }
        }
        offset += line.len();
    }
    None
}

/// Deterministic transformation of raw model text into document text
#[derive(Debug, Clone, Default)]
pub struct OutputSanitizer {
    config: SanitizerConfig,
    source_scripts: Option<Vec<Script>>,
    target_scripts: Option<Vec<Script>>,
    glossary: Option<GlossaryMapping>,
}

impl OutputSanitizer {
    pub fn new(config: SanitizerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Resolve source and target scripts from language codes
    pub fn with_languages(self, source_language: &str, target_language: &str) -> anyhow::Result<Self> {
        let source = language_utils::scripts_for_language(source_language)?;
        let target = language_utils::scripts_for_language(target_language)?;
        Ok(self.with_scripts(source, Some(target)))
    }

    pub fn with_scripts(mut self, source: Vec<Script>, target: Option<Vec<Script>>) -> Self {
        self.source_scripts = Some(source);
        self.target_scripts = target;
        self
    }

    /// Glossary pairs restated by the model are removed as echo
    pub fn with_glossary(mut self, glossary: GlossaryMapping) -> Self {
        self.glossary = if glossary.is_empty() { None } else { Some(glossary) };
        self
    }

    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// Whether the residual ratio can be measured for the configured languages
    pub fn residual_measurable(&self) -> bool {
        match (&self.source_scripts, &self.target_scripts) {
            (Some(source), Some(target)) => !source.iter().any(|s| target.contains(s)),
            _ => false,
        }
    }

    /// Clean a raw response. `source_text` is the document that was translated.
    pub fn sanitize(&self, raw: &str, source_text: Option<&str>) -> SanitizedOutput {
        let mut removed = Vec::new();
        let mut issues = Vec::new();

        if raw.trim().is_empty() {
            issues.push(ValidationIssue::fatal(IssueKind::EmptyOutput, "model returned no text"));
            return self.finish(raw.to_string(), SanitizeStatus::Invalid, removed, issues, false, source_text);
        }

        let text = self.strip_prefixes(raw, &mut removed);
        let (text, reasoning_removed) = self.strip_reasoning_blocks(&text, &mut removed, &mut issues);
        // The block preceded the answer, so the answer may open with its own prefix
        let text = if reasoning_removed {
            self.strip_prefixes(&text, &mut removed)
        } else {
            text
        };
        let text = self.strip_forced_sections(&text, &mut removed, &mut issues);
        let text = self.strip_leading_instructions(&text, &mut removed);
        let text = self.extract_after_label(&text, &mut removed);

        let mut cleaned = text.trim().to_string();
        let forced = removed.iter().any(|s| s.kind.is_forced());
        let mut status = if removed.is_empty() {
            SanitizeStatus::Clean
        } else {
            SanitizeStatus::Cleaned
        };

        let raw_len = char_len(raw.trim());
        let loss = 1.0 - char_len(&cleaned) as f64 / raw_len as f64;
        if !forced && loss > self.config.max_length_loss {
            warn!(
                "Cleaning removed {:.0}% of the response, falling back to minimal cleanup",
                loss * 100.0
            );
            issues.push(ValidationIssue::notice(
                IssueKind::ExcessiveLengthLoss,
                format!("cleaning removed {:.0}% of the response", loss * 100.0),
            ));
            removed.clear();
            let minimal = self.minimal_cleanup(raw, &mut removed);
            if (char_len(&minimal) as f64) < raw_len as f64 * self.config.min_retained_fraction {
                removed.clear();
                cleaned = raw.trim().to_string();
                status = SanitizeStatus::FallbackOriginal;
            } else {
                cleaned = minimal;
                status = SanitizeStatus::FallbackMinimal;
            }
        }

        if cleaned.is_empty() {
            warn!("Cleaning left no content, keeping the raw response");
            issues.push(ValidationIssue::fatal(IssueKind::EmptyOutput, "no content left after cleaning"));
            return self.finish(raw.to_string(), SanitizeStatus::Invalid, removed, issues, forced, source_text);
        }

        if let Some(source) = source_text {
            let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
            if normalize(source) == normalize(&cleaned) {
                issues.push(ValidationIssue::fatal(
                    IssueKind::UnchangedSource,
                    "output is identical to the source document",
                ));
            }
        }

        self.finish(cleaned, status, removed, issues, forced, source_text)
    }

    fn finish(
        &self,
        cleaned_text: String,
        status: SanitizeStatus,
        removed_sections: Vec<RemovedSection>,
        mut validation_errors: Vec<ValidationIssue>,
        forced_removal_applied: bool,
        source_text: Option<&str>,
    ) -> SanitizedOutput {
        let (residual_ratio, residual_measured) = self.residual_ratio(&cleaned_text, source_text);
        if !residual_measured {
            validation_errors.push(ValidationIssue::notice(
                IssueKind::ResidualNotMeasurable,
                "source and target scripts are not distinguishable",
            ));
        }
        SanitizedOutput {
            cleaned_text,
            status,
            removed_sections,
            residual_ratio,
            residual_measured,
            validation_errors,
            forced_removal_applied,
        }
    }

    fn residual_ratio(&self, text: &str, source_text: Option<&str>) -> (f64, bool) {
        let source = match &self.source_scripts {
            Some(scripts) => scripts.clone(),
            None => match source_text.and_then(language_utils::dominant_script) {
                Some(script) => vec![script],
                None => return (0.0, false),
            },
        };
        let Some(target) = &self.target_scripts else {
            return (0.0, false);
        };
        if source.iter().any(|s| target.contains(s)) {
            return (0.0, false);
        }
        (language_utils::script_ratio(text, &source), true)
    }

    /// Step 1: contiguous leading run of introductory phrases
    fn strip_prefixes(&self, text: &str, removed: &mut Vec<RemovedSection>) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let mut end = 0;
        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !is_prefix_line(trimmed) {
                break;
            }
            end = i + 1;
        }
        if end == 0 {
            return text.to_string();
        }
        removed.push(RemovedSection::from_lines(RemovalKind::Prefix, &lines[..end]));
        lines[end..].join("\n")
    }

    /// Step 2: reasoning blocks leading the response, then answer wrappers.
    ///
    /// Tags are only recognised before the first heading or content line;
    /// mentions further down belong to the document.
    fn strip_reasoning_blocks(
        &self,
        text: &str,
        removed: &mut Vec<RemovedSection>,
        issues: &mut Vec<ValidationIssue>,
    ) -> (String, bool) {
        let mut text = text.to_string();
        let mut reasoning_removed = false;

        // Blocks may be chained, e.g. <think> followed by <reflection>
        'leading: loop {
            let body = text.trim_start();
            for tag in REASONING_PATTERNS.iter() {
                if !tag.leading_open.is_match(body) {
                    continue;
                }
                match tag.close.find(body) {
                    Some(close) => {
                        removed.push(RemovedSection::from_text(RemovalKind::ReasoningBlock, &body[..close.end()]));
                        text = body[close.end()..].to_string();
                        reasoning_removed = true;
                        continue 'leading;
                    }
                    None => {
                        issues.push(ValidationIssue::fatal(
                            IssueKind::UnterminatedReasoningBlock,
                            "reasoning block was opened but never closed",
                        ));
                        break 'leading;
                    }
                }
            }
            break;
        }

        // Opening tag omitted by the backend: the block spans the start of the text
        if !reasoning_removed {
            if let Some(end) = orphan_close_end(&text) {
                removed.push(RemovedSection::from_text(RemovalKind::ReasoningBlock, &text[..end]));
                text = text[end..].to_string();
                reasoning_removed = true;
            }
        }

        if ANSWER_BLOCK.is_match(&text) {
            removed.push(RemovedSection::from_lines(RemovalKind::AnswerWrapper, &["<answer>", "</answer>"]));
            text = ANSWER_BLOCK.replace_all(&text, "$1").into_owned();
        }
        let artifacts: Vec<&str> = text.lines().filter(|l| ANSWER_ARTIFACT_LINE.is_match(l)).collect();
        if !artifacts.is_empty() {
            removed.push(RemovedSection::from_lines(RemovalKind::AnswerWrapper, &artifacts));
            text = text
                .lines()
                .filter(|l| !ANSWER_ARTIFACT_LINE.is_match(l))
                .collect::<Vec<_>>()
                .join("\n");
        }

        if reasoning_removed {
            text = text.trim_start().to_string();
        }
        (text, reasoning_removed)
    }

    /// Step 3: marker-initiated blocks plus single-line echoes, never inside code fences
    fn strip_forced_sections(
        &self,
        text: &str,
        removed: &mut Vec<RemovedSection>,
        issues: &mut Vec<ValidationIssue>,
    ) -> String {
        let cap = self.config.forced_section_line_cap;
        let mut kept: Vec<&str> = Vec::new();
        let mut in_fence = false;
        let mut block: Option<Vec<&str>> = None;
        let mut block_lines = 0usize;

        for line in text.lines() {
            let trimmed = line.trim();

            if let Some(dropped) = block.as_mut() {
                if trimmed.is_empty() {
                    dropped.push(line);
                    continue;
                }
                if is_heading(trimmed) || is_fence(trimmed) {
                    removed.push(RemovedSection::from_lines(RemovalKind::ForcedSection, dropped));
                    block = None;
                } else if DELIMITER_ECHO.is_match(trimmed) {
                    dropped.push(line);
                    removed.push(RemovedSection::from_lines(RemovalKind::ForcedSection, dropped));
                    block = None;
                    continue;
                } else if block_lines >= cap {
                    warn!(
                        "Forced section exceeded {} lines without a heading, keeping the remainder",
                        cap
                    );
                    issues.push(ValidationIssue::notice(
                        IssueKind::ForcedRemovalCapExceeded,
                        format!("forced section exceeded {} lines; remainder preserved", cap),
                    ));
                    removed.push(RemovedSection::from_lines(RemovalKind::ForcedSection, dropped));
                    block = None;
                } else {
                    dropped.push(line);
                    block_lines += 1;
                    continue;
                }
            }

            if is_fence(trimmed) {
                in_fence = !in_fence;
                kept.push(line);
                continue;
            }
            if in_fence || trimmed.is_empty() {
                kept.push(line);
                continue;
            }
            if is_forced_marker(trimmed) {
                block = Some(vec![line]);
                block_lines = 0;
            } else if DELIMITER_ECHO.is_match(trimmed) {
                removed.push(RemovedSection::from_lines(RemovalKind::DelimiterEcho, &[line]));
            } else if is_directive_line(trimmed) {
                removed.push(RemovedSection::from_lines(RemovalKind::DirectiveLine, &[line]));
            } else if self.glossary.as_ref().is_some_and(|g| g.echoes_pair(trimmed)) {
                removed.push(RemovedSection::from_lines(RemovalKind::GlossaryEcho, &[line]));
            } else {
                kept.push(line);
            }
        }

        if let Some(dropped) = block {
            removed.push(RemovedSection::from_lines(RemovalKind::ForcedSection, &dropped));
        }
        kept.join("\n")
    }

    fn is_content_line(&self, line: &str) -> bool {
        let len = char_len(line);
        let has_markup = ["```", "**", "__", "*", "[", "]("].iter().any(|m| line.contains(m));
        is_heading(line)
            || len > self.config.content_line_min_chars
            || (has_markup && len > self.config.markup_line_min_chars)
    }

    /// Step 4: instruction echo at the start, bounded to the first lines.
    ///
    /// Activates only when the text opens with an instruction-like line. A
    /// single ambiguous line ends the scan and is kept; a run of two or more
    /// ambiguous lines is skipped only when content or another instruction
    /// line follows it inside the window.
    fn strip_leading_instructions(&self, text: &str, removed: &mut Vec<RemovedSection>) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let limit = lines.len().min(self.config.leading_scan_lines);
        let mut cut = 0;
        let mut seen_instruction = false;
        let mut ambiguous_run = 0;

        for (i, line) in lines.iter().enumerate().take(limit) {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if is_heading(trimmed) {
                if ambiguous_run >= 2 {
                    cut = i;
                }
                break;
            }
            if is_instruction_line(trimmed) {
                if ambiguous_run == 1 {
                    break;
                }
                seen_instruction = true;
                cut = i + 1;
                ambiguous_run = 0;
                continue;
            }
            if self.is_content_line(trimmed) {
                if ambiguous_run >= 2 {
                    cut = i;
                }
                break;
            }
            if !seen_instruction {
                break;
            }
            ambiguous_run += 1;
        }

        if cut == 0 || lines[cut..].iter().all(|l| l.trim().is_empty()) {
            return text.to_string();
        }
        removed.push(RemovedSection::from_lines(RemovalKind::LeadingInstructions, &lines[..cut]));
        lines[cut..].join("\n")
    }

    /// Step 5: cut through the last explicit content label preceding the first heading
    fn extract_after_label(&self, text: &str, removed: &mut Vec<RemovedSection>) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let mut label_at = None;
        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if is_heading(trimmed) {
                break;
            }
            if is_content_label(trimmed) {
                label_at = Some(i);
            }
        }
        match label_at {
            Some(i) if lines[i + 1..].iter().any(|l| !l.trim().is_empty()) => {
                removed.push(RemovedSection::from_lines(RemovalKind::ContentLabel, &lines[..=i]));
                lines[i + 1..].join("\n")
            }
            _ => text.to_string(),
        }
    }

    /// Whitespace trimming plus at most one known prefix line
    fn minimal_cleanup(&self, raw: &str, removed: &mut Vec<RemovedSection>) -> String {
        let trimmed = raw.trim();
        let mut lines = trimmed.lines();
        match lines.next() {
            Some(first) if is_prefix_line(first.trim()) || is_content_label(first.trim()) => {
                removed.push(RemovedSection::from_lines(RemovalKind::Prefix, &[first]));
                lines.collect::<Vec<_>>().join("\n").trim().to_string()
            }
            _ => trimmed.to_string(),
        }
    }
}
