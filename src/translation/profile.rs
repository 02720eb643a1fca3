/*!
 * Model capability profiles.
 *
 * Backend models fall into three behavioral groups that need different prompt
 * shapes and retry budgets. The (provider, model) to profile lookup is a
 * declarative, ordered rule table: the first matching rule wins and unmatched
 * models are treated as general chat models. The table is built once and
 * shared read-only between jobs.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Behavioral classification of a backend model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileKind {
    /// Models that narrate their reasoning before answering
    Reasoning,
    /// Purpose-built translation models that degrade under long instructions
    DirectTranslation,
    /// General instruction-following models
    Chat,
}

impl ProfileKind {
    /// Retries allowed after the first invocation
    pub fn retry_budget(&self) -> usize {
        match self {
            Self::Reasoning => 1,
            Self::DirectTranslation => 1,
            Self::Chat => 2,
        }
    }

    pub fn template(&self) -> TemplateId {
        match self {
            Self::Reasoning => TemplateId::ReasoningStrict,
            Self::DirectTranslation => TemplateId::DirectMinimal,
            Self::Chat => TemplateId::ChatDelimited,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::DirectTranslation => "direct-translation",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompt template identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateId {
    /// Strict output-only framing that suppresses exploratory narration
    ReasoningStrict,
    /// One-line instruction followed by the document
    DirectMinimal,
    /// Instructions and document bracketed by explicit delimiter markers
    ChatDelimited,
}

/// Resolved profile of one (provider, model) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub kind: ProfileKind,
    pub retry_budget: usize,
    pub template: TemplateId,
}

impl ModelProfile {
    pub fn of(kind: ProfileKind) -> Self {
        Self {
            kind,
            retry_budget: kind.retry_budget(),
            template: kind.template(),
        }
    }

    /// Total invocations a job with this profile may perform
    pub fn max_invocations(&self) -> usize {
        self.retry_budget + 1
    }
}

/// How a rule matches the model name (case-insensitive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelMatch {
    /// Whole model name
    Exact(String),
    /// One token of the model name split on `-`, `_`, `:`, `/`, `.` and spaces
    Token(String),
    /// Substring of the model name
    Contains(String),
    /// Every model
    Any,
}

impl ModelMatch {
    fn matches(&self, model: &str) -> bool {
        match self {
            Self::Exact(name) => model == name.to_lowercase(),
            Self::Token(token) => {
                let token = token.to_lowercase();
                model
                    .split(|c: char| matches!(c, '-' | '_' | ':' | '/' | '.') || c.is_whitespace())
                    .any(|t| t == token)
            }
            Self::Contains(fragment) => model.contains(&fragment.to_lowercase()),
            Self::Any => true,
        }
    }
}

/// One entry of the capability table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRule {
    /// Restrict the rule to one provider type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub model: ModelMatch,
    pub profile: ProfileKind,
}

impl CapabilityRule {
    pub fn new(provider: Option<&str>, model: ModelMatch, profile: ProfileKind) -> Self {
        Self {
            provider: provider.map(str::to_string),
            model,
            profile,
        }
    }

    fn matches(&self, provider: &str, model: &str) -> bool {
        self.provider
            .as_ref()
            .is_none_or(|p| p.eq_ignore_ascii_case(provider))
            && self.model.matches(model)
    }
}

/// Ordered (provider, model) to profile lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    rules: Vec<CapabilityRule>,
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CapabilityTable {
    /// Table without any rule; every model classifies as chat
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Built-in classification of known model families
    pub fn builtin() -> Self {
        use ModelMatch::*;
        use ProfileKind::*;

        let rules = vec![
            CapabilityRule::new(Some("mimo"), Any, DirectTranslation),
            CapabilityRule::new(None, Contains("qwq".into()), Reasoning),
            CapabilityRule::new(None, Contains("qwen".into()), Chat),
            CapabilityRule::new(None, Contains("reason".into()), Reasoning),
            CapabilityRule::new(None, Token("r1".into()), Reasoning),
            CapabilityRule::new(None, Token("o1".into()), Reasoning),
            CapabilityRule::new(None, Token("o3".into()), Reasoning),
            CapabilityRule::new(None, Contains("opus-mt".into()), DirectTranslation),
            CapabilityRule::new(None, Contains("nmt".into()), DirectTranslation),
            CapabilityRule::new(None, Contains("translate".into()), DirectTranslation),
        ];
        Self { rules }
    }

    /// Prepend rules so they take precedence over the existing ones
    pub fn with_rules(mut self, rules: Vec<CapabilityRule>) -> Self {
        let mut combined = rules;
        combined.append(&mut self.rules);
        self.rules = combined;
        self
    }

    pub fn rules(&self) -> &[CapabilityRule] {
        &self.rules
    }

    /// Profile for a provider type and model name
    pub fn classify(&self, provider: &str, model: &str) -> ModelProfile {
        let model = model.trim().to_lowercase();
        let kind = self
            .rules
            .iter()
            .find(|rule| rule.matches(provider, &model))
            .map(|rule| rule.profile)
            .unwrap_or(ProfileKind::Chat);
        ModelProfile::of(kind)
    }
}
