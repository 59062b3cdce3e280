//! Guardrail configuration and enforcement.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::pii::{PiiEntity, PiiRedactor};
use crate::{Error, Result};

/// Message returned to the user when input is hard-blocked.
pub const BLOCKED_INPUT_MESSAGE: &str =
    "Your message contains content that violates our usage policy. Please rephrase your question.";

const MASK: &str = "****";

/// Guardrail configuration loaded from the `[guardrails]` TOML section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Run the checks at all. Disabled guardrails pass text through.
    pub enabled: bool,

    /// Toxicity score at or above which input is blocked.
    pub toxicity_threshold: f32,

    /// PII entity names to redact from output.
    pub pii_entities: Vec<String>,

    /// Topics the assistant is meant to discuss.
    pub valid_topics: Vec<String>,

    /// Topics that trigger redirect mode.
    pub invalid_topics: Vec<String>,

    /// Words and phrases counted as toxic.
    pub toxic_terms: Vec<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            toxicity_threshold: 0.5,
            pii_entities: strings(&[
                "EMAIL_ADDRESS",
                "PHONE_NUMBER",
                "US_SSN",
                "CREDIT_CARD",
                "IP_ADDRESS",
            ]),
            valid_topics: strings(&[
                "requirements management",
                "requirements engineering",
                "traceability",
                "Jama Software",
                "Jama Connect",
                "INCOSE",
                "EARS notation",
                "system requirements",
                "software requirements",
                "verification",
                "validation",
                "requirements analysis",
                "requirements specification",
                "requirements elicitation",
                "stakeholder requirements",
                "functional requirements",
                "non-functional requirements",
                "requirements review",
                "requirements baseline",
                "change management",
                "impact analysis",
            ]),
            invalid_topics: strings(&[
                "politics",
                "religion",
                "sports",
                "entertainment",
                "cooking",
                "travel",
                "fashion",
                "gaming",
                "cryptocurrency",
                "stock trading",
            ]),
            toxic_terms: strings(&[
                "idiot",
                "moron",
                "stupid",
                "dumbass",
                "loser",
                "worthless",
                "shut up",
                "hate you",
                "kill yourself",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Which side of the model a check runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Result of a guardrail check.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// False only for hard-blocked input.
    pub allowed: bool,
    /// False when input strays into an invalid topic.
    pub on_topic: bool,
    /// The text to use downstream, possibly sanitized.
    pub text: String,
    /// Human-readable notes on what was flagged.
    pub reasons: Vec<String>,
    pub pii_detected: bool,
    pub toxicity_detected: bool,
}

impl Verdict {
    fn pass(text: &str) -> Self {
        Self {
            allowed: true,
            on_topic: true,
            text: text.to_string(),
            reasons: Vec::new(),
            pii_detected: false,
            toxicity_detected: false,
        }
    }
}

/// Case-insensitive, whole-word matcher over a list of phrases.
#[derive(Debug, Clone)]
struct TermMatcher {
    regex: Option<Regex>,
}

impl TermMatcher {
    fn new(terms: &[String]) -> Result<Self> {
        let alternatives: Vec<String> = terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { regex: None });
        }
        let regex = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))?;
        Ok(Self { regex: Some(regex) })
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }

    /// Distinct terms present in `text`, lowercased.
    fn distinct_hits(&self, text: &str) -> BTreeSet<String> {
        match &self.regex {
            Some(r) => r.find_iter(text).map(|m| m.as_str().to_lowercase()).collect(),
            None => BTreeSet::new(),
        }
    }

    fn mask(&self, text: &str) -> String {
        match &self.regex {
            Some(r) => r.replace_all(text, MASK).into_owned(),
            None => text.to_string(),
        }
    }
}

/// Input and output content checks.
///
/// Built once at startup and shared by reference with request handlers.
#[derive(Debug, Clone)]
pub struct Guardrails {
    enabled: bool,
    toxicity_threshold: f32,
    valid_topics: TermMatcher,
    invalid_topics: TermMatcher,
    toxic_terms: TermMatcher,
    redactor: PiiRedactor,
}

impl Guardrails {
    /// Compile guardrails from configuration.
    pub fn new(config: &GuardrailConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.toxicity_threshold) {
            return Err(Error::Invalid(format!(
                "toxicity_threshold must be within 0..=1, got {}",
                config.toxicity_threshold
            )));
        }

        let entities = config
            .pii_entities
            .iter()
            .map(|name| name.parse::<PiiEntity>())
            .collect::<Result<Vec<_>>>()?;

        let guardrails = Self {
            enabled: config.enabled,
            toxicity_threshold: config.toxicity_threshold,
            valid_topics: TermMatcher::new(&config.valid_topics)?,
            invalid_topics: TermMatcher::new(&config.invalid_topics)?,
            toxic_terms: TermMatcher::new(&config.toxic_terms)?,
            redactor: PiiRedactor::new(entities)?,
        };

        info!(
            enabled = config.enabled,
            valid_topics = config.valid_topics.len(),
            invalid_topics = config.invalid_topics.len(),
            pii_entities = config.pii_entities.len(),
            "guardrails configured"
        );
        Ok(guardrails)
    }

    /// Guardrails that let everything through unchanged.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            toxicity_threshold: 1.0,
            valid_topics: TermMatcher { regex: None },
            invalid_topics: TermMatcher { regex: None },
            toxic_terms: TermMatcher { regex: None },
            redactor: PiiRedactor::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run the check for the given direction.
    pub fn check(&self, direction: Direction, text: &str) -> Verdict {
        match direction {
            Direction::Input => self.check_input(text),
            Direction::Output => self.check_output(text),
        }
    }

    /// Score in `0..1` that grows with each distinct toxic term present.
    pub fn toxicity_score(&self, text: &str) -> f32 {
        let hits = self.toxic_terms.distinct_hits(text).len();
        1.0 - 0.5_f32.powi(i32::try_from(hits).unwrap_or(i32::MAX))
    }

    /// Validate a user prompt.
    ///
    /// Toxic input is blocked outright. Off-topic input is allowed but
    /// flagged so the caller can switch to redirect mode.
    pub fn check_input(&self, text: &str) -> Verdict {
        let mut verdict = Verdict::pass(text);
        if !self.enabled {
            return verdict;
        }
        debug!(input_length = text.len(), "validating user input");

        let score = self.toxicity_score(text);
        if score > 0.0 && score >= self.toxicity_threshold {
            warn!("toxic content detected in user input");
            verdict.allowed = false;
            verdict.toxicity_detected = true;
            verdict.reasons.push(BLOCKED_INPUT_MESSAGE.to_string());
            return verdict;
        }

        if self.invalid_topics.is_match(text) && !self.valid_topics.is_match(text) {
            let preview: String = text.chars().take(100).collect();
            info!(input_preview = %preview, "off-topic input detected");
            verdict.on_topic = false;
            verdict
                .reasons
                .push("Content is not related to requirements management".to_string());
        }

        verdict
    }

    /// Sanitize a model response. Output is never blocked.
    pub fn check_output(&self, text: &str) -> Verdict {
        let mut verdict = Verdict::pass(text);
        if !self.enabled {
            return verdict;
        }
        debug!(output_length = text.len(), "validating model output");

        let (redacted, found) = self.redactor.redact(text);
        if !found.is_empty() {
            info!(entities = found.len(), "PII detected and redacted from output");
            verdict.pii_detected = true;
            verdict.reasons.push("PII detected and redacted".to_string());
        }

        let masked = self.toxic_terms.mask(&redacted);
        if masked != redacted {
            info!("toxic content sanitized from output");
            verdict.toxicity_detected = true;
            verdict
                .reasons
                .push("Toxic content detected and sanitized".to_string());
        }

        verdict.text = masked;
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guardrails() -> Guardrails {
        Guardrails::new(&GuardrailConfig::default()).unwrap()
    }

    #[test]
    fn on_topic_question_passes() {
        let verdict = guardrails().check_input("What is EARS notation?");
        assert!(verdict.allowed);
        assert!(verdict.on_topic);
        assert_eq!(verdict.text, "What is EARS notation?");
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn off_topic_question_is_flagged_not_blocked() {
        let verdict = guardrails().check_input("Who will win in sports this weekend?");
        assert!(verdict.allowed);
        assert!(!verdict.on_topic);
        assert_eq!(verdict.reasons.len(), 1);
    }

    #[test]
    fn valid_topic_wins_over_invalid_one() {
        let verdict =
            guardrails().check_input("How does traceability work for gaming software?");
        assert!(verdict.on_topic);
    }

    #[test]
    fn toxic_input_is_blocked() {
        let verdict = guardrails().check_input("You are an idiot");
        assert!(!verdict.allowed);
        assert!(verdict.toxicity_detected);
        assert_eq!(verdict.reasons, [BLOCKED_INPUT_MESSAGE]);
    }

    #[test]
    fn toxicity_score_grows_with_distinct_hits() {
        let g = guardrails();
        assert_eq!(g.toxicity_score("all good here"), 0.0);
        assert_eq!(g.toxicity_score("idiot idiot"), 0.5);
        assert_eq!(g.toxicity_score("idiot moron"), 0.75);
    }

    #[test]
    fn higher_threshold_tolerates_a_single_hit() {
        let config = GuardrailConfig {
            toxicity_threshold: 0.7,
            ..GuardrailConfig::default()
        };
        let g = Guardrails::new(&config).unwrap();
        assert!(g.check_input("that was stupid").allowed);
        assert!(!g.check_input("stupid idiot").allowed);
    }

    #[test]
    fn output_is_redacted_and_masked() {
        let verdict = guardrails().check_output("Mail me at a@b.com, you idiot.");
        assert!(verdict.allowed);
        assert!(verdict.pii_detected);
        assert!(verdict.toxicity_detected);
        assert_eq!(verdict.text, "Mail me at <EMAIL_ADDRESS>, you ****.");
        assert_eq!(verdict.reasons.len(), 2);
    }

    #[test]
    fn clean_output_is_untouched() {
        let verdict = guardrails().check(Direction::Output, "EARS is a notation.");
        assert_eq!(verdict, Verdict::pass("EARS is a notation."));
    }

    #[test]
    fn disabled_guardrails_pass_everything() {
        let g = Guardrails::disabled();
        assert!(!g.is_enabled());
        assert!(g.check_input("you idiot").allowed);
        assert_eq!(g.check_output("a@b.com").text, "a@b.com");
    }

    #[test]
    fn rejects_unknown_entity() {
        let config = GuardrailConfig {
            pii_entities: vec!["PASSPORT".into()],
            ..GuardrailConfig::default()
        };
        assert!(matches!(
            Guardrails::new(&config),
            Err(Error::UnknownEntity(e)) if e == "PASSPORT"
        ));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = GuardrailConfig {
            toxicity_threshold: 1.5,
            ..GuardrailConfig::default()
        };
        assert!(matches!(Guardrails::new(&config), Err(Error::Invalid(_))));
    }

    #[test]
    fn parses_toml_section() {
        let toml = r#"
enabled = true
toxicity_threshold = 0.9
pii_entities = ["US_SSN"]
invalid_topics = ["weather"]
"#;
        let config: GuardrailConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.pii_entities, ["US_SSN"]);
        assert!(!config.valid_topics.is_empty());

        let g = Guardrails::new(&config).unwrap();
        assert!(!g.check_input("what's the weather").on_topic);
    }
}
