//! Ordered pattern rules (first tier)
//!
//! Rules are evaluated strictly in declaration order and the first match
//! wins. Narrow rules must therefore be declared before broad ones that can
//! match the same message: a message mentioning both a CIP vote and a CIP
//! discussion resolves to `cip-vote` because the vote rule comes first.
//!
//! Confidences are fixed per rule and returned verbatim; they are not
//! derived from match strength.

use crate::config::{MatcherSpec, RuleSpec};
use aho_corasick::AhoCorasick;
use govstage_core::{Error, Result, StageId};
use regex::{Regex, RegexBuilder};

/// Compiled detection pattern
#[derive(Debug, Clone)]
pub enum PatternMatcher {
    /// Case-insensitive regular expression
    Regex(Regex),
    /// Case-insensitive literal phrases
    Keywords(AhoCorasick),
}

impl PatternMatcher {
    /// Compile a regular expression
    pub fn regex(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| Error::rule(format!("invalid pattern '{}': {}", pattern, e)))?;
        Ok(Self::Regex(regex))
    }

    /// Build a literal phrase matcher; phrases only match as whole words
    pub fn keywords<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Err(Error::rule("keyword rule needs at least one non-empty keyword"));
        }

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&keywords)
            .map_err(|e| Error::rule(format!("failed to build keyword matcher: {}", e)))?;
        Ok(Self::Keywords(matcher))
    }

    /// Whether the normalized text matches
    pub fn is_match(&self, normalized: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(normalized),
            Self::Keywords(matcher) => matcher
                .find_overlapping_iter(normalized)
                .any(|m| on_word_boundary(normalized, m.start(), m.end())),
        }
    }
}

fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word) && !after.is_some_and(is_word)
}

/// A pattern bound to a stage and a fixed confidence
#[derive(Debug, Clone)]
pub struct PatternRule {
    name: String,
    matcher: PatternMatcher,
    stage: StageId,
    confidence: f32,
}

impl PatternRule {
    /// Create a rule, validating the confidence
    pub fn new(
        name: impl Into<String>,
        matcher: PatternMatcher,
        stage: StageId,
        confidence: f32,
    ) -> Result<Self> {
        let name = name.into();
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(Error::rule(format!(
                "rule '{}' confidence {} is outside (0, 1]",
                name, confidence
            )));
        }

        Ok(Self {
            name,
            matcher,
            stage,
            confidence,
        })
    }

    /// Compile a configured rule; unnamed rules are named by position
    pub fn from_spec(spec: &RuleSpec, index: usize) -> Result<Self> {
        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("rule-{}-{}", index, spec.stage));

        let matcher = match &spec.matcher {
            MatcherSpec::Pattern { pattern } => PatternMatcher::regex(pattern),
            MatcherSpec::Keywords { keywords } => PatternMatcher::keywords(keywords),
        }
        .map_err(|e| Error::rule(format!("rule '{}': {}", name, e)))?;

        Self::new(name, matcher, spec.stage, spec.confidence)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Outcome of a rule hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatch<'a> {
    /// Stage of the matching rule
    pub stage: StageId,

    /// The rule's fixed confidence
    pub confidence: f32,

    /// Position of the matching rule in the list
    pub rule_index: usize,

    /// Name of the matching rule, for diagnostics
    pub rule_name: &'a str,
}

/// Ordered rule list; first match wins
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<PatternRule>,
}

impl RuleMatcher {
    /// Create a matcher that keeps the given order
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Compile configured rule specs in order
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        let rules = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| PatternRule::from_spec(spec, index))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(rules))
    }

    /// Return the stage and confidence of the first matching rule
    pub fn match_text(&self, text: &str) -> Option<RuleMatch<'_>> {
        let normalized = text.to_lowercase();

        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matcher.is_match(&normalized))
            .map(|(rule_index, rule)| RuleMatch {
                stage: rule.stage,
                confidence: rule.confidence,
                rule_index,
                rule_name: &rule.name,
            })
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self::from_specs(&default_rule_specs()).expect("built-in stage rules compile")
    }
}

/// Canonical built-in rule set, most specific first
pub fn default_rule_specs() -> Vec<RuleSpec> {
    vec![
        RuleSpec::pattern(
            "cip-vote",
            StageId::CipVote,
            0.95,
            r"\bcip[\s-]*\d*\b.*\bvot(e|es|ing)\b|\bvot(e|es|ing)\b.*\bcip\b|\bvote\s+proposal\b|\bvoting\s+(is\s+)?(now\s+)?open\b|\bcast\s+your\s+votes?\b",
        ),
        RuleSpec::pattern(
            "cip-announce",
            StageId::CipAnnounce,
            0.90,
            r"\bcip[\s-]*\d+\b.*\b(approved|accepted|ratified|finali[sz]ed|passed|announc\w*)\b|\bannounc\w*\b.*\bcip\b",
        ),
        RuleSpec::pattern(
            "tokenomics-announce",
            StageId::TokenomicsAnnounce,
            0.90,
            r"\b(tokenomics|rewards?|fees?|minting)\b.*\b(announc\w*|takes?\s+effect|effective\s+(from|on|as\s+of))\b|\bannounc\w*\b.*\b(tokenomics|rewards?|fees?)\b",
        ),
        RuleSpec::pattern(
            "sv-announce",
            StageId::SvAnnounce,
            0.85,
            r"\b(svs?|super[\s-]?validators?)\b.*\b(announc\w*|onboard\w*|joined|welcome)\b|\b(announc\w*|welcome)\b.*\b(svs?|super[\s-]?validators?)\b",
        ),
        RuleSpec::keywords(
            "tokenomics",
            StageId::Tokenomics,
            0.80,
            &[
                "tokenomics",
                "reward rate",
                "burn rate",
                "minting curve",
                "fee schedule",
                "traffic fees",
                "canton coin",
                "emission",
            ],
        ),
        RuleSpec::pattern(
            "cip-discuss",
            StageId::CipDiscuss,
            0.75,
            r"\bcip[\s-]*\d+\b|\bcips?\s+discuss\w*|\bimprovement\s+proposals?\b",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, pattern: &str, stage: StageId, confidence: f32) -> PatternRule {
        PatternRule::new(name, PatternMatcher::regex(pattern).unwrap(), stage, confidence).unwrap()
    }

    #[test]
    fn test_vote_proposal_hits_vote_rule() {
        let matcher = RuleMatcher::default();

        let hit = matcher.match_text("CIP Vote Proposal").unwrap();
        assert_eq!(hit.stage, StageId::CipVote);
        assert_eq!(hit.confidence, 0.95);
        assert_eq!(hit.rule_index, 0);
        assert_eq!(hit.rule_name, "cip-vote");
    }

    #[test]
    fn test_vote_precedes_discussion() {
        let matcher = RuleMatcher::default();

        let hit = matcher
            .match_text("Discussion thread for CIP-42, voting is now open")
            .unwrap();
        assert_eq!(hit.stage, StageId::CipVote);
    }

    #[test]
    fn test_builtin_stages() {
        let matcher = RuleMatcher::default();

        let cases = [
            ("CIP-0057 has been approved by the SVs", StageId::CipAnnounce),
            ("Announcing a new reward schedule for validators", StageId::TokenomicsAnnounce),
            ("Please welcome our newest super validator", StageId::SvAnnounce),
            ("Thoughts on the current burn rate?", StageId::Tokenomics),
            ("Draft of CIP-0071 for feedback", StageId::CipDiscuss),
        ];

        for (text, expected) in cases {
            let hit = matcher.match_text(text);
            assert_eq!(hit.map(|h| h.stage), Some(expected), "text: {}", text);
        }
    }

    #[test]
    fn test_no_match() {
        let matcher = RuleMatcher::default();
        assert!(matcher.match_text("Lunch is at noon today").is_none());
        assert!(matcher.match_text("").is_none());
        assert!(matcher.match_text("recipe for cake").is_none());
    }

    #[test]
    fn test_case_insensitive() {
        let matcher = RuleMatcher::new(vec![rule("upper", "Vote", StageId::CipVote, 0.9)]);
        assert!(matcher.match_text("VOTE now").is_some());
        assert!(matcher.match_text("vote now").is_some());
    }

    #[test]
    fn test_first_declared_rule_wins() {
        let broad_first = RuleMatcher::new(vec![
            rule("broad", "cip", StageId::CipDiscuss, 0.5),
            rule("narrow", "cip vote", StageId::CipVote, 0.99),
        ]);
        let hit = broad_first.match_text("cip vote").unwrap();
        assert_eq!(hit.stage, StageId::CipDiscuss);
        assert_eq!(hit.confidence, 0.5);

        let narrow_first = RuleMatcher::new(vec![
            rule("narrow", "cip vote", StageId::CipVote, 0.99),
            rule("broad", "cip", StageId::CipDiscuss, 0.5),
        ]);
        let hit = narrow_first.match_text("cip vote").unwrap();
        assert_eq!(hit.stage, StageId::CipVote);
        assert_eq!(hit.rule_index, 0);
    }

    #[test]
    fn test_keyword_rule() {
        let matcher = RuleMatcher::new(vec![PatternRule::new(
            "kw",
            PatternMatcher::keywords(["Reward Rate", "  "]).unwrap(),
            StageId::Tokenomics,
            0.8,
        )
        .unwrap()]);

        assert!(matcher.match_text("the REWARD RATE changed").is_some());
        assert!(matcher.match_text("nothing here").is_none());
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let matcher = RuleMatcher::default();

        let hit = matcher.match_text("Patient is in remission");
        assert!(hit.is_none(), "unexpected hit: {:?}", hit);
        assert!(matcher.match_text("Reburn rates are up").is_none());

        let hit = matcher.match_text("Emission schedule for next year").unwrap();
        assert_eq!(hit.stage, StageId::Tokenomics);
        let hit = matcher.match_text("remission, then emission.").unwrap();
        assert_eq!(hit.stage, StageId::Tokenomics);
        assert!(matcher.match_text("(canton coin)").is_some());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        assert!(PatternMatcher::regex("(unclosed").is_err());
        assert!(PatternMatcher::keywords(Vec::<String>::new()).is_err());

        let matcher = PatternMatcher::regex("x").unwrap();
        assert!(PatternRule::new("zero", matcher.clone(), StageId::Other, 0.0).is_err());
        assert!(PatternRule::new("big", matcher.clone(), StageId::Other, 1.01).is_err());
        assert!(PatternRule::new("nan", matcher.clone(), StageId::Other, f32::NAN).is_err());
        assert!(PatternRule::new("one", matcher, StageId::Other, 1.0).is_ok());
    }

    #[test]
    fn test_unnamed_spec_gets_positional_name() {
        let spec = RuleSpec {
            name: None,
            stage: StageId::SvAnnounce,
            confidence: 0.7,
            matcher: MatcherSpec::Pattern {
                pattern: "sv".to_string(),
            },
        };
        let rule = PatternRule::from_spec(&spec, 3).unwrap();
        assert_eq!(rule.name(), "rule-3-sv-announce");
    }
}
