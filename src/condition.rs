//! Rule conditions as seen by the merge queue
//!
//! Conditions are produced by an external evaluator. The queue only needs
//! each condition's attribute name and a way to test it against a single
//! check name, which [`CheckSubject`] provides.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Attribute prefixes that denote CI checks
const CHECK_PREFIXES: [&str; 2] = ["check-", "status-"];

/// The single attribute a condition is tested against when matching a check
#[derive(Debug, Clone, Copy)]
pub struct CheckSubject<'a> {
    /// Attribute name (the condition's own attribute)
    pub attribute: &'a str,
    /// Check name to test
    pub name: &'a str,
}

impl<'a> CheckSubject<'a> {
    /// Build a subject exposing `name` under `attribute`
    pub const fn new(attribute: &'a str, name: &'a str) -> Self {
        Self { attribute, name }
    }
}

/// A policy rule predicate
pub trait Condition: fmt::Display + fmt::Debug + Send + Sync {
    /// Attribute the condition tests (e.g. `check-success`, `label`)
    fn attribute_name(&self) -> &str;

    /// Test the condition against a single-attribute subject
    fn evaluate(&self, subject: &CheckSubject<'_>) -> bool;

    /// Whether the condition is about a CI check or commit status
    fn is_check_related(&self) -> bool {
        let attribute = self.attribute_name();
        CHECK_PREFIXES.iter().any(|p| attribute.starts_with(p))
    }
}

/// Shared handle on a condition
pub type ConditionRef = Arc<dyn Condition>;

/// Comparison operator of a [`RuleCondition`]
#[derive(Debug, Clone)]
enum Operator {
    Eq(String),
    Ne(String),
    Matches(Regex),
    /// Bare attribute: true when the attribute has a non-empty value
    Present,
}

/// Condition written as `attribute<op>value`
///
/// Supported forms: `attr=value`, `attr!=value`, `attr~=regex` and a bare
/// `attr`.
#[derive(Debug, Clone)]
pub struct RuleCondition {
    source: String,
    attribute: String,
    operator: Operator,
}

impl RuleCondition {
    /// Parse a condition from its textual form
    pub fn parse(text: &str) -> Result<Self> {
        let source = text.trim().to_string();
        if source.is_empty() {
            return Err(Error::Config("empty condition".to_string()));
        }

        let (attribute, operator) = if let Some((attr, value)) = source.split_once("~=") {
            let regex = Regex::new(value.trim())
                .map_err(|e| Error::Config(format!("invalid regex in `{source}`: {e}")))?;
            (attr, Operator::Matches(regex))
        } else if let Some((attr, value)) = source.split_once("!=") {
            (attr, Operator::Ne(value.trim().to_string()))
        } else if let Some((attr, value)) = source.split_once('=') {
            (attr, Operator::Eq(value.trim().to_string()))
        } else {
            (source.as_str(), Operator::Present)
        };

        let attribute = attribute.trim().to_string();
        if attribute.is_empty() {
            return Err(Error::Config(format!("missing attribute in `{source}`")));
        }

        Ok(Self {
            source,
            attribute,
            operator,
        })
    }

    /// Condition required by branch protection for a status check
    pub fn check_success(name: &str) -> Self {
        Self {
            source: format!("check-success={name}"),
            attribute: "check-success".to_string(),
            operator: Operator::Eq(name.to_string()),
        }
    }
}

impl fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Condition for RuleCondition {
    fn attribute_name(&self) -> &str {
        &self.attribute
    }

    fn evaluate(&self, subject: &CheckSubject<'_>) -> bool {
        if subject.attribute != self.attribute {
            return false;
        }
        match &self.operator {
            Operator::Eq(value) => subject.name == value,
            Operator::Ne(value) => subject.name != value,
            Operator::Matches(regex) => regex.is_match(subject.name),
            Operator::Present => !subject.name.is_empty(),
        }
    }
}

/// Conditions branch protection requires for the given status checks
pub fn required_check_conditions(names: &[String]) -> Vec<ConditionRef> {
    names
        .iter()
        .map(|name| Arc::new(RuleCondition::check_success(name)) as ConditionRef)
        .collect()
}

/// A rule after evaluation against a pull request
#[derive(Debug, Clone, Default)]
pub struct EvaluatedRule {
    /// Rule name
    pub name: String,
    /// Every condition of the rule
    pub conditions: Vec<ConditionRef>,
    /// Conditions the pull request currently fails
    pub missing_conditions: Vec<ConditionRef>,
}

impl EvaluatedRule {
    /// Build an evaluated rule from textual conditions
    ///
    /// Every entry of `missing` must also appear in `conditions`.
    pub fn parse(name: &str, conditions: &[&str], missing: &[&str]) -> Result<Self> {
        let conditions = conditions
            .iter()
            .map(|c| RuleCondition::parse(c).map(|c| Arc::new(c) as ConditionRef))
            .collect::<Result<Vec<_>>>()?;

        let missing_conditions = missing
            .iter()
            .map(|m| {
                conditions
                    .iter()
                    .find(|c| c.to_string() == m.trim())
                    .cloned()
                    .ok_or_else(|| {
                        Error::Config(format!("missing condition `{m}` is not part of rule {name}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            conditions,
            missing_conditions,
        })
    }

    /// Whether a condition is currently unsatisfied
    pub fn is_missing(&self, condition: &dyn Condition) -> bool {
        let text = condition.to_string();
        self.missing_conditions
            .iter()
            .any(|m| m.to_string() == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operators() {
        let eq = RuleCondition::parse("check-success=ci/build").unwrap();
        assert_eq!(eq.attribute_name(), "check-success");
        assert!(eq.evaluate(&CheckSubject::new("check-success", "ci/build")));
        assert!(!eq.evaluate(&CheckSubject::new("check-success", "ci/lint")));

        let ne = RuleCondition::parse("label!=wip").unwrap();
        assert!(ne.evaluate(&CheckSubject::new("label", "ready")));
        assert!(!ne.evaluate(&CheckSubject::new("label", "wip")));

        let re = RuleCondition::parse("status-success~=^ci/").unwrap();
        assert!(re.evaluate(&CheckSubject::new("status-success", "ci/test")));
        assert!(!re.evaluate(&CheckSubject::new("status-success", "lint")));
    }

    #[test]
    fn test_subject_with_other_attribute_never_matches() {
        let cond = RuleCondition::parse("check-success=ci").unwrap();
        assert!(!cond.evaluate(&CheckSubject::new("check-failure", "ci")));
    }

    #[test]
    fn test_check_related_prefixes() {
        assert!(RuleCondition::parse("check-success=ci").unwrap().is_check_related());
        assert!(RuleCondition::parse("status-failure=ci").unwrap().is_check_related());
        assert!(!RuleCondition::parse("label=ready").unwrap().is_check_related());
        assert!(!RuleCondition::parse("approved-reviews-by=alice").unwrap().is_check_related());
    }

    #[test]
    fn test_display_keeps_source() {
        let cond = RuleCondition::parse("  base=main ").unwrap();
        assert_eq!(cond.to_string(), "base=main");
        assert_eq!(RuleCondition::check_success("ci").to_string(), "check-success=ci");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(matches!(RuleCondition::parse(""), Err(Error::Config(_))));
        assert!(matches!(RuleCondition::parse("=x"), Err(Error::Config(_))));
        assert!(matches!(RuleCondition::parse("check~=("), Err(Error::Config(_))));
    }

    #[test]
    fn test_evaluated_rule_missing_must_belong_to_rule() {
        let rule = EvaluatedRule::parse("r", &["label=ready"], &["label=ready"]).unwrap();
        assert!(rule.is_missing(rule.conditions[0].as_ref()));
        assert!(EvaluatedRule::parse("r", &["label=ready"], &["base=main"]).is_err());
    }
}
