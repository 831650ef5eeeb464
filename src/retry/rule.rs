use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RuleError;

/// A known-transient failure, recognised by matching its error text.
///
/// The pattern is compiled once when the rule is built, so an invalid
/// expression surfaces at configuration time rather than mid-run.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RuleSpec")]
pub struct TransientErrorRule {
    pattern: Regex,
    description: String,
}

/// Serialized form of a [`TransientErrorRule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    pub description: String,
}

impl TransientErrorRule {
    pub fn new(pattern: &str, description: impl Into<String>) -> Result<Self, RuleError> {
        let compiled = Regex::new(pattern).map_err(|source| RuleError {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            description: description.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }

    /// The rules the data-warehouse blueprint retries on: zonal capacity
    /// shortages and subnets that are still draining on teardown.
    pub fn blueprint_defaults() -> Vec<Self> {
        compile_specs(default_specs())
    }
}

impl TryFrom<RuleSpec> for TransientErrorRule {
    type Error = RuleError;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        Self::new(&spec.pattern, spec.description)
    }
}

impl From<&TransientErrorRule> for RuleSpec {
    fn from(rule: &TransientErrorRule) -> Self {
        Self {
            pattern: rule.pattern().to_string(),
            description: rule.description.clone(),
        }
    }
}

impl Serialize for TransientErrorRule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RuleSpec::from(self).serialize(serializer)
    }
}

impl PartialEq for TransientErrorRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern.as_str() == other.pattern.as_str() && self.description == other.description
    }
}

impl Eq for TransientErrorRule {}

impl fmt::Display for TransientErrorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (/{}/)", self.description, self.pattern)
    }
}

// Invalid specs are logged and left out of the rule set.
fn compile_specs(specs: Vec<RuleSpec>) -> Vec<TransientErrorRule> {
    specs
        .into_iter()
        .filter_map(|spec| match TransientErrorRule::try_from(spec) {
            Ok(rule) => Some(rule),
            Err(err) => {
                warn!("skipping built-in transient rule: {err}");
                None
            }
        })
        .collect()
}

fn default_specs() -> Vec<RuleSpec> {
    vec![
        RuleSpec {
            pattern: ".*does not have enough resources available to fulfill the request.  Try a different zone,.*".to_string(),
            description: "Compute zone resources currently unavailable.".to_string(),
        },
        RuleSpec {
            pattern: ".*Error 400: The subnetwork resource*".to_string(),
            description: "Subnet is eventually drained".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        let err = TransientErrorRule::new("[unclosed", "broken").unwrap_err();
        assert_eq!(err.pattern, "[unclosed");
        assert!(err.to_string().contains("invalid transient error pattern"));
    }

    #[test]
    fn matches_substring_anywhere_in_message() {
        let rule = TransientErrorRule::new("quota exceeded", "quota").unwrap();
        assert!(rule.is_match("googleapi: Error 429: quota exceeded for project"));
        assert!(!rule.is_match("googleapi: Error 403: permission denied"));
    }

    #[test]
    fn blueprint_defaults_all_compile() {
        let rules = TransientErrorRule::blueprint_defaults();
        assert_eq!(rules.len(), default_specs().len());
    }

    #[test]
    fn invalid_built_in_spec_is_skipped() {
        let rules = compile_specs(vec![
            RuleSpec {
                pattern: "Error 400: (unclosed".to_string(),
                description: "broken".to_string(),
            },
            RuleSpec {
                pattern: "quota exceeded".to_string(),
                description: "quota".to_string(),
            },
        ]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].description(), "quota");
    }

    #[test]
    fn blueprint_defaults_match_known_messages() {
        let rules = TransientErrorRule::blueprint_defaults();
        let zone = "Error: Error waiting for instance: The zone 'projects/p/zones/us-central1-a' \
                    does not have enough resources available to fulfill the request.  Try a different zone, \
                    or try again later.";
        let subnet = "Error: Error when reading or editing Subnetwork: googleapi: \
                      Error 400: The subnetwork resource 'projects/p/regions/r/subnetworks/s' is already being used";
        assert!(rules[0].is_match(zone));
        assert!(!rules[0].is_match(subnet));
        assert!(rules[1].is_match(subnet));
    }

    #[test]
    fn deserializes_and_compiles_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            rules: Vec<TransientErrorRule>,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
            [[rules]]
            pattern = "rate limit"
            description = "API throttling"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.rules[0].pattern(), "rate limit");
        assert_eq!(parsed.rules[0].description(), "API throttling");

        let invalid: Result<Wrapper, _> = toml::from_str(
            r#"
            [[rules]]
            pattern = "(unbalanced"
            description = "bad"
            "#,
        );
        assert!(invalid.is_err());
    }

    #[test]
    fn display_shows_description_and_pattern() {
        let rule = TransientErrorRule::new("quota exceeded", "quota").unwrap();
        assert_eq!(rule.to_string(), "quota (/quota exceeded/)");
    }
}
