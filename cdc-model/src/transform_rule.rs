use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A declarative filter applied by the Transformer's rule mode (spec
/// §4.6.2). An empty `database`/`table` pattern matches any value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformRule {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub rename: HashMap<String, String>,
    #[serde(default)]
    pub add_fields: HashMap<String, serde_json::Value>,
}

impl TransformRule {
    /// True when this rule's database/table patterns match the event's.
    pub fn matches(&self, database: &str, table: &str) -> bool {
        (self.database.is_empty() || self.database.eq_ignore_ascii_case(database))
            && (self.table.is_empty() || self.table.eq_ignore_ascii_case(table))
    }

    /// Load-time validation (spec §4.6.2): `include`/`exclude` mutually
    /// exclusive; every `rename` source key must be covered by a non-empty
    /// `include`.
    pub fn validate(&self) -> Result<()> {
        if !self.include.is_empty() && !self.exclude.is_empty() {
            return Err(Error::Config(format!(
                "transform rule for {}.{}: include and exclude are mutually exclusive",
                self.database, self.table
            )));
        }
        if !self.include.is_empty() {
            for source in self.rename.keys() {
                if !self
                    .include
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(source))
                {
                    return Err(Error::Config(format!(
                        "transform rule for {}.{}: rename source '{}' is not in include",
                        self.database, self.table, source
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Validate a full rule set: each rule individually, plus no structural
/// conflict with script mode (checked by the caller, which owns both
/// `script` and `rules` from the same config section).
pub fn validate_rules(rules: &[TransformRule]) -> Result<()> {
    for rule in rules {
        rule.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn include_and_exclude_conflict_rejected() {
        let rule = TransformRule {
            include: vec!["a".into()],
            exclude: vec!["b".into()],
            ..Default::default()
        };
        assert!(rule.validate().is_err());
    }

    #[test]
    fn rename_must_be_covered_by_include() {
        let rule = TransformRule {
            include: vec!["id".into()],
            rename: HashMap::from([("email".to_string(), "user_email".to_string())]),
            ..Default::default()
        };
        assert!(rule.validate().is_err());
    }

    #[test]
    fn empty_patterns_match_everything() {
        let rule = TransformRule::default();
        assert!(rule.matches("shop", "orders"));
        assert!(rule.matches("anything", "else"));
    }

    #[test]
    fn deserializes_from_json_shape() {
        let rule: TransformRule = serde_json::from_value(json!({
            "database": "shop",
            "table": "users",
            "exclude": ["password"],
            "rename": {"email": "user_email"},
            "add_fields": {"source": "mysql-cdc"}
        }))
        .unwrap();
        assert_eq!(rule.database, "shop");
        assert_eq!(rule.add_fields.get("source"), Some(&json!("mysql-cdc")));
    }
}
