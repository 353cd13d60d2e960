//! The Transformer (spec §4.6): disabled pass-through, declarative rule
//! rewriting, or an embedded ECMAScript script — selected once at
//! pipeline startup and exclusive of one another.

mod rule;
mod script;

pub use script::ScriptTransformer;

use cdc_model::{ChangeEvent, EventSink, Result, TransformRule};
use std::sync::Arc;

pub enum Transformer {
    Disabled,
    Rule(Vec<TransformRule>),
    Script(ScriptTransformer),
}

impl Transformer {
    pub fn disabled() -> Self {
        Transformer::Disabled
    }

    pub fn rule_based(rules: Vec<TransformRule>) -> Result<Self> {
        cdc_model::transform_rule::validate_rules(&rules)?;
        Ok(Transformer::Rule(rules))
    }

    pub async fn scripted(source: String, sink: Option<Arc<dyn EventSink>>) -> Result<Self> {
        Ok(Transformer::Script(ScriptTransformer::load(source, sink).await?))
    }

    /// Apply this transformer to one event. `Ok(None)` means the event is
    /// dropped (script rejection, spec §4.6.3 step 5); this is NOT an
    /// error case (spec §7 "Event rejection").
    pub async fn transform(&self, event: ChangeEvent) -> Result<Option<ChangeEvent>> {
        match self {
            Transformer::Disabled => Ok(Some(event)),
            Transformer::Rule(rules) => Ok(Some(rule::apply(rules, event))),
            Transformer::Script(script) => script.transform(&event).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_model::{ColumnValue, Row};

    fn sample_event() -> ChangeEvent {
        let mut row = Row::new();
        row.insert("id", ColumnValue::Int(1));
        ChangeEvent::insert("shop", "orders", 1, vec![row])
    }

    #[tokio::test]
    async fn disabled_mode_is_identity() {
        let transformer = Transformer::disabled();
        let event = transformer.transform(sample_event()).await.unwrap().unwrap();
        assert_eq!(event.rows[0].get_ci("id"), Some(&ColumnValue::Int(1)));
    }

    #[tokio::test]
    async fn rule_mode_applies_first_match() {
        let rules = vec![TransformRule {
            database: "shop".into(),
            table: "orders".into(),
            add_fields: std::collections::HashMap::from([(
                "source".to_string(),
                serde_json::json!("mysql-cdc"),
            )]),
            ..Default::default()
        }];
        let transformer = Transformer::rule_based(rules).unwrap();
        let event = transformer.transform(sample_event()).await.unwrap().unwrap();
        assert_eq!(
            event.rows[0].get_ci("source"),
            Some(&ColumnValue::Json(serde_json::json!("mysql-cdc")))
        );
    }
}
