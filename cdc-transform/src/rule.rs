use cdc_model::{ChangeEvent, ColumnValue, Row, TransformRule};

/// Apply the first matching rule to every row of `event` (spec §4.6.2).
/// No match leaves the event untouched, which makes rule mode a strict
/// superset of disabled mode for events nothing targets.
pub fn apply(rules: &[TransformRule], mut event: ChangeEvent) -> ChangeEvent {
    let rule = match rules.iter().find(|r| r.matches(&event.database, &event.table)) {
        Some(rule) => rule,
        None => return event,
    };

    event.rows = event.rows.iter().map(|row| apply_to_row(rule, row)).collect();
    event.old_rows = event
        .old_rows
        .iter()
        .map(|row| apply_to_row(rule, row))
        .collect();
    event
}

fn apply_to_row(rule: &TransformRule, row: &Row) -> Row {
    let mut out = Row::with_capacity(row.len() + rule.add_fields.len());

    // Static fields first so a same-named input field overwrites them
    // (spec §4.6.2 step 3).
    for (key, value) in &rule.add_fields {
        out.insert(key.clone(), ColumnValue::Json(value.clone()));
    }

    for (key, value) in row.iter() {
        if !rule.exclude.is_empty() && rule.exclude.iter().any(|e| e.eq_ignore_ascii_case(key)) {
            continue;
        }
        if !rule.include.is_empty() && !rule.include.iter().any(|i| i.eq_ignore_ascii_case(key)) {
            continue;
        }
        let output_key = rule
            .rename
            .iter()
            .find(|(source, _)| source.eq_ignore_ascii_case(key))
            .map(|(_, target)| target.clone())
            .unwrap_or_else(|| key.to_string());
        out.insert(output_key, value.clone());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_model::ChangeType;
    use std::collections::HashMap;

    fn sample_event() -> ChangeEvent {
        let mut row = Row::new();
        row.insert("id", ColumnValue::Int(7));
        row.insert("email", ColumnValue::Text("a@b".into()));
        row.insert("password", ColumnValue::Text("x".into()));
        ChangeEvent::insert("shop", "users", 100, vec![row])
    }

    #[test]
    fn rule_excludes_renames_and_adds_fields() {
        let rule = TransformRule {
            database: "shop".into(),
            table: "users".into(),
            exclude: vec!["password".into()],
            rename: HashMap::from([("email".to_string(), "user_email".to_string())]),
            add_fields: HashMap::from([("source".to_string(), serde_json::json!("mysql-cdc"))]),
            ..Default::default()
        };
        let event = apply(&[rule], sample_event());
        let row = &event.rows[0];
        assert!(row.get_ci("password").is_none());
        assert_eq!(row.get_ci("user_email"), Some(&ColumnValue::Text("a@b".into())));
        assert_eq!(row.get_ci("source"), Some(&ColumnValue::Json(serde_json::json!("mysql-cdc"))));
        assert_eq!(event.change_type, ChangeType::Insert);
    }

    #[test]
    fn no_matching_rule_leaves_event_untouched() {
        let rule = TransformRule {
            database: "other".into(),
            table: "table".into(),
            ..Default::default()
        };
        let event = apply(&[rule], sample_event());
        assert_eq!(event.rows[0].len(), 3);
    }
}
