use crate::compare::values_equal;
use crate::config::CategoricalRule;
use crate::model::Value;

/// Whether the A text contains the rule's marker, honouring case sensitivity.
/// An empty marker is always found.
pub fn marker_found(value_a: &Value, rule: &CategoricalRule) -> bool {
    let text = value_a.to_string();
    let text = text.trim();
    if rule.case_sensitive {
        text.contains(rule.contains.as_str())
    } else {
        text.to_lowercase().contains(&rule.contains.to_lowercase())
    }
}

/// The B value the rule expects for this A value.
pub fn expected_value<'r>(value_a: &Value, rule: &'r CategoricalRule) -> &'r Value {
    if marker_found(value_a, rule) {
        &rule.if_true
    } else {
        &rule.if_false
    }
}

/// True when the B value agrees with what the A text implies.
pub fn categorical_match(
    value_a: &Value,
    value_b: &Value,
    rule: &CategoricalRule,
    tolerance: f64,
) -> bool {
    values_equal(value_b, expected_value(value_a, rule), tolerance)
}

/// Human-readable rule text for reports.
pub fn describe(rule: &CategoricalRule) -> String {
    format!(
        "If '{}' in {}, then {} should be {}, else {}",
        rule.contains, rule.a, rule.b, rule.if_true, rule.if_false
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cooling_rule(case_sensitive: bool) -> CategoricalRule {
        CategoricalRule {
            a: "Cooling".into(),
            b: "HEAT".into(),
            contains: "Central Air".into(),
            if_true: Value::from(1.0),
            if_false: Value::from(0.0),
            case_sensitive,
        }
    }

    #[test]
    fn contains_marker_expects_true_value() {
        let rule = cooling_rule(false);
        let a = Value::from("Central Air and Heat Pump");
        assert_eq!(expected_value(&a, &rule), &Value::Number(1.0));
        assert!(categorical_match(&a, &Value::from(1.0), &rule, 0.01));
        assert!(!categorical_match(&a, &Value::from(0.0), &rule, 0.01));
    }

    #[test]
    fn case_insensitive_by_default() {
        let rule = cooling_rule(false);
        assert!(marker_found(&Value::from("  central air  "), &rule));
    }

    #[test]
    fn case_sensitive_requires_exact_case() {
        let rule = cooling_rule(true);
        assert!(!marker_found(&Value::from("central air"), &rule));
        assert!(marker_found(&Value::from("Has Central Air"), &rule));
    }

    #[test]
    fn missing_marker_expects_false_value() {
        let rule = cooling_rule(false);
        let a = Value::from("Window Unit(s)");
        assert_eq!(expected_value(&a, &rule), &Value::Number(0.0));
        assert!(categorical_match(&a, &Value::from("0"), &rule, 0.01));
    }

    #[test]
    fn empty_marker_always_found() {
        let mut rule = cooling_rule(true);
        rule.contains = String::new();
        assert!(marker_found(&Value::from("anything"), &rule));
        assert!(marker_found(&Value::Null, &rule));
    }

    #[test]
    fn text_expectations_compare_as_text() {
        let rule = CategoricalRule {
            a: "Basement".into(),
            b: "BSMT".into(),
            contains: "finished".into(),
            if_true: Value::from("Y"),
            if_false: Value::from("N"),
            case_sensitive: false,
        };
        let a = Value::from("Full, Finished");
        assert!(categorical_match(&a, &Value::from(" y "), &rule, 0.01));
        assert!(!categorical_match(&a, &Value::from("N"), &rule, 0.01));
    }

    #[test]
    fn description_text() {
        assert_eq!(
            describe(&cooling_rule(false)),
            "If 'Central Air' in Cooling, then HEAT should be 1, else 0"
        );
    }
}
