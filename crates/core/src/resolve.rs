//! Prior-output resolvers.
//!
//! Downstream nodes may leave settings (amount, chain) unset and inherit
//! them from upstream outputs. The lookup is deliberately narrow: a
//! fixed field-name list and at most one level of recursion into a
//! nested `output` object, never general field scanning.

use serde_json::Value;

use crate::context::PriorOutput;

/// Field names accepted as a numeric amount, in priority order.
pub const NUMERIC_FIELDS: [&str; 6] = ["amount", "value", "balance", "price", "total", "count"];

fn as_numeric_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<f64>().ok().map(|_| trimmed.to_string())
        }
        _ => None,
    }
}

fn amount_from_output(output: &Value) -> Option<String> {
    if let Some(v) = output.get("amountReceived").and_then(as_numeric_string) {
        return Some(v);
    }
    if let Some(v) = output
        .get("output")
        .and_then(|o| o.get("amountReceived"))
        .and_then(as_numeric_string)
    {
        return Some(v);
    }
    for field in NUMERIC_FIELDS {
        if let Some(v) = output.get(field).and_then(as_numeric_string) {
            return Some(v);
        }
    }
    for field in NUMERIC_FIELDS {
        if let Some(v) = output
            .get("output")
            .and_then(|o| o.get(field))
            .and_then(as_numeric_string)
        {
            return Some(v);
        }
    }
    None
}

/// Resolve an amount: an explicit config value wins; otherwise prior
/// outputs are scanned most-recent first, preferring `amountReceived`
/// (top level, then nested under `output`) over the fixed numeric field
/// names. Returns `None` when nothing resolves.
pub fn resolve_amount(explicit: Option<&str>, prior: &[PriorOutput]) -> Option<String> {
    if let Some(amount) = explicit {
        let trimmed = amount.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    prior.iter().rev().find_map(|p| amount_from_output(&p.output))
}

fn project(value: &Value, recurse: bool) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Object(map) => {
            for field in NUMERIC_FIELDS {
                if let Some(v) = map.get(field).and_then(|v| project(v, false)) {
                    return Some(v);
                }
            }
            if recurse {
                // one level only
                map.get("output").and_then(|o| project(o, false))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Numeric projection of a node output, used for condition operands.
/// Numbers and numeric strings project directly; objects are checked
/// against the fixed field names and then once against their nested
/// `output`; anything else projects to zero.
pub fn numeric_projection(value: &Value) -> f64 {
    project(value, true).unwrap_or(0.0)
}

/// The chain context carried by the most recent prior output, if any.
pub fn inherit_chain(prior: &[PriorOutput]) -> Option<String> {
    prior.iter().rev().find_map(|p| {
        let top = p.output.get("chain").and_then(Value::as_str);
        let nested = p
            .output
            .get("output")
            .and_then(|o| o.get("chain"))
            .and_then(Value::as_str);
        top.or(nested).map(String::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;
    use serde_json::json;

    fn prior(node_id: &str, output: Value) -> PriorOutput {
        PriorOutput {
            node_id: NodeId::new(node_id),
            target_handle: None,
            output,
        }
    }

    #[test]
    fn explicit_amount_wins() {
        let outputs = vec![prior("swap", json!({"amountReceived": "9"}))];
        assert_eq!(
            resolve_amount(Some("1.0"), &outputs),
            Some("1.0".to_string())
        );
    }

    #[test]
    fn amount_received_preferred_over_named_fields() {
        let outputs = vec![prior(
            "swap",
            json!({"balance": "100", "amountReceived": "5"}),
        )];
        assert_eq!(resolve_amount(None, &outputs), Some("5".to_string()));
    }

    #[test]
    fn nested_output_amount_received_is_found() {
        let outputs = vec![prior("tool", json!({"output": {"amountReceived": "5"}}))];
        assert_eq!(resolve_amount(None, &outputs), Some("5".to_string()));
    }

    #[test]
    fn most_recent_prior_output_wins() {
        let outputs = vec![
            prior("old", json!({"amountReceived": "1"})),
            prior("new", json!({"amountReceived": "2"})),
        ];
        assert_eq!(resolve_amount(None, &outputs), Some("2".to_string()));
    }

    #[test]
    fn named_numeric_fields_are_scanned_in_priority_order() {
        let outputs = vec![prior("q", json!({"count": 7, "price": 3}))];
        // "price" precedes "count" in the fixed list
        assert_eq!(resolve_amount(None, &outputs), Some("3".to_string()));
    }

    #[test]
    fn non_numeric_strings_do_not_resolve() {
        let outputs = vec![prior("ai", json!({"value": "lots"}))];
        assert_eq!(resolve_amount(None, &outputs), None);
        assert_eq!(resolve_amount(Some("  "), &outputs), None);
    }

    #[test]
    fn projection_handles_scalars() {
        assert_eq!(numeric_projection(&json!(4.5)), 4.5);
        assert_eq!(numeric_projection(&json!("12")), 12.0);
        assert_eq!(numeric_projection(&json!(true)), 1.0);
        assert_eq!(numeric_projection(&json!(null)), 0.0);
        assert_eq!(numeric_projection(&json!("not a number")), 0.0);
    }

    #[test]
    fn projection_recurses_exactly_one_level() {
        assert_eq!(numeric_projection(&json!({"output": {"value": 8}})), 8.0);
        // two levels deep is out of contract and projects to zero
        assert_eq!(
            numeric_projection(&json!({"output": {"output": {"value": 8}}})),
            0.0
        );
    }

    #[test]
    fn chain_inherited_from_most_recent_output() {
        let outputs = vec![
            prior("a", json!({"chain": "ethereum"})),
            prior("b", json!({"output": {"chain": "somnia"}})),
        ];
        assert_eq!(inherit_chain(&outputs), Some("somnia".to_string()));
        assert_eq!(inherit_chain(&[]), None);
    }
}
