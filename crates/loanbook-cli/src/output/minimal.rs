use serde_json::Value;

use super::cell;

/// Result fields worth printing on their own, in priority order.
const HEADLINE_KEYS: [&str; 7] = [
    "instalment_amount",
    "outstanding_balance",
    "overdue_loans",
    "fully_paid",
    "total_payable",
    "total_collected",
    "num_instalments",
];

/// Print just the headline value of a computation.
pub fn print_minimal(value: &Value) {
    let result = value.get("result").unwrap_or(value);

    if let Value::Object(map) = result {
        if let Some(val) = HEADLINE_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|val| !val.is_null())
        {
            println!("{}", cell(val));
            return;
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, cell(val));
            return;
        }
    }

    println!("{}", cell(result));
}
