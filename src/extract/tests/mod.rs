
use crate::strategy::Strategy;

/// Parses a strategy document the way the oracle would send it
fn strategy(json: &str) -> Strategy {
    serde_json::from_str(json).expect("test strategy is valid JSON")
}
