const DEFAULT_SID: &str = "S1";
const DEFAULT_OUTBOUND_QUEUE_CAP: usize = 256;

pub const SID_VAR: &str = "LIVE_VIEW_SID";
pub const OUTBOUND_QUEUE_CAP_VAR: &str = "LIVE_VIEW_OUTBOUND_QUEUE_CAP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub sid: String,
    pub outbound_queue_cap: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sid: DEFAULT_SID.to_string(),
            outbound_queue_cap: DEFAULT_OUTBOUND_QUEUE_CAP,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let sid = lookup(SID_VAR)
            .filter(|sid| !sid.is_empty())
            .unwrap_or_else(|| DEFAULT_SID.to_string());

        let outbound_queue_cap = lookup(OUTBOUND_QUEUE_CAP_VAR)
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_OUTBOUND_QUEUE_CAP);

        Self {
            sid,
            outbound_queue_cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn missing_vars_use_defaults() {
        assert_eq!(
            RuntimeConfig::from_lookup(lookup_from(&[])),
            RuntimeConfig::default()
        );
    }

    #[test]
    fn explicit_values_are_used() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            (SID_VAR, "S9"),
            (OUTBOUND_QUEUE_CAP_VAR, "16"),
        ]));
        assert_eq!(config.sid, "S9");
        assert_eq!(config.outbound_queue_cap, 16);
    }

    #[test]
    fn zero_or_garbage_capacity_falls_back() {
        for raw in ["0", "-3", "lots", ""] {
            let config = RuntimeConfig::from_lookup(lookup_from(&[(OUTBOUND_QUEUE_CAP_VAR, raw)]));
            assert_eq!(config.outbound_queue_cap, DEFAULT_OUTBOUND_QUEUE_CAP);
        }
    }
}
