//! Recognized configuration options. Loading these from a file
//! or CLI is out of scope; the struct and its defaults are not.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Cluster size target for consensus.
    pub k: usize,
    /// Replication factor; 1 means only the closest peer serves a key.
    pub responsibility_k: usize,
    /// Permit smaller cohorts when the mesh is smaller than `k`.
    pub allow_cluster_downsize: bool,
    /// Fraction in `[0,1]` of how far a cohort may shrink below `k`.
    pub cluster_size_tolerance: f64,
    /// Protocol scoping string, `"/optimystic/{networkName}/"`.
    pub network_name: String,
    pub pending_retry_delay_ms: u64,
    pub peer_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            k: 10,
            responsibility_k: 1,
            allow_cluster_downsize: true,
            cluster_size_tolerance: 0.5,
            network_name: "default".to_string(),
            pending_retry_delay_ms: 100,
            peer_timeout_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.k, 10);
        assert_eq!(config.responsibility_k, 1);
        assert!(config.allow_cluster_downsize);
        assert_eq!(config.cluster_size_tolerance, 0.5);
        assert_eq!(config.network_name, "default");
        assert_eq!(config.pending_retry_delay_ms, 100);
        assert_eq!(config.peer_timeout_ms, 60_000);
    }

    #[test]
    fn round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"responsibilityK\""));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
