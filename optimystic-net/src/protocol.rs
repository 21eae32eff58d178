//! Protocol namespace strings: `"/optimystic/{networkName}/"`
//! followed by a sub-protocol tag.

pub const REPO: &str = "repo/1.0.0";
pub const CLUSTER: &str = "cluster/1.0.0";
pub const SYNC: &str = "sync/1.0.0";

pub const FRET_NEIGHBORS: &str = "fret/1.0.0/neighbors";
pub const FRET_NEIGHBORS_ANNOUNCE: &str = "fret/1.0.0/neighbors/announce";
pub const FRET_MAYBE_ACT: &str = "fret/1.0.0/maybeAct";
pub const FRET_LEAVE: &str = "fret/1.0.0/leave";
pub const FRET_PING: &str = "fret/1.0.0/ping";

pub fn namespaced(network_name: &str, sub_protocol: &str) -> String {
    format!("/optimystic/{}/{}", network_name, sub_protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_a_sub_protocol() {
        assert_eq!(namespaced("default", REPO), "/optimystic/default/repo/1.0.0");
    }
}
