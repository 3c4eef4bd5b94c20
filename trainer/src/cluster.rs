use std::fmt;

/// The job a process plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Worker,
    Ps,
}

impl Role {
    /// The job name, `worker` or `ps`.
    pub fn job_name(self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Ps => "ps",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.job_name())
    }
}

/// The hosts of every job of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterSpec {
    pub ps: Vec<String>,
    pub worker: Vec<String>,
}

impl ClusterSpec {
    /// Creates a new `ClusterSpec`.
    ///
    /// # Arguments
    /// * `ps` - The parameter server hosts, in task order.
    /// * `worker` - The worker hosts, in task order.
    pub fn new(ps: Vec<String>, worker: Vec<String>) -> Self {
        Self { ps, worker }
    }

    /// The hosts of `role`.
    pub fn hosts(&self, role: Role) -> &[String] {
        match role {
            Role::Worker => &self.worker,
            Role::Ps => &self.ps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_by_role() {
        let cluster = ClusterSpec::new(
            vec!["h2".to_string(), "h3".to_string()],
            vec!["h0".to_string()],
        );

        assert_eq!(cluster.hosts(Role::Ps), ["h2", "h3"]);
        assert_eq!(cluster.hosts(Role::Worker), ["h0"]);
        assert_eq!(Role::Ps.to_string(), "ps");
        assert_eq!(Role::Worker.job_name(), "worker");
    }
}
