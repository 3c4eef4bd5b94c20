use graph::ClusterHandle;
use trainer::Role;

/// The amount of process indices that are assigned the worker role.
pub const WORKER_SLOTS: usize = 2;

/// The hosts of the handle, split into the worker and parameter server jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hosts {
    pub worker: Vec<String>,
    pub ps: Vec<String>,
}

/// Splits the comma joined host list in half, the first half are workers.
///
/// With an odd amount of hosts the parameter servers get the extra one.
pub fn split_hosts(server: &str) -> Hosts {
    let hosts: Vec<String> = server.split(',').map(str::to_string).collect();
    let mid = hosts.len() / 2;

    Hosts {
        worker: hosts[..mid].to_vec(),
        ps: hosts[mid..].to_vec(),
    }
}

/// Assigns a role from the process index alone.
///
/// The first `WORKER_SLOTS` indices are workers, every other index is a parameter server
/// counted from `WORKER_SLOTS`. This rule doesn't look at the host split, see `slot_mismatch`.
///
/// # Returns
/// The role and the task index inside its job.
pub fn assign_role(index: usize) -> (Role, usize) {
    if index < WORKER_SLOTS {
        (Role::Worker, index)
    } else {
        (Role::Ps, index - WORKER_SLOTS)
    }
}

/// Whether the host split disagrees with the fixed amount of worker slots.
pub fn slot_mismatch(hosts: &Hosts) -> bool {
    hosts.worker.len() != WORKER_SLOTS
}

/// Points the handle's servers at the parameter servers and its clients at the workers.
pub fn rewrite_handle(handle: &mut ClusterHandle, hosts: &Hosts) {
    handle.server = hosts.ps.join(",");
    handle.client = Some(hosts.worker.join(","));
}
