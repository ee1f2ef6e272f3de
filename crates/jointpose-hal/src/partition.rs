//! Mapping from actuator names to physical publish groups.
//!
//! Each group is one publish destination (typically a limb).  Every full
//! snapshot is split with a [`GroupPartition`] before it is handed to the
//! [`CommandSink`][crate::sink::CommandSink].

use jointpose_types::JointState;

/// Decides which group an actuator name is published to.
pub trait GroupPartition: Send + Sync {
    /// Group tags in publish order.
    fn groups(&self) -> &[String];

    /// Return the group `name` belongs to, or `None` when no group claims it.
    fn group_of(&self, name: &str) -> Option<&str>;
}

/// Partition by name prefix: `name` belongs to group `g` when it starts with
/// `g_`.  This matches the names produced by
/// [`ActuatorStateStore::report_joint_positions`][crate::state::ActuatorStateStore::report_joint_positions].
#[derive(Debug, Clone)]
pub struct PrefixPartition {
    groups: Vec<String>,
}

impl PrefixPartition {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// The two arms of a Baxter: `left` and `right`.
    pub fn dual_arm() -> Self {
        Self::new(["left", "right"])
    }
}

impl GroupPartition for PrefixPartition {
    fn groups(&self) -> &[String] {
        &self.groups
    }

    fn group_of(&self, name: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| {
                name.strip_prefix(g.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
            })
            .map(String::as_str)
    }
}

/// Split `snapshot` into one ordered sub-state per group, in
/// [`GroupPartition::groups`] order.  Groups with no members are omitted, and
/// the second element lists names no group claimed.
pub fn split_by_group<'a>(
    partition: &dyn GroupPartition,
    snapshot: &'a JointState,
) -> (Vec<(String, JointState)>, Vec<&'a str>) {
    let mut buckets: Vec<(String, JointState)> = partition
        .groups()
        .iter()
        .map(|g| (g.clone(), JointState::new()))
        .collect();
    let mut orphans = Vec::new();

    for (name, position) in snapshot.iter() {
        match partition.group_of(name) {
            Some(group) => {
                if let Some((_, bucket)) = buckets.iter_mut().find(|(g, _)| g.as_str() == group) {
                    bucket.set(name, position);
                }
            }
            None => orphans.push(name),
        }
    }

    buckets.retain(|(_, bucket)| !bucket.is_empty());
    (buckets, orphans)
}
