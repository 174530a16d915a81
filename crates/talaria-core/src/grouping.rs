//! Inverted sensor group discovery
//!
//! An inverted group is four sensors sharing a name prefix and ending in
//! `r1`, `r2`, `v1` and `v2` (case-insensitive). Groups are found by
//! classifying each catalog name and folding the results by prefix.

use log::debug;

use crate::source::SensorInfo;

/// Channel slot within an inverted group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    R1,
    R2,
    V1,
    V2,
}

impl Role {
    /// All roles in record order
    pub const ALL: [Role; 4] = [Role::R1, Role::R2, Role::V1, Role::V2];

    /// Name suffix identifying this role
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::R1 => "r1",
            Self::R2 => "r2",
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }

    /// Position of this role in a group or record
    pub const fn index(self) -> usize {
        match self {
            Self::R1 => 0,
            Self::R2 => 1,
            Self::V1 => 2,
            Self::V2 => 3,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| suffix.eq_ignore_ascii_case(role.suffix()))
    }
}

/// Split a sensor name into its group prefix and role.
///
/// Returns `None` for names that do not end in a role suffix.
pub fn classify(name: &str) -> Option<(&str, Role)> {
    let (split, _) = name.char_indices().rev().nth(1)?;
    let (prefix, suffix) = name.split_at(split);
    let role = Role::from_suffix(suffix)?;
    Some((prefix.trim(), role))
}

/// Four related sensors treated as one multi-channel sensor
#[derive(Debug, Clone)]
pub struct InvertedGroup {
    /// Shared name prefix
    pub name: String,
    /// Job the group was discovered in
    pub job_id: u32,
    slots: [Option<SensorInfo>; 4],
}

impl InvertedGroup {
    /// Create an empty group
    pub fn new(name: impl Into<String>, job_id: u32) -> Self {
        Self {
            name: name.into(),
            job_id,
            slots: Default::default(),
        }
    }

    /// Fill a slot, replacing any sensor already in it
    pub fn set(&mut self, role: Role, sensor: SensorInfo) {
        self.slots[role.index()] = Some(sensor);
    }

    /// Sensor in a slot
    pub fn get(&self, role: Role) -> Option<&SensorInfo> {
        self.slots[role.index()].as_ref()
    }

    /// Check that all four slots are populated
    pub fn is_valid(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Sensor ids in r1, r2, v1, v2 order, if the group is complete
    pub fn ids(&self) -> Option<[u32; 4]> {
        let [r1, r2, v1, v2] = &self.slots;
        Some([r1.as_ref()?.id, r2.as_ref()?.id, v1.as_ref()?.id, v2.as_ref()?.id])
    }
}

impl PartialEq for InvertedGroup {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

/// Find the complete inverted groups within one job's sensor catalog.
///
/// Groups are returned in the order their first member appears.
pub fn discover_groups(job_id: u32, sensors: &[SensorInfo]) -> Vec<InvertedGroup> {
    let mut groups = sensors.iter().fold(Vec::<InvertedGroup>::new(), |mut groups, sensor| {
        if let Some((prefix, role)) = classify(&sensor.name) {
            match groups.iter_mut().find(|group| group.name == prefix) {
                Some(group) => group.set(role, sensor.clone()),
                None => {
                    let mut group = InvertedGroup::new(prefix, job_id);
                    group.set(role, sensor.clone());
                    groups.push(group);
                }
            }
        }
        groups
    });

    groups.retain(|group| {
        let valid = group.is_valid();
        if !valid {
            debug!("Discarding incomplete group \"{}\" in job {}", group.name, job_id);
        }
        valid
    });
    groups
}

/// Append groups not already present in `into`
pub fn merge_groups(into: &mut Vec<InvertedGroup>, found: Vec<InvertedGroup>) {
    for group in found {
        if !into.contains(&group) {
            into.push(group);
        }
    }
}
