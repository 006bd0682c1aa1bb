//! Extraction statistics and the updates that build them

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Resource class extracted by one producer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Workspace users
    Users,
    /// Workspace projects
    Projects,
}

impl ResourceClass {
    /// Every class, in spawn order.
    pub const ALL: [ResourceClass; 2] = [ResourceClass::Users, ResourceClass::Projects];

    /// Metric/log label
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Users => "users",
            ResourceClass::Projects => "projects",
        }
    }

    /// Singular noun used in error messages
    pub fn singular(&self) -> &'static str {
        match self {
            ResourceClass::Users => "user",
            ResourceClass::Projects => "project",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outcome reported by a producer to the stats aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsUpdate {
    /// An item of this class was persisted
    Extracted(ResourceClass),
    /// An item of this class failed to persist
    Failed(ResourceClass),
}

/// Totals of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Users persisted
    pub users_extracted: u64,
    /// Projects persisted
    pub projects_extracted: u64,
    /// Items that failed to persist, across classes
    pub errors: u64,
    /// Wall time of the run
    pub duration: Duration,
}

impl ExtractionStats {
    /// Apply one update.
    pub fn apply(&mut self, update: StatsUpdate) {
        match update {
            StatsUpdate::Extracted(ResourceClass::Users) => self.users_extracted += 1,
            StatsUpdate::Extracted(ResourceClass::Projects) => self.projects_extracted += 1,
            StatsUpdate::Failed(_) => self.errors += 1,
        }
    }

    /// Items persisted across classes
    pub fn total_extracted(&self) -> u64 {
        self.users_extracted + self.projects_extracted
    }

    /// Persisted count for `class`
    pub fn extracted(&self, class: ResourceClass) -> u64 {
        match class {
            ResourceClass::Users => self.users_extracted,
            ResourceClass::Projects => self.projects_extracted,
        }
    }
}

impl fmt::Display for ExtractionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users={} projects={} errors={} duration={:.2?}",
            self.users_extracted, self.projects_extracted, self.errors, self.duration
        )
    }
}
