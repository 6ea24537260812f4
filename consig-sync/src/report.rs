//! Counters describing what a sync run did.

use std::fmt;
use std::ops::AddAssign;

use crate::types::EntityKind;
use crate::writer::WriteOutcome;

/// Outcome counters for one entity kind. Every processed row lands in exactly one counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityReport {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub errored: u64,
}

impl EntityReport {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.inserted += 1,
            WriteOutcome::Updated => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn record_error(&mut self) {
        self.errored += 1;
    }

    /// Returns the number of rows processed.
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.unchanged + self.errored
    }
}

impl AddAssign for EntityReport {
    fn add_assign(&mut self, other: EntityReport) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.errored += other.errored;
    }
}

impl fmt::Display for EntityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted={} updated={} unchanged={} errored={}",
            self.inserted, self.updated, self.unchanged, self.errored
        )
    }
}

/// Counters of a whole run, one entry per processed kind in processing order.
///
/// Built fresh for every run and never persisted. Row errors do not fail a run; callers that
/// care check [`RunReport::total_errored`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    entries: Vec<(EntityKind, EntityReport)>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the counters of `kind`, merging with an existing entry for the same kind.
    pub fn push(&mut self, kind: EntityKind, report: EntityReport) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == kind) {
            Some((_, existing)) => *existing += report,
            None => self.entries.push((kind, report)),
        }
    }

    pub fn get(&self, kind: EntityKind) -> Option<&EntityReport> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == kind)
            .map(|(_, report)| report)
    }

    pub fn entries(&self) -> &[(EntityKind, EntityReport)] {
        &self.entries
    }

    /// Returns the counters summed over every kind.
    pub fn totals(&self) -> EntityReport {
        let mut totals = EntityReport::default();
        for (_, report) in &self.entries {
            totals += *report;
        }
        totals
    }

    /// Returns the number of rows that could not be synchronized.
    pub fn total_errored(&self) -> u64 {
        self.totals().errored
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, report) in &self.entries {
            writeln!(f, "{kind}: {report}")?;
        }
        write!(f, "total: {}", self.totals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_land_in_one_counter_each() {
        let mut report = EntityReport::default();
        report.record(WriteOutcome::Inserted);
        report.record(WriteOutcome::Inserted);
        report.record(WriteOutcome::Unchanged);
        report.record_error();

        assert_eq!(
            report,
            EntityReport {
                inserted: 2,
                updated: 0,
                unchanged: 1,
                errored: 1,
            }
        );
        assert_eq!(report.total(), 4);
    }

    #[test]
    fn renders_flat_summary_in_processing_order() {
        let mut report = RunReport::new();
        report.push(
            EntityKind::Members,
            EntityReport {
                inserted: 1,
                ..Default::default()
            },
        );
        report.push(
            EntityKind::Sales,
            EntityReport {
                updated: 3,
                errored: 2,
                ..Default::default()
            },
        );

        insta::assert_snapshot!(report.to_string(), @r"
        members: inserted=1 updated=0 unchanged=0 errored=0
        sales: inserted=0 updated=3 unchanged=0 errored=2
        total: inserted=1 updated=3 unchanged=0 errored=2
        ");
        assert_eq!(report.total_errored(), 2);
    }

    #[test]
    fn pushing_the_same_kind_merges_counters() {
        let mut report = RunReport::new();
        report.push(
            EntityKind::Members,
            EntityReport {
                inserted: 1,
                ..Default::default()
            },
        );
        report.push(
            EntityKind::Members,
            EntityReport {
                unchanged: 1,
                ..Default::default()
            },
        );

        assert_eq!(report.entries().len(), 1);
        assert_eq!(report.get(EntityKind::Members).unwrap().total(), 2);
        assert!(report.get(EntityKind::Sales).is_none());
    }
}
