use serde::Serialize;

use crate::schema::CanonicalRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub open: usize,
    pub closed: usize,
    pub deferred: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBucket {
    Open,
    Closed,
    Deferred,
}

impl StatusBucket {
    /// Buckets a status by substring, checking OPEN, then CLOSED, then DEFER.
    pub fn classify(status: &str) -> Option<StatusBucket> {
        let upper = status.to_uppercase();
        if upper.contains("OPEN") {
            Some(StatusBucket::Open)
        } else if upper.contains("CLOSED") {
            Some(StatusBucket::Closed)
        } else if upper.contains("DEFER") {
            Some(StatusBucket::Deferred)
        } else {
            None
        }
    }
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.open + self.closed + self.deferred
    }

    fn record(&mut self, bucket: StatusBucket) {
        match bucket {
            StatusBucket::Open => self.open += 1,
            StatusBucket::Closed => self.closed += 1,
            StatusBucket::Deferred => self.deferred += 1,
        }
    }
}

/// Counts status buckets over the rows of the current view.
pub fn aggregate<'a, I>(rows: I) -> StatusCounts
where
    I: IntoIterator<Item = &'a CanonicalRow>,
{
    let mut counts = StatusCounts::default();
    for row in rows {
        if let Some(bucket) = StatusBucket::classify(&row.status) {
            counts.record(bucket);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(value: &str) -> CanonicalRow {
        CanonicalRow {
            status: value.into(),
            ..Default::default()
        }
    }

    #[test]
    fn classification_follows_priority_order() {
        assert_eq!(StatusBucket::classify("reopened"), Some(StatusBucket::Open));
        assert_eq!(StatusBucket::classify("Closed"), Some(StatusBucket::Closed));
        assert_eq!(StatusBucket::classify("DEFERRED"), Some(StatusBucket::Deferred));
        assert_eq!(StatusBucket::classify("IN WORK"), None);
    }

    #[test]
    fn unknown_statuses_are_not_counted() {
        let rows = vec![status("OPEN"), status("closed"), status("defer"), status("??")];
        let counts = aggregate(&rows);
        assert_eq!(
            counts,
            StatusCounts {
                open: 1,
                closed: 1,
                deferred: 1
            }
        );
        assert_eq!(counts.total(), 3);
    }
}
