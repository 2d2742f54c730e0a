use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved identifier of a billing account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountIdentity(pub String);

impl AccountIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One day's cost for one service, in the gateway's native currency unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub date: NaiveDate,
    pub service: String,
    pub amount: f64,
}

impl CostRecord {
    pub fn new(date: NaiveDate, service: impl Into<String>, amount: f64) -> Self {
        Self {
            date,
            service: service.into(),
            amount,
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days ending on (and including) `end`.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: end - Duration::days(span),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Smallest window covering both.
    pub fn union(&self, other: &DateWindow) -> DateWindow {
        DateWindow {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

/// Which commitment family a usage quantity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentService {
    Compute,
    Database,
}

impl fmt::Display for CommitmentService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitmentService::Compute => f.write_str("Compute"),
            CommitmentService::Database => f.write_str("Database"),
        }
    }
}

/// Instance-hours consumed on one day by one (service, instance type, region).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageQuantity {
    pub date: NaiveDate,
    pub service: CommitmentService,
    pub instance_type: String,
    pub region: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub name: String,
    pub limit: f64,
    pub actual: f64,
    #[serde(default)]
    pub forecast: Option<f64>,
}
