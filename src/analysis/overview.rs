//! Period-over-period spend, service breakdown, instance states and budgets.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Budget, CostRecord, DateWindow, Inventory};

/// Service totals at or below this amount are left out of the breakdown.
const SERVICE_FLOOR: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "days", rename_all = "snake_case")]
pub enum ComparisonPeriod {
    /// Month to date against the whole previous month
    MonthToDate,
    /// The last N days against the N days before them
    TrailingDays(u32),
}

impl ComparisonPeriod {
    pub fn from_days(time_range_days: Option<u32>) -> Self {
        match time_range_days {
            Some(days) if days > 0 => ComparisonPeriod::TrailingDays(days),
            _ => ComparisonPeriod::MonthToDate,
        }
    }

    /// (current, previous) windows ending at `as_of`.
    pub fn windows(&self, as_of: NaiveDate) -> (DateWindow, DateWindow) {
        match *self {
            ComparisonPeriod::MonthToDate => {
                let month_start = as_of.with_day(1).unwrap_or(as_of);
                let previous_end = month_start - Duration::days(1);
                let previous_start = previous_end.with_day(1).unwrap_or(previous_end);
                (
                    DateWindow::new(month_start, as_of),
                    DateWindow::new(previous_start, previous_end),
                )
            }
            ComparisonPeriod::TrailingDays(days) => {
                let current = DateWindow::trailing(as_of, days);
                let previous = DateWindow::trailing(current.start - Duration::days(1), days);
                (current, previous)
            }
        }
    }

    pub fn labels(&self) -> (String, String) {
        match self {
            ComparisonPeriod::MonthToDate => ("Current month".to_string(), "Last month".to_string()),
            ComparisonPeriod::TrailingDays(days) => (
                format!("Current {} days", days),
                format!("Previous {} days", days),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCost {
    pub service: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub name: String,
    pub limit: f64,
    pub actual: f64,
    pub forecast: Option<f64>,
    pub over_limit: bool,
    pub forecast_over_limit: bool,
}

impl From<&Budget> for BudgetStatus {
    fn from(budget: &Budget) -> Self {
        Self {
            name: budget.name.clone(),
            limit: budget.limit,
            actual: budget.actual,
            forecast: budget.forecast,
            over_limit: budget.actual > budget.limit,
            forecast_over_limit: budget.forecast.is_some_and(|f| f > budget.limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostOverview {
    pub current_period_name: String,
    pub previous_period_name: String,
    pub current_period: DateWindow,
    pub previous_period: DateWindow,
    pub current_total: f64,
    pub previous_total: f64,
    /// `None` when there was no spend in the previous period.
    pub percent_change: Option<f64>,
    pub services: Vec<ServiceCost>,
    pub instance_states: BTreeMap<String, usize>,
    pub budgets: Vec<BudgetStatus>,
}

/// `(current - previous) / previous * 100`, undefined without previous spend.
pub fn percent_change(current: f64, previous: f64) -> Option<f64> {
    if previous <= 0.0 {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

pub fn cost_overview(
    costs: &[CostRecord],
    inventory: &Inventory,
    budgets: &[Budget],
    period: ComparisonPeriod,
    as_of: NaiveDate,
) -> CostOverview {
    let (current, previous) = period.windows(as_of);
    let (current_period_name, previous_period_name) = period.labels();

    let total_in = |window: &DateWindow| -> f64 {
        costs
            .iter()
            .filter(|c| window.contains(c.date))
            .map(|c| c.amount)
            .sum()
    };
    let current_total = total_in(&current);
    let previous_total = total_in(&previous);

    let mut by_service: BTreeMap<&str, f64> = BTreeMap::new();
    for record in costs.iter().filter(|c| current.contains(c.date)) {
        *by_service.entry(record.service.as_str()).or_insert(0.0) += record.amount;
    }
    let mut services: Vec<ServiceCost> = by_service
        .into_iter()
        .filter(|(_, amount)| *amount > SERVICE_FLOOR)
        .map(|(service, amount)| ServiceCost {
            service: service.to_string(),
            amount,
        })
        .collect();
    services.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));

    let mut instance_states: BTreeMap<String, usize> = BTreeMap::new();
    instance_states.insert("running".to_string(), 0);
    instance_states.insert("stopped".to_string(), 0);
    for instance in &inventory.instances {
        *instance_states
            .entry(instance.state.as_str().to_string())
            .or_insert(0) += 1;
    }

    CostOverview {
        current_period_name,
        previous_period_name,
        current_period: current,
        previous_period: previous,
        current_total,
        previous_total,
        percent_change: percent_change(current_total, previous_total),
        services,
        instance_states,
        budgets: budgets.iter().map(BudgetStatus::from).collect(),
    }
}
