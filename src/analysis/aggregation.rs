//! Consolidates per-profile fetches into one view per billing account.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::diagnostics::Diagnostics;
use crate::gateway::{ProfileFetch, SavingsPlanOffer};
use crate::models::{AccountIdentity, Budget, CostRecord, Inventory, UsageQuantity};

/// Merged totals at or below this amount are treated as noise.
pub const MATERIALITY_THRESHOLD: f64 = 0.001;

/// Everything the analyzers need for one billing account.
#[derive(Debug, Clone)]
pub struct AccountView {
    /// Resolved account id, or the profile name when resolution failed.
    pub label: String,
    pub account: Option<AccountIdentity>,
    pub profiles: Vec<String>,
    pub costs: Vec<CostRecord>,
    pub inventory: Inventory,
    pub usage: Vec<UsageQuantity>,
    pub budgets: Vec<Budget>,
    pub savings_plan_advisory: Option<Vec<SavingsPlanOffer>>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupKey {
    Account(AccountIdentity),
    Unresolved(String),
}

/// Per-account merge of profile data
#[derive(Debug, Default)]
pub struct UsageAggregator;

impl UsageAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Group fetches by account, keeping the order in which accounts first appear.
    pub fn aggregate(&self, fetches: Vec<ProfileFetch>) -> Vec<AccountView> {
        let mut groups: Vec<(GroupKey, Vec<ProfileFetch>)> = Vec::new();

        for fetch in fetches {
            let key = match &fetch.account {
                Some(account) => GroupKey::Account(account.clone()),
                None => GroupKey::Unresolved(fetch.profile.clone()),
            };
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(fetch),
                None => groups.push((key, vec![fetch])),
            }
        }

        groups
            .into_iter()
            .map(|(key, members)| self.merge_group(key, members))
            .collect()
    }

    fn merge_group(&self, key: GroupKey, mut members: Vec<ProfileFetch>) -> AccountView {
        let label = match &key {
            GroupKey::Account(account) => account.to_string(),
            GroupKey::Unresolved(profile) => profile.clone(),
        };
        let account = match key {
            GroupKey::Account(account) => Some(account),
            GroupKey::Unresolved(_) => None,
        };

        if members.len() == 1 {
            let only = members.remove(0);
            debug!(account = %label, profile = %only.profile, "Single profile, passing through");
            return AccountView {
                label,
                account,
                profiles: vec![only.profile],
                costs: only.costs.unwrap_or_default(),
                inventory: only.inventory,
                usage: only.usage,
                budgets: only.budgets,
                savings_plan_advisory: only.savings_plan_advisory,
                diagnostics: only.diagnostics,
            };
        }

        let profiles: Vec<String> = members.iter().map(|m| m.profile.clone()).collect();
        info!(account = %label, profiles = ?profiles, "Merging profiles of one account");

        let contributions: Vec<Vec<CostRecord>> = members
            .iter_mut()
            .map(|m| m.costs.take().unwrap_or_default())
            .collect();
        let costs = merge_costs(&contributions);

        let mut diagnostics = Diagnostics::new();
        let mut members = members.into_iter();
        // The first profile is the only source of resource-level data so
        // instances visible to several profiles are counted once.
        let primary = match members.next() {
            Some(primary) => primary,
            None => ProfileFetch::empty(label.clone()),
        };
        diagnostics.absorb(primary.diagnostics);
        for other in members {
            diagnostics.absorb(other.diagnostics);
        }

        AccountView {
            label,
            account,
            profiles,
            costs,
            inventory: primary.inventory,
            usage: primary.usage,
            budgets: primary.budgets,
            savings_plan_advisory: primary.savings_plan_advisory,
            diagnostics,
        }
    }
}

/// Sum amounts per (date, service) across contributions.
///
/// Amounts for a key are added in ascending order, so the result does not
/// depend on the order of the contributions. Keys whose total is at or below
/// [`MATERIALITY_THRESHOLD`] are dropped. Output is sorted by date, then service.
pub fn merge_costs(contributions: &[Vec<CostRecord>]) -> Vec<CostRecord> {
    let mut buckets: BTreeMap<(NaiveDate, String), Vec<f64>> = BTreeMap::new();
    for records in contributions {
        for record in records {
            buckets
                .entry((record.date, record.service.clone()))
                .or_default()
                .push(record.amount);
        }
    }

    buckets
        .into_iter()
        .filter_map(|((date, service), mut amounts)| {
            amounts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let total: f64 = amounts.iter().sum();
            (total > MATERIALITY_THRESHOLD).then(|| CostRecord::new(date, service, total))
        })
        .collect()
}

/// Per-account headline numbers, useful for logging and reports.
#[derive(Debug, Clone, Serialize)]
pub struct AccountTotals {
    pub total_cost: f64,
    pub services: usize,
}

impl AccountView {
    pub fn totals(&self) -> AccountTotals {
        let mut services: Vec<&str> = self.costs.iter().map(|c| c.service.as_str()).collect();
        services.sort_unstable();
        services.dedup();
        AccountTotals {
            total_cost: self.costs.iter().map(|c| c.amount).sum(),
            services: services.len(),
        }
    }
}
