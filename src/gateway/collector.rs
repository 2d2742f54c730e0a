//! Concurrent per-profile collection.
//!
//! Each profile runs in its own task and every gateway call is isolated: a
//! failing region, instance or feed becomes a warning on that profile's
//! [`Diagnostics`] and collection moves on.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{BillingGateway, SavingsPlanOffer};
use crate::diagnostics::Diagnostics;
use crate::models::{AccountIdentity, Budget, CostRecord, DateWindow, Inventory, UsageQuantity};

/// What to fetch for every profile.
#[derive(Debug, Clone)]
pub struct CollectionPlan {
    pub cost_window: DateWindow,
    pub cpu_window: DateWindow,
    pub usage_window: DateWindow,
    /// Explicit regions; empty means whatever the gateway lists.
    pub regions: Vec<String>,
    pub tag_filter: Vec<String>,
}

/// Raw data gathered for one profile.
#[derive(Debug, Clone)]
pub struct ProfileFetch {
    pub profile: String,
    /// `None` when the account could not be resolved.
    pub account: Option<AccountIdentity>,
    /// `None` when cost retrieval failed.
    pub costs: Option<Vec<CostRecord>>,
    pub inventory: Inventory,
    pub usage: Vec<UsageQuantity>,
    pub budgets: Vec<Budget>,
    /// `None` when the provider advisory is unavailable.
    pub savings_plan_advisory: Option<Vec<SavingsPlanOffer>>,
    pub diagnostics: Diagnostics,
}

impl ProfileFetch {
    pub fn empty(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            account: None,
            costs: None,
            inventory: Inventory::default(),
            usage: Vec::new(),
            budgets: Vec::new(),
            savings_plan_advisory: None,
            diagnostics: Diagnostics::new(),
        }
    }
}

/// Fetch every profile concurrently; results come back in input order.
pub async fn collect_profiles(
    gateway: Arc<dyn BillingGateway>,
    profiles: &[String],
    plan: &CollectionPlan,
) -> Vec<ProfileFetch> {
    let plan = Arc::new(plan.clone());
    let mut tasks = JoinSet::new();

    for (index, profile) in profiles.iter().enumerate() {
        let gateway = Arc::clone(&gateway);
        let plan = Arc::clone(&plan);
        let profile = profile.clone();
        tasks.spawn(async move {
            let fetch = fetch_profile(gateway.as_ref(), &profile, &plan).await;
            (index, fetch)
        });
    }

    let mut fetched: Vec<Option<ProfileFetch>> = vec![None; profiles.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, fetch)) => fetched[index] = Some(fetch),
            Err(e) => warn!(error = %e, "Profile collection task failed"),
        }
    }

    // A task that panicked or was cancelled still yields an entry for its profile.
    fetched
        .into_iter()
        .zip(profiles)
        .map(|(fetch, profile)| {
            fetch.unwrap_or_else(|| {
                let mut failed = ProfileFetch::empty(profile.as_str());
                failed
                    .diagnostics
                    .profile(profile, "collection task did not complete");
                failed
            })
        })
        .collect()
}

/// Fetch one profile, turning every failed call into a warning.
pub async fn fetch_profile(
    gateway: &dyn BillingGateway,
    profile: &str,
    plan: &CollectionPlan,
) -> ProfileFetch {
    let mut fetch = ProfileFetch::empty(profile);
    let diagnostics = &mut fetch.diagnostics;

    match gateway.resolve_account(profile).await {
        Ok(account) => {
            debug!(profile, account = %account, "Resolved account");
            fetch.account = Some(account);
        }
        Err(e) => diagnostics.profile(profile, format!("account could not be resolved: {}", e)),
    }

    match gateway
        .daily_costs(profile, plan.cost_window, &plan.tag_filter)
        .await
    {
        Ok(costs) => fetch.costs = Some(costs),
        Err(e) => diagnostics.profile(profile, format!("cost data unavailable: {}", e)),
    }

    let regions = if plan.regions.is_empty() {
        match gateway.regions(profile).await {
            Ok(regions) => regions,
            Err(e) => {
                diagnostics.profile(profile, format!("regions could not be listed: {}", e));
                Vec::new()
            }
        }
    } else {
        plan.regions.clone()
    };

    for region in &regions {
        let mut inventory = match gateway.inventory(profile, region).await {
            Ok(inventory) => inventory,
            Err(e) => {
                diagnostics.region(profile, region, format!("inventory unavailable: {}", e));
                continue;
            }
        };

        let running: Vec<String> = inventory.running_instances().map(|i| i.id.clone()).collect();
        for instance_id in running {
            match gateway
                .cpu_history(profile, region, &instance_id, plan.cpu_window)
                .await
            {
                Ok(points) => {
                    inventory.cpu_history.insert(instance_id, points);
                }
                Err(e) => diagnostics.resource(
                    profile,
                    region,
                    &instance_id,
                    format!("CPU metrics unavailable: {}", e),
                ),
            }
        }

        fetch.inventory.extend(inventory);
    }

    match gateway.usage_quantities(profile, plan.usage_window).await {
        Ok(usage) => fetch.usage = usage,
        Err(e) => diagnostics.profile(profile, format!("usage history unavailable: {}", e)),
    }

    match gateway.budgets(profile).await {
        Ok(budgets) => fetch.budgets = budgets,
        Err(e) => diagnostics.profile(profile, format!("budgets unavailable: {}", e)),
    }

    // A missing advisory is expected; the usage estimate takes over.
    match gateway.savings_plan_advisory(profile).await {
        Ok(offers) => fetch.savings_plan_advisory = Some(offers),
        Err(e) => debug!(profile, error = %e, "No savings plan advisory"),
    }

    info!(
        profile,
        regions = fetch.inventory.regions.len(),
        instances = fetch.inventory.instances.len(),
        warnings = fetch.diagnostics.warnings().len(),
        "Collected profile"
    );

    fetch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WarningScope;
    use crate::gateway::SnapshotGateway;
    use chrono::NaiveDate;

    fn plan() -> CollectionPlan {
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let window = DateWindow::trailing(end, 31);
        CollectionPlan {
            cost_window: window,
            cpu_window: window,
            usage_window: window,
            regions: Vec::new(),
            tag_filter: Vec::new(),
        }
    }

    const SNAPSHOT: &str = r#"{
        "profiles": [
            {
                "name": "ops",
                "account_id": "222222222222",
                "regions": {
                    "us-east-1": {
                        "instances": [
                            {"id": "i-ok", "instance_type": "m5.large", "state": "running"},
                            {"id": "i-broken", "instance_type": "m5.large", "state": "running"}
                        ],
                        "cpu": {
                            "i-ok": [{"timestamp": "2024-01-10T00:00:00Z", "average": 12.0, "maximum": 20.0}]
                        }
                    },
                    "ap-south-1": {}
                },
                "failures": {
                    "costs": "throttled",
                    "inventory": {"ap-south-1": "opt-in required"},
                    "cpu": {"i-broken": "no datapoints"}
                }
            },
            {"name": "audit", "account_id": "333333333333"}
        ]
    }"#;

    #[tokio::test]
    async fn test_failures_become_scoped_warnings() {
        let gateway = SnapshotGateway::from_json(SNAPSHOT).unwrap();
        let fetch = fetch_profile(&gateway, "ops", &plan()).await;

        assert!(fetch.costs.is_none());
        assert_eq!(fetch.inventory.regions, vec!["us-east-1"]);
        assert_eq!(fetch.inventory.cpu("i-ok").len(), 1);
        assert!(fetch.inventory.cpu("i-broken").is_empty());

        let scopes: Vec<&WarningScope> = fetch.diagnostics.warnings().iter().map(|w| &w.scope).collect();
        assert_eq!(scopes.len(), 3);
        assert!(scopes.iter().any(|s| matches!(s, WarningScope::Profile { .. })));
        assert!(scopes.iter().any(|s| matches!(s, WarningScope::Region { region, .. } if region == "ap-south-1")));
        assert!(scopes.iter().any(|s| matches!(s, WarningScope::Resource { resource_id, .. } if resource_id == "i-broken")));
    }

    #[tokio::test]
    async fn test_collect_keeps_input_order() {
        let gateway: Arc<dyn BillingGateway> = Arc::new(SnapshotGateway::from_json(SNAPSHOT).unwrap());
        let profiles = vec!["audit".to_string(), "ops".to_string()];
        let fetched = collect_profiles(gateway, &profiles, &plan()).await;

        let names: Vec<&str> = fetched.iter().map(|f| f.profile.as_str()).collect();
        assert_eq!(names, vec!["audit", "ops"]);
        assert_eq!(fetched[0].account.as_ref().unwrap().as_str(), "333333333333");
    }

    /// Delegates to a snapshot but panics while resolving one profile.
    struct PanickingGateway {
        inner: SnapshotGateway,
        panics_on: &'static str,
    }

    #[async_trait::async_trait]
    impl BillingGateway for PanickingGateway {
        async fn resolve_account(&self, profile: &str) -> crate::gateway::GatewayResult<AccountIdentity> {
            if profile == self.panics_on {
                panic!("credential provider crashed");
            }
            self.inner.resolve_account(profile).await
        }

        async fn regions(&self, profile: &str) -> crate::gateway::GatewayResult<Vec<String>> {
            self.inner.regions(profile).await
        }

        async fn daily_costs(
            &self,
            profile: &str,
            window: DateWindow,
            tag_filter: &[String],
        ) -> crate::gateway::GatewayResult<Vec<CostRecord>> {
            self.inner.daily_costs(profile, window, tag_filter).await
        }

        async fn inventory(&self, profile: &str, region: &str) -> crate::gateway::GatewayResult<Inventory> {
            self.inner.inventory(profile, region).await
        }

        async fn cpu_history(
            &self,
            profile: &str,
            region: &str,
            instance_id: &str,
            window: DateWindow,
        ) -> crate::gateway::GatewayResult<Vec<crate::models::CpuDatapoint>> {
            self.inner.cpu_history(profile, region, instance_id, window).await
        }

        async fn usage_quantities(
            &self,
            profile: &str,
            window: DateWindow,
        ) -> crate::gateway::GatewayResult<Vec<UsageQuantity>> {
            self.inner.usage_quantities(profile, window).await
        }

        async fn budgets(&self, profile: &str) -> crate::gateway::GatewayResult<Vec<Budget>> {
            self.inner.budgets(profile).await
        }

        async fn savings_plan_advisory(
            &self,
            profile: &str,
        ) -> crate::gateway::GatewayResult<Vec<SavingsPlanOffer>> {
            self.inner.savings_plan_advisory(profile).await
        }
    }

    #[tokio::test]
    async fn test_panicked_profile_stays_in_results() {
        let gateway: Arc<dyn BillingGateway> = Arc::new(PanickingGateway {
            inner: SnapshotGateway::from_json(SNAPSHOT).unwrap(),
            panics_on: "ops",
        });
        let profiles = vec!["ops".to_string(), "audit".to_string()];
        let fetched = collect_profiles(gateway, &profiles, &plan()).await;

        let names: Vec<&str> = fetched.iter().map(|f| f.profile.as_str()).collect();
        assert_eq!(names, vec!["ops", "audit"]);

        let failed = &fetched[0];
        assert!(failed.account.is_none());
        assert!(failed.costs.is_none());
        let warnings = failed.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(&warnings[0].scope, WarningScope::Profile { profile } if profile == "ops"));
        assert!(fetched[1].account.is_some());
    }

    #[tokio::test]
    async fn test_explicit_regions_skip_listing() {
        let gateway = SnapshotGateway::from_json(SNAPSHOT).unwrap();
        let mut plan = plan();
        plan.regions = vec!["us-east-1".to_string()];
        let fetch = fetch_profile(&gateway, "ops", &plan).await;

        assert!(
            !fetch
                .diagnostics
                .warnings()
                .iter()
                .any(|w| matches!(&w.scope, WarningScope::Region { .. }))
        );
    }
}
