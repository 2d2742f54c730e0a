use chrono::{Duration, NaiveDate, NaiveTime};
use serde_json::{Value, json};
use std::sync::Arc;

use cloudspend::analysis::UsageAggregator;
use cloudspend::config::Config;
use cloudspend::diagnostics::WarningScope;
use cloudspend::gateway::{BillingGateway, SnapshotGateway, collect_profiles};
use cloudspend::models::{Confidence, UnusedResourceKind};
use cloudspend::{Engine, EngineError, EngineReport};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
}

fn day(offset_from_as_of: i64) -> String {
    (as_of() - Duration::days(offset_from_as_of))
        .format("%Y-%m-%d")
        .to_string()
}

fn gateway(snapshot: Value) -> Arc<dyn BillingGateway> {
    Arc::new(SnapshotGateway::from_json(&snapshot.to_string()).unwrap())
}

fn profiles(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

async fn run(config: Config, snapshot: Value, names: &[&str]) -> EngineReport {
    Engine::new(config)
        .unwrap()
        .run(gateway(snapshot), &profiles(names), as_of())
        .await
        .unwrap()
}

/// 90 days of flat Compute spend with a spike on day 45.
fn spiky_costs() -> Vec<Value> {
    (0..90)
        .map(|i| {
            let amount = match i {
                44 => 500.0,
                45 => 12.0,
                _ => 10.0,
            };
            json!({"date": day(89 - i), "service": "Compute", "amount": amount})
        })
        .collect()
}

/// Hourly CPU samples for the last 14 days.
fn cpu_samples(avg: f64, max: f64) -> Vec<Value> {
    let start = (as_of() - Duration::days(13)).and_time(NaiveTime::MIN).and_utc();
    (0..14 * 24)
        .map(|h| {
            let peak = if h == 10 { max } else { avg };
            json!({
                "timestamp": (start + Duration::hours(h)).to_rfc3339(),
                "average": avg,
                "maximum": peak,
            })
        })
        .collect()
}

/// m5.large usage on 28 of the last 30 days, alternating 45.6 / 50.4 hours.
fn steady_usage() -> Vec<Value> {
    (0..30)
        .filter(|i| *i != 3 && *i != 17)
        .enumerate()
        .map(|(n, i)| {
            let hours = if n % 2 == 0 { 45.6 } else { 50.4 };
            json!({
                "date": day(i),
                "service": "compute",
                "instance_type": "m5.large",
                "region": "us-east-1",
                "hours": hours,
            })
        })
        .collect()
}

#[tokio::test]
async fn test_spike_is_reported_once() {
    let snapshot = json!({"profiles": [
        {"name": "billing", "account_id": "111", "costs": spiky_costs()}
    ]});

    let report = run(Config::default(), snapshot, &["billing"]).await;
    let anomalies = &report.accounts[0].anomalies;

    assert_eq!(anomalies.anomalies.len(), 1);
    let spike = &anomalies.anomalies[0];
    assert_eq!(spike.service, "Compute");
    assert_eq!(spike.date.format("%Y-%m-%d").to_string(), day(45));
    assert_eq!(spike.days_ago, 45);
    assert!((spike.baseline - 10.0).abs() < 0.1);
    assert!((spike.deviation_multiplier - 50.0).abs() < 1.0);
    assert_eq!(anomalies.summary.services_with_anomalies, 1);
}

#[tokio::test]
async fn test_history_lagging_as_of_is_still_analysed() {
    // Billing data usually stops the day before the analysis date.
    let costs: Vec<Value> = (1..=60)
        .map(|offset| {
            let amount = if offset == 5 { 500.0 } else { 10.0 };
            json!({"date": day(offset), "service": "Compute", "amount": amount})
        })
        .collect();
    let snapshot = json!({"profiles": [
        {"name": "billing", "account_id": "111", "costs": costs}
    ]});

    let report = run(Config::default(), snapshot, &["billing"]).await;
    let anomalies = &report.accounts[0].anomalies;

    assert_eq!(anomalies.summary.services_analyzed, 1);
    assert_eq!(anomalies.anomalies.len(), 1);
    assert_eq!(anomalies.anomalies[0].date.format("%Y-%m-%d").to_string(), day(5));
}

#[tokio::test]
async fn test_untagged_resources_are_listed_per_region() {
    let snapshot = json!({"profiles": [{
        "name": "prod",
        "account_id": "666",
        "regions": {
            "us-east-1": {
                "instances": [
                    {"id": "i-bare", "instance_type": "t3.micro", "state": "shutting-down"},
                    {"id": "i-owned", "instance_type": "t3.micro", "state": "running",
                     "tags": {"Team": "web"}}
                ],
                "volumes": [{"id": "vol-bare", "size_gb": 8, "volume_type": "gp3", "state": "in-use"}]
            },
            "eu-west-1": {
                "instances": [{"id": "i-eu", "instance_type": "t3.micro", "state": "stopped"}]
            }
        }
    }]});

    let report = run(Config::default(), snapshot, &["prod"]).await;
    let account = &report.accounts[0];
    let untagged = &account.untagged;

    assert_eq!(untagged.instances["us-east-1"], vec!["i-bare"]);
    assert_eq!(untagged.instances["eu-west-1"], vec!["i-eu"]);
    assert_eq!(untagged.volumes["us-east-1"], vec!["vol-bare"]);
    assert_eq!(untagged.count(), 3);
    assert_eq!(account.overview.instance_states.get("shutting-down"), Some(&1));
}

#[tokio::test]
async fn test_underused_instance_is_downsized() {
    let snapshot = json!({"profiles": [{
        "name": "prod",
        "account_id": "222",
        "regions": {"us-east-1": {
            "instances": [{"id": "i-web", "instance_type": "t3.large", "state": "running",
                           "tags": {"Name": "web"}}],
            "cpu": {"i-web": cpu_samples(8.0, 35.0)}
        }}
    }]});

    let report = run(Config::default(), snapshot, &["prod"]).await;
    let optimization = &report.accounts[0].optimization;
    let resizes: Vec<_> = optimization.resizes().collect();

    assert_eq!(resizes.len(), 1);
    assert_eq!(resizes[0].resource_id, "i-web");
    assert_eq!(resizes[0].region, "us-east-1");
    assert_eq!(resizes[0].recommended_type, "t3.medium");
    assert!(resizes[0].monthly_savings > 0.0);
    assert_eq!(optimization.unused().count(), 0);
}

#[tokio::test]
async fn test_profiles_of_one_account_are_merged() {
    let snapshot = json!({"profiles": [
        {"name": "dev", "account_id": "111",
         "costs": [{"date": day(5), "service": "Compute", "amount": 7.0}]},
        {"name": "ops", "account_id": "111",
         "costs": [{"date": day(5), "service": "Compute", "amount": 5.0}]}
    ]});

    let report = run(Config::default(), snapshot, &["dev", "ops"]).await;

    assert_eq!(report.accounts.len(), 1);
    let account = &report.accounts[0];
    assert_eq!(account.label, "111");
    assert_eq!(account.profiles, profiles(&["dev", "ops"]));
    assert_eq!(account.overview.services.len(), 1);
    assert!((account.overview.services[0].amount - 12.0).abs() < 1e-9);
    assert!((account.overview.current_total - 12.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_merge_does_not_depend_on_profile_order() {
    let snapshot = json!({"profiles": [
        {"name": "dev", "account_id": "111", "costs": [
            {"date": day(2), "service": "Compute", "amount": 0.1},
            {"date": day(2), "service": "Storage", "amount": 0.2}]},
        {"name": "ops", "account_id": "111", "costs": [
            {"date": day(2), "service": "Compute", "amount": 0.7},
            {"date": day(1), "service": "Storage", "amount": 3.0}]}
    ]});

    let plan = Engine::new(Config::default()).unwrap().plan(as_of());
    let forward = collect_profiles(gateway(snapshot.clone()), &profiles(&["dev", "ops"]), &plan).await;
    let backward = collect_profiles(gateway(snapshot), &profiles(&["ops", "dev"]), &plan).await;

    let aggregator = UsageAggregator::new();
    let forward = aggregator.aggregate(forward);
    let backward = aggregator.aggregate(backward);
    assert_eq!(forward.len(), 1);
    assert_eq!(forward[0].costs, backward[0].costs);
}

#[tokio::test]
async fn test_steady_usage_gets_high_confidence_reservation() {
    let snapshot = json!({"profiles": [
        {"name": "prod", "account_id": "333", "usage": steady_usage()}
    ]});

    let report = run(Config::default(), snapshot, &["prod"]).await;
    let account = &report.accounts[0];

    let pattern = &account.usage_patterns[0];
    assert_eq!(pattern.days_used, 28);
    assert!((pattern.consistency - 28.0 / 30.0).abs() < 1e-9);
    assert!((pattern.coefficient_of_variation - 0.05).abs() < 1e-6);
    assert_eq!(pattern.confidence, Confidence::High);

    let reserved: Vec<_> = account.optimization.reserved_instances().collect();
    assert_eq!(reserved.len(), 1);
    assert_eq!(reserved[0].instance_type, "m5.large");
    assert_eq!(reserved[0].recommended_count, 2);
    assert_eq!(reserved[0].confidence, Confidence::High);
}

#[tokio::test]
async fn test_low_confidence_never_reaches_the_report() {
    // Erratic usage: present every day but wildly varying.
    let usage: Vec<Value> = (0..30)
        .map(|i| {
            let hours = if i % 2 == 0 { 2.0 } else { 70.0 };
            json!({"date": day(i), "service": "compute", "instance_type": "c5.xlarge",
                   "region": "us-east-1", "hours": hours})
        })
        .collect();
    let snapshot = json!({"profiles": [
        {"name": "prod", "account_id": "333", "usage": usage}
    ]});

    let report = run(Config::default(), snapshot, &["prod"]).await;
    let optimization = &report.accounts[0].optimization;

    assert_eq!(optimization.reserved_instances().count(), 0);
    assert!(
        optimization
            .recommendations
            .iter()
            .filter_map(|r| r.confidence())
            .all(|c| c != Confidence::Low)
    );
}

#[tokio::test]
async fn test_partial_failures_become_warnings() {
    let snapshot = json!({"profiles": [
        {"name": "broken", "account_id": "111",
         "regions": {
             "us-east-1": {"volumes": [{"id": "vol-1", "size_gb": 100, "volume_type": "gp2",
                                        "state": "available"}]},
             "eu-west-1": {}
         },
         "failures": {"costs": "throttled", "inventory": {"eu-west-1": "access denied"}}},
        {"name": "healthy", "account_id": "222",
         "costs": [{"date": day(1), "service": "Compute", "amount": 4.0}]}
    ]});

    let report = run(Config::default(), snapshot, &["broken", "healthy"]).await;
    assert_eq!(report.accounts.len(), 2);

    let broken = report.account("111").unwrap();
    assert_eq!(broken.warnings.len(), 2);
    assert!(broken.warnings.iter().any(|w| matches!(
        &w.scope,
        WarningScope::Region { region, .. } if region == "eu-west-1"
    )));
    assert_eq!(broken.overview.current_total, 0.0);
    // The region that did load is still analysed.
    let unused: Vec<_> = broken.optimization.unused().collect();
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].kind, UnusedResourceKind::DetachedVolume);

    let healthy = report.account("222").unwrap();
    assert!(healthy.warnings.is_empty());
    assert!((healthy.overview.current_total - 4.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_unknown_profile_stands_alone() {
    let snapshot = json!({"profiles": [
        {"name": "dev", "account_id": "111"}
    ]});

    let report = run(Config::default(), snapshot, &["dev", "ghost"]).await;
    assert_eq!(report.accounts.len(), 2);

    let ghost = report.account("ghost").unwrap();
    assert!(ghost.account.is_none());
    assert!(!ghost.warnings.is_empty());
}

#[tokio::test]
async fn test_identical_input_gives_identical_output() {
    let config = Config::default();
    let snapshot = json!({"profiles": [
        {"name": "billing", "account_id": "111", "costs": spiky_costs(), "usage": steady_usage()}
    ]});

    let first = run(config.clone(), snapshot.clone(), &["billing"]).await;
    let second = run(config, snapshot, &["billing"]).await;

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_before_collection() {
    let mut config = Config::default();
    config.analysis.tag_filter = vec!["not-a-pair".to_string()];
    assert!(matches!(
        Engine::new(config),
        Err(EngineError::InvalidConfiguration(_))
    ));

    let engine = Engine::new(Config::default()).unwrap();
    let snapshot = json!({"profiles": [{"name": "dev", "account_id": "111"}]});
    let result = engine.run(gateway(snapshot), &[], as_of()).await;
    assert!(matches!(result, Err(EngineError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_savings_summary_adds_up() {
    let snapshot = json!({"profiles": [{
        "name": "prod",
        "account_id": "444",
        "regions": {"us-east-1": {
            "instances": [
                {"id": "i-web", "instance_type": "t3.large", "state": "running"},
                {"id": "i-old", "instance_type": "m5.large", "state": "stopped",
                 "volume_ids": ["vol-root"],
                 "state_transition_reason": "User initiated (2024-03-01 08:00:00 GMT)"}
            ],
            "volumes": [
                {"id": "vol-root", "size_gb": 50, "volume_type": "gp2", "state": "in-use"},
                {"id": "vol-free", "size_gb": 200, "volume_type": "gp2", "state": "available"}
            ],
            "addresses": [{"allocation_id": "eipalloc-1", "public_ip": "203.0.113.5"}],
            "cpu": {"i-web": cpu_samples(8.0, 35.0)}
        }},
        "usage": steady_usage(),
        "savings_plan_advisory": [
            {"hourly_commitment": 1.5, "estimated_monthly_savings": 120.0, "estimated_utilization": 95.0}
        ]
    }]});

    let report = run(Config::default(), snapshot, &["prod"]).await;
    let summary = &report.accounts[0].optimization.summary;

    let parts = summary.resize_monthly
        + summary.unused_monthly
        + summary.reserved_instance_monthly
        + summary.savings_plan_monthly;
    assert!((summary.total_monthly - parts).abs() < 1e-9);
    assert!((summary.total_annual - summary.total_monthly * 12.0).abs() < 1e-9);
    assert!((summary.savings_plan_monthly - 120.0).abs() < 1e-9);
    assert_eq!(report.accounts[0].optimization.unused().count(), 3);
    assert!(summary.resize_monthly > 0.0);
}
