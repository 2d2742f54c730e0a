use serde::Serialize;
use tabled::{Table, Tabled};

use crate::analysis::{
    AnomalyRecord, AnomalyReport, OptimizationReport, ServiceCost, UntaggedResources, UsagePattern,
};
use crate::diagnostics::{Warning, WarningScope};
use crate::engine::{AccountReport, EngineReport};
use crate::models::{CommitmentTerm, PaymentOption, Recommendation};

/// Trait for items that can be displayed as tables or JSON
pub trait OutputFormat {
    fn to_table(&self) -> String;
    fn to_json(&self) -> Result<String, serde_json::Error>;
}

#[derive(Tabled, Serialize, Debug)]
pub struct ServiceRow {
    #[tabled(rename = "Service")]
    pub service: String,
    #[tabled(rename = "Cost")]
    pub cost: String,
}

#[derive(Tabled, Serialize, Debug)]
pub struct AnomalyRow {
    #[tabled(rename = "Service")]
    pub service: String,
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Amount")]
    pub amount: String,
    #[tabled(rename = "Baseline")]
    pub baseline: String,
    #[tabled(rename = "Deviation")]
    pub deviation: String,
    #[tabled(rename = "Days Ago")]
    pub days_ago: String,
}

#[derive(Tabled, Serialize, Debug)]
pub struct RecommendationRow {
    #[tabled(rename = "Type")]
    pub kind: String,
    #[tabled(rename = "Resource")]
    pub resource: String,
    #[tabled(rename = "Region")]
    pub region: String,
    #[tabled(rename = "Action")]
    pub action: String,
    #[tabled(rename = "Monthly Savings")]
    pub monthly_savings: String,
    #[tabled(rename = "Confidence")]
    pub confidence: String,
}

#[derive(Tabled, Serialize, Debug)]
pub struct PatternRow {
    #[tabled(rename = "Service")]
    pub service: String,
    #[tabled(rename = "Instance Type")]
    pub instance_type: String,
    #[tabled(rename = "Region")]
    pub region: String,
    #[tabled(rename = "Consistency")]
    pub consistency: String,
    #[tabled(rename = "Avg Hours/Day")]
    pub average_daily_hours: String,
    #[tabled(rename = "Confidence")]
    pub confidence: String,
}

#[derive(Tabled, Serialize, Debug)]
pub struct UntaggedRow {
    #[tabled(rename = "Type")]
    pub kind: String,
    #[tabled(rename = "Region")]
    pub region: String,
    #[tabled(rename = "Resource")]
    pub resource: String,
}

#[derive(Tabled, Serialize, Debug)]
pub struct WarningRow {
    #[tabled(rename = "Scope")]
    pub scope: String,
    #[tabled(rename = "Message")]
    pub message: String,
}

impl ServiceRow {
    pub fn from_service_cost(cost: &ServiceCost) -> Self {
        Self {
            service: cost.service.clone(),
            cost: format_currency(cost.amount),
        }
    }
}

impl AnomalyRow {
    pub fn from_anomaly(anomaly: &AnomalyRecord) -> Self {
        Self {
            service: anomaly.service.clone(),
            date: anomaly.date.format("%Y-%m-%d").to_string(),
            amount: format_currency(anomaly.amount),
            baseline: format_currency(anomaly.baseline),
            deviation: format!("{:.1}x", anomaly.deviation_multiplier),
            days_ago: anomaly.days_ago.to_string(),
        }
    }
}

impl RecommendationRow {
    pub fn from_recommendation(recommendation: &Recommendation) -> Self {
        let confidence = recommendation
            .confidence()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let monthly_savings = format_currency(recommendation.monthly_savings());

        match recommendation {
            Recommendation::Resize(r) => Self {
                kind: "Resize".to_string(),
                resource: display_name(&r.resource_id, r.resource_name.as_deref()),
                region: r.region.clone(),
                action: format!("{} -> {}", r.current_type, r.recommended_type),
                monthly_savings,
                confidence,
            },
            Recommendation::UnusedResource(r) => Self {
                kind: r.kind.resource_type().to_string(),
                resource: display_name(&r.resource_id, r.resource_name.as_deref()),
                region: r.region.clone(),
                action: r.recommendation.clone(),
                monthly_savings,
                confidence,
            },
            Recommendation::ReservedInstance(r) => Self {
                kind: format!("{} Reservation", r.service),
                resource: format!("{} x {}", r.recommended_count, r.instance_type),
                region: r.region.clone(),
                action: format!("Reserve for {}, {}", term_label(r.term), payment_label(r.payment_option)),
                monthly_savings,
                confidence,
            },
            Recommendation::SavingsPlan(r) => Self {
                kind: "Savings Plan".to_string(),
                resource: format!("{}/hour", format_currency(r.hourly_commitment)),
                region: "-".to_string(),
                action: format!("Commit for {}, {}", term_label(r.term), payment_label(r.payment_option)),
                monthly_savings,
                confidence,
            },
        }
    }
}

impl PatternRow {
    pub fn from_pattern(pattern: &UsagePattern) -> Self {
        Self {
            service: pattern.service.to_string(),
            instance_type: pattern.instance_type.clone(),
            region: pattern.region.clone(),
            consistency: format!("{:.1}%", pattern.consistency * 100.0),
            average_daily_hours: format!("{:.1}", pattern.average_daily_hours),
            confidence: pattern.confidence.to_string(),
        }
    }
}

impl UntaggedRow {
    pub fn from_untagged(untagged: &UntaggedResources) -> Vec<Self> {
        let mut rows = Vec::new();
        for (kind, by_region) in [("Instance", &untagged.instances), ("Volume", &untagged.volumes)] {
            for (region, ids) in by_region {
                rows.extend(ids.iter().map(|id| Self {
                    kind: kind.to_string(),
                    region: region.clone(),
                    resource: id.clone(),
                }));
            }
        }
        rows
    }
}

impl WarningRow {
    pub fn from_warning(warning: &Warning) -> Self {
        let scope = match &warning.scope {
            WarningScope::Profile { profile } => profile.clone(),
            WarningScope::Region { profile, region } => format!("{}/{}", profile, region),
            WarningScope::Resource {
                profile,
                region,
                resource_id,
            } => format!("{}/{}/{}", profile, region, resource_id),
        };
        Self {
            scope,
            message: warning.message.clone(),
        }
    }
}

/// Anomalies only, per account.
#[derive(Debug, Serialize)]
pub struct AnomalyListing<'a> {
    pub as_of: chrono::NaiveDate,
    pub accounts: Vec<AccountAnomalies<'a>>,
}

#[derive(Debug, Serialize)]
pub struct AccountAnomalies<'a> {
    pub label: &'a str,
    pub anomalies: &'a AnomalyReport,
    pub warnings: &'a [Warning],
}

impl<'a> AnomalyListing<'a> {
    pub fn from_report(report: &'a EngineReport) -> Self {
        Self {
            as_of: report.as_of,
            accounts: report
                .accounts
                .iter()
                .map(|a| AccountAnomalies {
                    label: &a.label,
                    anomalies: &a.anomalies,
                    warnings: &a.warnings,
                })
                .collect(),
        }
    }
}

/// Recommendations and usage patterns only, per account.
#[derive(Debug, Serialize)]
pub struct OptimizationListing<'a> {
    pub as_of: chrono::NaiveDate,
    pub accounts: Vec<AccountOptimization<'a>>,
}

#[derive(Debug, Serialize)]
pub struct AccountOptimization<'a> {
    pub label: &'a str,
    pub optimization: &'a OptimizationReport,
    pub usage_patterns: &'a [UsagePattern],
    pub warnings: &'a [Warning],
}

impl<'a> OptimizationListing<'a> {
    pub fn from_report(report: &'a EngineReport) -> Self {
        Self {
            as_of: report.as_of,
            accounts: report
                .accounts
                .iter()
                .map(|a| AccountOptimization {
                    label: &a.label,
                    optimization: &a.optimization,
                    usage_patterns: &a.usage_patterns,
                    warnings: &a.warnings,
                })
                .collect(),
        }
    }
}

impl OutputFormat for EngineReport {
    fn to_table(&self) -> String {
        if self.accounts.is_empty() {
            return "No accounts analysed.".to_string();
        }

        let mut sections = Vec::new();
        for account in &self.accounts {
            let mut out = account_header(account);
            out.push_str(&overview_section(account));
            out.push_str(&untagged_section(&account.untagged));
            out.push_str(&anomaly_section(&account.anomalies));
            out.push_str(&optimization_section(&account.optimization));
            out.push_str(&warning_section(&account.warnings));
            sections.push(out);
        }
        sections.join("\n")
    }

    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl OutputFormat for AnomalyListing<'_> {
    fn to_table(&self) -> String {
        if self.accounts.is_empty() {
            return "No accounts analysed.".to_string();
        }

        self.accounts
            .iter()
            .map(|a| {
                let mut out = format!("Account {}\n", a.label);
                out.push_str(&anomaly_section(a.anomalies));
                out.push_str(&warning_section(a.warnings));
                out
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl OutputFormat for OptimizationListing<'_> {
    fn to_table(&self) -> String {
        if self.accounts.is_empty() {
            return "No accounts analysed.".to_string();
        }

        self.accounts
            .iter()
            .map(|a| {
                let mut out = format!("Account {}\n", a.label);
                out.push_str(&optimization_section(a.optimization));
                if !a.usage_patterns.is_empty() {
                    let rows: Vec<PatternRow> =
                        a.usage_patterns.iter().map(PatternRow::from_pattern).collect();
                    out.push_str(&format!("\nUsage patterns\n{}\n", Table::new(rows)));
                }
                out.push_str(&warning_section(a.warnings));
                out
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn account_header(account: &AccountReport) -> String {
    format!(
        "Account {} (profiles: {})\n",
        account.label,
        account.profiles.join(", ")
    )
}

fn overview_section(account: &AccountReport) -> String {
    let overview = &account.overview;
    let change = overview
        .percent_change
        .map(|p| format!("{:+.1}%", p))
        .unwrap_or_else(|| "n/a".to_string());

    let mut out = format!(
        "{}: {}  |  {}: {}  |  Change: {}\n",
        overview.current_period_name,
        format_currency(overview.current_total),
        overview.previous_period_name,
        format_currency(overview.previous_total),
        change
    );

    let states: Vec<String> = overview
        .instance_states
        .iter()
        .map(|(state, count)| format!("{} {}", count, state))
        .collect();
    out.push_str(&format!("Instances: {}\n", states.join(", ")));

    for budget in &overview.budgets {
        let flag = if budget.over_limit {
            " (over limit)"
        } else if budget.forecast_over_limit {
            " (forecast over limit)"
        } else {
            ""
        };
        out.push_str(&format!(
            "Budget {}: {} of {}{}\n",
            budget.name,
            format_currency(budget.actual),
            format_currency(budget.limit),
            flag
        ));
    }

    if !overview.services.is_empty() {
        let rows: Vec<ServiceRow> = overview.services.iter().map(ServiceRow::from_service_cost).collect();
        out.push_str(&format!("{}\n", Table::new(rows)));
    }
    out
}

fn anomaly_section(report: &AnomalyReport) -> String {
    if report.anomalies.is_empty() {
        return "\nNo cost anomalies detected.\n".to_string();
    }
    let rows: Vec<AnomalyRow> = report.anomalies.iter().map(AnomalyRow::from_anomaly).collect();
    format!(
        "\nAnomalies ({} across {} services)\n{}\n",
        report.summary.total_anomalies,
        report.summary.services_with_anomalies,
        Table::new(rows)
    )
}

fn optimization_section(report: &OptimizationReport) -> String {
    if report.recommendations.is_empty() {
        return "\nNo optimization opportunities found.\n".to_string();
    }
    let rows: Vec<RecommendationRow> = report
        .recommendations
        .iter()
        .map(RecommendationRow::from_recommendation)
        .collect();
    format!(
        "\nRecommendations\n{}\nPotential savings: {}/month, {}/year\n",
        Table::new(rows),
        format_currency(report.summary.total_monthly),
        format_currency(report.summary.total_annual)
    )
}

fn untagged_section(untagged: &UntaggedResources) -> String {
    if untagged.is_empty() {
        return String::new();
    }
    let rows = UntaggedRow::from_untagged(untagged);
    format!("\nUntagged resources\n{}\n", Table::new(rows))
}

fn warning_section(warnings: &[Warning]) -> String {
    if warnings.is_empty() {
        return String::new();
    }
    let rows: Vec<WarningRow> = warnings.iter().map(WarningRow::from_warning).collect();
    format!("\nWarnings\n{}\n", Table::new(rows))
}

fn display_name(id: &str, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("{} ({})", name, id),
        _ => id.to_string(),
    }
}

fn term_label(term: CommitmentTerm) -> &'static str {
    match term {
        CommitmentTerm::OneYear => "1 year",
        CommitmentTerm::ThreeYears => "3 years",
    }
}

fn payment_label(option: PaymentOption) -> &'static str {
    match option {
        PaymentOption::NoUpfront => "no upfront",
        PaymentOption::PartialUpfront => "partial upfront",
        PaymentOption::AllUpfront => "all upfront",
    }
}

/// Format currency value with thousands separators and two decimals
pub fn format_currency(amount: f64) -> String {
    if amount == 0.0 {
        return "$0.00".to_string();
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{}", sign, grouped, cents)
}
