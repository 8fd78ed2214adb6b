//! Contract records and the timeline items derived from them.
//!
//! A contract contributes up to two timeline items: a point milestone on its
//! end date, and a notice bar covering the notice period that precedes it.
//! Every derived value is computed against an explicit `today` so that the
//! derivation is reproducible.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::debug;

use super::event::Metadata;
use super::source::SourceItem;

/// Days-left threshold under which an in-notice contract turns red.
pub const URGENT_NOTICE_DAYS: i64 = 30;

pub const COLOR_EXPIRED: &str = "#6B7280";
pub const COLOR_NOTICE_URGENT: &str = "#EF4444";
pub const COLOR_NOTICE: &str = "#F59E0B";
pub const COLOR_ACTIVE: &str = "#10B981";

/// Computed lifecycle status of a contract relative to a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    InNotice,
    Expired,
}

impl ContractStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::InNotice => "in_notice",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_status() -> String {
    "active".to_string()
}

/// A stored contract as exported by the contracts service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: String,
    pub name: String,
    pub supplier: String,
    pub amount: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notice_period_days: u32,
    #[serde(default)]
    pub sharepoint_file_url: Option<String>,
    /// Stored workflow status; distinct from [`ContractRecord::status_on`].
    #[serde(default = "default_status")]
    pub status: String,
}

impl ContractRecord {
    /// First day of the notice period, or `None` when it would fall before
    /// the earliest representable date.
    #[must_use]
    pub fn notice_start_date(&self) -> Option<NaiveDate> {
        self.end_date
            .checked_sub_signed(Duration::days(i64::from(self.notice_period_days)))
    }

    /// Days from `today` until the end date; negative once the contract ended.
    #[must_use]
    pub fn days_until_end(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days()
    }

    #[must_use]
    pub fn is_in_notice_period(&self, today: NaiveDate) -> bool {
        // An unrepresentable start means the notice period began before any date
        self.notice_start_date().is_none_or(|start| start <= today) && today <= self.end_date
    }

    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        today > self.end_date
    }

    #[must_use]
    pub fn status_on(&self, today: NaiveDate) -> ContractStatus {
        if self.is_expired(today) {
            ContractStatus::Expired
        } else if self.is_in_notice_period(today) {
            ContractStatus::InNotice
        } else {
            ContractStatus::Active
        }
    }

    /// Display colour for both derived items.
    #[must_use]
    pub fn timeline_color(&self, today: NaiveDate) -> &'static str {
        match self.status_on(today) {
            ContractStatus::Expired => COLOR_EXPIRED,
            ContractStatus::InNotice if self.days_until_end(today) <= URGENT_NOTICE_DAYS => {
                COLOR_NOTICE_URGENT
            }
            ContractStatus::InNotice => COLOR_NOTICE,
            ContractStatus::Active => COLOR_ACTIVE,
        }
    }

    /// Derive the timeline items for this contract.
    ///
    /// The milestone is always emitted. The notice bar is emitted while the
    /// contract is in notice or its notice period is still ahead.
    #[must_use]
    pub fn timeline_items(&self, today: NaiveDate) -> Vec<SourceItem> {
        let color = self.timeline_color(today);
        let end = self.end_date.to_string();

        let milestone = SourceItem::new(
            format!("contract-milestone-{}", self.id),
            format!("{} - End", self.name),
            end.clone(),
        )
        .with_kind("contract-milestone")
        .with_color(color)
        .with_metadata(
            Metadata::new()
                .with("contract_id", self.id.clone())
                .with("supplier", self.supplier.clone())
                .with("amount", self.amount)
                .with("sharepoint_url", json!(self.sharepoint_file_url)),
        );

        let mut items = vec![milestone];

        let Some(notice_start) = self.notice_start_date() else {
            debug!(contract = %self.id, "notice period out of date range, no notice bar");
            return items;
        };
        if self.is_in_notice_period(today) || notice_start >= today {
            items.push(
                SourceItem::new(
                    format!("contract-notice-{}", self.id),
                    format!("{} - Notice", self.name),
                    notice_start.to_string(),
                )
                .with_end(end)
                .with_kind("contract-notice")
                .with_color(color)
                .with_metadata(
                    Metadata::new()
                        .with("contract_id", self.id.clone())
                        .with("supplier", self.supplier.clone())
                        .with("notice_days", self.notice_period_days),
                ),
            );
        }

        items
    }
}

/// Derive timeline items for a batch of contracts, milestones first per contract.
#[must_use]
pub fn contract_timeline(contracts: &[ContractRecord], today: NaiveDate) -> Vec<SourceItem> {
    contracts
        .iter()
        .flat_map(|contract| contract.timeline_items(today))
        .collect()
}
