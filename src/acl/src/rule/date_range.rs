//! Date range rule

use super::{AccessRule, RuleEffect, RuleMeta};
use crate::error::{AclError, Result};
use crate::predicate::{CompareOp, Predicate};
use crate::types::{Principal, Resource};
use crate::value::{parse_datetime, to_datetime, FILTER_DATETIME_FORMAT};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

fn default_date_column() -> String {
    "created_at".to_string()
}

/// Settings of a date range rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRangeSettings {
    /// Inclusive lower bound; snaps to the start of its day
    #[serde(default)]
    pub from: Option<String>,

    /// Inclusive upper bound; snaps to the end of its day
    #[serde(default)]
    pub to: Option<String>,

    /// Resource field holding the date
    #[serde(default = "default_date_column")]
    pub date_column: String,
}

impl Default for DateRangeSettings {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            date_column: default_date_column(),
        }
    }
}

/// Rule restricting access to resources dated within `[from, to]`
#[derive(Debug, Clone)]
pub struct DateRangeRule {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    date_column: String,
    meta: RuleMeta,
}

fn parse_bound(raw: &str, time: NaiveTime) -> Result<DateTime<Utc>> {
    let parsed = parse_datetime(raw)
        .ok_or_else(|| AclError::RuleInstantiation(format!("Invalid date bound '{}'", raw)))?;

    Ok(Utc.from_utc_datetime(&parsed.date_naive().and_time(time)))
}

impl DateRangeRule {
    /// Rule over `date_column`; either bound may be open
    pub fn new(from: Option<&str>, to: Option<&str>, date_column: impl Into<String>) -> Result<Self> {
        Self::from_settings(
            DateRangeSettings {
                from: from.map(str::to_string),
                to: to.map(str::to_string),
                date_column: date_column.into(),
            },
            RuleMeta::default(),
        )
    }

    /// Build from typed settings; an unparseable bound is an instantiation error
    pub fn from_settings(settings: DateRangeSettings, meta: RuleMeta) -> Result<Self> {
        let (Some(start_of_day), Some(end_of_day)) = (
            NaiveTime::from_hms_opt(0, 0, 0),
            NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999),
        ) else {
            return Err(AclError::Internal("invalid day boundary".to_string()));
        };

        let from = settings
            .from
            .as_deref()
            .map(|raw| parse_bound(raw, start_of_day))
            .transpose()?;
        let to = settings
            .to
            .as_deref()
            .map(|raw| parse_bound(raw, end_of_day))
            .transpose()?;

        Ok(Self {
            from,
            to,
            date_column: settings.date_column,
            meta,
        })
    }

    /// Set priority and effect
    pub fn with_meta(mut self, meta: RuleMeta) -> Self {
        self.meta = meta;
        self
    }

    fn format(bound: &DateTime<Utc>) -> String {
        bound.format(FILTER_DATETIME_FORMAT).to_string()
    }
}

impl AccessRule for DateRangeRule {
    fn passes(&self, _principal: &Principal, resource: &Resource) -> Result<bool> {
        if self.from.is_none() && self.to.is_none() {
            return Ok(true);
        }

        let date = resource
            .attribute(&self.date_column)
            .and_then(to_datetime)
            .ok_or_else(|| {
                AclError::Evaluation(format!(
                    "Resource field '{}' is missing or not a date",
                    self.date_column
                ))
            })?;

        let after_start = self.from.map_or(true, |from| date >= from);
        let before_end = self.to.map_or(true, |to| date <= to);

        Ok(after_start && before_end)
    }

    fn filter(&self, _principal: &Principal) -> Result<Predicate> {
        let column = self.date_column.as_str();

        Ok(match (&self.from, &self.to) {
            (Some(from), Some(to)) => Predicate::between(column, Self::format(from), Self::format(to)),
            (Some(from), None) => Predicate::compare(column, CompareOp::Ge, Self::format(from)),
            (None, Some(to)) => Predicate::compare(column, CompareOp::Le, Self::format(to)),
            (None, None) => Predicate::True,
        })
    }

    fn priority(&self) -> i32 {
        self.meta.priority
    }

    fn effect(&self) -> RuleEffect {
        self.meta.effect
    }
}
