// ABOUTME: Defines ShareRecord and the public-safe projections derived from it.
// ABOUTME: Also holds share scope, validity window, and pagination types.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ShareError;

/// Which API definitions a share exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "range", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareScope {
    /// Every definition in the project.
    #[default]
    All,
    /// Definitions under any of the listed modules, descendants included.
    Modules { module_ids: BTreeSet<String> },
    /// Definitions whose request path matches the value.
    Path { symbol: MatchSymbol, value: String },
    /// Definitions carrying the tag.
    Tag { value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchSymbol {
    Equals,
    Contains,
}

/// Unit for a share's validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidUnit {
    Hour,
    Day,
    Month,
    Year,
}

impl InvalidUnit {
    fn hours(self) -> u32 {
        match self {
            Self::Hour => 1,
            Self::Day => 24,
            Self::Month => 24 * 30,
            Self::Year => 24 * 365,
        }
    }

    /// Largest `invalid_time` accepted for this unit.
    pub fn max_time(self) -> u32 {
        MAX_VALIDITY_HOURS / self.hours()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Month => "MONTH",
            Self::Year => "YEAR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "HOUR" => Some(Self::Hour),
            "DAY" => Some(Self::Day),
            "MONTH" => Some(Self::Month),
            "YEAR" => Some(Self::Year),
            _ => None,
        }
    }
}

/// Longest validity window a share may carry: one hundred years, in hours.
pub const MAX_VALIDITY_HOURS: u32 = 24 * 365 * 100;

/// How long a share stays readable after it was last saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub invalid_time: u32,
    pub invalid_unit: InvalidUnit,
}

impl Validity {
    /// Reject empty windows and windows longer than [`MAX_VALIDITY_HOURS`].
    pub fn validate(&self) -> Result<(), ShareError> {
        if self.invalid_time == 0 {
            return Err(ShareError::validation("invalid_time must be positive"));
        }
        let max = self.invalid_unit.max_time();
        if self.invalid_time > max {
            return Err(ShareError::validation(format!(
                "invalid_time must be at most {} for unit {}",
                max,
                self.invalid_unit.as_str()
            )));
        }
        Ok(())
    }

    /// The instant at which a share saved at `saved_at` stops being readable.
    /// Expiry instants are stored as four-digit-year text, so anything past
    /// year 9999 is refused.
    pub fn expires_from(&self, saved_at: DateTime<Utc>) -> Result<DateTime<Utc>, ShareError> {
        self.validate()?;
        TimeDelta::try_hours(i64::from(self.invalid_time) * i64::from(self.invalid_unit.hours()))
            .and_then(|window| saved_at.checked_add_signed(window))
            .filter(|at| at.year() <= 9999)
            .ok_or_else(|| ShareError::validation("validity window ends after year 9999"))
    }
}

/// A persisted share. Never serialized directly: callers only ever see
/// [`ShareSummary`] or [`ShareDetail`], neither of which carries the hash.
#[derive(Clone, PartialEq)]
pub struct ShareRecord {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub scope: ShareScope,
    pub password_hash: Option<String>,
    pub validity: Option<Validity>,
    pub expires_at: Option<DateTime<Utc>>,
    pub allow_export: bool,
    pub creator_id: String,
    pub update_user: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl fmt::Debug for ShareRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareRecord")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("is_private", &self.is_private())
            .field("validity", &self.validity)
            .field("expires_at", &self.expires_at)
            .field("allow_export", &self.allow_export)
            .field("creator_id", &self.creator_id)
            .field("update_time", &self.update_time)
            .finish()
    }
}

impl ShareRecord {
    pub fn is_private(&self) -> bool {
        self.password_hash.is_some()
    }

    /// True once the validity window has elapsed at `now`.
    pub fn is_invalid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> ShareSummary {
        ShareSummary {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            name: self.name.clone(),
            scope: self.scope.clone(),
            is_private: self.is_private(),
            validity: self.validity,
            expires_at: self.expires_at,
            invalid: self.is_invalid_at(now),
            allow_export: self.allow_export,
            create_user: self.creator_id.clone(),
            update_user: self.update_user.clone(),
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }

    pub fn detail(&self, now: DateTime<Utc>) -> ShareDetail {
        ShareDetail {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            name: self.name.clone(),
            is_private: self.is_private(),
            allow_export: self.allow_export,
            invalid: self.is_invalid_at(now),
            expires_at: self.expires_at,
        }
    }
}

/// Fields supplied when creating a share. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct ShareDraft {
    pub project_id: String,
    pub name: String,
    pub scope: ShareScope,
    pub password_hash: Option<String>,
    pub validity: Option<Validity>,
    pub allow_export: bool,
    pub creator_id: String,
}

/// Management-list projection of a share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSummary {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub scope: ShareScope,
    pub is_private: bool,
    pub validity: Option<Validity>,
    pub expires_at: Option<DateTime<Utc>>,
    pub invalid: bool,
    pub allow_export: bool,
    pub create_user: String,
    pub update_user: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// What an anonymous viewer may learn about a share before unlocking it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareDetail {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub is_private: bool,
    pub allow_export: bool,
    pub invalid: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Filter for listing shares of one project.
#[derive(Debug, Clone, Default)]
pub struct ShareFilter {
    pub project_id: String,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CreateTime,
    UpdateTime,
    Name,
}

impl SortColumn {
    pub fn column_name(self) -> &'static str {
        match self {
            Self::CreateTime => "create_time",
            Self::UpdateTime => "update_time",
            Self::Name => "name",
        }
    }
}

/// Parsed `"<column> <asc|desc>"` sort expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub column: SortColumn,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            column: SortColumn::CreateTime,
            descending: true,
        }
    }
}

impl SortOrder {
    /// Parse a sort expression. Blank input yields the default
    /// `create_time desc`; unknown columns or directions yield None.
    pub fn parse(expr: &str) -> Option<Self> {
        let mut parts = expr.split_whitespace();
        let Some(column) = parts.next() else {
            return Some(Self::default());
        };
        let column = match column.to_ascii_lowercase().as_str() {
            "create_time" | "createtime" => SortColumn::CreateTime,
            "update_time" | "updatetime" => SortColumn::UpdateTime,
            "name" => SortColumn::Name,
            _ => return None,
        };
        let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(_) => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { column, descending })
    }
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub current: u32,
    pub page_size: u32,
    pub sort: SortOrder,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.current.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub current: u32,
    pub page_size: u32,
    pub total: u64,
    pub list: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            current: self.current,
            page_size: self.page_size,
            total: self.total,
            list: self.list.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(password_hash: Option<&str>) -> ShareRecord {
        let now = Utc::now();
        ShareRecord {
            id: "share-1".to_string(),
            project_id: "project-1".to_string(),
            name: "Public docs".to_string(),
            scope: ShareScope::All,
            password_hash: password_hash.map(str::to_string),
            validity: None,
            expires_at: None,
            allow_export: true,
            creator_id: "alice".to_string(),
            update_user: "alice".to_string(),
            create_time: now,
            update_time: now,
        }
    }

    #[test]
    fn detail_never_serializes_password_hash() {
        for hash in [None, Some("sha256$00$11")] {
            let share = record(hash);
            let json = serde_json::to_value(share.detail(Utc::now())).unwrap();
            let text = json.to_string();
            assert!(json.get("password_hash").is_none());
            assert!(!text.contains("sha256$"));
            assert_eq!(json["is_private"], hash.is_some());
        }
    }

    #[test]
    fn debug_output_redacts_hash() {
        let share = record(Some("sha256$abcd$ef01"));
        let debug = format!("{:?}", share);
        assert!(!debug.contains("abcd"));
        assert!(debug.contains("is_private: true"));
    }

    #[test]
    fn validity_window_marks_share_invalid() {
        let mut share = record(None);
        let validity = Validity {
            invalid_time: 2,
            invalid_unit: InvalidUnit::Day,
        };
        share.validity = Some(validity);
        share.expires_at = Some(validity.expires_from(share.update_time).unwrap());

        assert!(!share.is_invalid_at(share.update_time + TimeDelta::hours(47)));
        assert!(share.is_invalid_at(share.update_time + TimeDelta::hours(48)));
    }

    #[test]
    fn validity_windows_are_capped_per_unit() {
        let saved_at = Utc::now();
        for unit in [
            InvalidUnit::Hour,
            InvalidUnit::Day,
            InvalidUnit::Month,
            InvalidUnit::Year,
        ] {
            let longest = Validity {
                invalid_time: unit.max_time(),
                invalid_unit: unit,
            };
            let expires = longest.expires_from(saved_at).unwrap();
            assert!(expires.year() <= 9999);

            for invalid_time in [unit.max_time() + 1, u32::MAX] {
                let err = Validity {
                    invalid_time,
                    invalid_unit: unit,
                }
                .expires_from(saved_at)
                .unwrap_err();
                assert!(matches!(err, ShareError::Validation(_)), "{unit:?} {invalid_time}");
            }
        }

        let empty = Validity {
            invalid_time: 0,
            invalid_unit: InvalidUnit::Day,
        };
        assert!(matches!(empty.validate(), Err(ShareError::Validation(_))));
    }

    #[test]
    fn expiry_past_year_9999_is_refused() {
        let late = DateTime::parse_from_rfc3339("9990-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let validity = Validity {
            invalid_time: 20,
            invalid_unit: InvalidUnit::Year,
        };
        let err = validity.expires_from(late).unwrap_err();
        assert!(matches!(err, ShareError::Validation(_)));
    }

    #[test]
    fn share_without_validity_never_expires() {
        let share = record(None);
        assert!(!share.is_invalid_at(Utc::now() + TimeDelta::days(10_000)));
    }

    #[test]
    fn sort_order_parses_expressions() {
        assert_eq!(SortOrder::parse("").unwrap(), SortOrder::default());
        assert_eq!(
            SortOrder::parse("name asc").unwrap(),
            SortOrder {
                column: SortColumn::Name,
                descending: false
            }
        );
        assert!(SortOrder::parse("update_time DESC").unwrap().descending);
        assert!(SortOrder::parse("password desc").is_none());
        assert!(SortOrder::parse("name sideways").is_none());
        assert!(SortOrder::parse("name asc; drop table").is_none());
    }

    #[test]
    fn scope_serializes_with_range_tag() {
        let scope = ShareScope::Modules {
            module_ids: ["m1".to_string()].into_iter().collect(),
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["range"], "MODULES");
        assert_eq!(json["module_ids"][0], "m1");

        let parsed: ShareScope =
            serde_json::from_str(r#"{"range":"PATH","symbol":"CONTAINS","value":"/pets"}"#).unwrap();
        assert_eq!(
            parsed,
            ShareScope::Path {
                symbol: MatchSymbol::Contains,
                value: "/pets".to_string()
            }
        );
    }
}
