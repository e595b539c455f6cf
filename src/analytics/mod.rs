/// View and click tracking plus per-tool analytics reports

mod manager;

pub use manager::AnalyticsManager;

use crate::auth::AuthUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Request metadata identifying a visitor
#[derive(Debug, Clone)]
pub struct Visitor {
    pub user: Option<AuthUser>,
    pub ip: String,
    pub user_agent: String,
    pub country: String,
}

impl Visitor {
    /// Signed-in users are their own session; anonymous visitors get a
    /// hash of their request metadata
    pub fn session_id(&self, at: DateTime<Utc>) -> String {
        match &self.user {
            Some(user) => user.user_id.clone(),
            None => anonymous_session(&self.ip, &self.user_agent, at),
        }
    }
}

/// sha256(ip + user agent + millisecond timestamp), first 32 hex chars
pub fn anonymous_session(ip: &str, user_agent: &str, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(user_agent.as_bytes());
    hasher.update(at.timestamp_millis().to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackViewRequest {
    /// Seconds spent on the page
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackClickRequest {
    #[serde(default)]
    pub click_type: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOutcome {
    pub message: String,
    pub is_new_view: bool,
}

impl ViewOutcome {
    /// Response used when tracking failed internally
    pub fn processed() -> Self {
        Self {
            message: "Request processed".to_string(),
            is_new_view: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickOutcome {
    pub message: String,
    pub tracked: bool,
}

impl ClickOutcome {
    /// Neutral answer when a click could not be recorded
    pub fn processed() -> Self {
        Self {
            message: "Request processed".to_string(),
            tracked: false,
        }
    }
}

/// Reporting window for analytics reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyticsPeriod {
    SevenDays,
    #[default]
    ThirtyDays,
    NinetyDays,
}

impl AnalyticsPeriod {
    /// Unknown values fall back to 30 days
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("7d") => AnalyticsPeriod::SevenDays,
            Some("90d") => AnalyticsPeriod::NinetyDays,
            _ => AnalyticsPeriod::ThirtyDays,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsPeriod::SevenDays => "7d",
            AnalyticsPeriod::ThirtyDays => "30d",
            AnalyticsPeriod::NinetyDays => "90d",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            AnalyticsPeriod::SevenDays => 7,
            AnalyticsPeriod::ThirtyDays => 30,
            AnalyticsPeriod::NinetyDays => 90,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceViews {
    pub source: String,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyViews {
    /// YYYY-MM-DD, UTC
    pub date: String,
    pub views: i64,
    pub unique_views: i64,
    pub avg_duration: f64,
    pub sources: Vec<SourceViews>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryViews {
    pub country: String,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickSummary {
    pub total: i64,
    pub by_type: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnalytics {
    pub period: String,
    pub total_views: i64,
    pub unique_views: i64,
    pub weekly_views: i64,
    pub monthly_views: i64,
    pub period_views: i64,
    pub daily_breakdown: Vec<DailyViews>,
    pub top_countries: Vec<CountryViews>,
    pub clicks: ClickSummary,
    pub last_updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::user::Role;
    use chrono::TimeZone;

    #[test]
    fn test_session_ids() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let anon = Visitor {
            user: None,
            ip: "203.0.113.9".to_string(),
            user_agent: "curl/8".to_string(),
            country: "Unknown".to_string(),
        };

        let session = anon.session_id(at);
        assert_eq!(session.len(), 32);
        assert!(session.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(session, anonymous_session("203.0.113.9", "curl/8", at));
        assert_ne!(session, anon.session_id(at + chrono::Duration::milliseconds(1)));

        let signed_in = Visitor {
            user: Some(AuthUser {
                user_id: "u1".to_string(),
                role: Role::User,
            }),
            ..anon
        };
        assert_eq!(signed_in.session_id(at), "u1");
    }

    #[test]
    fn test_period_parse() {
        assert_eq!(AnalyticsPeriod::parse(Some("7d")).days(), 7);
        assert_eq!(AnalyticsPeriod::parse(Some("90d")).as_str(), "90d");
        assert_eq!(AnalyticsPeriod::parse(Some("1y")), AnalyticsPeriod::ThirtyDays);
        assert_eq!(AnalyticsPeriod::parse(None), AnalyticsPeriod::ThirtyDays);
    }
}
