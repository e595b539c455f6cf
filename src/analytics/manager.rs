/// Analytics manager using runtime queries
use crate::{
    aggregates,
    analytics::{
        AnalyticsPeriod, ClickOutcome, ClickSummary, CountryViews, DailyViews, SourceViews,
        ToolAnalytics, TrackClickRequest, TrackViewRequest, ViewOutcome, Visitor,
    },
    auth::AuthUser,
    cache::InvalidationCoordinator,
    db::{
        self,
        analytics::{ClickType, TrafficSource, CLICK_TYPES},
    },
    error::{MarketError, MarketResult},
    metrics,
};
use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Maximum countries in an analytics report
const TOP_COUNTRIES: i64 = 10;

/// Analytics manager service
pub struct AnalyticsManager {
    db: SqlitePool,
    invalidation: InvalidationCoordinator,
}

impl AnalyticsManager {
    pub fn new(db: SqlitePool, invalidation: InvalidationCoordinator) -> Self {
        Self { db, invalidation }
    }

    /// Slug of the tracked tool; `None` when the lookup itself failed
    async fn tracked_slug(&self, kind: &str, tool_id: &str) -> MarketResult<Option<String>> {
        let slug: Option<String> = match sqlx::query_scalar("SELECT slug FROM tools WHERE id = ?1")
            .bind(tool_id)
            .fetch_optional(&self.db)
            .await
        {
            Ok(slug) => slug,
            Err(e) => {
                warn!("Tool lookup for {} tracking on {} failed: {}", kind, tool_id, e);
                metrics::record_analytics_event(kind, false);
                return Ok(None);
            }
        };

        slug.map(Some)
            .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))
    }

    /// Record a view; unknown tools are NotFound, anything else that goes
    /// wrong is logged and answered with a neutral response
    pub async fn track_view(
        &self,
        tool_id: &str,
        visitor: &Visitor,
        request: TrackViewRequest,
    ) -> MarketResult<ViewOutcome> {
        let Some(slug) = self.tracked_slug("view", tool_id).await? else {
            return Ok(ViewOutcome::processed());
        };

        match self.record_view(tool_id, visitor, &request).await {
            Ok(true) => {
                metrics::record_analytics_event("view", true);
                self.invalidation.view_recorded(tool_id, &slug).await;
                Ok(ViewOutcome {
                    message: "View tracked successfully".to_string(),
                    is_new_view: true,
                })
            }
            Ok(false) => {
                metrics::record_analytics_event("view", true);
                Ok(ViewOutcome {
                    message: "View updated".to_string(),
                    is_new_view: false,
                })
            }
            Err(e) => {
                warn!("View tracking failed for tool {}: {}", tool_id, e);
                metrics::record_analytics_event("view", false);
                Ok(ViewOutcome::processed())
            }
        }
    }

    /// Returns true when this session had not viewed the tool before
    async fn record_view(
        &self,
        tool_id: &str,
        visitor: &Visitor,
        request: &TrackViewRequest,
    ) -> MarketResult<bool> {
        let now = Utc::now();
        let stamp = db::timestamp(now);
        let session_id = visitor.session_id(now);
        let duration = request.duration.unwrap_or(0).max(0);
        let source = request
            .source
            .as_deref()
            .and_then(|s| TrafficSource::parse(s).ok())
            .unwrap_or_default();

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO tool_views (id, tool_id, user_id, session_id, ip_address, user_agent,
                 view_duration, source, country, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT (session_id, tool_id) DO NOTHING",
        )
        .bind(db::new_id())
        .bind(tool_id)
        .bind(visitor.user.as_ref().map(|u| u.user_id.as_str()))
        .bind(&session_id)
        .bind(&visitor.ip)
        .bind(&visitor.user_agent)
        .bind(duration)
        .bind(source.as_str())
        .bind(&visitor.country)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            aggregates::recompute_views(&mut *tx, tool_id, now).await?;
        } else {
            sqlx::query(
                "UPDATE tool_views SET view_duration = MAX(view_duration, ?3), updated_at = ?4
                 WHERE session_id = ?1 AND tool_id = ?2",
            )
            .bind(&session_id)
            .bind(tool_id)
            .bind(duration)
            .bind(&stamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "View on {} from session {} ({})",
            tool_id,
            session_id,
            if inserted { "new" } else { "repeat" }
        );
        Ok(inserted)
    }

    /// Record an outbound click; every click is kept
    pub async fn track_click(
        &self,
        tool_id: &str,
        visitor: &Visitor,
        request: TrackClickRequest,
    ) -> MarketResult<ClickOutcome> {
        if self.tracked_slug("click", tool_id).await?.is_none() {
            return Ok(ClickOutcome::processed());
        }

        let now = Utc::now();
        let click_type = request
            .click_type
            .as_deref()
            .and_then(|s| ClickType::parse(s).ok())
            .unwrap_or_default();
        let source = request
            .source
            .as_deref()
            .and_then(|s| TrafficSource::parse(s).ok())
            .unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO clicks (id, tool_id, user_id, session_id, ip_address, user_agent,
                 click_type, source, country, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(db::new_id())
        .bind(tool_id)
        .bind(visitor.user.as_ref().map(|u| u.user_id.as_str()))
        .bind(visitor.session_id(now))
        .bind(&visitor.ip)
        .bind(&visitor.user_agent)
        .bind(click_type.as_str())
        .bind(source.as_str())
        .bind(&visitor.country)
        .bind(db::timestamp(now))
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => {
                metrics::record_analytics_event("click", true);
                Ok(ClickOutcome {
                    message: "Click tracked successfully".to_string(),
                    tracked: true,
                })
            }
            Err(e) => {
                warn!("Click tracking failed for tool {}: {}", tool_id, e);
                metrics::record_analytics_event("click", false);
                Ok(ClickOutcome::processed())
            }
        }
    }

    /// Analytics report for the tool owner or an admin
    pub async fn report(
        &self,
        actor: &AuthUser,
        tool_id: &str,
        period: AnalyticsPeriod,
    ) -> MarketResult<ToolAnalytics> {
        let tool = sqlx::query(
            "SELECT submitted_by, total_views, unique_views, weekly_views, monthly_views,
                 last_viewed_at
             FROM tools WHERE id = ?1",
        )
        .bind(tool_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))?;

        if tool.get::<String, _>("submitted_by") != actor.user_id && !actor.is_admin() {
            return Err(MarketError::Forbidden(
                "Not authorized to view analytics".to_string(),
            ));
        }

        let since = db::timestamp(Utc::now() - Duration::days(period.days()));

        let mut sources: BTreeMap<String, Vec<SourceViews>> = BTreeMap::new();
        let source_rows = sqlx::query(
            "SELECT substr(created_at, 1, 10) AS day, source, COUNT(*) AS views
             FROM tool_views WHERE tool_id = ?1 AND created_at >= ?2
             GROUP BY day, source ORDER BY day ASC, source ASC",
        )
        .bind(tool_id)
        .bind(&since)
        .fetch_all(&self.db)
        .await?;
        for row in source_rows {
            sources
                .entry(row.get("day"))
                .or_default()
                .push(SourceViews {
                    source: row.get("source"),
                    views: row.get("views"),
                });
        }

        let daily_breakdown: Vec<DailyViews> = sqlx::query(
            "SELECT substr(created_at, 1, 10) AS day, COUNT(*) AS views,
                 COUNT(DISTINCT session_id) AS unique_views,
                 AVG(view_duration) AS avg_duration
             FROM tool_views WHERE tool_id = ?1 AND created_at >= ?2
             GROUP BY day ORDER BY day ASC",
        )
        .bind(tool_id)
        .bind(&since)
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(|row| {
            let date: String = row.get("day");
            DailyViews {
                sources: sources.remove(&date).unwrap_or_default(),
                views: row.get("views"),
                unique_views: row.get("unique_views"),
                avg_duration: row.get::<Option<f64>, _>("avg_duration").unwrap_or(0.0),
                date,
            }
        })
        .collect();

        let top_countries = sqlx::query(
            "SELECT country, COUNT(*) AS views FROM tool_views
             WHERE tool_id = ?1 AND created_at >= ?2
             GROUP BY country ORDER BY views DESC, country ASC LIMIT ?3",
        )
        .bind(tool_id)
        .bind(&since)
        .bind(TOP_COUNTRIES)
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(|row| CountryViews {
            country: row.get("country"),
            views: row.get("views"),
        })
        .collect();

        let mut by_type: BTreeMap<String, i64> = CLICK_TYPES
            .iter()
            .map(|t| (t.as_str().to_string(), 0))
            .collect();
        let click_rows = sqlx::query(
            "SELECT click_type, COUNT(*) AS clicks FROM clicks
             WHERE tool_id = ?1 AND created_at >= ?2 GROUP BY click_type",
        )
        .bind(tool_id)
        .bind(&since)
        .fetch_all(&self.db)
        .await?;
        for row in click_rows {
            by_type.insert(row.get("click_type"), row.get("clicks"));
        }

        Ok(ToolAnalytics {
            period: period.as_str().to_string(),
            total_views: tool.get("total_views"),
            unique_views: tool.get("unique_views"),
            weekly_views: tool.get("weekly_views"),
            monthly_views: tool.get("monthly_views"),
            period_views: daily_breakdown.iter().map(|d| d.views).sum(),
            daily_breakdown,
            top_countries,
            clicks: ClickSummary {
                total: by_type.values().sum(),
                by_type,
            },
            last_updated: db::parse_optional_timestamp(tool.get("last_viewed_at"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{keys, tests::settings, Cache};
    use crate::db::user::Role;

    struct Fixture {
        analytics: AnalyticsManager,
        cache: Cache,
        pool: SqlitePool,
    }

    async fn fixture() -> Fixture {
        let pool = db::create_memory_pool().await.unwrap();
        let cache = Cache::in_memory(settings());
        let analytics = AnalyticsManager::new(pool.clone(), InvalidationCoordinator::new(cache.clone()));

        let now = db::timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO users (id, company_name, email, password_hash, created_at, updated_at)
             VALUES ('owner', 'Co', 'owner@example.com', 'x', ?1, ?1)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO tools (id, name, slug, tagline, description, website_url, status,
                 submitted_by, created_at, updated_at)
             VALUES ('t1', 'Tool', 'tool', 'x', 'x', 'https://x.io', 'approved', 'owner', ?1, ?1)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        Fixture {
            analytics,
            cache,
            pool,
        }
    }

    fn member(id: &str, role: Role) -> AuthUser {
        AuthUser {
            user_id: id.to_string(),
            role,
        }
    }

    fn visitor(user: Option<AuthUser>, country: &str) -> Visitor {
        Visitor {
            user,
            ip: "198.51.100.7".to_string(),
            user_agent: "test-agent".to_string(),
            country: country.to_string(),
        }
    }

    fn view(duration: i64, source: &str) -> TrackViewRequest {
        TrackViewRequest {
            duration: Some(duration),
            source: Some(source.to_string()),
        }
    }

    async fn stored_duration(pool: &SqlitePool, session: &str) -> i64 {
        sqlx::query_scalar("SELECT view_duration FROM tool_views WHERE session_id = ?1")
            .bind(session)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_repeat_view_only_raises_duration() {
        let f = fixture().await;
        let reader = visitor(Some(member("reader", Role::User)), "DE");

        let first = f.analytics.track_view("t1", &reader, view(10, "search")).await.unwrap();
        assert!(first.is_new_view);

        let repeat = f.analytics.track_view("t1", &reader, view(30, "search")).await.unwrap();
        assert!(!repeat.is_new_view);
        assert_eq!(stored_duration(&f.pool, "reader").await, 30);

        f.analytics.track_view("t1", &reader, view(5, "search")).await.unwrap();
        assert_eq!(stored_duration(&f.pool, "reader").await, 30);

        let (total, unique): (i64, i64) =
            sqlx::query_as("SELECT total_views, unique_views FROM tools WHERE id = 't1'")
                .fetch_one(&f.pool)
                .await
                .unwrap();
        assert_eq!((total, unique), (1, 1));
    }

    #[tokio::test]
    async fn test_tracking_survives_store_failure() {
        let f = fixture().await;
        let reader = visitor(None, "US");

        assert!(matches!(
            f.analytics.track_view("missing", &reader, view(1, "direct")).await,
            Err(MarketError::NotFound(_))
        ));

        f.pool.close().await;

        let viewed = f.analytics.track_view("t1", &reader, view(1, "direct")).await.unwrap();
        assert_eq!(viewed, ViewOutcome::processed());
        let clicked = f
            .analytics
            .track_click("t1", &reader, TrackClickRequest::default())
            .await
            .unwrap();
        assert_eq!(clicked, ClickOutcome::processed());
    }

    #[tokio::test]
    async fn test_new_view_invalidates_tool_cache() {
        let f = fixture().await;
        f.cache.put_json(&keys::tool_by_id("t1"), &"cached", 60).await;
        f.cache.put_json(keys::ALL_TOOLS, &"cached", 60).await;

        f.analytics
            .track_view("t1", &visitor(None, "FR"), TrackViewRequest::default())
            .await
            .unwrap();

        assert!(f.cache.get_json::<String>("tool", &keys::tool_by_id("t1")).await.is_none());
        assert!(f.cache.get_json::<String>("tool_list", keys::ALL_TOOLS).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            f.analytics
                .track_view("missing", &visitor(None, "FR"), TrackViewRequest::default())
                .await,
            Err(MarketError::NotFound(_))
        ));
        assert!(matches!(
            f.analytics
                .track_click("missing", &visitor(None, "FR"), TrackClickRequest::default())
                .await,
            Err(MarketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_report_aggregates_views_and_clicks() {
        let f = fixture().await;
        for (i, (country, source)) in [("US", "search"), ("US", "direct"), ("DE", "search")]
            .iter()
            .enumerate()
        {
            let v = visitor(Some(member(&format!("u{}", i), Role::User)), country);
            f.analytics.track_view("t1", &v, view(20, source)).await.unwrap();
        }

        let clicker = visitor(None, "US");
        for click_type in ["website", "website", "app_store"] {
            f.analytics
                .track_click(
                    "t1",
                    &clicker,
                    TrackClickRequest {
                        click_type: Some(click_type.to_string()),
                        source: None,
                    },
                )
                .await
                .unwrap();
        }

        let report = f
            .analytics
            .report(&member("owner", Role::User), "t1", AnalyticsPeriod::SevenDays)
            .await
            .unwrap();

        assert_eq!(report.period, "7d");
        assert_eq!(report.total_views, 3);
        assert_eq!(report.period_views, 3);
        assert_eq!(report.daily_breakdown.len(), 1);
        let today = &report.daily_breakdown[0];
        assert_eq!(today.unique_views, 3);
        assert_eq!(today.avg_duration, 20.0);
        let search = today.sources.iter().find(|s| s.source == "search").unwrap();
        assert_eq!(search.views, 2);

        assert_eq!(report.top_countries[0].country, "US");
        assert_eq!(report.top_countries[0].views, 2);

        assert_eq!(report.clicks.total, 3);
        assert_eq!(report.clicks.by_type["website"], 2);
        assert_eq!(report.clicks.by_type["google_play"], 0);
        assert!(report.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_report_requires_owner_or_admin() {
        let f = fixture().await;

        assert!(matches!(
            f.analytics
                .report(&member("someone", Role::User), "t1", AnalyticsPeriod::default())
                .await,
            Err(MarketError::Forbidden(_))
        ));
        assert!(f
            .analytics
            .report(&member("boss", Role::Admin), "t1", AnalyticsPeriod::default())
            .await
            .is_ok());
    }
}
