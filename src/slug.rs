/// Human-readable unique identifiers for tools
use crate::error::{MarketError, MarketResult};
use sqlx::SqlitePool;

/// Candidates tried per assignment: the bare base plus numbered suffixes
pub const MAX_SLUG_ATTEMPTS: u32 = 100;

/// Base used when a name has no slug-able characters
const FALLBACK_BASE: &str = "tool";

/// Normalize a tool name into a URL-safe slug base
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut pending_dash = false;

    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_dash = true;
        }
        // everything else is dropped without separating words
    }

    if slug.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        slug
    }
}

/// Candidate for a given attempt: `base`, `base-1`, `base-2`, ...
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

/// Picks slugs that no other tool holds
#[derive(Clone)]
pub struct SlugAssigner {
    db: SqlitePool,
}

impl SlugAssigner {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Find the first free candidate at or after `from_attempt`
    ///
    /// A slug held by `exclude_tool` itself counts as free. Returns the slug
    /// and the attempt it was found at, so a write that still collides can
    /// resume from the next suffix.
    pub async fn find_available(
        &self,
        base: &str,
        exclude_tool: Option<&str>,
        from_attempt: u32,
    ) -> MarketResult<(String, u32)> {
        for attempt in from_attempt..MAX_SLUG_ATTEMPTS {
            let slug = candidate(base, attempt);

            let holder: Option<String> = sqlx::query_scalar("SELECT id FROM tools WHERE slug = ?1")
                .bind(&slug)
                .fetch_optional(&self.db)
                .await?;

            match holder {
                None => return Ok((slug, attempt)),
                Some(id) if Some(id.as_str()) == exclude_tool => return Ok((slug, attempt)),
                Some(_) => continue,
            }
        }

        Err(MarketError::SlugGenerationExhausted(base.to_string()))
    }

    /// Slug for a tool name
    pub async fn assign(&self, name: &str, exclude_tool: Option<&str>) -> MarketResult<(String, u32)> {
        self.find_available(&slugify(name), exclude_tool, 0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("AI Content Writer!!"), "ai-content-writer");
        assert_eq!(slugify("  Hello   World  "), "hello-world");
        assert_eq!(slugify("foo--bar - baz"), "foo-bar-baz");
        assert_eq!(slugify("-Leading and trailing-"), "leading-and-trailing");
        assert_eq!(slugify("C++ Tools"), "c-tools");
        assert_eq!(slugify("Café"), "caf");
        assert_eq!(slugify("!!!"), "tool");
        assert_eq!(slugify(""), "tool");
    }

    #[test]
    fn test_candidate_suffixes() {
        assert_eq!(candidate("writer", 0), "writer");
        assert_eq!(candidate("writer", 3), "writer-3");
    }

    async fn insert_tool(pool: &SqlitePool, id: &str, slug: &str) {
        let now = db::timestamp(chrono::Utc::now());
        sqlx::query(
            "INSERT INTO users (id, company_name, email, password_hash, created_at, updated_at)
             VALUES ('owner', 'Acme', 'owner@example.com', 'x', ?1, ?1)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO tools (id, name, slug, tagline, description, website_url, submitted_by, created_at, updated_at)
             VALUES (?1, ?2, ?2, 't', 'd', 'https://example.com', 'owner', ?3, ?3)",
        )
        .bind(id)
        .bind(slug)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_collision_gets_next_suffix() {
        let pool = db::create_memory_pool().await.unwrap();
        let assigner = SlugAssigner::new(pool.clone());

        let (first, _) = assigner.assign("AI Content Writer!!", None).await.unwrap();
        assert_eq!(first, "ai-content-writer");
        insert_tool(&pool, "t1", &first).await;

        let (second, attempt) = assigner.assign("AI Content Writer", None).await.unwrap();
        assert_eq!(second, "ai-content-writer-1");
        assert_eq!(attempt, 1);
    }

    #[tokio::test]
    async fn test_own_slug_is_reusable() {
        let pool = db::create_memory_pool().await.unwrap();
        let assigner = SlugAssigner::new(pool.clone());
        insert_tool(&pool, "t1", "writer").await;

        let (slug, _) = assigner.assign("Writer", Some("t1")).await.unwrap();
        assert_eq!(slug, "writer");
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let pool = db::create_memory_pool().await.unwrap();
        let assigner = SlugAssigner::new(pool.clone());

        for attempt in 0..MAX_SLUG_ATTEMPTS {
            insert_tool(&pool, &format!("t{}", attempt), &candidate("busy", attempt)).await;
        }

        assert!(matches!(
            assigner.assign("Busy", None).await,
            Err(MarketError::SlugGenerationExhausted(_))
        ));
    }
}
