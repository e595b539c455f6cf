/// Cache key derivation shared by readers and writers
use crate::auth::AuthUser;

/// Approved tools, featured first then newest
pub const ALL_TOOLS: &str = "allTools";

/// Approved featured tools
pub const FEATURED_TOOLS: &str = "featuredTools";

pub fn tool_by_id(id: &str) -> String {
    format!("tool:{}", id)
}

pub fn tool_by_slug(slug: &str) -> String {
    format!("tool:slug:{}", slug)
}

/// Every comment page of a tool lives under this prefix
pub fn comments_prefix(tool_id: &str) -> String {
    format!("comments:{}:", tool_id)
}

/// Requester segment of keys whose response varies by viewer
pub fn viewer_segment(viewer: Option<&AuthUser>) -> String {
    match viewer {
        Some(user) => format!("{}-{}", user.role.as_str(), user.user_id),
        None => "anonymous".to_string(),
    }
}

pub fn comment_page(
    tool_id: &str,
    page: u32,
    limit: u32,
    sort: &str,
    viewer: Option<&AuthUser>,
) -> String {
    format!(
        "{}{}:{}:{}:{}",
        comments_prefix(tool_id),
        page,
        limit,
        sort,
        viewer_segment(viewer)
    )
}

pub fn pending_signup(token: &str) -> String {
    format!("pendingSignup:{}", token)
}
