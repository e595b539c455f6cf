/// Moderation state machines for tools and comments
use crate::db::{comment::CommentStatus, tool::ToolStatus};
use crate::error::{MarketError, MarketResult};

/// Tool statuses an admin may set; every transition between them is allowed
pub fn check_tool_status(status: &str) -> MarketResult<ToolStatus> {
    ToolStatus::parse(status)
}

/// Validate an admin moderation decision on a comment
pub fn check_comment_moderation(
    from: CommentStatus,
    to: CommentStatus,
) -> MarketResult<()> {
    match to {
        CommentStatus::Approved | CommentStatus::Rejected | CommentStatus::Pending => {}
        other => {
            return Err(MarketError::Validation(format!(
                "Comments cannot be moderated to {}",
                other
            )))
        }
    }

    if from == CommentStatus::Deleted {
        return Err(MarketError::Validation(
            "Deleted comments cannot be moderated".to_string(),
        ));
    }

    Ok(())
}

/// Change in the approved-comment counter for a status transition
pub fn approved_delta(from: CommentStatus, to: CommentStatus) -> i64 {
    match (from == CommentStatus::Approved, to == CommentStatus::Approved) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

/// Whether a user report should move the comment to `reported`
pub fn report_transitions(status: CommentStatus) -> bool {
    status == CommentStatus::Approved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_status_values() {
        assert_eq!(check_tool_status("rejected").unwrap(), ToolStatus::Rejected);
        assert!(check_tool_status("deleted").is_err());
    }

    #[test]
    fn test_comment_moderation_targets() {
        assert!(check_comment_moderation(CommentStatus::Reported, CommentStatus::Approved).is_ok());
        assert!(check_comment_moderation(CommentStatus::Pending, CommentStatus::Rejected).is_ok());
        assert!(check_comment_moderation(CommentStatus::Reported, CommentStatus::Deleted).is_err());
        assert!(check_comment_moderation(CommentStatus::Deleted, CommentStatus::Approved).is_err());
    }

    #[test]
    fn test_approved_delta() {
        assert_eq!(approved_delta(CommentStatus::Reported, CommentStatus::Approved), 1);
        assert_eq!(approved_delta(CommentStatus::Approved, CommentStatus::Rejected), -1);
        assert_eq!(approved_delta(CommentStatus::Approved, CommentStatus::Approved), 0);
        assert_eq!(approved_delta(CommentStatus::Pending, CommentStatus::Rejected), 0);
    }

    #[test]
    fn test_only_approved_comments_become_reported() {
        assert!(report_transitions(CommentStatus::Approved));
        assert!(!report_transitions(CommentStatus::Reported));
        assert!(!report_transitions(CommentStatus::Pending));
    }
}
