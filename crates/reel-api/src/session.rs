//! Session-token checks for project-scoped routes.
//!
//! There are no user accounts; a project belongs to whichever browser
//! session created it. Every project-scoped request must carry the same
//! opaque token in `x-session-token`. A wrong token answers 404, not 403,
//! so tokens cannot be used to probe for project ids.

use axum::http::HeaderMap;

use reel_models::Project;

use crate::error::{ApiError, ApiResult};

pub const SESSION_HEADER: &str = "x-session-token";

/// Extract the session token or reject with 401.
pub fn require_session(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("missing x-session-token header"))
}

/// Check that the session owns the project.
pub fn check_ownership(project: &Project, session_token: &str) -> ApiResult<()> {
    if project.session_token != session_token {
        return Err(ApiError::not_found(format!("project {}", project.id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_require_session() {
        let mut headers = HeaderMap::new();
        assert!(require_session(&headers).is_err());

        headers.insert(SESSION_HEADER, HeaderValue::from_static("sess-1"));
        assert_eq!(require_session(&headers).unwrap(), "sess-1");
    }

    #[test]
    fn test_wrong_session_reads_as_missing_project() {
        let project = Project::new("sess-1", "prompt");
        assert!(check_ownership(&project, "sess-1").is_ok());
        let err = check_ownership(&project, "sess-2").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
