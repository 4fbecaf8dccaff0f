//! Stream identity and auth carrier

use std::fmt;

/// Identity of a published stream plus its auth parameters.
///
/// The registry keys sources by [`stream_url`](Self::stream_url); the `param`
/// field carries the query-string style auth token, which may be refreshed by
/// [`update_auth`](Self::update_auth) while the identity stays fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtRequest {
    /// Application name (e.g. "live").
    pub app: String,
    /// Stream name.
    pub stream: String,
    /// Auth/query parameters (e.g. "?secret=abc").
    pub param: String,
}

impl SrtRequest {
    /// A request with no auth parameters.
    pub fn new(app: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            stream: stream.into(),
            param: String::new(),
        }
    }

    /// A request carrying an auth parameter string.
    pub fn with_param(
        app: impl Into<String>,
        stream: impl Into<String>,
        param: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            stream: stream.into(),
            param: param.into(),
        }
    }

    /// Registry key for this stream. Opaque, case-sensitive, exact match.
    pub fn stream_url(&self) -> String {
        format!("{}/{}", self.app, self.stream)
    }

    /// Refresh auth fields from `other`, preserving stream identity.
    ///
    /// Used when origin auth is on and a reconnecting caller presents a
    /// fresh token for an already-registered stream.
    pub fn update_auth(&mut self, other: &SrtRequest) {
        self.param = other.param.clone();
    }
}

impl fmt::Display for SrtRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_is_app_slash_stream() {
        let req = SrtRequest::new("live", "studio_a");
        assert_eq!(req.stream_url(), "live/studio_a");
        assert_eq!(req.to_string(), "live/studio_a");
    }

    #[test]
    fn update_auth_preserves_identity() {
        let mut req = SrtRequest::with_param("live", "studio_a", "?secret=old");
        let fresh = SrtRequest::with_param("live", "other", "?secret=new");

        req.update_auth(&fresh);

        assert_eq!(req.param, "?secret=new");
        assert_eq!(req.stream_url(), "live/studio_a");
    }
}
