use uuid::Uuid;

/// Correlation id attached to every recommendation span
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Creates a new random request ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reuses a caller-supplied id when it is a valid UUID, otherwise generates one
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(RequestId)
            .unwrap_or_else(RequestId::new)
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span wrapping one recommendation request
pub fn make_span_with_request_id(request_id: &RequestId, condition: &str) -> tracing::Span {
    tracing::info_span!(
        "recommendation",
        request_id = %request_id,
        condition = condition,
    )
}
