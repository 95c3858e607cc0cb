use crate::upstream::requester::Timing;
use crate::upstream::transport::BoxError;

/// Failure while talking to the upstream, with the timing observed so far.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// No response head arrived: connect failure, refused connection or timeout.
    #[error("request error: {source}")]
    Request { source: BoxError, timing: Timing },

    /// The head arrived but the body could not be read in full.
    #[error("reading response body: {source}")]
    BodyRead {
        status: u16,
        source: BoxError,
        timing: Timing,
    },
}

impl UpstreamError {
    pub fn timing(&self) -> Timing {
        match self {
            Self::Request { timing, .. } | Self::BodyRead { timing, .. } => *timing,
        }
    }

    /// Status the upstream answered with before the body failed, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Request { .. } => None,
            Self::BodyRead { status, .. } => Some(*status),
        }
    }
}
