use crate::{ChannelName, EndpointId};

/// Errors returned by a channel binding.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("endpoint {0} is no longer attached")]
    EndpointGone(EndpointId),

    #[error("no implicit peer to send to on channel {0}")]
    Unroutable(ChannelName),

    #[error("channel binding failure: {0}")]
    Binding(#[source] anyhow::Error),
}
