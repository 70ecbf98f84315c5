use thiserror::Error;

/// Failures reconstructing HTML from a stream of update trees.
///
/// Every variant here reflects the server and client having fallen out of
/// sync — a dropped frame, a reconnection that skipped the reset handshake,
/// or a bug in the differ. None of them are reachable when the server
/// obeys the protocol (§4.5, §4.6).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("received a delta before any full tree was merged")]
    MissingInitialStatics,

    #[error("received an operation list for a slot with no cached iteration")]
    OpsWithoutCachedIteration,

    #[error("operation referenced unknown key `{key}`")]
    UnknownKey { key: String },
}
