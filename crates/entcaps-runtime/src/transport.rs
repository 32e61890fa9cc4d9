//! Discovery transport boundary.

use async_trait::async_trait;
use entcaps_core::{CapsResult, DiscoInfo, FullJid};

/// Sends disco#info queries and returns parsed replies.
///
/// Implemented by the XMPP stream layer. Errors map to the query-failure
/// variants of [`CapsError`](entcaps_core::CapsError): an error stanza is
/// `RemoteError`, an unparseable reply is `MalformedReply`. Timeouts are
/// applied by the scheduler.
#[async_trait]
pub trait DiscoTransport: Send + Sync {
    /// Query `target` for the disco#info of `node`.
    async fn disco_info(&self, target: &FullJid, node: &str) -> CapsResult<DiscoInfo>;
}
