//! Client half of the streaming RPCs.

use shared_types::{ContentHash, LedgerRecord, NodeId, Position};
use tracing::{debug, warn};

use super::PeerTransport;
use crate::adapters::framing::read_frame;
use crate::domain::errors::{TransportError, TransportResult};
use crate::domain::messages::{RpcRequest, RpcResponse};

/// Reads the next response frame, turning a peer failure into an error.
async fn next_response(recv: &mut quinn::RecvStream) -> TransportResult<Option<RpcResponse>> {
    match read_frame::<_, RpcResponse>(recv, "rpc response").await? {
        Some(RpcResponse::Failure { kind, message }) => {
            Err(TransportError::Remote { kind, message })
        }
        other => Ok(other),
    }
}

/// Ledger records streamed by a peer. Dropping it cancels the stream.
pub struct RecordStream {
    source: NodeId,
    recv: quinn::RecvStream,
}

impl RecordStream {
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// The next record, or `None` once the peer has sent them all.
    pub async fn next(&mut self) -> TransportResult<Option<LedgerRecord>> {
        match next_response(&mut self.recv).await? {
            None => Ok(None),
            Some(RpcResponse::Record(record)) => Ok(Some(record)),
            Some(other) => Err(TransportError::UnexpectedResponse(other.name())),
        }
    }
}

/// Content chunks streamed by a peer. Dropping it cancels the stream.
pub struct ContentStream {
    source: NodeId,
    hash: ContentHash,
    recv: quinn::RecvStream,
}

impl ContentStream {
    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub async fn next_chunk(&mut self) -> TransportResult<Option<Vec<u8>>> {
        match next_response(&mut self.recv).await? {
            None => Ok(None),
            Some(RpcResponse::Chunk(chunk)) => Ok(Some(chunk)),
            Some(other) => Err(TransportError::UnexpectedResponse(other.name())),
        }
    }
}

impl PeerTransport {
    /// Streams every record `peer` holds after `from`.
    pub async fn fetch_blocks(&self, peer: NodeId, from: Position) -> TransportResult<RecordStream> {
        debug!("[fab-04] Fetching blocks after {} from node {}", from, peer);
        let recv = self.open_rpc(peer, &RpcRequest::FetchBlocks(from)).await?;
        Ok(RecordStream { source: peer, recv })
    }

    /// Streams the chunks of `hash` from `peer`.
    pub async fn download_content(
        &self,
        peer: NodeId,
        hash: ContentHash,
    ) -> TransportResult<ContentStream> {
        let recv = self.open_rpc(peer, &RpcRequest::DownloadContent(hash)).await?;
        Ok(ContentStream {
            source: peer,
            hash,
            recv,
        })
    }

    /// Downloads all of `hash` from `peer` and checks the digest.
    pub async fn download(&self, peer: NodeId, hash: ContentHash) -> TransportResult<Vec<u8>> {
        let mut stream = self.download_content(peer, hash).await?;
        let mut content = Vec::new();
        while let Some(chunk) = stream.next_chunk().await? {
            content.extend_from_slice(&chunk);
        }

        let actual = ContentHash::of(&content);
        if actual != hash {
            warn!(
                "[fab-04] Content from node {} does not match {}",
                peer, hash
            );
            return Err(TransportError::ContentMismatch {
                expected: hash,
                actual,
            });
        }
        debug!(
            "[fab-04] Downloaded {} bytes of {} from node {}",
            content.len(),
            hash,
            peer
        );
        Ok(content)
    }
}
