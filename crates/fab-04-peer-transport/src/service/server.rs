//! Server half: accepting connections and answering RPCs.

use std::sync::Arc;

use fab_01_content_store::StoreError;
use rustls::pki_types::CertificateDer;
use shared_crypto::CertificateVerifier;
use shared_types::{ContentHash, NodeId, Position};
use tokio::io::AsyncWrite;
use tracing::{debug, error, info, warn};

use super::{stopped, PeerTransport};
use crate::adapters::framing::{read_frame, write_frame, CHUNK_SIZE};
use crate::domain::errors::{TransportError, TransportResult};
use crate::domain::messages::{FailureKind, PeerEnvelope, RpcRequest, RpcResponse};

impl PeerTransport {
    pub(super) async fn accept_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            let incoming = tokio::select! {
                _ = stopped(&mut shutdown) => break,
                incoming = self.endpoint.accept() => incoming,
            };
            let Some(incoming) = incoming else { break };

            let transport = Arc::clone(&self);
            tokio::spawn(async move {
                match incoming.await {
                    Ok(connection) => transport.serve_connection(connection).await,
                    Err(e) => debug!("[fab-04] Inbound handshake failed: {}", e),
                }
            });
        }
        debug!("[fab-04] Accept loop stopped");
    }

    /// Node id named by the certificate the remote presented.
    fn remote_identity(connection: &quinn::Connection) -> Option<NodeId> {
        let certificates = connection
            .peer_identity()?
            .downcast::<Vec<CertificateDer<'static>>>()
            .ok()?;
        let leaf = certificates.first()?;
        CertificateVerifier::claimed_identity(leaf.as_ref())
    }

    async fn serve_connection(self: Arc<Self>, connection: quinn::Connection) {
        let Some(remote) = Self::remote_identity(&connection) else {
            warn!(
                "[fab-04] Closing connection from {}: certificate names no node",
                connection.remote_address()
            );
            connection.close(1u32.into(), b"unidentified");
            return;
        };
        debug!(
            "[fab-04] Accepted node {} from {}",
            remote,
            connection.remote_address()
        );

        loop {
            match connection.accept_bi().await {
                Ok((send, recv)) => {
                    let transport = Arc::clone(&self);
                    tokio::spawn(async move { transport.handle_stream(remote, send, recv).await });
                }
                Err(e) => {
                    debug!("[fab-04] Inbound connection from node {} ended: {}", remote, e);
                    break;
                }
            }
        }
    }

    async fn handle_stream(
        &self,
        remote: NodeId,
        mut send: quinn::SendStream,
        mut recv: quinn::RecvStream,
    ) {
        let request = match read_frame::<_, RpcRequest>(&mut recv, "rpc request").await {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                warn!("[fab-04] Bad request from node {}: {}", remote, e);
                return;
            }
        };

        let outcome = match request {
            RpcRequest::Consensus(envelope) => {
                let response = self.accept_envelope(remote, envelope).await;
                write_frame(&mut send, &response).await
            }
            RpcRequest::FetchBlocks(from) => self.stream_blocks(remote, from, &mut send).await,
            RpcRequest::DownloadContent(hash) => {
                self.stream_content(remote, hash, &mut send).await
            }
        };

        match outcome {
            Ok(()) => {
                let _ = send.finish();
            }
            Err(e) => {
                warn!("[fab-04] Resetting stream to node {}: {}", remote, e);
                let _ = send.reset(quinn::VarInt::from_u32(1));
            }
        }
    }

    /// Queues an envelope for `serve`, after checking who sent it.
    async fn accept_envelope(&self, remote: NodeId, envelope: PeerEnvelope) -> RpcResponse {
        if envelope.sender == self.node_id {
            warn!("[fab-04] Rejected envelope claiming to come from this node");
            return RpcResponse::failure(FailureKind::Loopback, "sender is the receiving node");
        }
        if envelope.sender != remote {
            warn!(
                "[fab-04] Rejected envelope from node {} claiming sender {}",
                remote, envelope.sender
            );
            return RpcResponse::failure(
                FailureKind::IdentityMismatch,
                format!("certificate is node {}, envelope says {}", remote, envelope.sender),
            );
        }
        if self.is_shut_down() {
            return RpcResponse::failure(FailureKind::Unavailable, "shutting down");
        }
        match self.inbound_tx.send(envelope).await {
            Ok(()) => RpcResponse::Ack,
            Err(_) => RpcResponse::failure(FailureKind::Unavailable, "inbound queue closed"),
        }
    }

    async fn stream_blocks<W>(
        &self,
        remote: NodeId,
        from: Position,
        send: &mut W,
    ) -> TransportResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let records = self.ledger.read_all(from);
        info!(
            "[fab-04] Streaming {} records after {} to node {}",
            records.len(),
            from,
            remote
        );
        for (sent, record) in records.into_iter().enumerate() {
            match write_frame(send, &RpcResponse::Record(record)).await {
                Ok(()) => {}
                Err(e @ TransportError::FrameTooLarge { .. }) => {
                    error!(
                        "[fab-04] Record {} after {} cannot be sent to node {}: {}",
                        sent + 1,
                        from,
                        remote,
                        e
                    );
                    let response = RpcResponse::failure(
                        FailureKind::Internal,
                        format!("record {} after {from}: {e}", sent + 1),
                    );
                    return write_frame(send, &response).await;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn stream_content<W>(
        &self,
        remote: NodeId,
        hash: ContentHash,
        send: &mut W,
    ) -> TransportResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let store = Arc::clone(&self.store);
        let content = match tokio::task::spawn_blocking(move || store.get(&hash)).await {
            Ok(Ok(content)) => content,
            Ok(Err(StoreError::NotFound(_))) => {
                debug!("[fab-04] Node {} asked for unknown content {}", remote, hash);
                let response =
                    RpcResponse::failure(FailureKind::NotFound, format!("no content {hash}"));
                return write_frame(send, &response).await;
            }
            Ok(Err(e)) => {
                error!("[fab-04] Reading content {} failed: {}", hash, e);
                let response = RpcResponse::failure(FailureKind::Internal, e.to_string());
                return write_frame(send, &response).await;
            }
            Err(e) => {
                error!("[fab-04] Content read task failed: {}", e);
                let response = RpcResponse::failure(FailureKind::Internal, "read task failed");
                return write_frame(send, &response).await;
            }
        };

        debug!(
            "[fab-04] Sending {} bytes of {} to node {}",
            content.len(),
            hash,
            remote
        );
        for chunk in content.chunks(CHUNK_SIZE) {
            write_frame(send, &RpcResponse::Chunk(chunk.to_vec())).await?;
        }
        Ok(())
    }
}
