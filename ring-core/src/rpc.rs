use bytes::BytesMut;
use ring_wire::Rpc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::instrument;

use crate::error::{RingError, Result};
use crate::state::RingConfig;

/// The typed, timed RPC primitives. Each call opens a short-lived
/// TCP connection to a named peer, writes one framed request, and — for
/// `join` only — awaits one framed response before dropping the connection.
/// There is no persistent peer session to manage.
#[derive(Debug, Clone, Copy)]
pub struct RpcShim {
    timeout: std::time::Duration,
}

impl RpcShim {
    pub fn new(config: RingConfig) -> Self {
        RpcShim {
            timeout: config.rpc_timeout,
        }
    }

    async fn dial(&self, peer: &str) -> Result<TcpStream> {
        timeout(self.timeout, TcpStream::connect(peer))
            .await
            .map_err(|_| RingError::Timeout {
                peer: peer.to_string(),
            })?
            .map_err(|source| RingError::Transport {
                peer: peer.to_string(),
                source,
            })
    }

    async fn write_frame(&self, stream: &mut TcpStream, rpc: &Rpc, peer: &str) -> Result<()> {
        let mut buf = BytesMut::new();
        rpc.encode(&mut buf);
        timeout(self.timeout, async {
            stream.write_all(&buf).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| RingError::Timeout {
            peer: peer.to_string(),
        })?
        .map_err(|source| RingError::Transport {
            peer: peer.to_string(),
            source,
        })
    }

    async fn read_frame(&self, stream: &mut TcpStream, peer: &str) -> Result<Rpc> {
        let mut buf = BytesMut::with_capacity(256);
        timeout(self.timeout, async {
            loop {
                if let Some(rpc) = Rpc::decode(&mut buf)? {
                    return Ok(rpc);
                }
                let n = stream
                    .read_buf(&mut buf)
                    .await
                    .map_err(|source| RingError::Transport {
                        peer: peer.to_string(),
                        source,
                    })?;
                if n == 0 {
                    return Err(RingError::Transport {
                        peer: peer.to_string(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "peer closed connection before responding",
                        ),
                    });
                }
            }
        })
        .await
        .map_err(|_| RingError::Timeout {
            peer: peer.to_string(),
        })?
    }

    /// Sends a one-way message (`set_next`, `set_prev`, `list`, `election`,
    /// `coordinator`): the sender does not await an application-level ack,
    /// only that the bytes were handed to the peer's transport.
    #[instrument(skip(self, rpc))]
    pub async fn send_one_way(&self, peer: &str, rpc: Rpc) -> Result<()> {
        let mut stream = self.dial(peer).await?;
        self.write_frame(&mut stream, &rpc, peer).await
    }

    /// `join(self_id)` against bootstrap peer `peer`; returns the identity
    /// `peer` reports as the predecessor the joiner should install.
    #[instrument(skip(self))]
    pub async fn call_join(&self, peer: &str, self_id: &str) -> Result<String> {
        let mut stream = self.dial(peer).await?;
        self.write_frame(&mut stream, &Rpc::Join(self_id.to_string()), peer)
            .await?;
        match self.read_frame(&mut stream, peer).await? {
            Rpc::JoinResponse(id) => Ok(id),
            _ => Err(RingError::UnexpectedResponse {
                peer: peer.to_string(),
            }),
        }
    }
}
