//! Client side of the tag byte contract.
//!
//! A peer that wants the gRPC engine must write [`RpcType::Grpc`] as the very
//! first byte of the connection. [`connect`] hides that detail behind a tonic
//! [`Channel`]; [`open`] exposes the raw tagged stream for callers that speak
//! some other tag or want to drive the socket by hand.

use crate::{Result, types::RpcType};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tokio::{io::AsyncWriteExt, net::TcpStream};
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

/// Dials `addr` and writes `tag` before anything else.
///
/// The returned stream is positioned right after the tag byte.
pub async fn open(addr: SocketAddr, tag: RpcType) -> std::io::Result<TcpStream> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    stream.write_all(&[tag.as_byte()]).await?;
    Ok(stream)
}

/// Opens a gRPC [`Channel`] to a demultiplexing listener at `addr`.
///
/// Every connection the channel establishes, including reconnects, is
/// prefixed with the gRPC tag byte.
///
/// # Errors
///
/// Returns [`Error::Transport`](crate::Error::Transport) if the endpoint is
/// invalid or the first connection cannot be established.
pub async fn connect(addr: SocketAddr) -> Result<Channel> {
    let endpoint = Endpoint::try_from(format!("http://{addr}"))?;
    let channel = endpoint
        .connect_with_connector(service_fn(move |_: Uri| async move {
            open(addr, RpcType::Grpc).await.map(TokioIo::new)
        }))
        .await?;
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GRPC_TAG;
    use tokio::{io::AsyncReadExt, net::TcpListener};

    #[tokio::test]
    async fn open_writes_the_tag_first() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = open(addr, RpcType::Grpc).await.unwrap();
            stream.write_all(b"payload").await.unwrap();
        });

        let (mut conn, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        client.await.unwrap();
        conn.read_to_end(&mut buf).await.unwrap();

        assert_eq!(buf[0], GRPC_TAG);
        assert_eq!(&buf[1..], b"payload");
    }

    #[tokio::test]
    async fn open_sends_unknown_tags_verbatim() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { open(addr, RpcType::Unknown(0xff)).await });

        let (mut conn, _) = listener.accept().await.unwrap();
        assert_eq!(conn.read_u8().await.unwrap(), 0xff);
        client.await.unwrap().unwrap();
    }
}
