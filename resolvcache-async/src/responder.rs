//! Asynchronous mDNS responder.

use std::{
    io,
    net::{SocketAddr, UdpSocket},
    sync::Arc,
};

use async_io::Async;
use resolvcache::{cache::RecordCache, MDNS_BUFFER_SIZE};

pub use resolvcache::responder::*;

/// Asynchronous mDNS responder.
///
/// Datagrams are answered one after another on the task that polls [`AsyncResponder::listen`].
pub struct AsyncResponder {
    responder: Responder,
    sock: Async<UdpSocket>,
}

impl AsyncResponder {
    /// Creates the responder socket as described by `config`.
    pub fn new(config: &ResponderConfig) -> io::Result<Self> {
        let sock = create_socket(config)?;
        log::info!("mDNS responder bound to {}", sock.local_addr()?);
        Self::from_socket(sock, Responder::new(config))
    }

    /// Serves `responder` on an already set up socket.
    pub fn from_socket(sock: UdpSocket, responder: Responder) -> io::Result<Self> {
        Ok(Self {
            responder,
            sock: Async::new(sock)?,
        })
    }

    /// Attaches a record cache to take addresses from.
    pub fn with_cache(self, cache: Arc<RecordCache>) -> Self {
        Self {
            responder: self.responder.with_cache(cache),
            ..self
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.sock.get_ref().local_addr()
    }

    /// Listens for and replies to incoming queries.
    ///
    /// Only returns when receiving from the socket fails.
    pub async fn listen(&self) -> io::Result<()> {
        let mut recv_buf = [0; MDNS_BUFFER_SIZE];
        let mut send_buf = [0; MDNS_BUFFER_SIZE];
        loop {
            let (len, addr) = self.sock.recv_from(&mut recv_buf).await?;
            let packet = &recv_buf[..len];

            log::trace!("raw recv from {}: {:x?}", addr, packet);

            match self.responder.handle_packet(packet, &mut send_buf) {
                Ok(Some(len)) => {
                    if let Err(e) = self.sock.send_to(&send_buf[..len], addr).await {
                        log::warn!("failed to send response to {}: {}", addr, e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::debug!("failed to handle packet from {}: {}", addr, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, UdpSocket};

    use futures_lite::future;
    use resolvcache::packet::{
        decoder::MessageDecoder,
        encoder::{MessageEncoder, Question},
        name::DomainName,
        QType,
    };

    use super::*;

    #[test]
    fn answers_over_udp() {
        let sock = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let responder =
            AsyncResponder::from_socket(sock, Responder::new(&ResponderConfig::default()))
                .unwrap();
        let server = responder.local_addr().unwrap();

        let name = DomainName::from_str("foo.local").unwrap();
        let mut query = [0; 64];
        let mut enc = MessageEncoder::new(&mut query);
        enc.question(Question::new(&name).ty(QType::A));
        let len = enc.finish().unwrap();

        let client = Async::<UdpSocket>::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let reply = future::block_on(future::or(
            async {
                responder.listen().await.unwrap();
                Vec::new()
            },
            async {
                client.send_to(&query[..len], server).await.unwrap();
                let mut buf = [0; MDNS_BUFFER_SIZE];
                let (len, _) = client.recv_from(&mut buf).await.unwrap();
                buf[..len].to_vec()
            },
        ));

        let dec = MessageDecoder::new(&reply).unwrap();
        assert!(dec.header().is_response());
        let mut dec = dec.answers().unwrap();
        let rr = dec.records().next().unwrap().unwrap();
        assert_eq!(rr.to_buf().unwrap().to_string(), "foo.local.\t120\tIN\tA\t127.0.0.1");
    }
}
