//! A minimal mDNS responder for `.local.` names.
//!
//! [`Responder`] is the socket-free core: it turns one query datagram into at most one reply.
//! [`SyncResponder`] drives it from a pool of blocking worker threads; the `resolvcache-async`
//! crate drives it from an async task instead.
//!
//! Only `A` and `AAAA` questions are answered. The answer is the address cached for the queried
//! name, if a [`RecordCache`] is attached and has one, and the configured default otherwise.

use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, UdpSocket},
    sync::Arc,
    thread,
};

use socket2::{Domain, Protocol, Socket};

use crate::{
    cache::RecordCache,
    hex::Hex,
    packet::{
        decoder::MessageDecoder,
        encoder::{MessageEncoder, Question, ResourceRecord},
        name::DomainName,
        records::{Record, A, AAAA},
        Error, Header, Opcode, QClass, QType, Type,
    },
    MDNS_BUFFER_SIZE, MDNS_GROUP_V4,
};

/// The port [`ResponderConfig`] listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 5354;

/// TTL of synthesized answers, in seconds.
pub const DEFAULT_TTL: u32 = 120;

/// Configuration for [`Responder`] and the socket it listens on.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    port: u16,
    interface: Ipv4Addr,
    ipv4: Ipv4Addr,
    ipv6: Ipv6Addr,
    ttl: u32,
    workers: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            ipv4: Ipv4Addr::LOCALHOST,
            ipv6: Ipv6Addr::LOCALHOST,
            ttl: DEFAULT_TTL,
            workers: 4,
        }
    }
}

impl ResponderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the UDP port to bind to.
    pub fn port(self, port: u16) -> Self {
        Self { port, ..self }
    }

    /// Sets the local interface address used to join the multicast group.
    ///
    /// [`Ipv4Addr::UNSPECIFIED`] lets the OS pick one.
    pub fn interface(self, interface: Ipv4Addr) -> Self {
        Self { interface, ..self }
    }

    /// Sets the address `A` queries are answered with when nothing is cached.
    pub fn ipv4(self, ipv4: Ipv4Addr) -> Self {
        Self { ipv4, ..self }
    }

    /// Sets the address `AAAA` queries are answered with when nothing is cached.
    pub fn ipv6(self, ipv6: Ipv6Addr) -> Self {
        Self { ipv6, ..self }
    }

    /// Sets the TTL of the answers.
    pub fn ttl(self, ttl: u32) -> Self {
        Self { ttl, ..self }
    }

    /// Sets the number of threads [`SyncResponder::listen`] receives datagrams on.
    ///
    /// A value of 0 is treated as 1.
    pub fn workers(self, workers: usize) -> Self {
        Self { workers, ..self }
    }
}

/// Creates the UDP socket an mDNS responder listens on.
///
/// The socket has `SO_REUSEADDR` set, is bound to `0.0.0.0` on the configured port, and has
/// joined the mDNS multicast group.
pub fn create_socket(config: &ResponderConfig) -> io::Result<UdpSocket> {
    let sock = Socket::new(Domain::IPV4, socket2::Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_reuse_address(true)?;
    sock.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port).into())?;

    let sock = UdpSocket::from(sock);
    sock.join_multicast_v4(&MDNS_GROUP_V4, &config.interface)?;
    Ok(sock)
}

/// Answers mDNS queries. Holds no per-packet state.
#[derive(Debug, Clone)]
pub struct Responder {
    local: DomainName,
    ipv4: Ipv4Addr,
    ipv6: Ipv6Addr,
    ttl: u32,
    cache: Option<Arc<RecordCache>>,
}

impl Responder {
    pub fn new(config: &ResponderConfig) -> Self {
        Self {
            local: DomainName::local(),
            ipv4: config.ipv4,
            ipv6: config.ipv6,
            ttl: config.ttl,
            cache: None,
        }
    }

    /// Attaches a record cache to take addresses from.
    pub fn with_cache(self, cache: Arc<RecordCache>) -> Self {
        Self {
            cache: Some(cache),
            ..self
        }
    }

    /// Handles a single received datagram.
    ///
    /// If the packet warrants a reply, it is encoded into `buf` and its length is returned. `buf`
    /// must be able to hold at least a message header; a reply that does not fit entirely is
    /// returned truncated, with the TC bit set.
    ///
    /// Errors are only returned for packets that fail to decode.
    pub fn handle_packet(&self, packet: &[u8], buf: &mut [u8]) -> Result<Option<usize>, Error> {
        let mut dec = MessageDecoder::new(packet)?;
        let header = *dec.header();
        if header.is_response() {
            return Ok(None);
        }
        if header.opcode() != Opcode::QUERY {
            log::debug!("ignoring {} message", header.opcode());
            return Ok(None);
        }
        let q = match dec.next() {
            Some(q) => q?,
            None => return Ok(None),
        };

        log::debug!("Q: {q}");
        if q.qclass() != QClass::IN || !q.qname().is_subdomain_of(&self.local) {
            log::debug!("not for us: {}", q.qname());
            return Ok(None);
        }

        let answer: Record = match q.qtype() {
            QType::A => A::new(self.ipv4_for(q.qname())).into(),
            QType::AAAA => AAAA::new(self.ipv6_for(q.qname())).into(),
            ty => {
                log::debug!("unsupported query type {}", ty);
                return Ok(None);
            }
        };
        log::debug!("A: {} {}", q.qname(), answer);

        let mut reply = Header::default();
        reply.set_id(header.id());
        reply.set_response(true);
        reply.set_authority(true);
        reply.set_recursion_desired(header.is_recursion_desired());

        let mut enc = MessageEncoder::new(buf);
        enc.set_header(reply);
        enc.question(Question::new(q.qname()).class(QClass::IN).ty(q.qtype()));
        let mut enc = enc.answers();
        enc.add_answer(ResourceRecord::new(q.qname(), &answer).ttl(self.ttl));

        // truncated replies still get sent
        let len = enc.finish().unwrap_or(buf.len());
        Ok(Some(len))
    }

    fn ipv4_for(&self, name: &DomainName) -> Ipv4Addr {
        self.cached(name, Type::A).unwrap_or(self.ipv4)
    }

    fn ipv6_for(&self, name: &DomainName) -> Ipv6Addr {
        self.cached(name, Type::AAAA).unwrap_or(self.ipv6)
    }

    fn cached<T: std::str::FromStr>(&self, name: &DomainName, ty: Type) -> Option<T> {
        let cache = self.cache.as_ref()?;
        cache
            .lookup(name, ty)
            .iter()
            .find_map(|entry| entry.record().value().parse().ok())
    }
}

/// Blocking mDNS responder.
pub struct SyncResponder {
    sock: UdpSocket,
    responder: Responder,
    workers: usize,
}

impl SyncResponder {
    /// Creates the responder socket as described by `config`.
    ///
    /// Failing to bind the port or join the multicast group is reported here, and nowhere else.
    pub fn new(config: &ResponderConfig) -> io::Result<Self> {
        let sock = create_socket(config)?;
        log::info!("mDNS responder bound to {}", sock.local_addr()?);
        Ok(Self::from_socket(sock, config))
    }

    /// Serves queries on an already set up socket.
    ///
    /// Only the answer and worker settings of `config` are used.
    pub fn from_socket(sock: UdpSocket, config: &ResponderConfig) -> Self {
        Self {
            sock,
            responder: Responder::new(config),
            workers: config.workers.max(1),
        }
    }

    /// Attaches a record cache to take addresses from.
    pub fn with_cache(self, cache: Arc<RecordCache>) -> Self {
        Self {
            responder: self.responder.with_cache(cache),
            ..self
        }
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.sock
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    /// Starts listening for and responding to queries.
    ///
    /// Each worker thread receives on its own handle to the socket, so a slow reply does not hold
    /// up the next datagram. This method only returns when every worker has hit a receive error,
    /// and then returns the first of those errors.
    pub fn listen(&self) -> io::Result<()> {
        let socks = (0..self.workers)
            .map(|_| self.sock.try_clone())
            .collect::<io::Result<Vec<_>>>()?;

        thread::scope(|s| {
            let workers = socks
                .into_iter()
                .map(|sock| s.spawn(move || self.serve(&sock)))
                .collect::<Vec<_>>();

            let mut result = Ok(());
            for worker in workers {
                let res = worker
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
                if let Err(e) = res {
                    log::debug!("responder worker stopped: {}", e);
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
            result
        })
    }

    fn serve(&self, sock: &UdpSocket) -> io::Result<()> {
        let mut recv_buf = [0; MDNS_BUFFER_SIZE];
        let mut send_buf = [0; MDNS_BUFFER_SIZE];
        loop {
            let (len, addr) = sock.recv_from(&mut recv_buf)?;
            let packet = &recv_buf[..len];

            log::trace!("raw recv from {}: {}", addr, Hex(packet));

            match self.responder.handle_packet(packet, &mut send_buf) {
                Ok(Some(len)) => {
                    if let Err(e) = sock.send_to(&send_buf[..len], addr) {
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
    use expect_test::expect;

    use super::*;
    use crate::packet::records::ResourceRecordBuf;

    fn query(name: &str, class: QClass, ty: QType) -> Vec<u8> {
        let name = DomainName::from_str(name).unwrap();
        let mut buf = [0; 512];
        let mut header = Header::default();
        header.set_id(0x1234);
        let mut enc = MessageEncoder::new(&mut buf);
        enc.set_header(header);
        enc.question(Question::new(&name).class(class).ty(ty));
        let len = enc.finish().unwrap();
        buf[..len].to_vec()
    }

    fn respond(responder: &Responder, packet: &[u8]) -> Option<Vec<u8>> {
        let mut buf = [0; MDNS_BUFFER_SIZE];
        responder
            .handle_packet(packet, &mut buf)
            .unwrap()
            .map(|len| buf[..len].to_vec())
    }

    fn single_answer(reply: &[u8]) -> ResourceRecordBuf {
        let dec = MessageDecoder::new(reply).unwrap();
        assert!(dec.header().is_response());
        assert!(dec.header().is_authority());
        assert_eq!(dec.header().question_count(), 1);
        assert_eq!(dec.header().answer_count(), 1);
        let mut dec = dec.answers().unwrap();
        let rr = dec.records().next().unwrap().unwrap();
        rr.to_buf().unwrap()
    }

    #[test]
    fn answers_a() {
        let responder = Responder::new(&ResponderConfig::default());
        let reply = respond(&responder, &query("foo.local", QClass::IN, QType::A)).unwrap();

        expect![[r#"
            12 34 84 00 00 01 00 01 00 00 00 00 03 66 6f 6f 05 6c 6f 63 61 6c 00 00 01 00 01 03 66 6f 6f 05 6c 6f 63 61 6c 00 00 01 00 01 00 00 00 78 00 04 7f 00 00 01"#]]
        .assert_eq(&format!("{:#}", Hex(&reply)));

        let rr = single_answer(&reply);
        assert_eq!(rr.to_string(), "foo.local.\t120\tIN\tA\t127.0.0.1");
    }

    #[test]
    fn answers_aaaa() {
        let responder = Responder::new(&ResponderConfig::default());
        let reply = respond(&responder, &query("bar.local.", QClass::IN, QType::AAAA)).unwrap();
        let rr = single_answer(&reply);
        assert_eq!(rr.to_string(), "bar.local.\t120\tIN\tAAAA\t::1");
    }

    #[test]
    fn default_port_avoids_system_responder() {
        assert_ne!(ResponderConfig::default().port, crate::MDNS_PORT);
        assert_eq!(ResponderConfig::new().port(crate::MDNS_PORT).port, 5353);
    }

    #[test]
    fn configured_defaults() {
        let config = ResponderConfig::new()
            .ipv4(Ipv4Addr::new(192, 168, 1, 2))
            .ttl(30);
        let responder = Responder::new(&config);
        let reply = respond(&responder, &query("host.local", QClass::IN, QType::A)).unwrap();
        let rr = single_answer(&reply);
        assert_eq!(rr.to_string(), "host.local.\t30\tIN\tA\t192.168.1.2");
    }

    #[test]
    fn ignores_unsupported() {
        let responder = Responder::new(&ResponderConfig::default());
        for packet in [
            query("foo.local", QClass::IN, QType::MX),
            query("foo.local", QClass::IN, QType::ALL),
            query("example.com", QClass::IN, QType::A),
            query("local.example.com", QClass::IN, QType::A),
            query("foo.local", QClass::CH, QType::A),
            query("foo.local", QClass::ANY, QType::A),
        ] {
            assert_eq!(respond(&responder, &packet), None);
        }
    }

    #[test]
    fn ignores_responses_and_empty_queries() {
        let responder = Responder::new(&ResponderConfig::default());

        let mut packet = query("foo.local", QClass::IN, QType::A);
        packet[2] |= 0x80; // QR
        assert_eq!(respond(&responder, &packet), None);

        let mut packet = query("foo.local", QClass::IN, QType::A);
        packet[2] |= 0x02 << 3; // STATUS opcode
        assert_eq!(respond(&responder, &packet), None);

        let mut header = [0; 12];
        header[1] = 0x01;
        assert_eq!(respond(&responder, &header), None);
    }

    #[test]
    fn malformed_packets_are_errors() {
        let responder = Responder::new(&ResponderConfig::default());
        let mut buf = [0; MDNS_BUFFER_SIZE];
        assert!(responder.handle_packet(&[0x12, 0x34], &mut buf).is_err());

        let packet = query("foo.local", QClass::IN, QType::A);
        assert!(responder
            .handle_packet(&packet[..packet.len() - 3], &mut buf)
            .is_err());
    }

    #[test]
    fn accepts_unicast_response_bit() {
        let responder = Responder::new(&ResponderConfig::default());
        let packet = query("foo.local", QClass::from(0x8001), QType::A);
        let reply = respond(&responder, &packet).unwrap();
        let rr = single_answer(&reply);
        assert_eq!(rr.to_string(), "foo.local.\t120\tIN\tA\t127.0.0.1");
    }

    #[test]
    fn copies_recursion_desired() {
        let responder = Responder::new(&ResponderConfig::default());
        let mut packet = query("foo.local", QClass::IN, QType::A);
        packet[2] |= 0x01; // RD
        let reply = respond(&responder, &packet).unwrap();
        let dec = MessageDecoder::new(&reply).unwrap();
        assert_eq!(dec.header().id(), 0x1234);
        assert!(dec.header().is_recursion_desired());
    }

    #[test]
    fn worker_threads_reply_to_sender() {
        let sock = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let server = sock.local_addr().unwrap();
        let responder = SyncResponder::from_socket(sock, &ResponderConfig::new().workers(2));
        thread::spawn(move || responder.listen());

        let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        client
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();

        let mut second = query("bar.local", QClass::IN, QType::AAAA);
        second[..2].copy_from_slice(&[0x56, 0x78]);
        client
            .send_to(&query("foo.local", QClass::IN, QType::A), server)
            .unwrap();
        client.send_to(&second, server).unwrap();

        let mut replies = (0..2)
            .map(|_| {
                let mut buf = [0; MDNS_BUFFER_SIZE];
                let (len, from) = client.recv_from(&mut buf).unwrap();
                assert_eq!(from, server);
                let id = MessageDecoder::new(&buf[..len]).unwrap().header().id();
                (id, single_answer(&buf[..len]).to_string())
            })
            .collect::<Vec<_>>();
        replies.sort();

        assert_eq!(
            replies,
            [
                (0x1234, "foo.local.\t120\tIN\tA\t127.0.0.1".to_string()),
                (0x5678, "bar.local.\t120\tIN\tAAAA\t::1".to_string()),
            ]
        );
    }

    #[test]
    fn prefers_cached_address() {
        let cache = Arc::new(RecordCache::new());
        let name = DomainName::from_str("printer.local").unwrap();
        cache.add(&ResourceRecordBuf::new(name.clone(), A::new(Ipv4Addr::new(10, 0, 0, 7))).ttl(60));
        let responder = Responder::new(&ResponderConfig::default()).with_cache(cache);

        let reply = respond(&responder, &query("Printer.local", QClass::IN, QType::A)).unwrap();
        let rr = single_answer(&reply);
        assert_eq!(rr.to_string(), "Printer.local.\t120\tIN\tA\t10.0.0.7");

        // Nothing cached for AAAA or for other names.
        let reply = respond(&responder, &query("printer.local", QClass::IN, QType::AAAA)).unwrap();
        assert_eq!(single_answer(&reply).to_string(), "printer.local.\t120\tIN\tAAAA\t::1");
        let reply = respond(&responder, &query("scanner.local", QClass::IN, QType::A)).unwrap();
        assert_eq!(single_answer(&reply).to_string(), "scanner.local.\t120\tIN\tA\t127.0.0.1");
    }
}
