//! DNS resource records.
//!
//! Every supported record type has a struct holding its RDATA, and [`Record`] is the closed set of
//! those plus an [`Unknown`] fallback for everything else. The [`fmt::Display`] impl of each type
//! yields the record's canonical value string, which is also what the [`cache`] stores.
//!
//! [`cache`]: crate::cache

use std::{
    fmt::{self, Write},
    net::{Ipv4Addr, Ipv6Addr},
};

use crate::hex::Hex;

use super::{decoder::Reader, encoder::Writer, name::DomainName, Class, Error, Type};

pub struct ResourceRecordEncoder<'a> {
    pub(crate) w: Writer<'a>,
}

pub struct ResourceRecordDecoder<'a> {
    pub(crate) r: Reader<'a>,
}

/// Trait implemented by all typed resource record data.
pub trait ResourceRecordData: Sized {
    /// The associated resource record type.
    const TYPE: Type;

    /// Writes the RDATA of this resource record to the given encoder.
    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>);

    /// Decodes an instance of this resource record from an RDATA field.
    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error>;
}

macro_rules! records {
    (
        $($record:ident),+ $(,)?
    ) => {
        /// Record data of any type.
        ///
        /// Types without a dedicated struct are kept as [`Record::Unknown`] with their raw RDATA.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Record {
            $( $record($record), )+
            Unknown(Unknown),
        }

        impl Record {
            /// Decodes the RDATA held by `dec` as a record of type `ty`.
            pub(crate) fn decode(ty: Type, dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
                match ty {
                    $( Type::$record => $record::decode(dec).map(Self::$record), )+
                    _ => Ok(Self::Unknown(Unknown::new(ty, dec.r.buf().to_vec()))),
                }
            }

            pub(crate) fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
                match self {
                    $( Record::$record(rr) => rr.encode(enc), )+
                    Record::Unknown(rr) => enc.w.write_slice(&rr.rdata),
                }
            }

            pub fn record_type(&self) -> Type {
                match self {
                    $( Record::$record(_) => <$record as ResourceRecordData>::TYPE, )+
                    Record::Unknown(rr) => rr.ty,
                }
            }
        }

        impl fmt::Display for Record {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( Record::$record(r) => fmt::Display::fmt(r, f), )+
                    Record::Unknown(r) => fmt::Display::fmt(r, f),
                }
            }
        }

        $(
            impl From<$record> for Record {
                fn from(rr: $record) -> Self {
                    Record::$record(rr)
                }
            }
        )+
    };
}

records!(A, AAAA, CNAME, MX, NS, SOA, TXT, PTR, SRV, HINFO);

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct A {
    addr: Ipv4Addr,
}

impl ResourceRecordData for A {
    const TYPE: Type = Type::A;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_slice(&self.addr.octets())
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self::new(Ipv4Addr::from(*dec.r.read_array()?)))
    }
}

impl A {
    #[inline]
    pub fn new(addr: Ipv4Addr) -> Self {
        Self { addr }
    }

    #[inline]
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
}

impl fmt::Display for A {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AAAA {
    addr: Ipv6Addr,
}

impl ResourceRecordData for AAAA {
    const TYPE: Type = Type::AAAA;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_slice(&self.addr.octets());
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self::new(Ipv6Addr::from(*dec.r.read_array()?)))
    }
}

impl AAAA {
    #[inline]
    pub fn new(addr: Ipv6Addr) -> Self {
        Self { addr }
    }

    #[inline]
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }
}

impl fmt::Display for AAAA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CNAME {
    target: DomainName,
}

impl ResourceRecordData for CNAME {
    const TYPE: Type = Type::CNAME;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_domain_name(&self.target);
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self::new(dec.r.read_domain_name()?))
    }
}

impl CNAME {
    pub fn new(target: DomainName) -> Self {
        Self { target }
    }

    #[inline]
    pub fn target(&self) -> &DomainName {
        &self.target
    }
}

impl fmt::Display for CNAME {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.target, f)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MX {
    preference: u16,
    exchange: DomainName,
}

impl ResourceRecordData for MX {
    const TYPE: Type = Type::MX;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_u16(self.preference);
        enc.w.write_domain_name(&self.exchange);
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            preference: dec.r.read_u16()?,
            exchange: dec.r.read_domain_name()?,
        })
    }
}

impl MX {
    pub fn new(preference: u16, exchange: DomainName) -> Self {
        Self {
            preference,
            exchange,
        }
    }

    #[inline]
    pub fn preference(&self) -> u16 {
        self.preference
    }

    #[inline]
    pub fn exchange(&self) -> &DomainName {
        &self.exchange
    }
}

impl fmt::Display for MX {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.preference, self.exchange)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NS {
    nsdname: DomainName,
}

impl ResourceRecordData for NS {
    const TYPE: Type = Type::NS;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_domain_name(&self.nsdname);
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self::new(dec.r.read_domain_name()?))
    }
}

impl NS {
    pub fn new(nsdname: DomainName) -> Self {
        Self { nsdname }
    }

    pub fn nsdname(&self) -> &DomainName {
        &self.nsdname
    }
}

impl fmt::Display for NS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.nsdname, f)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SOA {
    mname: DomainName,
    rname: DomainName,
    serial: u32,
    refresh: u32,
    retry: u32,
    expire: u32,
    minimum_ttl: u32,
}

impl ResourceRecordData for SOA {
    const TYPE: Type = Type::SOA;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_domain_name(&self.mname);
        enc.w.write_domain_name(&self.rname);
        for v in [
            self.serial,
            self.refresh,
            self.retry,
            self.expire,
            self.minimum_ttl,
        ] {
            enc.w.write_u32(v);
        }
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            mname: dec.r.read_domain_name()?,
            rname: dec.r.read_domain_name()?,
            serial: dec.r.read_u32()?,
            refresh: dec.r.read_u32()?,
            retry: dec.r.read_u32()?,
            expire: dec.r.read_u32()?,
            minimum_ttl: dec.r.read_u32()?,
        })
    }
}

impl SOA {
    /// Creates an SOA record.
    ///
    /// `timers` are, in order: serial, refresh, retry, expire, and minimum TTL.
    pub fn new(mname: DomainName, rname: DomainName, timers: [u32; 5]) -> Self {
        let [serial, refresh, retry, expire, minimum_ttl] = timers;
        Self {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum_ttl,
        }
    }

    /// The primary name server of the zone.
    #[inline]
    pub fn mname(&self) -> &DomainName {
        &self.mname
    }

    /// The mailbox of the person responsible for the zone.
    #[inline]
    pub fn rname(&self) -> &DomainName {
        &self.rname
    }

    #[inline]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    #[inline]
    pub fn minimum_ttl(&self) -> u32 {
        self.minimum_ttl
    }
}

impl fmt::Display for SOA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.mname,
            self.rname,
            self.serial,
            self.refresh,
            self.retry,
            self.expire,
            self.minimum_ttl
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TXT {
    segments: Vec<Vec<u8>>,
}

impl ResourceRecordData for TXT {
    const TYPE: Type = Type::TXT;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        for segment in self.segments() {
            enc.w.write_character_string(segment);
        }
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        let mut segments = Vec::new();

        // Technically at least one is required, but we accept 0 too.
        while !dec.r.buf().is_empty() {
            segments.push(dec.r.read_character_string()?.to_vec());
        }

        Ok(Self { segments })
    }
}

impl TXT {
    /// Creates a [`TXT`] record from its *character strings*.
    ///
    /// Fails with [`Error::InvalidValue`] if a segment exceeds 255 bytes.
    pub fn new<I, T>(segments: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        let segments = segments.into_iter().map(Into::into).collect::<Vec<_>>();
        if segments.iter().any(|s| s.len() > 255) {
            return Err(Error::InvalidValue);
        }
        Ok(Self { segments })
    }

    /// Returns an iterator over all *character strings* in this record.
    pub fn segments(&self) -> impl Iterator<Item = &'_ [u8]> {
        self.segments.iter().map(|s| &**s)
    }
}

/// Segments are separated by a single space. Printable ASCII is written verbatim, except for `"`
/// and `\` which get a backslash, and everything else is written as `\DDD`.
impl fmt::Display for TXT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments().enumerate() {
            if i != 0 {
                f.write_char(' ')?;
            }

            write_escaped(f, segment)?;
        }
        Ok(())
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, string: &[u8]) -> fmt::Result {
    for &byte in string {
        match byte {
            b'"' | b'\\' => {
                f.write_char('\\')?;
                f.write_char(byte as char)?;
            }
            b' '..=b'~' => f.write_char(byte as char)?,
            _ => write!(f, "\\{:03}", byte)?,
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PTR {
    ptrdname: DomainName,
}

impl ResourceRecordData for PTR {
    const TYPE: Type = Type::PTR;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_domain_name(&self.ptrdname);
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self::new(dec.r.read_domain_name()?))
    }
}

impl PTR {
    pub fn new(ptrdname: DomainName) -> Self {
        Self { ptrdname }
    }

    pub fn ptrdname(&self) -> &DomainName {
        &self.ptrdname
    }
}

impl fmt::Display for PTR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.ptrdname, f)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SRV {
    priority: u16,
    weight: u16,
    port: u16,
    target: DomainName,
}

impl ResourceRecordData for SRV {
    const TYPE: Type = Type::SRV;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_u16(self.priority);
        enc.w.write_u16(self.weight);
        enc.w.write_u16(self.port);
        enc.w.write_domain_name(&self.target);
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            priority: dec.r.read_u16()?,
            weight: dec.r.read_u16()?,
            port: dec.r.read_u16()?,
            target: dec.r.read_domain_name()?,
        })
    }
}

impl SRV {
    pub fn new(priority: u16, weight: u16, port: u16, target: DomainName) -> Self {
        Self {
            priority,
            weight,
            port,
            target,
        }
    }

    /// Returns the priority value of this service (lower values mean that the service should be
    /// preferred).
    #[inline]
    pub fn priority(&self) -> u16 {
        self.priority
    }

    #[inline]
    pub fn weight(&self) -> u16 {
        self.weight
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn target(&self) -> &DomainName {
        &self.target
    }
}

/// `<priority> <weight> <port> <target>`
impl fmt::Display for SRV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.target
        )
    }
}

/// Host information: CPU and operating system.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct HINFO {
    cpu: Vec<u8>,
    os: Vec<u8>,
}

impl ResourceRecordData for HINFO {
    const TYPE: Type = Type::HINFO;

    fn encode(&self, enc: &mut ResourceRecordEncoder<'_>) {
        enc.w.write_character_string(&self.cpu);
        enc.w.write_character_string(&self.os);
    }

    fn decode(dec: &mut ResourceRecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            cpu: dec.r.read_character_string()?.to_vec(),
            os: dec.r.read_character_string()?.to_vec(),
        })
    }
}

impl HINFO {
    /// Fails with [`Error::InvalidValue`] if either string exceeds 255 bytes.
    pub fn new(cpu: impl Into<Vec<u8>>, os: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let (cpu, os) = (cpu.into(), os.into());
        if cpu.len() > 255 || os.len() > 255 {
            return Err(Error::InvalidValue);
        }
        Ok(Self { cpu, os })
    }

    pub fn cpu(&self) -> &[u8] {
        &self.cpu
    }

    pub fn os(&self) -> &[u8] {
        &self.os
    }
}

/// Both strings quoted, as in zone files: `"<cpu>" "<os>"`.
impl fmt::Display for HINFO {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        write_escaped(f, &self.cpu)?;
        f.write_str("\" \"")?;
        write_escaped(f, &self.os)?;
        f.write_char('"')
    }
}

/// Record data of a type without a dedicated struct.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Unknown {
    ty: Type,
    rdata: Vec<u8>,
}

impl Unknown {
    pub fn new(ty: Type, rdata: Vec<u8>) -> Self {
        Self { ty, rdata }
    }

    #[inline]
    pub fn rdata(&self) -> &[u8] {
        &self.rdata
    }
}

/// Uses the generic RDATA notation from RFC 3597, `\# <length> <hex>`.
impl fmt::Display for Unknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\# {}", self.rdata.len())?;
        if !self.rdata.is_empty() {
            write!(f, " {}", Hex(&self.rdata))?;
        }
        Ok(())
    }
}

/// An owned resource record: owner name, class, TTL, and [`Record`] data.
///
/// This is the unit the [`cache`] ingests and the responder answers with.
///
/// [`cache`]: crate::cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecordBuf {
    name: DomainName,
    class: Class,
    ttl: u32,
    data: Record,
}

impl ResourceRecordBuf {
    /// Creates a record in class [`Class::IN`] with a TTL of 0.
    pub fn new(name: DomainName, data: impl Into<Record>) -> Self {
        Self {
            name,
            class: Class::IN,
            ttl: 0,
            data: data.into(),
        }
    }

    #[inline]
    pub fn class(self, class: Class) -> Self {
        Self { class, ..self }
    }

    #[inline]
    pub fn ttl(self, ttl: u32) -> Self {
        Self { ttl, ..self }
    }

    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    pub fn record_class(&self) -> Class {
        self.class
    }

    #[inline]
    pub fn record_ttl(&self) -> u32 {
        self.ttl
    }

    #[inline]
    pub fn record_type(&self) -> Type {
        self.data.record_type()
    }

    #[inline]
    pub fn data(&self) -> &Record {
        &self.data
    }
}

impl From<Unknown> for Record {
    fn from(rr: Unknown) -> Self {
        Record::Unknown(rr)
    }
}

/// Zone-file style presentation: `name<TAB>ttl<TAB>class<TAB>type<TAB>rdata`.
impl fmt::Display for ResourceRecordBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name,
            self.ttl,
            self.class,
            self.record_type(),
            self.data
        )
    }
}
