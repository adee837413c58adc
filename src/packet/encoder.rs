//! DNS message encoder.
//!
//! Names are always written in full; the encoder never emits compression pointers.

use core::marker::PhantomData;
use std::mem::size_of;

use bytemuck::{NoUninit, Zeroable};

use super::{
    name::DomainName,
    records::{Record, ResourceRecordBuf, ResourceRecordEncoder},
    section::{self, Section},
    Class, Error, Header, QClass, QType,
};

pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    pub(crate) pos: usize,
    trunc: bool,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            trunc: false,
        }
    }

    fn modify_header(&mut self, with: impl FnOnce(&mut Header)) {
        let h = bytemuck::from_bytes_mut(&mut self.buf[..size_of::<Header>()]);
        with(h);
    }

    /// Writes `data`, or as much of it as fits, marking the output as truncated otherwise.
    pub(crate) fn write_slice(&mut self, data: &[u8]) {
        let buf = &mut self.buf[self.pos..];
        if data.len() > buf.len() {
            self.trunc = true;
            let fits = buf.len();
            buf.copy_from_slice(&data[..fits]);
            self.pos += fits;
        } else {
            buf[..data.len()].copy_from_slice(data);
            self.pos += data.len();
        }
    }

    pub(crate) fn write_obj<T: NoUninit>(&mut self, obj: T) {
        self.write_slice(bytemuck::bytes_of(&obj))
    }

    pub(crate) fn write_u8(&mut self, b: u8) {
        self.write_slice(&[b]);
    }

    pub(crate) fn write_u16(&mut self, v: u16) {
        self.write_slice(&v.to_be_bytes());
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Writes an uncompressed `<domain-name>`.
    pub(crate) fn write_domain_name(&mut self, name: &DomainName) {
        for label in name.labels() {
            // `Label` guarantees at most 63 bytes.
            self.write_u8(label.as_bytes().len() as u8);
            self.write_slice(label.as_bytes());
        }
        // Implicit root label at the end.
        self.write_u8(0);
    }

    /// Writes a `<character-string>`; callers guarantee `string` is at most 255 bytes.
    pub(crate) fn write_character_string(&mut self, string: &[u8]) {
        debug_assert!(string.len() <= 255);
        self.write_u8(string.len() as u8);
        self.write_slice(string);
    }
}

struct EncoderInner<'a> {
    w: Writer<'a>,
    qdcount: u16,
    ancount: u16,
}

impl<'a> Drop for EncoderInner<'a> {
    fn drop(&mut self) {
        let trunc = self.w.trunc;
        let (qd, an) = (self.qdcount, self.ancount);
        self.w.modify_header(|h| {
            h.set_counts(qd, an);
            h.set_truncated(trunc);
        });
    }
}

/// Streaming encoder for DNS messages.
///
/// Like [`MessageDecoder`], the encoder tracks the section it is writing as the `S` type parameter.
/// A message has a *Question* section followed by an *Answer* section; the *Authority* and
/// *Additional Records* sections are always left empty.
///
/// [`MessageDecoder`]: super::decoder::MessageDecoder
pub struct MessageEncoder<'a, S: Section> {
    inner: EncoderInner<'a>,
    _p: PhantomData<S>,
}

impl<'a, S: Section> MessageEncoder<'a, S> {
    /// Overrides the whole message header.
    ///
    /// The section counts and the TC bit are overwritten again when the encoder is dropped or
    /// finished, so that the message always parses correctly.
    pub fn set_header(&mut self, header: Header) {
        self.inner.w.modify_header(|h| *h = header);
    }

    /// Finishes encoding the message, and returns the number of bytes written to the buffer.
    ///
    /// If the message did not fit into the buffer, this returns [`Error::Truncated`] and the
    /// message's TC bit is set. The truncated message in the buffer can still be sent.
    pub fn finish(self) -> Result<usize, Error> {
        let bytes_written = self.inner.w.pos;

        if self.inner.w.trunc {
            Err(Error::Truncated)
        } else {
            Ok(bytes_written)
        }
    }

    fn change_section<N: Section>(self) -> MessageEncoder<'a, N> {
        MessageEncoder {
            inner: self.inner,
            _p: PhantomData,
        }
    }

    fn write_rr(&mut self, rr: ResourceRecord<'_>) {
        let w = &mut self.inner.w;
        w.write_domain_name(rr.name);
        w.write_u16(rr.rdata.record_type().to_raw());
        w.write_u16(rr.class.to_raw());
        w.write_u32(rr.ttl);

        // Reserve RDLENGTH, write the RDATA, then go back and fill in its length.
        let lenpos = w.pos;
        w.write_u16(0);
        let before_rdata = w.pos;
        let mut enc = ResourceRecordEncoder {
            w: Writer {
                buf: &mut *w.buf,
                pos: w.pos,
                trunc: w.trunc,
            },
        };
        rr.rdata.encode(&mut enc);
        w.pos = enc.w.pos;
        w.trunc = enc.w.trunc;

        if w.trunc {
            // The length field may not even have been written. Leave it alone.
            return;
        }
        let rdata_len = match u16::try_from(w.pos - before_rdata) {
            Ok(len) => len,
            Err(_) => {
                w.trunc = true;
                return;
            }
        };
        let finished_pos = w.pos;
        w.pos = lenpos;
        w.write_u16(rdata_len);
        w.pos = finished_pos;
    }
}

impl<'a> MessageEncoder<'a, section::Question> {
    /// Creates a new message encoder that will write to `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is too small to hold a message [`Header`] (12 bytes).
    pub fn new(buf: &'a mut [u8]) -> Self {
        assert!(
            buf.len() >= size_of::<Header>(),
            "message buffer too small for the header"
        );
        let mut w = Writer::new(buf);
        w.write_obj(Header::zeroed());
        Self {
            inner: EncoderInner {
                w,
                qdcount: 0,
                ancount: 0,
            },
            _p: PhantomData,
        }
    }

    /// Adds a question to the *Question* section.
    pub fn question(&mut self, question: Question<'_>) {
        self.inner.w.write_domain_name(question.name);
        self.inner.w.write_u16(question.ty.to_raw());
        self.inner.w.write_u16(question.class.to_raw());
        self.inner.qdcount += 1;
    }

    /// Moves the encoder to the *Answer* section.
    #[inline]
    pub fn answers(self) -> MessageEncoder<'a, section::Answer> {
        self.change_section()
    }
}

impl<'a> MessageEncoder<'a, section::Answer> {
    pub fn add_answer(&mut self, rr: ResourceRecord<'_>) {
        self.write_rr(rr);
        self.inner.ancount += 1;
    }
}

/// A question to encode.
pub struct Question<'a> {
    name: &'a DomainName,
    class: QClass,
    ty: QType,
}

impl<'a> Question<'a> {
    /// Creates a question asking for all records ([`QType::ALL`]) in the internet class
    /// ([`QClass::IN`]) pertaining to `name`.
    #[inline]
    pub fn new(name: &'a DomainName) -> Self {
        Self {
            name,
            class: QClass::IN,
            ty: QType::ALL,
        }
    }

    /// Sets the record class to query.
    #[inline]
    pub fn class(self, class: QClass) -> Self {
        Self { class, ..self }
    }

    /// Sets the resource type to query.
    #[inline]
    pub fn ty(self, ty: QType) -> Self {
        Self { ty, ..self }
    }
}

/// A borrowed resource record to encode.
pub struct ResourceRecord<'a> {
    name: &'a DomainName,
    class: Class,
    ttl: u32,
    rdata: &'a Record,
}

impl<'a> ResourceRecord<'a> {
    pub fn new(name: &'a DomainName, rdata: &'a Record) -> Self {
        Self {
            name,
            class: Class::IN,
            ttl: 0,
            rdata,
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
}

impl<'a> From<&'a ResourceRecordBuf> for ResourceRecord<'a> {
    fn from(rr: &'a ResourceRecordBuf) -> Self {
        Self::new(rr.name(), rr.data())
            .class(rr.record_class())
            .ttl(rr.record_ttl())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use expect_test::expect;

    use super::*;
    use crate::{hex::Hex, packet::records::A};

    #[test]
    fn encode_response() {
        let name = DomainName::from_str("foo.local").unwrap();
        let rr = ResourceRecordBuf::new(name.clone(), A::new(Ipv4Addr::LOCALHOST)).ttl(120);

        let mut buf = [0; 512];
        let mut header = Header::default();
        header.set_id(0xbeef);
        header.set_response(true);
        let mut enc = MessageEncoder::new(&mut buf);
        enc.set_header(header);
        enc.question(Question::new(&name).ty(QType::A));
        let mut enc = enc.answers();
        enc.add_answer((&rr).into());
        let len = enc.finish().unwrap();

        expect![[r#"
            be ef 80 00 00 01 00 01 00 00 00 00 03 66 6f 6f 05 6c 6f 63 61 6c 00 00 01 00 01 03 66 6f 6f 05 6c 6f 63 61 6c 00 00 01 00 01 00 00 00 78 00 04 7f 00 00 01"#]]
        .assert_eq(&format!("{:#}", Hex(&buf[..len])));
    }

    #[test]
    fn truncation_sets_tc() {
        let name = DomainName::from_str("a-rather-long-name.local").unwrap();
        let mut buf = [0; 20];
        let mut enc = MessageEncoder::new(&mut buf);
        enc.question(Question::new(&name));
        assert_eq!(enc.finish(), Err(Error::Truncated));

        let header: Header = bytemuck::pod_read_unaligned(&buf[..12]);
        assert!(header.is_truncated());
        assert_eq!(header.question_count(), 1);
    }
}
