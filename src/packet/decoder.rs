//! DNS message decoder.

use std::{cmp, fmt, marker::PhantomData, mem::size_of};

use bytemuck::AnyBitPattern;

use crate::num::{U16, U32};

use super::{
    name::{DomainName, Label},
    records::{Record, ResourceRecordBuf, ResourceRecordDecoder},
    section::{self, Section},
    Class, Error, Header, QClass, QType, Type, MDNS_CLASS_FLAG,
};

#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    /// The buffer containing the whole DNS message.
    full_buf: &'a [u8],
    /// The current reader position in the buffer.
    pub(crate) pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            full_buf: buf,
            pos: 0,
        }
    }

    pub(crate) fn buf(&self) -> &'a [u8] {
        &self.full_buf[self.pos..]
    }

    fn read_obj<T: AnyBitPattern>(&mut self) -> Result<T, Error> {
        let bytes = self.buf().get(..size_of::<T>()).ok_or(Error::Eof)?;
        self.pos += size_of::<T>();
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn peek_u8(&self) -> Result<u8, Error> {
        self.full_buf.get(self.pos).copied().ok_or(Error::Eof)
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let slice = self
            .full_buf
            .get(self.pos..self.pos + len)
            .ok_or(Error::Eof)?;
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn read_array<const LEN: usize>(&mut self) -> Result<&'a [u8; LEN], Error> {
        let slice = self.read_slice(LEN)?;
        slice.try_into().map_err(|_| Error::Eof)
    }

    /// Splits off another `Reader` at the current position, with a backing store truncated to
    /// `self.pos + len`.
    ///
    /// The new reader can still follow name pointers into earlier parts of the message.
    fn split_off(&mut self, len: usize) -> Result<Reader<'a>, Error> {
        if self.buf().len() < len {
            return Err(Error::Eof);
        }
        let copy = Reader {
            full_buf: &self.full_buf[..self.pos + len],
            pos: self.pos,
        };
        self.pos += len;
        Ok(copy)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Error> {
        self.read_obj::<u8>()
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(self.read_obj::<U16>()?.get())
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(self.read_obj::<U32>()?.get())
    }

    /// Reads a `<character-string>` value.
    pub(crate) fn read_character_string(&mut self) -> Result<&'a [u8], Error> {
        let length = self.read_u8()?;
        self.read_slice(length.into())
    }

    /// Reads a `<domain-name>` value, following compression pointers.
    pub(crate) fn read_domain_name(&mut self) -> Result<DomainName, Error> {
        let mut domain_name = DomainName::ROOT;
        let mut min_pos = self.pos;
        let mut copy = self.clone();
        loop {
            let length = copy.peek_u8()?;
            match length & 0b1100_0000 {
                0b1100_0000 => {
                    // 14-bit pointer to somewhere else in the message.
                    let ptr = usize::from(copy.read_u16()? & 0b0011_1111_1111_1111);
                    if ptr >= min_pos {
                        // Only pointers to earlier data are followed, so every jump makes progress
                        // towards the start of the message and loops are impossible.
                        return Err(Error::PointerLoop);
                    }
                    self.pos = cmp::max(self.pos, copy.pos);
                    min_pos = ptr;
                    copy.pos = ptr;
                }
                0b0000_0000 => {
                    copy.pos += 1;

                    let length = usize::from(length);
                    if length == 0 {
                        break;
                    }
                    let label = copy.read_slice(length)?;
                    domain_name.push_label(Label::try_new(label)?)?;
                }
                // 01 and 10 are reserved
                _ => return Err(Error::InvalidValue),
            }
        }

        self.pos = cmp::max(self.pos, copy.pos);
        Ok(domain_name)
    }

    fn read_question(&mut self) -> Result<Question, Error> {
        let qname = self.read_domain_name()?;
        let qtype = QType(self.read_u16()?);
        let raw_class = self.read_u16()?;
        Ok(Question {
            qname,
            qtype,
            qclass: QClass(raw_class & !MDNS_CLASS_FLAG),
            unicast_response: raw_class & MDNS_CLASS_FLAG != 0,
        })
    }

    fn read_resource_record(&mut self) -> Result<ResourceRecord<'a>, Error> {
        let name = self.read_domain_name()?;
        let type_ = Type(self.read_u16()?);
        let raw_class = self.read_u16()?;
        let ttl = self.read_u32()?;
        let rdlength = self.read_u16()?;
        let rdata = self.split_off(usize::from(rdlength))?;
        Ok(ResourceRecord {
            name,
            type_,
            class: Class(raw_class & !MDNS_CLASS_FLAG),
            cache_flush: raw_class & MDNS_CLASS_FLAG != 0,
            ttl,
            rdata,
        })
    }
}

/// Streaming decoder for DNS messages.
///
/// The decoder stores the section it is currently reading as the `S` type parameter, starting out
/// in [`section::Question`] after [`MessageDecoder::new`]. Moving on to the *Answer* section skips
/// whatever questions are left. Nothing past the *Answer* section is ever read.
pub struct MessageDecoder<'a, S: Section> {
    header: Header,
    remaining: [u16; 2],
    r: Reader<'a>,
    has_errored: bool,
    section: PhantomData<S>,
}

impl<'a> MessageDecoder<'a, section::Question> {
    /// Creates a streaming message decoder that will read from `buf`.
    pub fn new(buf: &'a [u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let header = r.read_obj::<Header>()?;
        Ok(Self {
            header,
            remaining: [header.question_count(), header.answer_count()],
            r,
            has_errored: false,
            section: PhantomData,
        })
    }

    /// Reads the next [`Question`] from the *Question* section.
    pub fn next(&mut self) -> Option<Result<Question, Error>> {
        self.next_entry(Reader::read_question)
    }

    /// Returns an iterator over the remaining [`Question`]s.
    pub fn iter(&mut self) -> QuestionIter<'_, 'a> {
        QuestionIter { dec: self }
    }

    /// Skips the rest of the *Question* section.
    pub fn answers(mut self) -> Result<MessageDecoder<'a, section::Answer>, Error> {
        while let Some(res) = self.next() {
            res?;
        }

        Ok(MessageDecoder {
            header: self.header,
            remaining: self.remaining,
            r: self.r,
            has_errored: self.has_errored,
            section: PhantomData,
        })
    }
}

impl<'a, S: Section> MessageDecoder<'a, S> {
    /// Returns the message header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    fn next_entry<T>(
        &mut self,
        read: impl FnOnce(&mut Reader<'a>) -> Result<T, Error>,
    ) -> Option<Result<T, Error>> {
        if self.has_errored || self.remaining[S::INDEX] == 0 {
            return None;
        }

        match read(&mut self.r) {
            Ok(entry) => {
                self.remaining[S::INDEX] -= 1;
                Some(Ok(entry))
            }
            Err(e) => {
                self.has_errored = true;
                Some(Err(e))
            }
        }
    }

    fn next_rr(&mut self) -> Option<Result<ResourceRecord<'a>, Error>> {
        self.next_entry(Reader::read_resource_record)
    }

    /// Returns an iterator over the remaining resource records in the current section.
    ///
    /// In the *Question* section this yields nothing; use [`MessageDecoder::next`] there.
    pub fn records(&mut self) -> ResourceRecordIter<'_, 'a, S> {
        ResourceRecordIter { dec: self }
    }
}

/// Iterator over Resource Records in a section of a DNS message.
pub struct ResourceRecordIter<'dec, 'data, S: Section> {
    dec: &'dec mut MessageDecoder<'data, S>,
}

impl<'dec, 'data, S: Section> Iterator for ResourceRecordIter<'dec, 'data, S> {
    type Item = Result<ResourceRecord<'data>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if S::INDEX == 0 {
            return None;
        }
        self.dec.next_rr()
    }
}

/// A Resource Record from the *Answer* section.
pub struct ResourceRecord<'a> {
    name: DomainName,
    type_: Type,
    class: Class,
    cache_flush: bool,
    ttl: u32,
    /// Record data, as a [`Reader`] pointing at the RDATA.
    rdata: Reader<'a>,
}

impl<'a> ResourceRecord<'a> {
    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    pub fn type_(&self) -> Type {
        self.type_
    }

    #[inline]
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns whether the record's mDNS cache-flush bit is set.
    #[inline]
    pub fn cache_flush(&self) -> bool {
        self.cache_flush
    }

    /// Returns the entry's Time To Live, in seconds.
    #[inline]
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the raw record data.
    #[inline]
    pub fn rdata(&self) -> &[u8] {
        self.rdata.buf()
    }

    /// Decodes the RDATA into a [`Record`].
    ///
    /// Types without a dedicated record struct decode to [`Record::Unknown`].
    pub fn data(&self) -> Result<Record, Error> {
        let mut dec = ResourceRecordDecoder {
            r: self.rdata.clone(),
        };
        Record::decode(self.type_, &mut dec)
    }

    /// Decodes the RDATA and copies the whole record into an owned [`ResourceRecordBuf`].
    pub fn to_buf(&self) -> Result<ResourceRecordBuf, Error> {
        Ok(ResourceRecordBuf::new(self.name.clone(), self.data()?)
            .class(self.class)
            .ttl(self.ttl))
    }
}

impl<'a> fmt::Debug for ResourceRecord<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRecord")
            .field("name", &self.name)
            .field("type_", &self.type_)
            .field("class", &self.class)
            .field("cache_flush", &self.cache_flush)
            .field("ttl", &self.ttl)
            .field("rdata", &self.data())
            .finish()
    }
}

impl<'a> fmt::Display for ResourceRecord<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t",
            self.name, self.ttl, self.class, self.type_
        )?;
        match self.data() {
            Ok(rr) => write!(f, "{}", rr),
            Err(e) => write!(f, "<{}>", e),
        }
    }
}

/// An iterator over [`Question`]s in the *Question* section of a DNS message.
pub struct QuestionIter<'dec, 'data> {
    dec: &'dec mut MessageDecoder<'data, section::Question>,
}

impl<'dec, 'data> Iterator for QuestionIter<'dec, 'data> {
    type Item = Result<Question, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.dec.next()
    }
}

/// A question from a DNS query message.
#[derive(Debug)]
pub struct Question {
    qname: DomainName,
    qtype: QType,
    qclass: QClass,
    unicast_response: bool,
}

impl Question {
    /// Returns the domain name that is being queried.
    #[inline]
    pub fn qname(&self) -> &DomainName {
        &self.qname
    }

    /// Returns the resource record types the client is interested in.
    #[inline]
    pub fn qtype(&self) -> QType {
        self.qtype
    }

    /// Returns the record class the client is interested in, without the mDNS unicast-response
    /// bit.
    #[inline]
    pub fn qclass(&self) -> QClass {
        self.qclass
    }

    /// Returns whether the mDNS "QU" bit asks for a unicast response.
    #[inline]
    pub fn unicast_response(&self) -> bool {
        self.unicast_response
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.qname, self.qclass, self.qtype)
    }
}
