//! In-memory record cache.
//!
//! Records are identified by their `(name, type, value)` triple, where the value is the canonical
//! string rendering of the record data (see [`Record`]'s `Display` impl). Adding a record whose
//! identity is already cached refreshes the existing entry instead of creating a second one.
//!
//! Entries are kept until they are explicitly removed or swept with
//! [`RecordCache::purge_expired`]; nothing expires on its own.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;

use crate::packet::{
    decoder,
    name::DomainName,
    records::{Record, ResourceRecordBuf},
    Error, Type,
};

/// The cached view of a resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    name: String,
    rtype: String,
    value: String,
    ttl: u32,
}

impl DnsRecord {
    /// Renders `rr` into its cached form.
    ///
    /// A, AAAA, CNAME, MX, NS, SOA, and TXT records store their record data as the value. Every
    /// other type stores the whole-record presentation.
    pub fn from_rr(rr: &ResourceRecordBuf) -> Self {
        let value = match rr.data() {
            Record::A(_)
            | Record::AAAA(_)
            | Record::CNAME(_)
            | Record::MX(_)
            | Record::NS(_)
            | Record::SOA(_)
            | Record::TXT(_) => rr.data().to_string(),
            Record::PTR(_) | Record::SRV(_) | Record::HINFO(_) | Record::Unknown(_) => {
                rr.to_string()
            }
        };
        Self {
            name: rr.name().to_string(),
            rtype: rr.record_type().to_string(),
            value,
            ttl: rr.record_ttl(),
        }
    }

    /// The fully-qualified owner name, with a trailing dot.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The record type mnemonic (`A`, `MX`, ...), or `TYPE<n>`.
    #[inline]
    pub fn rtype(&self) -> &str {
        &self.rtype
    }

    /// The canonical value string.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[inline]
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    fn same_identity(&self, other: &DnsRecord) -> bool {
        self.name == other.name && self.rtype == other.rtype && self.value == other.value
    }
}

/// `name type value ttl`, separated by single spaces.
impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.name, self.rtype, self.value, self.ttl
        )
    }
}

/// A [`DnsRecord`] together with its cache bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    record: DnsRecord,
    expiry: SystemTime,
    timestamp: SystemTime,
    last_query: SystemTime,
}

impl CacheRecord {
    #[inline]
    pub fn record(&self) -> &DnsRecord {
        &self.record
    }

    /// The time at which the record's TTL lapses, counted from its most recent refresh.
    #[inline]
    pub fn expiry(&self) -> SystemTime {
        self.expiry
    }

    /// The time the record's identity was first cached. Refreshes do not change it.
    #[inline]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// The time of the most recent add or refresh.
    ///
    /// Lookups do not touch this.
    #[inline]
    pub fn last_query(&self) -> SystemTime {
        self.last_query
    }

    /// Returns whether the record's TTL has lapsed at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expiry <= now
    }
}

impl fmt::Display for CacheRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.record, f)
    }
}

/// What [`RecordCache::add`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The identity was not cached before and has been appended.
    Inserted,
    /// An entry with the same identity existed; its TTL, expiry, and last-query time were updated.
    Refreshed,
}

/// Selects the entry to remove from a [`RecordCache`].
///
/// The name must match exactly (after adding a trailing dot if missing). Type and value, when
/// given, narrow down names that have more than one cached record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveRequest {
    name: String,
    rtype: Option<String>,
    value: Option<String>,
}

impl RemoveRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: fully_qualified(name.into()),
            rtype: None,
            value: None,
        }
    }

    /// Only match records of this type. Type mnemonics are compared case-insensitively.
    pub fn rtype(self, rtype: impl Into<String>) -> Self {
        Self {
            rtype: Some(rtype.into()),
            ..self
        }
    }

    /// Only match records with this exact value string.
    pub fn value(self, value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..self
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, record: &DnsRecord) -> bool {
        record.name == self.name
            && self
                .rtype
                .as_deref()
                .map_or(true, |t| t.eq_ignore_ascii_case(&record.rtype))
            && self.value.as_deref().map_or(true, |v| v == record.value)
    }
}

fn fully_qualified(mut name: String) -> String {
    if !name.ends_with('.') {
        name.push('.');
    }
    name
}

/// Why [`RecordCache::remove`] did not remove anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveError {
    /// No cached record matches the request.
    NotFound { name: String },
    /// More than one cached record matches. The request has to be narrowed down by type and/or
    /// value before anything is removed.
    Ambiguous {
        name: String,
        candidates: Vec<CacheRecord>,
    },
}

impl fmt::Display for RemoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoveError::NotFound { name } => write!(f, "no records found with the name {}", name),
            RemoveError::Ambiguous { name, candidates } => write!(
                f,
                "{} records found with the name {}",
                candidates.len(),
                name
            ),
        }
    }
}

impl std::error::Error for RemoveError {}

/// A thread-safe record cache.
///
/// Every operation holds the internal lock for its whole duration, so operations never observe
/// each other half-done. Read operations hand out clones.
#[derive(Debug, Default)]
pub struct RecordCache {
    // Kept in insertion order of first-seen identities.
    entries: Mutex<Vec<CacheRecord>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `rr` to the cache, or refreshes the entry with the same identity.
    pub fn add(&self, rr: &ResourceRecordBuf) -> AddOutcome {
        self.add_at(rr, SystemTime::now())
    }

    /// Like [`RecordCache::add`], with an explicit current time.
    pub fn add_at(&self, rr: &ResourceRecordBuf, now: SystemTime) -> AddOutcome {
        let record = DnsRecord::from_rr(rr);
        let expiry = now + Duration::from_secs(u64::from(record.ttl));

        let mut entries = self.entries.lock();
        match entries
            .iter_mut()
            .find(|entry| entry.record.same_identity(&record))
        {
            Some(entry) => {
                log::trace!("refreshing cached record: {}", record);
                entry.record.ttl = record.ttl;
                entry.expiry = expiry;
                entry.last_query = now;
                AddOutcome::Refreshed
            }
            None => {
                log::debug!("caching record: {}", record);
                entries.push(CacheRecord {
                    record,
                    expiry,
                    timestamp: now,
                    last_query: now,
                });
                AddOutcome::Inserted
            }
        }
    }

    /// Decodes a resource record straight out of a message and adds it.
    ///
    /// Nothing is cached if the record data fails to decode.
    pub fn ingest(&self, rr: &decoder::ResourceRecord<'_>) -> Result<AddOutcome, Error> {
        Ok(self.add(&rr.to_buf()?))
    }

    /// Returns a snapshot of all cached records, in the order their identities were first added.
    pub fn list(&self) -> Vec<CacheRecord> {
        self.entries.lock().clone()
    }

    /// Returns the cached records of type `ty` owned by `name`.
    ///
    /// Names are compared ASCII case-insensitively, as in DNS lookups.
    pub fn lookup(&self, name: &DomainName, ty: Type) -> Vec<CacheRecord> {
        let name = name.to_string();
        let ty = ty.to_string();
        self.entries
            .lock()
            .iter()
            .filter(|e| e.record.name.eq_ignore_ascii_case(&name) && e.record.rtype == ty)
            .cloned()
            .collect()
    }

    /// Removes the single record selected by `req`.
    ///
    /// The cache is left untouched unless exactly one record matches.
    pub fn remove(&self, req: &RemoveRequest) -> Result<CacheRecord, RemoveError> {
        let mut entries = self.entries.lock();
        let mut matching = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| req.matches(&e.record))
            .map(|(i, _)| i);

        match (matching.next(), matching.next()) {
            (None, _) => {
                log::debug!("remove: nothing cached under {}", req.name);
                Err(RemoveError::NotFound {
                    name: req.name.clone(),
                })
            }
            (Some(index), None) => {
                let removed = entries.remove(index);
                log::debug!("removed cached record: {}", removed.record);
                Ok(removed)
            }
            (Some(_), Some(_)) => {
                let candidates = entries
                    .iter()
                    .filter(|e| req.matches(&e.record))
                    .cloned()
                    .collect::<Vec<_>>();
                log::debug!(
                    "remove: {} candidates under {}, not removing any",
                    candidates.len(),
                    req.name
                );
                Err(RemoveError::Ambiguous {
                    name: req.name.clone(),
                    candidates,
                })
            }
        }
    }

    /// Drops every record whose TTL has lapsed and returns them.
    pub fn purge_expired(&self) -> Vec<CacheRecord> {
        self.purge_expired_at(SystemTime::now())
    }

    /// Like [`RecordCache::purge_expired`], with an explicit current time.
    pub fn purge_expired_at(&self, now: SystemTime) -> Vec<CacheRecord> {
        let mut entries = self.entries.lock();
        let (expired, live): (Vec<_>, Vec<_>) =
            entries.drain(..).partition(|e| e.is_expired_at(now));
        *entries = live;

        if !expired.is_empty() {
            log::debug!("purged {} expired records", expired.len());
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::{Ipv4Addr, Ipv6Addr},
        sync::Arc,
        thread,
    };

    use super::*;
    use crate::packet::records::{Unknown, A, AAAA, MX, PTR, SOA, TXT};

    fn name(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn a(owner: &str, addr: [u8; 4], ttl: u32) -> ResourceRecordBuf {
        ResourceRecordBuf::new(name(owner), A::new(Ipv4Addr::from(addr))).ttl(ttl)
    }

    fn mx(owner: &str, pref: u16, exchange: &str) -> ResourceRecordBuf {
        ResourceRecordBuf::new(name(owner), MX::new(pref, name(exchange))).ttl(3600)
    }

    #[test]
    fn refresh_keeps_identity_and_first_seen_time() {
        let cache = RecordCache::new();
        assert_eq!(
            cache.add_at(&a("example.com", [192, 0, 2, 1], 300), at(0)),
            AddOutcome::Inserted
        );
        assert_eq!(
            cache.add_at(&a("example.com", [192, 0, 2, 1], 60), at(10)),
            AddOutcome::Refreshed
        );

        let list = cache.list();
        assert_eq!(list.len(), 1);
        let entry = &list[0];
        assert_eq!(entry.record().ttl(), 60);
        assert_eq!(entry.timestamp(), at(0));
        assert_eq!(entry.last_query(), at(10));
        assert_eq!(entry.expiry(), at(70));
    }

    #[test]
    fn distinct_identities() {
        let cache = RecordCache::new();
        let rrs = [
            a("example.com", [192, 0, 2, 1], 300),
            a("example.com", [192, 0, 2, 2], 300),
            a("example.org", [192, 0, 2, 1], 300),
            ResourceRecordBuf::new(name("example.com"), AAAA::new(Ipv6Addr::LOCALHOST)),
            mx("example.com", 10, "mail.example.com"),
            mx("example.com", 20, "mail.example.com"),
        ];
        for (i, rr) in rrs.iter().enumerate() {
            assert_eq!(cache.add_at(rr, at(0)), AddOutcome::Inserted);
            assert_eq!(cache.len(), i + 1);
        }
    }

    #[test]
    fn list_keeps_insertion_order() {
        let cache = RecordCache::new();
        cache.add_at(&a("one.example", [10, 0, 0, 1], 300), at(0));
        cache.add_at(&a("two.example", [10, 0, 0, 2], 300), at(1));
        cache.add_at(&a("three.example", [10, 0, 0, 3], 300), at(2));
        cache.add_at(&a("one.example", [10, 0, 0, 1], 900), at(3));

        let names = cache
            .list()
            .iter()
            .map(|e| e.record().name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["one.example.", "two.example.", "three.example."]);
    }

    #[test]
    fn rendered_values() {
        let cache = RecordCache::new();
        cache.add_at(&mx("example.com", 10, "mail.example.com"), at(0));
        cache.add_at(
            &ResourceRecordBuf::new(
                name("example.com"),
                SOA::new(
                    name("ns1.example.com"),
                    name("admin.example.com"),
                    [1, 7200, 3600, 1209600, 300],
                ),
            )
            .ttl(3600),
            at(0),
        );
        cache.add_at(
            &ResourceRecordBuf::new(name("example.com"), TXT::new(["a b", "c"]).unwrap()).ttl(5),
            at(0),
        );
        cache.add_at(
            &ResourceRecordBuf::new(name("example.com"), Unknown::new(Type(99), vec![1, 2]))
                .ttl(7),
            at(0),
        );

        let rendered = cache
            .list()
            .iter()
            .map(|e| format!("{}|{}", e.record().rtype(), e.record().value()))
            .collect::<Vec<_>>();
        assert_eq!(
            rendered,
            [
                "MX|10 mail.example.com.",
                "SOA|ns1.example.com. admin.example.com. 1 7200 3600 1209600 300",
                "TXT|a b c",
                "TYPE99|example.com.\t7\tIN\tTYPE99\t\\# 2 0102",
            ]
        );
    }

    #[test]
    fn whole_record_values() {
        let cache = RecordCache::new();
        cache.add_at(
            &ResourceRecordBuf::new(
                name("_ipp._tcp.local"),
                PTR::new(name("printer._ipp._tcp.local")),
            )
            .ttl(4500),
            at(0),
        );
        cache.add_at(
            &ResourceRecordBuf::new(
                name("_443._tcp.example.com"),
                Unknown::new(Type::TLSA, vec![3, 1, 1, 0xab]),
            )
            .ttl(600),
            at(0),
        );

        let list = cache.list();
        assert_eq!(list[0].record().rtype(), "PTR");
        assert_eq!(
            list[0].record().value(),
            "_ipp._tcp.local.\t4500\tIN\tPTR\tprinter._ipp._tcp.local."
        );
        assert_eq!(list[1].record().rtype(), "TLSA");
        assert_eq!(
            list[1].record().value(),
            "_443._tcp.example.com.\t600\tIN\tTLSA\t\\# 4 030101ab"
        );
    }

    #[test]
    fn remove_single_match() {
        let cache = RecordCache::new();
        cache.add_at(&a("example.com", [192, 0, 2, 1], 300), at(0));
        cache.add_at(&a("example.org", [192, 0, 2, 1], 300), at(0));

        let removed = cache.remove(&RemoveRequest::new("example.com")).unwrap();
        assert_eq!(removed.record().name(), "example.com.");
        assert_eq!(removed.record().value(), "192.0.2.1");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.list()[0].record().name(), "example.org.");
    }

    #[test]
    fn remove_not_found() {
        let cache = RecordCache::new();
        cache.add_at(&a("example.com", [192, 0, 2, 1], 300), at(0));
        let before = cache.list();

        assert_eq!(
            cache.remove(&RemoveRequest::new("example.net")),
            Err(RemoveError::NotFound {
                name: "example.net.".into()
            })
        );
        // no suffix matching
        assert!(cache.remove(&RemoveRequest::new("com")).is_err());
        assert_eq!(cache.list(), before);
    }

    #[test]
    fn remove_ambiguous_then_narrowed() {
        let cache = RecordCache::new();
        cache.add_at(&a("example.com", [192, 0, 2, 1], 300), at(0));
        cache.add_at(&a("example.com", [192, 0, 2, 2], 300), at(0));
        cache.add_at(&mx("example.com", 10, "mail.example.com"), at(0));
        let before = cache.list();

        match cache.remove(&RemoveRequest::new("example.com.")) {
            Err(RemoveError::Ambiguous { name, candidates }) => {
                assert_eq!(name, "example.com.");
                assert_eq!(candidates, before);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert_eq!(cache.list(), before);

        // Type alone still leaves two A records.
        assert!(matches!(
            cache.remove(&RemoveRequest::new("example.com").rtype("a")),
            Err(RemoveError::Ambiguous { candidates, .. }) if candidates.len() == 2
        ));

        let removed = cache
            .remove(&RemoveRequest::new("example.com").rtype("MX"))
            .unwrap();
        assert_eq!(removed.record().value(), "10 mail.example.com.");

        let removed = cache
            .remove(
                &RemoveRequest::new("example.com")
                    .rtype("A")
                    .value("192.0.2.2"),
            )
            .unwrap();
        assert_eq!(removed.record().value(), "192.0.2.2");
        assert_eq!(cache.len(), 1);

        // The cache is still usable after all of that.
        assert_eq!(
            cache.add_at(&a("example.com", [192, 0, 2, 2], 300), at(1)),
            AddOutcome::Inserted
        );
    }

    #[test]
    fn lookup_by_name_and_type() {
        let cache = RecordCache::new();
        cache.add_at(&a("printer.local", [192, 168, 1, 20], 120), at(0));
        cache.add_at(&mx("printer.local", 10, "mail.local"), at(0));

        let found = cache.lookup(&name("PRINTER.local."), Type::A);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record().value(), "192.168.1.20");
        assert!(cache.lookup(&name("printer.local"), Type::AAAA).is_empty());
    }

    #[test]
    fn purge_only_lapsed() {
        let cache = RecordCache::new();
        cache.add_at(&a("short.example", [10, 0, 0, 1], 10), at(0));
        cache.add_at(&a("long.example", [10, 0, 0, 2], 1000), at(0));
        cache.add_at(&a("refreshed.example", [10, 0, 0, 3], 10), at(0));
        cache.add_at(&a("refreshed.example", [10, 0, 0, 3], 10), at(50));

        // Nothing happens without an explicit sweep.
        assert_eq!(cache.len(), 3);

        let purged = cache.purge_expired_at(at(10));
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].record().name(), "short.example.");
        assert_eq!(cache.len(), 2);

        assert!(cache.purge_expired_at(at(59)).is_empty());
        assert_eq!(cache.purge_expired_at(at(60)).len(), 1);
        assert_eq!(cache.list()[0].record().name(), "long.example.");
    }

    #[test]
    fn concurrent_adds() {
        let cache = Arc::new(RecordCache::new());
        let threads = (0..4)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..50u8 {
                        cache.add(&a("shared.example", [10, 0, t, i % 10], u32::from(i)));
                    }
                })
            })
            .collect::<Vec<_>>();
        for t in threads {
            t.join().unwrap();
        }

        // 4 threads * 10 distinct addresses
        assert_eq!(cache.len(), 40);
    }
}
