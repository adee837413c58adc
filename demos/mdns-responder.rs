//! Answers A/AAAA queries for `*.local.` names on the mDNS multicast group.
//!
//! Usage: `mdns-responder [port]`. Try it with
//! `dig @224.0.0.251 -p 5354 foo.local A`.

use std::{env, io, process, sync::Arc};

use log::LevelFilter;
use resolvcache::{
    cache::RecordCache,
    packet::records::{ResourceRecordBuf, A},
    responder::{ResponderConfig, SyncResponder, DEFAULT_PORT},
    MDNS_PORT,
};

fn main() -> io::Result<()> {
    env_logger::Builder::new()
        .filter_module(env!("CARGO_PKG_NAME"), LevelFilter::Trace)
        .filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Trace)
        .init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let port = match &*args {
        [] => DEFAULT_PORT,
        [port] => port.parse().unwrap_or_else(|e| {
            eprintln!("invalid port `{port}`: {e}");
            process::exit(1);
        }),
        _ => {
            eprintln!("usage: mdns-responder [port]");
            eprintln!("port defaults to {DEFAULT_PORT}; pass {MDNS_PORT} to serve the real mDNS port");
            process::exit(1);
        }
    };

    // `printer.local` resolves to the cached address, everything else to the loopback default.
    let cache = Arc::new(RecordCache::new());
    cache.add(
        &ResourceRecordBuf::new("printer.local".parse().unwrap(), A::new([192, 168, 1, 20].into()))
            .ttl(120),
    );
    for entry in cache.list() {
        log::info!("cached: {}", entry);
    }

    let responder = SyncResponder::new(&ResponderConfig::new().port(port))?.with_cache(cache);
    responder.listen()
}
