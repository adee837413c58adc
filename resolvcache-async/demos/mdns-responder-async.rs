//! The `mdns-responder` demo, served from a single async task.

use std::{env, io, process};

use futures_lite::future;
use log::LevelFilter;
use resolvcache::MDNS_PORT;
use resolvcache_async::responder::{AsyncResponder, ResponderConfig, DEFAULT_PORT};

fn main() -> io::Result<()> {
    env_logger::Builder::new()
        .filter_module("resolvcache", LevelFilter::Trace)
        .filter_module(env!("CARGO_PKG_NAME"), LevelFilter::Trace)
        .filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Trace)
        .init();

    let port = match env::args().nth(1) {
        None => DEFAULT_PORT,
        Some(port) => port.parse().unwrap_or_else(|e| {
            eprintln!("invalid port `{port}`: {e}");
            eprintln!("usage: mdns-responder-async [port] (e.g. {MDNS_PORT})");
            process::exit(1);
        }),
    };

    let responder = AsyncResponder::new(&ResponderConfig::new().port(port))?;
    future::block_on(responder.listen())
}
