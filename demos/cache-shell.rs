//! Interactive shell over a small pre-filled record cache.
//!
//! Reads commands from stdin, one per line: `list`, `remove ?`,
//! `remove <name> [<type> [<value>...]]`, and `purge` to drop lapsed records.

use std::{
    io::{self, BufRead, Write},
    net::{Ipv4Addr, Ipv6Addr},
};

use log::LevelFilter;
use resolvcache::{
    cache::RecordCache,
    command::{self, Command},
    name::DomainName,
    packet::records::{ResourceRecordBuf, A, AAAA, MX, TXT},
};

fn main() -> io::Result<()> {
    env_logger::Builder::new()
        .filter_module(env!("CARGO_PKG_NAME"), LevelFilter::Debug)
        .filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Debug)
        .init();

    let cache = RecordCache::new();
    let name = |s: &str| s.parse::<DomainName>().unwrap();
    for rr in [
        ResourceRecordBuf::new(name("example.com"), A::new(Ipv4Addr::new(93, 184, 216, 34))).ttl(300),
        ResourceRecordBuf::new(name("example.com"), AAAA::new(Ipv6Addr::LOCALHOST)).ttl(300),
        ResourceRecordBuf::new(name("example.com"), MX::new(10, name("mail.example.com"))).ttl(3600),
        ResourceRecordBuf::new(name("example.org"), TXT::new(["hello world"]).unwrap()).ttl(5),
    ] {
        cache.add(&rr);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim() == "purge" {
            for entry in cache.purge_expired() {
                writeln!(stdout, "Purged: {}", entry)?;
            }
        } else {
            match Command::parse(&line) {
                Ok(cmd) => write!(stdout, "{}", command::execute(&cache, &cmd))?,
                Err(command::CommandError::Empty) => {}
                Err(e) => writeln!(stdout, "{}", e)?,
            }
        }
        write!(stdout, "> ")?;
        stdout.flush()?;
    }

    Ok(())
}
