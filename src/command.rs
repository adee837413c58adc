//! Operator commands for inspecting and editing a [`RecordCache`].
//!
//! Lines are parsed into a [`Command`], which [`execute`] runs against a cache, producing the text
//! to show to the operator.
//!
//! ```text
//! list
//! remove ?
//! remove <name> [<type> [<value>...]]
//! ```

use std::{fmt, str::FromStr};

use crate::cache::{CacheRecord, RecordCache, RemoveError, RemoveRequest};

/// Text printed for `remove ?`.
pub const REMOVE_HELP: &str = "\
Enter the cache record in the format: <Name> [<Type> [<Value>]]
Example: example.com
Example: example.com MX 10 mail.example.com.
";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `list`
    List,
    /// `remove ?`
    RemoveHelp,
    /// `remove <name> [<type> [<value>...]]`
    Remove(RemoveRequest),
}

impl Command {
    /// Parses a single command line.
    ///
    /// Tokens are separated by any amount of whitespace. A `remove` value may span several tokens
    /// (as MX, SOA, and TXT values do); they are joined back together with single spaces.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or(CommandError::Empty)?;

        match verb {
            "list" => Ok(Command::List),
            "remove" => {
                let name = tokens.next().ok_or(CommandError::Usage)?;
                if name == "?" {
                    return Ok(Command::RemoveHelp);
                }

                let mut req = RemoveRequest::new(name);
                if let Some(rtype) = tokens.next() {
                    req = req.rtype(rtype);
                }
                let value = tokens.collect::<Vec<_>>();
                if !value.is_empty() {
                    req = req.value(value.join(" "));
                }
                Ok(Command::Remove(req))
            }
            _ => Err(CommandError::UnknownCommand(verb.to_string())),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors returned when parsing a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The line contained nothing but whitespace.
    Empty,
    /// `remove` was given without a record name.
    Usage,
    UnknownCommand(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => f.write_str("no command given"),
            CommandError::Usage => f.write_str("Please specify at least the record name."),
            CommandError::UnknownCommand(verb) => write!(f, "unknown command `{}`", verb),
        }
    }
}

impl std::error::Error for CommandError {}

/// Runs `cmd` against `cache` and returns the output for the operator.
pub fn execute(cache: &RecordCache, cmd: &Command) -> String {
    match cmd {
        Command::List => numbered("Cache Records:", &cache.list()),
        Command::RemoveHelp => REMOVE_HELP.to_string(),
        Command::Remove(req) => match cache.remove(req) {
            Ok(removed) => format!("Removed: {}\n", removed),
            Err(RemoveError::NotFound { name }) => {
                format!("No records found with the name: {}\n", name)
            }
            Err(RemoveError::Ambiguous { name, candidates }) => numbered(
                &format!("Multiple records found with the name: {}", name),
                &candidates,
            ),
        },
    }
}

/// A heading line followed by one `N. record` line per record.
fn numbered(heading: &str, records: &[CacheRecord]) -> String {
    let mut out = format!("{}\n", heading);
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, record));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::{
        net::Ipv4Addr,
        time::{Duration, SystemTime},
    };

    use expect_test::{expect, Expect};

    use super::*;
    use crate::packet::{
        name::DomainName,
        records::{ResourceRecordBuf, A, MX, TXT},
    };

    fn cache() -> RecordCache {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let name = |s: &str| s.parse::<DomainName>().unwrap();
        let cache = RecordCache::new();
        for rr in [
            ResourceRecordBuf::new(name("example.com"), A::new(Ipv4Addr::new(192, 0, 2, 1)))
                .ttl(300),
            ResourceRecordBuf::new(name("example.com"), MX::new(10, name("mail.example.com")))
                .ttl(3600),
            ResourceRecordBuf::new(name("example.org"), A::new(Ipv4Addr::new(192, 0, 2, 9)))
                .ttl(60),
            ResourceRecordBuf::new(
                name("example.org"),
                TXT::new(["v=spf1 -all"]).unwrap(),
            )
            .ttl(60),
        ] {
            cache.add_at(&rr, now);
        }
        cache
    }

    fn check(cache: &RecordCache, line: &str, expect: Expect) {
        let out = match Command::parse(line) {
            Ok(cmd) => execute(cache, &cmd),
            Err(e) => format!("error: {}\n", e),
        };
        expect.assert_eq(&out);
    }

    #[test]
    fn parse() {
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert_eq!(Command::parse("  \t "), Err(CommandError::Empty));
        assert_eq!(Command::parse("remove"), Err(CommandError::Usage));
        assert_eq!(
            Command::parse("purge"),
            Err(CommandError::UnknownCommand("purge".into()))
        );
        assert_eq!(Command::parse(" list "), Ok(Command::List));
        assert_eq!(Command::parse("remove ?"), Ok(Command::RemoveHelp));
        assert_eq!(
            Command::parse("remove example.com"),
            Ok(Command::Remove(RemoveRequest::new("example.com.")))
        );
        assert_eq!(
            "remove example.com  MX 10   mail.example.com.".parse(),
            Ok(Command::Remove(
                RemoveRequest::new("example.com")
                    .rtype("MX")
                    .value("10 mail.example.com.")
            ))
        );
    }

    #[test]
    fn list() {
        check(
            &cache(),
            "list",
            expect![[r#"
                Cache Records:
                1. example.com. A 192.0.2.1 300
                2. example.com. MX 10 mail.example.com. 3600
                3. example.org. A 192.0.2.9 60
                4. example.org. TXT v=spf1 -all 60
            "#]],
        );
        check(
            &RecordCache::new(),
            "list",
            expect![[r#"
                Cache Records:
            "#]],
        );
    }

    #[test]
    fn remove_help_and_usage() {
        let cache = cache();
        check(
            &cache,
            "remove ?",
            expect![[r#"
                Enter the cache record in the format: <Name> [<Type> [<Value>]]
                Example: example.com
                Example: example.com MX 10 mail.example.com.
            "#]],
        );
        check(
            &cache,
            "remove",
            expect![[r#"
                error: Please specify at least the record name.
            "#]],
        );
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn remove() {
        let cache = cache();
        check(
            &cache,
            "remove example.net",
            expect![[r#"
                No records found with the name: example.net.
            "#]],
        );
        check(
            &cache,
            "remove example.com",
            expect![[r#"
                Multiple records found with the name: example.com.
                1. example.com. A 192.0.2.1 300
                2. example.com. MX 10 mail.example.com. 3600
            "#]],
        );
        assert_eq!(cache.len(), 4);

        check(
            &cache,
            "remove example.com mx",
            expect![[r#"
                Removed: example.com. MX 10 mail.example.com. 3600
            "#]],
        );
        check(
            &cache,
            "remove example.org. TXT v=spf1 -all",
            expect![[r#"
                Removed: example.org. TXT v=spf1 -all 60
            "#]],
        );
        check(
            &cache,
            "list",
            expect![[r#"
                Cache Records:
                1. example.com. A 192.0.2.1 300
                2. example.org. A 192.0.2.9 60
            "#]],
        );
    }
}
