// ABOUTME: Destination host addressing for a migration.
// ABOUTME: Parses formats like "host", "host:port", "[v6addr]:port".

use serde::{Deserialize, Serialize};
use std::fmt;

/// The remote side of a migration: who to log in as and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl RemoteTarget {
    /// Parse a host argument, falling back to `default_port` when none is given.
    pub fn parse(user: &str, host: &str, default_port: u16) -> Result<Self, String> {
        let user = user.trim();
        if user.is_empty() {
            return Err("remote user cannot be empty".to_string());
        }
        let s = host.trim();
        if s.is_empty() {
            return Err("remote host cannot be empty".to_string());
        }
        if s.contains('@') {
            return Err(format!(
                "host '{s}' must not contain a user; pass the user as its own argument"
            ));
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            // [v6addr] or [v6addr]:port
            let (addr, tail) = rest
                .split_once(']')
                .ok_or_else(|| format!("unterminated '[' in host: {s}"))?;
            let port = match tail {
                "" => default_port,
                t => parse_port(t.strip_prefix(':').unwrap_or(t))?,
            };
            (addr, port)
        } else if let Some((host, port)) = s.split_once(':').filter(|(_, p)| !p.contains(':')) {
            (host, parse_port(port)?)
        } else {
            (s, default_port)
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(RemoteTarget {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

fn parse_port(s: &str) -> Result<u16, String> {
    s.parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| format!("invalid port: {}", s))
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}@[{}]:{}", self.user, self.host, self.port)
        } else {
            write!(f, "{}@{}:{}", self.user, self.host, self.port)
        }
    }
}
