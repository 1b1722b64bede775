use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

const WELL_KNOWN_LAST: u16 = 1023;

/// A non-empty, sorted, deduplicated set of TCP ports in `1..=65535`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRange {
    ports: Vec<u16>,
}

impl PortRange {
    /// Inclusive interval `first..=last`.
    pub fn interval(first: u16, last: u16) -> Result<Self, ConfigError> {
        let input = format!("{first}-{last}");
        if first == 0 {
            return Err(ConfigError::ports(&input, "port 0 is not scannable"));
        }
        if first > last {
            return Err(ConfigError::ports(&input, "interval is reversed"));
        }
        Ok(Self {
            ports: (first..=last).collect(),
        })
    }

    /// An explicit list; duplicates are folded and order is normalized.
    pub fn list<I>(ports: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = u16>,
    {
        let set: BTreeSet<u16> = ports.into_iter().collect();
        if set.is_empty() {
            return Err(ConfigError::ports("", "no ports given"));
        }
        if set.contains(&0) {
            return Err(ConfigError::ports("0", "port 0 is not scannable"));
        }
        Ok(Self {
            ports: set.into_iter().collect(),
        })
    }

    /// Ports `1-1023`, scanned when the caller does not choose.
    pub fn well_known() -> Self {
        Self {
            ports: (1..=WELL_KNOWN_LAST).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.binary_search(&port).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().copied()
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::well_known()
    }
}

impl IntoIterator for PortRange {
    type Item = u16;
    type IntoIter = std::vec::IntoIter<u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports.into_iter()
    }
}

impl FromStr for PortRange {
    type Err = ConfigError;

    /// Parses `22`, `1-1023`, `22,80,443` or any comma-separated mix of them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ports: BTreeSet<u16> = BTreeSet::new();

        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            match part.split_once('-') {
                Some((first, last)) => {
                    let first = parse_port(first, s)?;
                    let last = parse_port(last, s)?;
                    if first > last {
                        return Err(ConfigError::ports(s, format!("interval '{part}' is reversed")));
                    }
                    ports.extend(first..=last);
                }
                None => {
                    ports.insert(parse_port(part, s)?);
                }
            }
        }

        if ports.is_empty() {
            return Err(ConfigError::ports(s, "no ports given"));
        }

        Ok(Self {
            ports: ports.into_iter().collect(),
        })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut runs: Vec<String> = Vec::new();
        let mut iter = self.ports.iter().copied().peekable();

        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&end.wrapping_add(1)) {
                end = iter.next().unwrap_or(end);
            }
            if start == end {
                runs.push(start.to_string());
            } else {
                runs.push(format!("{start}-{end}"));
            }
        }

        write!(f, "{}", runs.join(","))
    }
}

fn parse_port(s: &str, input: &str) -> Result<u16, ConfigError> {
    let port = s
        .trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::ports(input, format!("'{}': {e}", s.trim())))?;
    if port == 0 {
        return Err(ConfigError::ports(input, "port 0 is not scannable"));
    }
    Ok(port)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
