//! # Subject rewriting: namespacing declared subjects per node.
//!
//! One bus can host many nodes running the same scripts. To keep their
//! endpoints apart, every declared subject is prefixed with a host
//! identifier before it reaches the bus, and stripped again before it
//! reaches the script.
//!
//! ## Rules
//! - `rewrite("g.hi")` on host `web01` yields `web01.g.hi`.
//! - `strip` removes exactly one leading `<host>.` prefix; anything else
//!   (partial matches, foreign prefixes, a bare `<host>.`) passes through
//!   unchanged.
//! - `strip(rewrite(s)) == s` for every declared subject `s` that is not
//!   already host-prefixed.

use tracing::warn;

use crate::config::HostId;

/// Pure subject prefixer/stripper bound to one resolved host identifier.
#[derive(Debug, Clone)]
pub struct SubjectRewriter {
    host: String,
}

impl SubjectRewriter {
    /// Creates a rewriter with an already-resolved host identifier.
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Resolves the configured host identifier into a rewriter.
    ///
    /// `auto` means the operating-system hostname; when that cannot be
    /// resolved the literal `unknown` is substituted and a warning is logged.
    pub fn from_host_id(host: &HostId) -> Self {
        match host {
            HostId::Explicit(name) => Self::new(name.clone()),
            HostId::Auto => match system_hostname() {
                Some(name) => Self::new(name),
                None => {
                    warn!(fallback = "unknown", "failed to resolve system hostname");
                    Self::new("unknown")
                }
            },
        }
    }

    /// The resolved host identifier.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Prefixes a declared subject with the host identifier.
    pub fn rewrite(&self, subject: &str) -> String {
        format!("{}.{}", self.host, subject)
    }

    /// Recovers the declared subject from a rewritten one.
    ///
    /// Returns the input unchanged when it does not begin with the host
    /// prefix followed by a dot, or when nothing would remain after it.
    pub fn strip<'a>(&self, subject: &'a str) -> &'a str {
        match subject
            .strip_prefix(self.host.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
        {
            Some(rest) if !rest.is_empty() => rest,
            _ => subject,
        }
    }
}

/// Reads the operating-system hostname.
#[cfg(unix)]
fn system_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let len = buf.iter().position(|b| *b == 0)?;
    let name = std::str::from_utf8(&buf[..len]).ok()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_with_host_prefix() {
        let rw = SubjectRewriter::new("web01");
        assert_eq!(rw.rewrite("g.hi"), "web01.g.hi");
    }

    #[test]
    fn strip_round_trips_rewrite() {
        let rw = SubjectRewriter::new("web01");
        for subject in ["g.hi", "sys.facts", "a-b_c.d1"] {
            assert_eq!(rw.strip(&rw.rewrite(subject)), subject);
        }
    }

    #[test]
    fn strip_ignores_foreign_prefixes() {
        let rw = SubjectRewriter::new("web01");
        assert_eq!(rw.strip("web02.g.hi"), "web02.g.hi");
        assert_eq!(rw.strip("g.hi"), "g.hi");
    }

    #[test]
    fn strip_does_not_match_partial_host() {
        // "web0" is a prefix of the host string but not of a host segment.
        let rw = SubjectRewriter::new("web0");
        assert_eq!(rw.strip("web01.g.hi"), "web01.g.hi");
    }

    #[test]
    fn strip_leaves_bare_prefix_alone() {
        let rw = SubjectRewriter::new("web01");
        assert_eq!(rw.strip("web01."), "web01.");
        assert_eq!(rw.strip("web01"), "web01");
    }

    #[test]
    fn explicit_host_id_is_used_verbatim() {
        let rw = SubjectRewriter::from_host_id(&HostId::Explicit("edge-7".to_string()));
        assert_eq!(rw.host(), "edge-7");
    }

    #[cfg(unix)]
    #[test]
    fn auto_host_id_resolves_to_something() {
        let rw = SubjectRewriter::from_host_id(&HostId::Auto);
        assert!(!rw.host().is_empty());
    }
}
