// Listening socket setup
// Parses the listening_ports spec and binds every listener up front,
// so a bad spec or an occupied port fails startup atomically.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::ConfigError;

/// One entry parsed out of the `listening_ports` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    pub addr: SocketAddr,
    /// `s` suffix: accepted sockets go through the TLS provider.
    pub tls: bool,
    /// `r` suffix: every request is answered with a redirect to the
    /// TLS listener.
    pub redirect: bool,
}

/// A successfully bound listener, ready for the acceptor loop.
pub struct BoundListener {
    pub listener: TcpListener,
    /// Actual bound address; differs from the spec for port 0.
    pub addr: SocketAddr,
    pub tls: bool,
    pub redirect: bool,
}

/// Parse a comma-separated list of `[ip_address:]port[s|r]` entries.
pub fn parse_port_spec(spec: &str) -> Result<Vec<ListenerSpec>, ConfigError> {
    let mut out = Vec::new();
    for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        out.push(parse_one(entry).ok_or_else(|| ConfigError::InvalidPortSpec(entry.to_string()))?);
    }
    if out.is_empty() {
        return Err(ConfigError::InvalidPortSpec(spec.to_string()));
    }
    Ok(out)
}

fn parse_one(entry: &str) -> Option<ListenerSpec> {
    let (entry, tls, redirect) = match entry.as_bytes().last()? {
        b's' | b'S' => (&entry[..entry.len() - 1], true, false),
        b'r' | b'R' => (&entry[..entry.len() - 1], false, true),
        _ => (entry, false, false),
    };

    let (ip, port_str) = match entry.rsplit_once(':') {
        Some((ip, port)) => (ip.parse::<IpAddr>().ok()?, port),
        None => (IpAddr::V4(Ipv4Addr::UNSPECIFIED), entry),
    };
    let port = port_str.parse::<u16>().ok()?;
    Some(ListenerSpec {
        addr: SocketAddr::new(ip, port),
        tls,
        redirect,
    })
}

/// Bind every spec. The first failure aborts the whole set; listeners
/// bound so far are dropped, so startup is all-or-nothing.
pub fn bind_all(specs: &[ListenerSpec]) -> Result<Vec<BoundListener>, ConfigError> {
    let mut bound = Vec::with_capacity(specs.len());
    for spec in specs {
        let listener = create_listener(spec.addr).map_err(|source| ConfigError::Bind {
            addr: spec.addr.to_string(),
            source,
        })?;
        let addr = listener.local_addr().map_err(|source| ConfigError::Bind {
            addr: spec.addr.to_string(),
            source,
        })?;
        bound.push(BoundListener {
            listener,
            addr,
            tls: spec.tls,
            redirect: spec.redirect,
        });
    }
    Ok(bound)
}

/// Create a non-blocking `TcpListener` with `SO_REUSEADDR` enabled.
///
/// Non-blocking mode lets one acceptor thread sweep all listeners
/// without parking on any single one.
fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // Allows rebinding a port still in TIME_WAIT after a restart.
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    // CGI children must not inherit the listening socket.
    #[cfg(unix)]
    socket.set_cloexec(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_port() {
        let specs = parse_port_spec("8080").expect("parse");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].addr, "0.0.0.0:8080".parse().unwrap());
        assert!(!specs[0].tls);
        assert!(!specs[0].redirect);
    }

    #[test]
    fn test_parse_tls_and_redirect_suffixes() {
        let specs = parse_port_spec("80r,127.0.0.1:8443s").expect("parse");
        assert!(specs[0].redirect);
        assert!(specs[1].tls);
        assert_eq!(specs[1].addr, "127.0.0.1:8443".parse().unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_port_spec("").is_err());
        assert!(parse_port_spec("notaport").is_err());
        assert!(parse_port_spec("8080,badx").is_err());
        assert!(parse_port_spec("999999").is_err());
    }

    #[test]
    fn test_bind_ephemeral() {
        let specs = parse_port_spec("127.0.0.1:0").expect("parse");
        let bound = bind_all(&specs).expect("bind");
        assert_ne!(bound[0].addr.port(), 0);
    }

    #[test]
    fn test_bind_conflict_is_atomic() {
        let specs = parse_port_spec("127.0.0.1:0").expect("parse");
        let holder = bind_all(&specs).expect("bind");
        let taken = holder[0].addr;
        // Second bind of the same concrete port must fail as a whole.
        let conflict = vec![
            ListenerSpec {
                addr: "127.0.0.1:0".parse().unwrap(),
                tls: false,
                redirect: false,
            },
            ListenerSpec {
                addr: taken,
                tls: false,
                redirect: false,
            },
        ];
        assert!(bind_all(&conflict).is_err());
    }
}
