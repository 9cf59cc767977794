//! Contains the option types that can be given to the [`ServerController`](crate::ServerController)
//! builder, and their defaults.

use bitflags::bitflags;
use std::{
    fmt::{self, Debug, Display, Formatter},
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

pub(crate) const DEFAULT_URL: &str = "ftp://localhost:21";
pub(crate) const DEFAULT_PASV_URL: &str = "ftp://localhost:30000";
pub(crate) const DEFAULT_PASV_MIN: u16 = 30000;
pub(crate) const DEFAULT_PASV_MAX: u16 = 30009;
pub(crate) const DEFAULT_GREETING: &str = "Welcome to FTP server";
pub(crate) const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_CERTIFICATE_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_FAILED_LOGIN_DELAY_MS: u64 = 1500;
pub(crate) const DEFAULT_IDLE_SESSION_TIMEOUT_SECS: u64 = 600;
pub(crate) const DEFAULT_PROVISION_ROOT: &str = "/mnt";

/// How the IP address advertised in _PASV_ replies is determined.
#[derive(Clone)]
pub enum PassiveHost {
    /// Use the IP address of the control connection
    FromConnection,
    /// Advertise this specific IP address
    Ip(IpAddr),
    /// Resolve this DNS name
    Dns(String),
    /// Ask this function, given the client's address
    Resolver(Arc<dyn Fn(SocketAddr) -> IpAddr + Send + Sync>),
}

impl Debug for PassiveHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PassiveHost::FromConnection => write!(f, "FromConnection"),
            PassiveHost::Ip(ip) => write!(f, "Ip({ip})"),
            PassiveHost::Dns(name) => write!(f, "Dns({name})"),
            PassiveHost::Resolver(_) => write!(f, "Resolver"),
        }
    }
}

impl PartialEq for PassiveHost {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PassiveHost::FromConnection, PassiveHost::FromConnection) => true,
            (PassiveHost::Ip(a), PassiveHost::Ip(b)) => a == b,
            (PassiveHost::Dns(a), PassiveHost::Dns(b)) => a == b,
            (PassiveHost::Resolver(a), PassiveHost::Resolver(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<IpAddr> for PassiveHost {
    fn from(ip: IpAddr) -> Self {
        PassiveHost::Ip(ip)
    }
}

impl From<&str> for PassiveHost {
    fn from(dns_or_ip: &str) -> Self {
        match dns_or_ip.parse() {
            Ok(ip) => PassiveHost::Ip(ip),
            Err(_) => PassiveHost::Dns(dns_or_ip.to_string()),
        }
    }
}

impl Display for PassiveHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PassiveHost::FromConnection => write!(f, "address of the control connection"),
            PassiveHost::Ip(ip) => write!(f, "{ip}"),
            PassiveHost::Dns(name) => write!(f, "{name}"),
            PassiveHost::Resolver(_) => write!(f, "resolver function"),
        }
    }
}

/// What failed login attempts are counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedLoginsBlock {
    /// Lock out the client address, whatever user it tries
    IP,
    /// Lock out the user, wherever it connects from
    User,
    /// Lock out the combination of the two
    UserAndIP,
}

/// Temporarily locks out clients after repeated login failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLoginsPolicy {
    /// Failures after which the key is locked
    pub max_attempts: u32,
    /// How long a lock, or a run of failures, lasts
    pub expires_after: Duration,
    /// What the failures are counted against
    pub block_by: FailedLoginsBlock,
}

impl FailedLoginsPolicy {
    /// Creates a new policy.
    pub fn new(max_attempts: u32, expires_after: Duration, block_by: FailedLoginsBlock) -> Self {
        FailedLoginsPolicy {
            max_attempts,
            expires_after,
            block_by,
        }
    }
}

impl Default for FailedLoginsPolicy {
    fn default() -> Self {
        FailedLoginsPolicy::new(3, Duration::from_secs(300), FailedLoginsBlock::UserAndIP)
    }
}

bitflags! {
    /// Tunes the rustls configuration built from certificate material.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TlsFlags: u32 {
        /// Allow TLS 1.2
        const V1_2 = 0b0000_0001;
        /// Allow TLS 1.3
        const V1_3 = 0b0000_0010;
        /// Session resumption through server side session ids
        const RESUMPTION_SESS_ID = 0b0000_0100;
        /// Session resumption through tickets
        const RESUMPTION_TICKETS = 0b0000_1000;
        /// Both protocol versions
        const LATEST_VERSIONS = Self::V1_2.bits() | Self::V1_3.bits();
    }
}

impl Default for TlsFlags {
    fn default() -> TlsFlags {
        TlsFlags::LATEST_VERSIONS | TlsFlags::RESUMPTION_SESS_ID | TlsFlags::RESUMPTION_TICKETS
    }
}
