//! Prometheus counters for sessions, logins, commands and certificate resolution. Without the
//! `prometheus` feature every function is a no-op.

#[cfg(feature = "prometheus")]
mod collectors {
    use lazy_static::lazy_static;
    use prometheus::{IntCounter, IntCounterVec, IntGauge, opts, register_int_counter, register_int_counter_vec, register_int_gauge};

    // A collector that fails to register (e.g. a name clash with one registered by the embedding
    // application) is left out rather than taking the server down.
    lazy_static! {
        pub static ref FTP_SESSIONS: Option<IntCounter> =
            register_int_counter!(opts!("ftp_sessions_total", "Total number of FTP sessions.")).ok();
        pub static ref FTP_ACTIVE_SESSIONS: Option<IntGauge> =
            register_int_gauge!(opts!("ftp_sessions_active", "Number of currently open FTP sessions.")).ok();
        pub static ref FTP_LOGINS: Option<IntCounterVec> = register_int_counter_vec!(
            "ftp_logins_total",
            "Total number of login attempts by outcome.",
            &["outcome"]
        )
        .ok();
        pub static ref FTP_COMMANDS: Option<IntCounterVec> = register_int_counter_vec!(
            "ftp_commands_total",
            "Total number of intercepted commands by verdict.",
            &["command", "verdict"]
        )
        .ok();
        pub static ref FTP_CERTIFICATES: Option<IntCounterVec> = register_int_counter_vec!(
            "ftp_certificate_resolutions_total",
            "Total number of certificate resolutions by outcome.",
            &["outcome"]
        )
        .ok();
    }
}

/// A session was opened.
pub fn session_opened() {
    #[cfg(feature = "prometheus")]
    {
        if let Some(c) = collectors::FTP_SESSIONS.as_ref() {
            c.inc();
        }
        if let Some(g) = collectors::FTP_ACTIVE_SESSIONS.as_ref() {
            g.inc();
        }
    }
}

/// A session was closed.
pub fn session_closed() {
    #[cfg(feature = "prometheus")]
    if let Some(g) = collectors::FTP_ACTIVE_SESSIONS.as_ref() {
        g.dec();
    }
}

/// A login finished with `outcome`.
pub fn login(outcome: &str) {
    #[cfg(feature = "prometheus")]
    if let Some(c) = collectors::FTP_LOGINS.as_ref() {
        c.with_label_values(&[outcome]).inc();
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = outcome;
}

/// A command was intercepted.
pub fn command(command: &str, verdict: &str) {
    #[cfg(feature = "prometheus")]
    if let Some(c) = collectors::FTP_COMMANDS.as_ref() {
        c.with_label_values(&[command, verdict]).inc();
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = (command, verdict);
}

/// A certificate resolution finished with `outcome`.
pub fn certificate_resolution(outcome: &str) {
    #[cfg(feature = "prometheus")]
    if let Some(c) = collectors::FTP_CERTIFICATES.as_ref() {
        c.with_label_values(&[outcome]).inc();
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = outcome;
}
