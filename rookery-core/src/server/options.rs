pub use crate::transport::tls::TlsConfig;

/// Default listen address when [`ServerOptions::addr`] is empty.
pub const DEFAULT_ADDR: &str = "tcp://127.0.0.1:1883";

/// MQTT server options.
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    /// Listen URL, `tcp://...` or `tls://...`.
    pub addr: String,

    /// TLS material, required for `tls`/`ssl`/`tcps` listeners.
    pub tls: Option<TlsConfig>,

    /// Disables the per-connection inactivity monitor.
    pub disable_monitor: bool,
}

impl ServerOptions {
    pub(crate) fn addr(&self) -> &str {
        if self.addr.is_empty() {
            DEFAULT_ADDR
        } else {
            &self.addr
        }
    }
}
