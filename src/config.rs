//! CLI/env configuration (§9a), grounded in the teacher's `args.rs`: a plain
//! `clap::Parser` struct, extended with `env` fallbacks since this service is
//! expected to run under a container orchestrator as often as from a shell.

use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None, version)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "TEMPOQ_LISTEN", default_value_t = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)))]
    pub listen: IpAddr,

    /// TCP port to listen on.
    #[arg(short, long, env = "TEMPOQ_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Connection string for the backing store. An empty value selects the
    /// in-process `MemoryStore` instead — handy for local development and
    /// the test suite, but state does not survive a restart.
    #[arg(
        long,
        env = "TEMPOQ_REDIS_URL",
        default_value = "redis://127.0.0.1:6379"
    )]
    pub redis_url: String,

    /// Default `ttl_seconds` applied to a Publish that omits it.
    #[arg(long, env = "TEMPOQ_DEFAULT_TTL_S", default_value_t = 86400)]
    pub default_ttl_s: u32,

    /// Default `tries` applied to a Publish that omits it.
    #[arg(long, env = "TEMPOQ_DEFAULT_TRIES", default_value_t = 1)]
    pub default_tries: u16,

    /// Upper bound on the TTR a caller is expected to request. Not
    /// currently consulted by the publish-path TTL grace, which uses a
    /// fixed margin instead (see SPEC_FULL.md §9); kept as a documented
    /// operator-facing hint for capacity planning.
    #[arg(long, env = "TEMPOQ_TTR_MAX_HINT_S", default_value_t = 3600)]
    pub ttr_max_hint_s: u32,

    /// How often the Pumper scans for due timer events.
    #[arg(long, env = "TEMPOQ_PUMP_INTERVAL_MS", default_value_t = 1000)]
    pub pump_interval_ms: u64,

    /// Maximum accepted job body size, in bytes.
    #[arg(long, env = "TEMPOQ_MAX_BODY_BYTES", default_value_t = 65535)]
    pub max_body_bytes: u32,

    /// Enables human-friendly (non-JSON) logging.
    #[arg(long, env = "TEMPOQ_DEBUG", default_value_t)]
    pub debug: bool,
}
