//! Command-line flags

use clap::Parser;
use std::path::PathBuf;

use overwatch_core::OverwatchConfig;

/// Tracking crypto market cap
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "crypto-market-overwatch", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host address to bind to
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds between refresh cycles
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Listings endpoint to poll
    #[arg(short, long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Debug mode
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Flags take precedence over every other configuration source
    pub fn apply(&self, config: &mut OverwatchConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(interval) = self.interval {
            config.collector.interval_secs = interval;
        }
        if let Some(endpoint) = &self.endpoint {
            config.collector.endpoint = endpoint.clone();
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_flags() {
        let cli = Cli::try_parse_from([
            "crypto-market-overwatch",
            "-H",
            "127.0.0.1",
            "-p",
            "9100",
            "-i",
            "60",
            "-d",
        ])
        .unwrap();

        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(9100));
        assert_eq!(cli.interval, Some(60));
        assert!(cli.debug);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_apply_overrides_only_given_flags() {
        let cli = Cli {
            port: Some(8080),
            debug: true,
            ..Default::default()
        };
        let mut config = OverwatchConfig::default();

        cli.apply(&mut config);

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.collector.interval_secs, 30);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_rejects_invalid_port() {
        assert!(Cli::try_parse_from(["crypto-market-overwatch", "--port", "70000"]).is_err());
    }
}
