use crate::config::RawParams;
use clap::Parser;
use std::path::PathBuf;

// Values are kept as text; coercion happens during validation.
#[derive(Parser, Debug, Default)]
#[command(name = "meross-toggle")]
#[command(author, version, about = "Switch a Meross plug on or off through a local MQTT broker")]
pub struct Cli {
    /// Path to a TOML parameter file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Print the topic and payload instead of publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Broker host name or address
    #[arg(long)]
    pub broker_ip: Option<String>,

    /// Broker port (default 1883)
    #[arg(long)]
    pub port: Option<String>,

    /// Device UUID
    #[arg(long)]
    pub uuid: Option<String>,

    /// Desired state (true/false, on/off, 1/0)
    #[arg(long)]
    pub enabled: Option<String>,

    /// QoS level 0, 1 or 2
    #[arg(long)]
    pub qos: Option<String>,

    /// Publish with the retain flag
    #[arg(long)]
    pub retain: Option<String>,

    /// MQTT client identifier (default meross-toggle)
    #[arg(long)]
    pub client_id: Option<String>,

    /// Keepalive interval in seconds
    #[arg(long)]
    pub keepalive: Option<String>,

    /// Broker user name, requires --password
    #[arg(long)]
    pub username: Option<String>,

    /// Broker password, requires --username
    #[arg(long)]
    pub password: Option<String>,

    /// CA certificate used to verify the broker
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,

    /// Client certificate for mutual TLS
    #[arg(long)]
    pub certfile: Option<PathBuf>,

    /// Private key for the client certificate
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// MQTTv31 or MQTTv311
    #[arg(long)]
    pub protocol: Option<String>,
}

impl Cli {
    /// Parameters given on the command line.
    pub fn params(&self) -> RawParams {
        let text = [
            ("broker_ip", &self.broker_ip),
            ("port", &self.port),
            ("uuid", &self.uuid),
            ("enabled", &self.enabled),
            ("qos", &self.qos),
            ("retain", &self.retain),
            ("client_id", &self.client_id),
            ("keepalive", &self.keepalive),
            ("username", &self.username),
            ("password", &self.password),
            ("protocol", &self.protocol),
        ];
        let paths = [
            ("ca_cert", &self.ca_cert),
            ("certfile", &self.certfile),
            ("keyfile", &self.keyfile),
        ];

        let mut params = RawParams::new();
        for (key, value) in text {
            if let Some(value) = value {
                params.insert(key, value.as_str());
            }
        }
        for (key, value) in paths {
            if let Some(path) = value {
                params.insert(key, path.display().to_string());
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamValue;
    use clap::CommandFactory;

    #[test]
    fn only_given_flags_become_params() {
        let cli = Cli::try_parse_from([
            "meross-toggle",
            "--broker-ip",
            "10.0.0.5",
            "--uuid",
            "abc123",
            "--enabled",
            "false",
        ])
        .unwrap();

        let params = cli.params();
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("broker_ip"), Some(&ParamValue::from("10.0.0.5")));
        assert_eq!(params.get("enabled"), Some(&ParamValue::from("false")));
        assert!(params.get("qos").is_none());
    }

    #[test]
    fn tls_paths_and_switches() {
        let cli = Cli::try_parse_from([
            "meross-toggle",
            "--dry-run",
            "-d",
            "--ca-cert",
            "/etc/ca.crt",
            "--certfile",
            "/etc/client.crt",
            "--keyfile",
            "/etc/client.key",
        ])
        .unwrap();

        assert!(cli.dry_run);
        assert!(cli.debug);
        let params = cli.params();
        assert_eq!(params.get("ca_cert"), Some(&ParamValue::from("/etc/ca.crt")));
        assert_eq!(params.get("keyfile"), Some(&ParamValue::from("/etc/client.key")));
    }

    #[test]
    fn every_parameter_flag_has_help() {
        let command = Cli::command();
        for arg in command.get_arguments() {
            if arg.get_id() == "help" || arg.get_id() == "version" {
                continue;
            }
            assert!(arg.get_help().is_some(), "--{} has no help text", arg.get_id());
        }
    }
}
