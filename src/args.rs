//! Command-line construction for the iperf3 executable
//!
//! Pure functions of a configuration snapshot: no I/O and no error paths.
//! Range checking of numeric settings belongs to configuration validation.

use crate::models::{ClientSettings, Config, ServerSettings};
use crate::types::{Protocol, Role};

/// Flags that take the next argument as their value
pub const VALUE_FLAGS: &[&str] = &[
    "-B", "-c", "-p", "-t", "-P", "-i", "-O", "-b", "-w", "-M", "-l", "--dscp", "-S",
];

/// Builds the ordered argument list for one invocation of the tool
pub struct ArgumentBuilder;

impl ArgumentBuilder {
    /// Arguments for `role`, with `run_index` identifying the run within a sequence
    pub fn build(config: &Config, role: Role, run_index: u32) -> Vec<String> {
        match role {
            Role::Server => Self::server_args(&config.server, run_index),
            Role::Client => Self::client_args(&config.client),
        }
    }

    /// Server invocation. The listening port is offset by the run index so
    /// sequential servers never collide on a port still in TIME_WAIT.
    pub fn server_args(server: &ServerSettings, run_index: u32) -> Vec<String> {
        let mut args = vec!["-s".to_string()];

        if !server.listen_address.is_empty() {
            push_value(&mut args, "-B", &server.listen_address);
        }

        let port = u32::from(server.port).saturating_add(run_index).min(u32::from(u16::MAX));
        push_value(&mut args, "-p", port);

        if server.interval > 0 {
            push_value(&mut args, "-i", server.interval);
        }

        if server.one_off {
            args.push("-1".to_string());
        }

        if server.json_format {
            args.push("-J".to_string());
        }

        args.push("--forceflush".to_string());
        args
    }

    /// Client invocation
    pub fn client_args(client: &ClientSettings) -> Vec<String> {
        let mut args = Vec::new();

        if !client.listen_address.is_empty() {
            push_value(&mut args, "-B", &client.listen_address);
        }

        push_value(&mut args, "-c", &client.address);
        push_value(&mut args, "-p", client.port);
        push_value(&mut args, "-t", client.duration);
        push_value(&mut args, "-P", client.streams);
        push_value(&mut args, "-i", 1);

        if client.omit_seconds > 0 {
            push_value(&mut args, "-O", client.omit_seconds);
        }

        if client.bandwidth > 0 {
            push_value(&mut args, "-b", with_unit(client.bandwidth, &client.bandwidth_unit));
        }

        if client.window > 0 {
            push_value(&mut args, "-w", with_unit(client.window, &client.window_unit));
        }

        if client.protocol == Protocol::Udp {
            args.push("-u".to_string());
        }

        let switches = [
            (client.no_delay, "-N"),
            (client.zero_copy, "-Z"),
            (client.reverse, "-R"),
            (client.bidirectional, "--bidir"),
            (client.dont_fragment, "--dont-fragment"),
        ];
        args.extend(switches.iter().filter(|(on, _)| *on).map(|(_, flag)| flag.to_string()));

        if client.set_mss > 0 {
            push_value(&mut args, "-M", client.set_mss);
        }

        if client.ipv4_only {
            args.push("-4".to_string());
        }

        if client.ipv6_only {
            args.push("-6".to_string());
        }

        if client.payload_length > 0 {
            push_value(&mut args, "-l", client.payload_length);
        }

        if client.dscp > 0 {
            push_value(&mut args, "--dscp", client.dscp);
        }

        if client.tos > 0 {
            push_value(&mut args, "-S", client.tos);
        }

        if client.json_format {
            args.push("-J".to_string());
        }

        args.push("--get-server-output".to_string());
        args
    }

    /// Shell-like rendering for logs
    pub fn command_line(binary: &std::path::Path, args: &[String]) -> String {
        let mut line = binary.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

fn push_value<T: ToString>(args: &mut Vec<String>, flag: &str, value: T) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

/// `1000` + `"MB"` → `1000M`
fn with_unit(value: u64, unit: &str) -> String {
    match unit.chars().next() {
        Some(suffix) => format!("{}{}", value, suffix),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value_of<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_default_client_args() {
        let config = Config::default();
        let args = ArgumentBuilder::build(&config, Role::Client, 0);

        assert_eq!(
            args,
            vec![
                "-c", "127.0.0.1", "-p", "5201", "-t", "10", "-P", "1", "-i", "1",
                "-l", "1024", "-J", "--get-server-output",
            ]
        );
    }

    #[test]
    fn test_default_server_args() {
        let config = Config::default();
        let args = ArgumentBuilder::build(&config, Role::Server, 0);
        assert_eq!(args, vec!["-s", "-p", "5201", "-i", "1", "-J", "--forceflush"]);
    }

    #[test]
    fn test_server_port_offset_by_run_index() {
        let mut config = Config::default();
        config.server.listen_address = "0.0.0.0".to_string();
        let args = ArgumentBuilder::build(&config, Role::Server, 3);

        assert_eq!(value_of(&args, "-p"), Some("5204"));
        assert_eq!(value_of(&args, "-B"), Some("0.0.0.0"));
    }

    #[test]
    fn test_server_port_offset_saturates() {
        let mut config = Config::default();
        config.server.port = 65530;
        let args = ArgumentBuilder::build(&config, Role::Server, 100);
        assert_eq!(value_of(&args, "-p"), Some("65535"));
    }

    #[test]
    fn test_server_optional_flags() {
        let mut config = Config::default();
        config.server.interval = 0;
        config.server.json_format = false;
        config.server.one_off = true;
        let args = ArgumentBuilder::server_args(&config.server, 0);

        assert!(!args.contains(&"-i".to_string()));
        assert!(!args.contains(&"-J".to_string()));
        assert!(args.contains(&"-1".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--forceflush"));
    }

    #[test]
    fn test_client_switches() {
        let mut config = Config::default();
        let client = &mut config.client;
        client.listen_address = "192.168.1.10".to_string();
        client.omit_seconds = 2;
        client.window = 256;
        client.window_unit = "KB".to_string();
        client.no_delay = true;
        client.zero_copy = true;
        client.bidirectional = true;
        client.dont_fragment = true;
        client.set_mss = 1400;
        client.ipv4_only = true;
        client.dscp = 46;
        client.tos = 16;
        client.payload_length = 0;

        let args = ArgumentBuilder::client_args(&config.client);

        assert_eq!(args[0], "-B");
        assert_eq!(value_of(&args, "-O"), Some("2"));
        assert_eq!(value_of(&args, "-w"), Some("256K"));
        assert_eq!(value_of(&args, "-M"), Some("1400"));
        assert_eq!(value_of(&args, "--dscp"), Some("46"));
        assert_eq!(value_of(&args, "-S"), Some("16"));
        for flag in ["-N", "-Z", "--bidir", "--dont-fragment", "-4"] {
            assert!(args.contains(&flag.to_string()), "missing {}", flag);
        }
        assert!(!args.contains(&"-R".to_string()));
        assert!(!args.contains(&"-6".to_string()));
        assert!(!args.contains(&"-l".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--get-server-output"));
    }

    #[test]
    fn test_empty_unit_has_no_suffix() {
        let mut config = Config::default();
        config.client.bandwidth = 500;
        config.client.bandwidth_unit = String::new();
        let args = ArgumentBuilder::client_args(&config.client);
        assert_eq!(value_of(&args, "-b"), Some("500"));
    }

    #[test]
    fn test_command_line_rendering() {
        let line = ArgumentBuilder::command_line(
            std::path::Path::new("/usr/bin/iperf3"),
            &["-s".to_string(), "-p".to_string(), "5201".to_string()],
        );
        assert_eq!(line, "/usr/bin/iperf3 -s -p 5201");
    }

    fn client_settings() -> impl Strategy<Value = ClientSettings> {
        (
            prop_oneof![Just(Protocol::Tcp), Just(Protocol::Udp)],
            0u64..10_000_000,
            prop_oneof![Just("KB"), Just("MB"), Just("GB")],
            1u32..128,
            0u32..3600,
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(protocol, bandwidth, unit, streams, duration, reverse, no_delay)| ClientSettings {
                protocol,
                bandwidth,
                bandwidth_unit: unit.to_string(),
                streams,
                duration,
                reverse,
                no_delay,
                ..ClientSettings::default()
            })
    }

    proptest! {
        #[test]
        fn udp_flag_tracks_protocol(client in client_settings()) {
            let args = ArgumentBuilder::client_args(&client);
            let has_udp = args.iter().any(|a| a == "-u");
            prop_assert_eq!(has_udp, client.protocol == Protocol::Udp);
        }

        #[test]
        fn bandwidth_flag_matches_setting(client in client_settings()) {
            let args = ArgumentBuilder::client_args(&client);
            match value_of(&args, "-b") {
                None => prop_assert_eq!(client.bandwidth, 0),
                Some(value) => {
                    prop_assert!(client.bandwidth > 0);
                    let (digits, suffix) = value.split_at(value.len() - 1);
                    prop_assert_eq!(digits.parse::<u64>().unwrap(), client.bandwidth);
                    prop_assert_eq!(suffix.chars().next(), client.bandwidth_unit.chars().next());
                }
            }
        }

        #[test]
        fn value_flags_are_followed_by_values(client in client_settings()) {
            let args = ArgumentBuilder::client_args(&client);
            for (i, arg) in args.iter().enumerate() {
                if VALUE_FLAGS.contains(&arg.as_str()) {
                    let value = args.get(i + 1);
                    prop_assert!(value.is_some());
                    prop_assert!(!value.unwrap().starts_with('-'));
                }
            }
        }

        #[test]
        fn argument_order_is_reproducible(client in client_settings()) {
            prop_assert_eq!(ArgumentBuilder::client_args(&client), ArgumentBuilder::client_args(&client));
        }
    }
}
