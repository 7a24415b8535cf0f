use std::net::Ipv4Addr;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

mod wol;

use wol::WakeError;

/// Send a Wake-on-LAN magic packet to power on a remote machine.
#[derive(Parser, Debug)]
#[command(name = "wake", version, about, long_about = None, disable_help_flag = true)]
struct Args {
    /// Verbose output.
    #[arg(short = 'v')]
    verbose: bool,

    /// Send `count` packets with a one second interval.
    #[arg(
        short = 'c',
        value_name = "count",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    count: u64,

    /// Target hostname or IP address (default: IPv4 broadcast).
    #[arg(short = 'h', value_name = "host")]
    host: Option<String>,

    /// Ethernet (MAC) address in 12 hexadecimal digits; other
    /// characters (such as grouping characters) are ignored.
    #[arg(value_name = "mac")]
    mac: Option<String>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // usage problems report on stdout, like the usage text itself
            print!("{err}");
            // help can't render here (the auto help flag is off, -h is
            // the host option), so --version is the only display kind
            return match err.kind() {
                ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<(), WakeError> {
    // an explicit target resolves eagerly, before the positional is
    // even looked at; a bad host is reported even when the MAC is missing
    let explicit = args.host.as_deref().map(wol::resolve_host).transpose()?;

    let Some(mac) = args.mac else {
        let _ = Args::command().print_help();
        return Ok(());
    };

    let packet = wol::create_magic_packet(&mac)?;

    let socket = wol::open_socket()?;
    // may not always be possible; unicast to a resolved host still works
    if let Err(err) = socket.set_broadcast(true) {
        eprintln!("Warning: could not enable broadcast: {err}");
    }

    let destination = match explicit {
        Some(addr) => addr,
        None => wol::resolve_host(&Ipv4Addr::BROADCAST.to_string())?,
    };

    wol::send_packets(&socket, &packet, destination, args.count, args.verbose)
}

#[test]
fn test_args_defaults() {
    let args = Args::try_parse_from(["wake", "001122334455"]).unwrap();
    assert!(!args.verbose);
    assert_eq!(args.count, 1);
    assert_eq!(args.host, None);
    assert_eq!(args.mac.as_deref(), Some("001122334455"));
}

#[test]
fn test_args_all_flags() {
    let args =
        Args::try_parse_from(["wake", "-v", "-c", "3", "-h", "nas.local", "00:11:22:33:44:55"])
            .unwrap();
    assert!(args.verbose);
    assert_eq!(args.count, 3);
    assert_eq!(args.host.as_deref(), Some("nas.local"));
    assert_eq!(args.mac.as_deref(), Some("00:11:22:33:44:55"));
}

#[test]
fn test_args_no_mac_is_usage_case() {
    let args = Args::try_parse_from(["wake"]).unwrap();
    assert_eq!(args.mac, None);
}

#[test]
fn test_args_count_zero_rejected() {
    assert!(Args::try_parse_from(["wake", "-c", "0", "001122334455"]).is_err());
}

#[test]
fn test_args_count_negative_rejected() {
    assert!(Args::try_parse_from(["wake", "-c", "-5", "001122334455"]).is_err());
}

#[test]
fn test_args_count_non_numeric_rejected() {
    assert!(Args::try_parse_from(["wake", "-c", "abc", "001122334455"]).is_err());
}

#[test]
fn test_args_duplicate_verbose_rejected() {
    assert!(Args::try_parse_from(["wake", "-v", "-v", "001122334455"]).is_err());
}

#[test]
fn test_args_duplicate_count_rejected() {
    assert!(Args::try_parse_from(["wake", "-c", "2", "-c", "3", "001122334455"]).is_err());
}

#[test]
fn test_args_duplicate_host_rejected() {
    assert!(Args::try_parse_from(["wake", "-h", "a", "-h", "b", "001122334455"]).is_err());
}

#[test]
fn test_args_extra_positional_rejected() {
    assert!(Args::try_parse_from(["wake", "001122334455", "extra"]).is_err());
}

#[test]
fn test_args_unknown_flag_rejected() {
    assert!(Args::try_parse_from(["wake", "-x", "001122334455"]).is_err());
}

#[test]
fn test_bad_host_reported_before_missing_mac() {
    // the empty string can never resolve, and fails without a DNS query
    let args = Args::try_parse_from(["wake", "-h", ""]).unwrap();
    assert!(matches!(run(args), Err(WakeError::UnknownHost(_))));
}

#[test]
fn test_missing_mac_prints_usage_and_succeeds() {
    let args = Args::try_parse_from(["wake"]).unwrap();
    assert!(run(args).is_ok());
}
