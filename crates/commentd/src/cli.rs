//! Command-line parsing.
//!
//! ```text
//! commentd [OPTIONS] [<COMMENT_DIR> <LOG_DIR> <PORT>...]
//! ```
//!
//! Positional arguments override the configuration file and the
//! environment. A `LOG_DIR` of `-` keeps logs on stdout.

use std::path::PathBuf;

use commentd_config::{parse_ports, CommentdConfig};
use thiserror::Error;

/// Usage text printed by `--help`.
pub const USAGE: &str = r"commentd - comment listener

USAGE:
    commentd [OPTIONS] [<COMMENT_DIR> <LOG_DIR> <PORT>...]

ARGS:
    <COMMENT_DIR>    Directory receiving <YYYY-MM-DD_HH-MM-SS>_<port>.comment files
    <LOG_DIR>        Directory receiving commentd.log ('-' for stdout)
    <PORT>...        One or more ports, one worker each

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
                           [default: ./commentd.toml, if present]
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    COMMENTD__SERVER__BIND_ADDR           Address every worker binds (default: 0.0.0.0)
    COMMENTD__SERVER__PORTS               Comma separated ports (default: 8080)
    COMMENTD__SERVER__BUFFER_CAPACITY     Request buffer size in bytes (default: 8096)
    COMMENTD__STORAGE__COMMENT_DIR        Comment directory (default: comments)
    COMMENTD__STORAGE__LOG_DIR            Log directory (default: stdout)
    COMMENTD__TELEMETRY__LOGGING__LEVEL   Log filter (default: info)
    COMMENTD__TELEMETRY__METRICS__ENABLED Serve Prometheus metrics (default: false)

EXAMPLES:
    # Listen on two ports
    commentd /var/lib/commentd /var/log/commentd 8080 8081

    # Run with a configuration file
    commentd --config /etc/commentd.toml
";

/// Argument errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// An option was given without its value.
    #[error("missing value for {0}")]
    MissingValue(String),

    /// An option nobody recognizes.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// A port argument is not a number in 1..=65535.
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// Positional arguments were given but not enough of them.
    #[error("expected <COMMENT_DIR> <LOG_DIR> <PORT>..., got {0} argument(s)")]
    MissingPositional(usize),
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the listener.
    Run(Args),
    /// Print usage.
    Help,
    /// Print the version.
    Version,
}

/// Where logs go, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// `-`: standard output.
    Stdout,
    /// A directory receiving the log file.
    Dir(PathBuf),
}

/// Positional overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Positional {
    /// Comment directory.
    pub comment_dir: PathBuf,
    /// Log destination.
    pub log: LogTarget,
    /// Ports, in the order given.
    pub ports: Vec<u16>,
}

/// Parsed arguments for [`Command::Run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Positional overrides, if any were given.
    pub positional: Option<Positional>,
}

impl Args {
    /// Parses arguments, not including the program name.
    ///
    /// `--help` and `--version` win as soon as they are seen.
    pub fn parse_from<I, S>(args: I) -> Result<Command, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let mut config = None;
        let mut rest = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().ok_or_else(|| CliError::MissingValue(arg))?;
                    config = Some(PathBuf::from(path));
                }
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-v" => return Ok(Command::Version),
                "-" => rest.push(arg),
                other if other.starts_with('-') => {
                    return Err(CliError::UnknownOption(other.to_string()))
                }
                _ => rest.push(arg),
            }
        }

        let positional = match rest.len() {
            0 => None,
            1 | 2 => return Err(CliError::MissingPositional(rest.len())),
            _ => Some(positional(rest)?),
        };

        Ok(Command::Run(Self { config, positional }))
    }

    /// Writes the positional overrides into `config`.
    pub fn apply(&self, config: &mut CommentdConfig) {
        let Some(positional) = &self.positional else {
            return;
        };

        config.storage.comment_dir.clone_from(&positional.comment_dir);
        config.storage.log_dir = match &positional.log {
            LogTarget::Stdout => None,
            LogTarget::Dir(dir) => Some(dir.clone()),
        };
        config.server.ports.clone_from(&positional.ports);
    }
}

fn positional(rest: Vec<String>) -> Result<Positional, CliError> {
    let mut rest = rest.into_iter();
    let comment_dir = rest.next().map(PathBuf::from).unwrap_or_default();
    let log = match rest.next().as_deref() {
        Some("-") | None => LogTarget::Stdout,
        Some(dir) => LogTarget::Dir(PathBuf::from(dir)),
    };

    let ports = rest
        .map(|arg| match parse_ports(&arg).as_deref() {
            Some([port]) if *port != 0 => Ok(*port),
            _ => Err(CliError::InvalidPort(arg)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Positional {
        comment_dir,
        log,
        ports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> Args {
        match Args::parse_from(args.iter().copied()).unwrap() {
            Command::Run(args) => args,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(run(&[]), Args::default());
    }

    #[test]
    fn test_config_option() {
        let args = run(&["-c", "/etc/commentd.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/commentd.toml")));
        assert!(args.positional.is_none());

        assert_eq!(
            Args::parse_from(["--config"]),
            Err(CliError::MissingValue("--config".to_string()))
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(Args::parse_from(["--help"]), Ok(Command::Help));
        assert_eq!(Args::parse_from(["/tmp", "-v"]), Ok(Command::Version));
    }

    #[test]
    fn test_unknown_option() {
        assert_eq!(
            Args::parse_from(["--verbose"]),
            Err(CliError::UnknownOption("--verbose".to_string()))
        );
    }

    #[test]
    fn test_positional() {
        let args = run(&["/srv/comments", "/var/log/commentd", "8080", "8081"]);
        assert_eq!(
            args.positional,
            Some(Positional {
                comment_dir: PathBuf::from("/srv/comments"),
                log: LogTarget::Dir(PathBuf::from("/var/log/commentd")),
                ports: vec![8080, 8081],
            })
        );
    }

    #[test]
    fn test_positional_stdout_log() {
        let args = run(&["comments", "-", "8080"]);
        assert_eq!(args.positional.unwrap().log, LogTarget::Stdout);
    }

    #[test]
    fn test_positional_needs_a_port() {
        assert_eq!(
            Args::parse_from(["comments", "logs"]),
            Err(CliError::MissingPositional(2))
        );
    }

    #[test]
    fn test_invalid_ports() {
        for bad in ["http", "0", "70000", "8080,8081"] {
            assert_eq!(
                Args::parse_from(["comments", "logs", bad]),
                Err(CliError::InvalidPort(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_apply_overrides_config() {
        let mut config = CommentdConfig::default();
        run(&["/srv/comments", "/var/log", "9000"]).apply(&mut config);

        assert_eq!(config.storage.comment_dir, PathBuf::from("/srv/comments"));
        assert_eq!(config.storage.log_dir, Some(PathBuf::from("/var/log")));
        assert_eq!(config.server.ports, vec![9000]);
    }

    #[test]
    fn test_apply_without_positional_keeps_config() {
        let mut config = CommentdConfig::default();
        config.storage.log_dir = Some(PathBuf::from("/var/log"));
        run(&[]).apply(&mut config);

        assert_eq!(config.storage.log_dir, Some(PathBuf::from("/var/log")));
        assert_eq!(config.server.ports, vec![8080]);
    }
}
