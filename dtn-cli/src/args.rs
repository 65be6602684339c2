//! Simple command-line argument parser.
//!
//! No external dependencies. Supports `--flag`, `--key value`,
//! `--key=value`, `-v`/`-q` (counted), short flags, and positional
//! arguments. Flags are checked against the tables below; anything
//! unknown is an error rather than silently consuming the next argument.

use std::collections::HashMap;
use std::fmt;

/// Long flags that take no value.
const LONG_BOOL: &[&str] = &["version", "help", "dump"];
/// Long flags that require a value.
const LONG_VALUE: &[&str] = &["config", "routes"];
/// Short flags that take no value.
const SHORT_BOOL: &[char] = &['d', 'h'];
/// Short flags that require a value.
const SHORT_VALUE: &[char] = &['c', 'r'];

/// Argument parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    UnknownFlag(String),
    MissingValue(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::UnknownFlag(flag) => write!(f, "Unknown flag '{}'", flag),
            ArgsError::MissingValue(flag) => write!(f, "Flag '{}' requires a value", flag),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Parsed command-line arguments.
#[derive(Debug)]
pub struct Args {
    pub flags: HashMap<String, String>,
    pub positional: Vec<String>,
    pub verbosity: u8,
    pub quiet: u8,
}

impl Args {
    /// Parse command-line arguments (skipping argv[0]).
    pub fn parse() -> Result<Self, ArgsError> {
        Self::parse_from(std::env::args().skip(1).collect())
    }

    /// Parse from a list of argument strings.
    pub fn parse_from(args: Vec<String>) -> Result<Self, ArgsError> {
        let mut flags = HashMap::new();
        let mut positional = Vec::new();
        let mut verbosity: u8 = 0;
        let mut quiet: u8 = 0;
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                // Everything after -- is positional
                positional.extend(iter);
                break;
            } else if let Some(key) = arg.strip_prefix("--") {
                if let Some(eq_pos) = key.find('=') {
                    let (k, v) = key.split_at(eq_pos);
                    if !LONG_VALUE.contains(&k) {
                        return Err(ArgsError::UnknownFlag(format!("--{}", k)));
                    }
                    flags.insert(k.to_string(), v[1..].to_string());
                } else if LONG_BOOL.contains(&key) {
                    flags.insert(key.to_string(), "true".into());
                } else if LONG_VALUE.contains(&key) {
                    let val = iter
                        .next()
                        .ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                    flags.insert(key.to_string(), val);
                } else {
                    return Err(ArgsError::UnknownFlag(arg));
                }
            } else if arg.starts_with('-') && arg.len() > 1 {
                // Short flags, possibly clustered: -vvq, -c PATH
                let chars: Vec<char> = arg[1..].chars().collect();
                for (i, &c) in chars.iter().enumerate() {
                    match c {
                        'v' => verbosity = verbosity.saturating_add(1),
                        'q' => quiet = quiet.saturating_add(1),
                        _ if SHORT_BOOL.contains(&c) => {
                            flags.insert(c.to_string(), "true".into());
                        }
                        _ if SHORT_VALUE.contains(&c) => {
                            // A value-taking short flag ends its cluster.
                            if i != chars.len() - 1 {
                                return Err(ArgsError::MissingValue(format!("-{}", c)));
                            }
                            let val = iter
                                .next()
                                .ok_or_else(|| ArgsError::MissingValue(format!("-{}", c)))?;
                            flags.insert(c.to_string(), val);
                        }
                        _ => return Err(ArgsError::UnknownFlag(format!("-{}", c))),
                    }
                }
            } else {
                positional.push(arg);
            }
        }

        Ok(Args {
            flags,
            positional,
            verbosity,
            quiet,
        })
    }

    /// Get a flag value by long or short name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.flags.get(key).map(|s| s.as_str())
    }

    /// Check if a flag is set.
    pub fn has(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }

    /// Get config path from --config or -c flag.
    pub fn config_path(&self) -> Option<&str> {
        self.get("config").or_else(|| self.get("c"))
    }

    /// Get route directory from --routes or -r flag.
    pub fn routes_path(&self) -> Option<&str> {
        self.get("routes").or_else(|| self.get("r"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Args {
        Args::parse_from(s.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn parse_err(s: &[&str]) -> ArgsError {
        Args::parse_from(s.iter().map(|s| s.to_string()).collect()).unwrap_err()
    }

    #[test]
    fn parse_config_and_verbose() {
        let a = args(&["--config", "/path/to/config", "-vv"]);
        assert_eq!(a.config_path(), Some("/path/to/config"));
        assert_eq!(a.verbosity, 2);
    }

    #[test]
    fn parse_version() {
        let a = args(&["--version"]);
        assert!(a.has("version"));
    }

    #[test]
    fn parse_positional_uri() {
        let a = args(&["-r", "/etc/routes", "dtn://alice/inbox"]);
        assert_eq!(a.routes_path(), Some("/etc/routes"));
        assert_eq!(a.positional, vec!["dtn://alice/inbox"]);
    }

    #[test]
    fn parse_short_config() {
        let a = args(&["-c", "/my/config"]);
        assert_eq!(a.config_path(), Some("/my/config"));
    }

    #[test]
    fn parse_quiet() {
        let a = args(&["-qq"]);
        assert_eq!(a.quiet, 2);
    }

    #[test]
    fn parse_dump() {
        let a = args(&["--dump", "--routes=/r"]);
        assert!(a.has("dump"));
        assert_eq!(a.routes_path(), Some("/r"));
    }

    #[test]
    fn parse_clustered_short_flags() {
        let a = args(&["-vvd"]);
        assert_eq!(a.verbosity, 2);
        assert!(a.has("d"));
    }

    #[test]
    fn positional_after_double_dash() {
        let a = args(&["--", "--not-a-flag"]);
        assert_eq!(a.positional, vec!["--not-a-flag"]);
    }

    #[test]
    fn unknown_long_flag_is_an_error() {
        // An unknown flag must not swallow the following argument.
        assert_eq!(
            parse_err(&["--bogus", "value"]),
            ArgsError::UnknownFlag("--bogus".into())
        );
        assert_eq!(
            parse_err(&["--bogus=value"]),
            ArgsError::UnknownFlag("--bogus".into())
        );
    }

    #[test]
    fn unknown_short_flag_is_an_error() {
        assert_eq!(parse_err(&["-x"]), ArgsError::UnknownFlag("-x".into()));
        assert_eq!(parse_err(&["-vx"]), ArgsError::UnknownFlag("-x".into()));
    }

    #[test]
    fn value_flag_without_value_is_an_error() {
        assert_eq!(
            parse_err(&["--config"]),
            ArgsError::MissingValue("--config".into())
        );
        assert_eq!(parse_err(&["-r"]), ArgsError::MissingValue("-r".into()));
        // Value-taking short flag stuck mid-cluster.
        assert_eq!(parse_err(&["-cv"]), ArgsError::MissingValue("-c".into()));
    }

    #[test]
    fn value_flag_accepts_dash_prefixed_value() {
        // The next argument is the value unconditionally.
        let a = args(&["--routes", "-weird-dir"]);
        assert_eq!(a.routes_path(), Some("-weird-dir"));
    }
}
