use clap::Parser;
use std::path::PathBuf;

/// VLF band-power monitor
#[derive(Parser, Debug)]
#[command(name = "sidmon", about = "VLF band-power monitor with daily records and loss-of-signal alerts")]
pub struct Cli {
    /// Configuration file (defaults to ./sidmon.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Raw PCM input, `-` for stdin; overrides [input] device
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Validate the configuration, print the band table and exit
    #[arg(long)]
    pub check_config: bool,

    /// Capture from the default audio input device instead of raw PCM
    #[cfg(feature = "device")]
    #[arg(long, conflicts_with = "input")]
    pub capture: bool,
}

impl Cli {
    /// Default log filter for the requested verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["sidmon", "-vv", "--config", "vlf.toml", "--check-config"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.config, Some(PathBuf::from("vlf.toml")));
        assert!(cli.check_config);
        assert!(cli.input.is_none());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sidmon", "-i", "-"]);
        assert_eq!(cli.log_level(), "warn");
        assert_eq!(cli.input, Some(PathBuf::from("-")));
    }
}
