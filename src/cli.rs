//! Command line interface and its conversion into runtime configuration.
//!
//! Everything the orchestrator needs is distilled into an [`EmbedConfig`] here so `main` only
//! wires components together. Verbosity flags map to a [`LogLevel`] consumed by
//! `logging::configure_logging`.

use clap::{ArgAction, Parser, ValueEnum, value_parser};

use crate::embed::{ChromeSource, EmbedConfig};
use crate::geometry::{ChromeInset, SizeCorrection};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChromeMode {
    /// Use --inset-x / --inset-y.
    Fixed,
    /// Derive the inset from the host's outer vs. client rectangle.
    Measured,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = concat!(
        env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"),
        " - Overlay a borderless child window on top of another application's window.",
    )
)]
pub struct Cli {
    /// Exact title of the host window. Without it a small control window asks for one.
    #[arg(short = 't', long = "title")]
    pub title: Option<String>,
    /// Log every property of the host window before embedding.
    #[arg(long = "inspect")]
    pub inspect: bool,
    /// Restore a minimized host before measuring it.
    #[arg(long = "restore-host")]
    pub restore_host: bool,
    /// Source of the host chrome allowance.
    #[arg(long = "chrome", value_enum, default_value_t = ChromeMode::Fixed)]
    pub chrome: ChromeMode,
    /// Horizontal chrome inset in device pixels (fixed mode).
    #[arg(
        long = "inset-x",
        default_value_t = ChromeInset::DEFAULT.horizontal,
        value_parser = value_parser!(i32).range(0..)
    )]
    pub inset_x: i32,
    /// Vertical chrome inset in device pixels (fixed mode).
    #[arg(
        long = "inset-y",
        default_value_t = ChromeInset::DEFAULT.vertical,
        value_parser = value_parser!(i32).range(0..)
    )]
    pub inset_y: i32,
    /// Width shaved off the guest after scaling, in guest logical units.
    #[arg(
        long = "correct-width",
        default_value_t = SizeCorrection::DEFAULT.width,
        value_parser = value_parser!(i32).range(0..)
    )]
    pub correct_width: i32,
    /// Height shaved off the guest after scaling, in guest logical units.
    #[arg(
        long = "correct-height",
        default_value_t = SizeCorrection::DEFAULT.height,
        value_parser = value_parser!(i32).range(0..)
    )]
    pub correct_height: i32,
    /// Increase verbosity (-v=debug, -vv=trace). Overrides RUST_LOG.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
    /// Quiet mode: only warnings and errors. Overrides -v and RUST_LOG.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Warn
        } else {
            match self.verbose {
                0 => LogLevel::Info,
                1 => LogLevel::Debug,
                _ => LogLevel::Trace,
            }
        }
    }

    pub fn embed_config(&self) -> EmbedConfig {
        let chrome = match self.chrome {
            ChromeMode::Fixed => ChromeSource::Fixed(ChromeInset {
                horizontal: self.inset_x,
                vertical: self.inset_y,
            }),
            ChromeMode::Measured => ChromeSource::Measured,
        };
        EmbedConfig {
            chrome,
            correction: SizeCorrection {
                width: self.correct_width,
                height: self.correct_height,
            },
            restore_host: self.restore_host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("winembed").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_documented_constants() {
        let cli = parse(&[]);
        assert!(cli.title.is_none());
        assert_eq!(cli.log_level(), LogLevel::Info);
        assert_eq!(cli.embed_config(), EmbedConfig::default());
    }

    #[test]
    fn title_and_measured_chrome() {
        let cli = parse(&["--title", "Untitled - Notepad", "--chrome", "measured"]);
        assert_eq!(cli.title.as_deref(), Some("Untitled - Notepad"));
        assert_eq!(cli.embed_config().chrome, ChromeSource::Measured);
    }

    #[test]
    fn custom_insets_and_corrections() {
        let cli = parse(&[
            "-t",
            "Host",
            "--inset-x",
            "16",
            "--inset-y",
            "39",
            "--correct-width",
            "0",
            "--correct-height",
            "0",
            "--restore-host",
        ]);
        let cfg = cli.embed_config();
        assert_eq!(
            cfg.chrome,
            ChromeSource::Fixed(ChromeInset {
                horizontal: 16,
                vertical: 39
            })
        );
        assert_eq!(cfg.correction, SizeCorrection { width: 0, height: 0 });
        assert!(cfg.restore_host);
    }

    #[test]
    fn negative_allowances_are_rejected() {
        for flag in ["--inset-x", "--inset-y", "--correct-width", "--correct-height"] {
            let arg = format!("{flag}=-5000");
            assert!(
                Cli::try_parse_from(["winembed", "-t", "Host", arg.as_str()]).is_err(),
                "{arg} accepted"
            );
        }
        let cli = parse(&["--inset-x=0", "--correct-height=0"]);
        assert_eq!(cli.inset_x, 0);
        assert_eq!(cli.correct_height, 0);
    }

    #[test]
    fn verbosity_flags() {
        assert_eq!(parse(&["-v"]).log_level(), LogLevel::Debug);
        assert_eq!(parse(&["-vv"]).log_level(), LogLevel::Trace);
        assert_eq!(parse(&["-vv", "-q"]).log_level(), LogLevel::Warn);
    }
}
