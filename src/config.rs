use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::demos::DemoKind;

pub const MEDIA_ENV: &str = "RENDER_DEMOS_MEDIA";

const USAGE: &str = "Usage: render-demos [--demo <name>] [--media <dir>] [--size <W>x<H>] \
                     [--no-vsync] [--list] [--summary-only]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Interactive,
    List,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub mode: RunMode,
    pub demo: DemoKind,
    pub media_dir: PathBuf,
    pub window_size: (u32, u32),
    pub vsync: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Interactive,
            demo: DemoKind::Pbr,
            media_dir: PathBuf::from("media"),
            window_size: (1280, 720),
            vsync: true,
        }
    }
}

impl AppConfig {
    /// Reads the process arguments and environment.
    pub fn from_env() -> Result<Self> {
        Self::from_args(env::args().skip(1), env::var_os(MEDIA_ENV).map(PathBuf::from))
    }

    /// Parses arguments (without the program name). `media_env` is the value
    /// of the media directory variable, used when `--media` is absent.
    pub fn from_args<I, S>(args: I, media_env: Option<PathBuf>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = media_env {
            config.media_dir = dir;
        }

        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--demo" => {
                    let name = next_value(&mut args, "--demo")?;
                    config.demo = DemoKind::from_name(&name).ok_or_else(|| {
                        anyhow!("Unknown demo '{name}'. Run with --list to see the available demos")
                    })?;
                }
                "--media" => config.media_dir = PathBuf::from(next_value(&mut args, "--media")?),
                "--size" => {
                    let value = next_value(&mut args, "--size")?;
                    config.window_size =
                        parse_size(&value).with_context(|| format!("invalid --size '{value}'"))?;
                }
                "--no-vsync" => config.vsync = false,
                "--list" => config.mode = RunMode::List,
                "--summary-only" => {
                    if config.mode != RunMode::List {
                        config.mode = RunMode::Summary;
                    }
                }
                "-h" | "--help" => bail!(USAGE),
                other => bail!("Unknown argument: {other}. {USAGE}"),
            }
        }
        Ok(config)
    }
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
}

/// Parses `WIDTHxHEIGHT`.
pub fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected <width>x<height>"))?;
    let width: u32 = width.trim().parse().context("invalid width")?;
    let height: u32 = height.trim().parse().context("invalid height")?;
    if width == 0 || height == 0 {
        bail!("window size must be non-zero");
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<AppConfig> {
        AppConfig::from_args(args.iter().copied(), None)
    }

    #[test]
    fn defaults_to_interactive_pbr() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.demo, DemoKind::Pbr);
    }

    #[test]
    fn parses_every_flag() {
        let config = parse(&[
            "--demo",
            "normal-map",
            "--media",
            "assets",
            "--size",
            "800x600",
            "--no-vsync",
            "--summary-only",
        ])
        .unwrap();
        assert_eq!(config.demo, DemoKind::NormalMap);
        assert_eq!(config.media_dir, PathBuf::from("assets"));
        assert_eq!(config.window_size, (800, 600));
        assert!(!config.vsync);
        assert_eq!(config.mode, RunMode::Summary);
    }

    #[test]
    fn list_wins_over_summary() {
        let config = parse(&["--list", "--summary-only"]).unwrap();
        assert_eq!(config.mode, RunMode::List);
    }

    #[test]
    fn media_falls_back_to_environment() {
        let config = AppConfig::from_args(Vec::<String>::new(), Some("/data".into())).unwrap();
        assert_eq!(config.media_dir, PathBuf::from("/data"));
        let config = AppConfig::from_args(["--media", "local"], Some("/data".into())).unwrap();
        assert_eq!(config.media_dir, PathBuf::from("local"));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--demo", "raytracer"]).is_err());
        assert!(parse(&["--size", "0x10"]).is_err());
        assert!(parse(&["--size", "wide"]).is_err());
        assert!(parse(&["--media"]).is_err());
        let err = parse(&["--frobnicate"]).unwrap_err();
        assert!(err.to_string().contains("Unknown argument"));
    }

    #[test]
    fn size_accepts_upper_case_separator() {
        assert_eq!(parse_size("1920X1080").unwrap(), (1920, 1080));
    }
}
