//! Command-line surface and its resolution against the config file.

use std::path::PathBuf;

use clap::Parser;
use jointpose_runtime::PadLayout;
use jointpose_types::PoseError;

use crate::config::{Config, TransportKind};

/// Teleoperate, record and replay robot joint poses.
#[derive(Debug, Parser)]
#[command(name = "jointpose", version, about)]
pub struct Args {
    /// Use a joystick for input
    #[arg(short = 'j', long, conflicts_with = "keyboard")]
    pub joystick: bool,

    /// Use the keyboard for input (default)
    #[arg(short = 'k', long)]
    pub keyboard: bool,

    /// Record snapshots to FILE
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Play back FILE instead of reading live input
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Playback rate in rows per second
    #[arg(short = 'r', long, value_name = "HZ", value_parser = clap::value_parser!(u32).range(1..))]
    pub rate: Option<u32>,

    /// Read configuration from FILE instead of ~/.jointpose/config.toml
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log commands instead of sending them to a robot
    #[arg(long)]
    pub sim: bool,

    /// rosbridge_server URL
    #[arg(long, value_name = "URL")]
    pub rosbridge_url: Option<String>,

    /// Write a default config file and exit
    #[arg(long)]
    pub init_config: bool,
}

/// Which input loop drives the session.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Keyboard,
    Joystick,
    File(PathBuf),
}

/// Everything `main` needs, with flags layered over config.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub input: InputMode,
    pub output: Option<PathBuf>,
    pub rate: u32,
    pub transport: TransportKind,
    pub rosbridge_url: String,
    pub pad: PadLayout,
    pub joystick_scale: f64,
    pub bindings_path: Option<PathBuf>,
    pub groups: Vec<String>,
}

impl Settings {
    /// # Errors
    ///
    /// [`PoseError::Config`] when no input can be selected, the pad type is
    /// unknown or joystick input is combined with the sim transport.
    pub fn resolve(args: &Args, cfg: &Config) -> Result<Self, PoseError> {
        let input = resolve_input_mode(args, cfg)?;
        let transport = if args.sim { TransportKind::Sim } else { cfg.transport };
        if input == InputMode::Joystick && transport == TransportKind::Sim {
            return Err(PoseError::Config(
                "joystick input requires the rosbridge transport".to_string(),
            ));
        }
        if cfg.groups.is_empty() {
            return Err(PoseError::Config("at least one group is required".to_string()));
        }

        Ok(Self {
            input,
            output: args.output.clone(),
            rate: args.rate.unwrap_or(cfg.playback_rate),
            transport,
            rosbridge_url: args
                .rosbridge_url
                .clone()
                .unwrap_or_else(|| cfg.rosbridge_url.clone()),
            pad: cfg.pad_type.parse()?,
            joystick_scale: cfg.joystick_scale,
            bindings_path: cfg.bindings_path.clone(),
            groups: cfg.groups.clone(),
        })
    }
}

/// A playback file wins, then `-j`, then the keyboard (explicit or default).
pub fn resolve_input_mode(args: &Args, cfg: &Config) -> Result<InputMode, PoseError> {
    if let Some(path) = &args.input {
        return Ok(InputMode::File(path.clone()));
    }
    if args.joystick {
        return Ok(InputMode::Joystick);
    }
    if args.keyboard || cfg.keyboard_default {
        return Ok(InputMode::Keyboard);
    }
    Err(PoseError::Config(
        "use either keyboard (default) or joystick: pass -k or -j, or set keyboard_default = true"
            .to_string(),
    ))
}
