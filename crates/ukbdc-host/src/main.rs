//! ukbdc: edit keyboard layouts and program them into the controller.
//!
//! # Usage
//!
//! ```text
//! ukbdc [--config <FILE>] <COMMAND>
//!
//! Commands:
//!   new      Create an empty layout file
//!   show     Print the effective key table of a layout file
//!   set      Change one key slot
//!   parent   Change the parent of a layer
//!   program  Upload a layout file to the controller
//!   status   Print the controller's status
//!   dfu      Reboot the controller into its bootloader
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable       | Description                                   |
//! |----------------|-----------------------------------------------|
//! | `UKBDC_CONFIG` | Config file used instead of the platform one |
//! | `RUST_LOG`     | Log filter, overrides `[log] level`           |
//!
//! All layout checks (file format, inheritance cycles, page count) run
//! before the controller is opened.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ukbdc_core::{Action, ActionKind, KeyDef, Layout, ScancodeTable};
use ukbdc_host::application::program::{query_status, reboot_to_dfu, upload_layout};
use ukbdc_host::application::session::DeviceSession;
use ukbdc_host::infrastructure::storage::config::{load_config, AppConfig};
use ukbdc_host::infrastructure::storage::layout_file::{load_layout, save_layout};
use ukbdc_host::infrastructure::usb::rusb_backend::RusbBackend;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Layout editor and programmer for the ukbdc keyboard controller.
#[derive(Debug, Parser)]
#[command(name = "ukbdc", about = "Keyboard layout tool for the ukbdc controller", version)]
struct Cli {
    /// Configuration file to use instead of the platform default.
    #[arg(long, global = true, env = "UKBDC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty layout file.
    New {
        file: PathBuf,
        /// Keys per layer [default: from config, 64]
        #[arg(long)]
        keys: Option<usize>,
        /// Number of layers [default: from config, 4]
        #[arg(long)]
        layers: Option<usize>,
    },

    /// Print the effective (resolved) key table, marking inherited keys.
    Show {
        file: PathBuf,
        /// Only print this layer.
        #[arg(long)]
        layer: Option<usize>,
    },

    /// Change one key slot in place.
    Set(SetArgs),

    /// Change the parent of a layer.
    Parent(ParentArgs),

    /// Validate, encode and upload a layout file.
    Program { file: PathBuf },

    /// Print the controller's status.
    Status,

    /// Reboot the controller into its DFU bootloader.
    Dfu,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("slot").required(true).args(["inherit", "scancode"])))]
struct SetArgs {
    file: PathBuf,
    #[arg(long)]
    layer: usize,
    #[arg(long)]
    key: usize,
    /// Make the slot inherit from the parent layer.
    #[arg(long)]
    inherit: bool,
    /// Scancode as a number (`30`, `0x1e`) or a mnemonic from `[mnemonics]`.
    #[arg(long)]
    scancode: Option<String>,
    /// Action on key press, `KIND:ARG` (e.g. `rel:+1`, `abs:2`, `none`).
    #[arg(long, value_parser = parse_action, conflicts_with = "inherit")]
    press: Option<Action>,
    /// Action on key release, same syntax as `--press`.
    #[arg(long, value_parser = parse_action, conflicts_with = "inherit")]
    release: Option<Action>,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("link").required(true).args(["none", "parent"])))]
struct ParentArgs {
    file: PathBuf,
    #[arg(long)]
    layer: usize,
    /// Make the layer a root layer.
    #[arg(long)]
    none: bool,
    /// Parent layer index.
    #[arg(long)]
    parent: Option<u8>,
}

/// Parses `none`, `rel:N`/`relative:N` or `abs:N`/`absolute:N`.
fn parse_action(s: &str) -> Result<Action, String> {
    let (kind, arg) = match s.split_once(':') {
        Some((kind, arg)) => (kind, Some(arg)),
        None => (s, None),
    };
    let kind = match kind.trim().to_ascii_lowercase().as_str() {
        "none" => ActionKind::None,
        "rel" | "relative" => ActionKind::Relative,
        "abs" | "absolute" => ActionKind::Absolute,
        other => return Err(format!("unknown action kind '{other}'")),
    };
    let arg = match (kind, arg) {
        (ActionKind::None, None) => 0,
        (_, Some(arg)) => arg
            .trim()
            .parse::<i8>()
            .map_err(|e| format!("invalid action argument '{arg}': {e}"))?,
        (_, None) => return Err(format!("{kind} action needs an argument, e.g. '{kind}:1'")),
    };
    Action::new(kind, arg).map_err(|e| e.to_string())
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_new(file: &Path, keys: Option<usize>, layers: Option<usize>, config: &AppConfig) -> anyhow::Result<()> {
    let no_keys = keys.unwrap_or(config.layout.no_keys);
    let no_layers = layers.unwrap_or(config.layout.no_layers);
    let layout = Layout::new(no_keys, no_layers)?;
    save_layout(&layout, file)?;
    println!(
        "created {} ({no_keys} keys x {no_layers} layers)",
        file.display()
    );
    Ok(())
}

fn render_layout(layout: &Layout, only: Option<usize>, table: &dyn ScancodeTable) -> anyhow::Result<String> {
    use std::fmt::Write as _;

    let layers: Vec<usize> = match only {
        Some(layer) => vec![layer],
        None => (0..layout.no_layers() as usize).collect(),
    };
    let mut out = String::new();
    for layer in layers {
        let parent = match layout.parent(layer)? {
            Some(p) => p.to_string(),
            None => "none".to_string(),
        };
        writeln!(out, "layer {layer} (parent: {parent})")?;
        for key in 0..layout.no_keys() as usize {
            let stored = layout.stored(layer, key)?;
            let def = layout.get(layer, key)?;
            writeln!(
                out,
                "  {key:>3}  {:<10} {:<9} {:<9}{}",
                def.display_name(table),
                action_label(&def.press),
                action_label(&def.release),
                if stored.inherited { "  (inherited)" } else { "" }
            )?;
        }
    }
    Ok(out)
}

fn action_label(action: &Action) -> String {
    if action.is_none() {
        "-".to_string()
    } else {
        format!("{}:{action}", action.kind())
    }
}

fn cmd_set(args: SetArgs, config: &AppConfig) -> anyhow::Result<()> {
    let mut layout = load_layout(&args.file)?;
    let def = match args.scancode {
        Some(name) if !args.inherit => KeyDef::from_mnemonic(
            &config.mnemonic_table(),
            &name,
            args.press.unwrap_or_else(Action::none),
            args.release.unwrap_or_else(Action::none),
        )?,
        _ => KeyDef::inherited(),
    };
    layout.set(args.layer, args.key, def)?;
    save_layout(&layout, &args.file)?;
    info!(layer = args.layer, key = args.key, "key updated");
    Ok(())
}

fn cmd_parent(args: ParentArgs) -> anyhow::Result<()> {
    let mut layout = load_layout(&args.file)?;
    let parent = if args.none { None } else { args.parent };
    layout.set_parent(args.layer, parent)?;
    if let Err(e) = layout.validate() {
        // Saved anyway: the cycle can be broken by a later edit.
        warn!("layout cannot be programmed until fixed: {e}");
    }
    save_layout(&layout, &args.file)?;
    Ok(())
}

fn cmd_program(file: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let layout = load_layout(file)?;
    let mut session = DeviceSession::new(RusbBackend::new(), config.device.session_config());
    let report = upload_layout(&mut session, &layout)
        .with_context(|| format!("failed to program {}", file.display()))?;
    println!(
        "programmed {} bytes in {} pages",
        report.bytes, report.pages
    );
    Ok(())
}

fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::New { file, keys, layers } => cmd_new(&file, keys, layers, config),
        Command::Show { file, layer } => {
            let layout = load_layout(&file)?;
            print!("{}", render_layout(&layout, layer, &config.mnemonic_table())?);
            Ok(())
        }
        Command::Set(args) => cmd_set(args, config),
        Command::Parent(args) => cmd_parent(args),
        Command::Program { file } => cmd_program(&file, config),
        Command::Status => {
            let mut session =
                DeviceSession::new(RusbBackend::new(), config.device.session_config());
            let status = query_status(&mut session)?;
            println!("{status} (code {})", status.code());
            Ok(())
        }
        Command::Dfu => {
            let mut session =
                DeviceSession::new(RusbBackend::new(), config.device.session_config());
            reboot_to_dfu(&mut session)?;
            println!("controller is rebooting into its bootloader");
            Ok(())
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. CLI arguments are parsed with `clap`.
/// 2. The config file is loaded (defaults if it does not exist).
/// 3. `tracing_subscriber` is initialised from `RUST_LOG`, falling back to
///    the configured level and then to `info`.
/// 4. The subcommand runs.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log.level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    run(cli.command, &config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
