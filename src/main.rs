//! webshell - an interactive terminal bound to a shell session
//!
//! The terminal surface and the session are joined by two event channels.
//! The surface reports input, fitted sizes and title changes on the outbound
//! channel; session output arrives on the inbound channel and is rendered.
//!
//! # Quick Start
//!
//! ```text
//! webshell                        # $SHELL in a loopback session
//! webshell -s /bin/bash -e FOO=1  # explicit shell and extra environment
//! webshell --prod --origin https://host --print-endpoint
//! ```

mod config;
mod core;
mod endpoint;
mod environment;
mod term;
mod ui;

use std::env;
use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::core::bridge::TerminalBridge;
use crate::core::controller::{SessionController, ViewState};
use crate::core::geometry::Geometry;
use crate::core::pty::PtyTransport;
use crate::core::surface::TerminalSurface;
use crate::endpoint::{BuildMode, Route};
use crate::term::VtSurface;
use crate::ui::{InputModes, KeyMapper, Renderer, StatusLine, TitleSlot};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line overrides
#[derive(Debug, Default, PartialEq)]
struct Args {
    shell: Option<String>,
    env: Vec<String>,
    prod: bool,
    origin: Option<String>,
    routed: bool,
    path: Option<String>,
    print_endpoint: bool,
    no_status: bool,
}

#[derive(Debug, PartialEq)]
enum Command {
    Run(Args),
    Help,
    Version,
}

fn print_help() {
    eprintln!("webshell {} - terminal bound to a shell session", VERSION);
    eprintln!();
    eprintln!("Usage: webshell [OPTIONS]");
    eprintln!();
    eprintln!("Session options:");
    eprintln!("  -s, --shell <CMD>     Shell to run (default: config, $SHELL, /bin/sh)");
    eprintln!("  -e, --env KEY=VALUE   Extra session environment (repeatable)");
    eprintln!();
    eprintln!("Endpoint options:");
    eprintln!("  --prod                Derive the endpoint from --origin");
    eprintln!("  --origin <URL>        Page origin (http:// or https://)");
    eprintln!("  --routed              Use /shell/ws instead of /ws");
    eprintln!("  --path <PATH>         Client path to route (implies --routed)");
    eprintln!("  --print-endpoint      Print the selected endpoint and exit");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  --no-status           Hide the status bar");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("If the session cannot be opened, resize the window to retry,");
    eprintln!("or press q / Ctrl+C to quit.");
    eprintln!();
    eprintln!("Configuration: ~/.webshell/config.toml");
    eprintln!("Log file:      ~/.webshell/webshell.log");
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-s" | "--shell" => {
                let shell = iter.next().ok_or("Missing shell argument")?;
                parsed.shell = Some(shell.clone());
            }
            "-e" | "--env" => {
                let entry = iter.next().ok_or("Missing KEY=VALUE argument")?;
                if !entry.split_once('=').is_some_and(|(key, _)| !key.is_empty()) {
                    return Err(format!("Invalid environment entry: {}", entry));
                }
                parsed.env.push(entry.clone());
            }
            "--prod" => parsed.prod = true,
            "--origin" => {
                let origin = iter.next().ok_or("Missing origin argument")?;
                parsed.origin = Some(origin.clone());
            }
            "--routed" => parsed.routed = true,
            "--path" => {
                let path = iter.next().ok_or("Missing path argument")?;
                parsed.path = Some(path.clone());
            }
            "--print-endpoint" => parsed.print_endpoint = true,
            "--no-status" => parsed.no_status = true,
            other => return Err(format!("Unknown argument: {}. Use -h for help.", other)),
        }
    }

    Ok(Command::Run(parsed))
}

impl Args {
    /// Command line values override the config file
    fn apply(&self, config: &mut Config) {
        if let Some(shell) = &self.shell {
            config.shell = Some(shell.clone());
        }
        config.env.extend(self.env.iter().cloned());
        if self.prod {
            config.endpoint.mode = BuildMode::Production;
        }
        if let Some(origin) = &self.origin {
            config.endpoint.origin = Some(origin.clone());
        }
        if self.routed || self.path.is_some() {
            config.endpoint.routed = true;
        }
        if self.no_status {
            config.status_bar.visible = false;
        }
    }
}

/// Log to `~/.webshell/webshell.log`; stdout belongs to the terminal
fn init_logging(level: &str) {
    let Some(dir) = config::app_dir() else {
        return;
    };
    let _ = fs::create_dir_all(&dir);

    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("webshell.log"))
    else {
        return;
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<()> {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Version) => {
            eprintln!("webshell {}", VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(2);
        }
    };

    let (mut config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    args.apply(&mut config);
    init_logging(&config.log_level);
    info!("webshell {} starting", VERSION);
    if let Some(e) = config_error {
        warn!("{}; using defaults", e);
    }

    let url = endpoint::select_endpoint(
        config.endpoint.mode,
        config.endpoint.origin.as_deref(),
        config.endpoint.shape(),
        &config.endpoint.dev_url,
    )
    .context("Failed to select websocket endpoint")?;
    info!(endpoint = %url, mode = ?config.endpoint.mode, "Selected endpoint");

    if config.endpoint.routed {
        let path = args.path.as_deref().unwrap_or(endpoint::SHELL_ROUTE);
        match endpoint::resolve_route(path) {
            Route::Shell => debug!(path, "Shell route"),
            Route::Redirect(target) => info!(from = path, to = target, "Redirected to shell route"),
        }
    }

    if args.print_endpoint {
        println!("{}", url);
        return Ok(());
    }

    let code = run(&config)?;
    if code != 0 {
        std::process::exit(i32::try_from(code).unwrap_or(1));
    }
    Ok(())
}

/// Run one binding until the session exits. Returns its exit status.
fn run(config: &Config) -> anyhow::Result<u32> {
    let shell = config.resolved_shell();
    let env = environment::build(env::vars(), config.inherit_safe_env, &config.env);
    info!(shell = %shell, vars = env.len(), "Session environment ready");

    let mut controller = SessionController::new(PtyTransport::new(shell), env);
    debug!(
        shell = controller.transport().shell(),
        env = ?controller.env(),
        "Controller ready"
    );
    let mut titles = TitleSlot::new(controller.outbound());

    let (cols, rows) = Renderer::size().context("Failed to read terminal size")?;
    let reserved = u16::from(config.status_bar.visible);
    // A zero size means the host could not be measured
    let container = Geometry::new(cols, rows).unwrap_or_default();
    let surface = VtSurface::new(container, reserved);
    let inbound = controller.inbound().clone();
    let mut bridge = TerminalBridge::attach(surface, &inbound, controller.outbound().clone())
        .context("Failed to attach terminal surface")?;

    let mut renderer = Renderer::new();
    renderer.init().context("Failed to initialize terminal")?;

    let result = run_main_loop(
        &mut controller,
        &mut bridge,
        &mut titles,
        &mut renderer,
        config.status_bar.visible,
    );

    // Surface first, then the session
    bridge.dispose();
    let _ = renderer.cleanup();
    drop(controller);

    result
}

fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn run_main_loop(
    controller: &mut SessionController<PtyTransport>,
    bridge: &mut TerminalBridge<VtSurface>,
    titles: &mut TitleSlot,
    renderer: &mut Renderer,
    show_status: bool,
) -> anyhow::Result<u32> {
    let poll_timeout = Duration::from_millis(10);
    let mut dirty = true;

    loop {
        if event::poll(poll_timeout)? {
            let evt = event::read()?;
            let failed = matches!(controller.view_state(), ViewState::OpenFailed(_));
            let Some(surface) = bridge.surface_mut() else {
                return Ok(0);
            };
            let modes = InputModes::from_screen(surface.screen());

            match evt {
                Event::Key(key) if failed && is_quit_key(&key) => {
                    info!("Quit after failed open");
                    return Ok(1);
                }
                Event::Key(key) => {
                    if let Some(bytes) = KeyMapper::map(&key, modes) {
                        surface.input(bytes);
                    }
                }
                Event::Paste(text) => surface.input(KeyMapper::paste(&text, modes)),
                Event::Resize(cols, rows) => {
                    debug!(columns = cols, rows = rows, "Host terminal resized");
                    surface.container_resized(cols, rows);
                    dirty = true;
                }
                _ => {}
            }
        }

        bridge.handle_surface_events();
        match controller.sync() {
            Ok(Some(command)) => {
                debug!(?command, open = controller.state().is_open(), "Session command issued");
                dirty = true;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Session request failed: {}", e);
                dirty = true;
            }
        }
        if let Err(e) = controller.flush_input() {
            warn!("Failed to forward input: {}", e);
        }

        if bridge.pump_inbound() > 0 {
            dirty = true;
            // Title changes raised while rendering the output
            bridge.handle_surface_events();
        }
        if let Some(title) = titles.refresh() {
            renderer.set_window_title(title)?;
            dirty = true;
        }

        if let Some(code) = controller.poll_exit() {
            bridge.pump_inbound();
            draw(renderer, bridge, controller, titles, show_status)?;
            info!(exit_status = code, "Session ended");
            return Ok(code);
        }

        if dirty {
            draw(renderer, bridge, controller, titles, show_status)?;
            dirty = false;
        }
    }
}

fn draw(
    renderer: &mut Renderer,
    bridge: &TerminalBridge<VtSurface>,
    controller: &SessionController<PtyTransport>,
    titles: &TitleSlot,
    show_status: bool,
) -> io::Result<()> {
    let Some(surface) = bridge.surface() else {
        return Ok(());
    };
    let status = StatusLine {
        title: titles.current(),
        view: controller.view_state(),
        geometry: surface.geometry(),
    };
    renderer.render(surface.screen(), show_status.then_some(&status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointShape;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags() {
        let parsed = parse_args(&args(&[
            "-s",
            "/bin/zsh",
            "-e",
            "A=1",
            "--env",
            "B=2",
            "--prod",
            "--origin",
            "https://h",
            "--routed",
            "--no-status",
        ]))
        .unwrap();

        assert_eq!(
            parsed,
            Command::Run(Args {
                shell: Some("/bin/zsh".to_string()),
                env: vec!["A=1".to_string(), "B=2".to_string()],
                prod: true,
                origin: Some("https://h".to_string()),
                routed: true,
                path: None,
                print_endpoint: false,
                no_status: true,
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["--shell"])).is_err());
        assert!(parse_args(&args(&["-e", "NOEQUALS"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
        assert_eq!(parse_args(&args(&["-h", "--bogus"])), Ok(Command::Help));
        assert_eq!(parse_args(&args(&["--version"])), Ok(Command::Version));
    }

    #[test]
    fn test_args_override_config() {
        let mut config = Config {
            env: vec!["EDITOR=vi".to_string()],
            ..Config::default()
        };
        let argv = args(&["-e", "A=1", "--prod", "--no-status"]);
        let Command::Run(parsed) = parse_args(&argv).unwrap() else {
            panic!("expected run");
        };
        parsed.apply(&mut config);

        assert_eq!(config.env, vec!["EDITOR=vi".to_string(), "A=1".to_string()]);
        assert_eq!(config.endpoint.mode, BuildMode::Production);
        assert!(!config.status_bar.visible);
    }

    #[test]
    fn test_path_implies_routed() {
        let mut config = Config::default();
        let Command::Run(parsed) = parse_args(&args(&["--path", "/other"])).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(parsed.path.as_deref(), Some("/other"));
        parsed.apply(&mut config);

        assert_eq!(config.endpoint.shape(), EndpointShape::Routed);
        assert!(parse_args(&args(&["--path"])).is_err());
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
    }
}
