//! Live dashboard demo.
//!
//! Demonstrates:
//! - Starting a dashboard on a fixed port with an inline or file page
//! - Driving telemetry from a `SharedState` that drifts over time
//! - Handling commands and replying with `LOG:` lines
//!
//! Usage:
//!   cargo run --example dashboard
//!   cargo run --example dashboard -- --port 9000
//!   cargo run --example dashboard -- --asset ./dashboard.html
//!   cargo run --example dashboard -- --debug
//!
//! Then open the printed URL and type `help` into the command box.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashwire::{
    Dashboard, DashboardAsset, Error, MetricsSource, Result, SharedState, SystemMode,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8080;
const DRIFT_PERIOD: Duration = Duration::from_millis(250);

const HELP: &str = "Commands: help, status, defense, dream, evolve, neutral, say <text>";

const PAGE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Dashwire</title>
<style>
  body { background: #0b0f14; color: #9fe8c6; font: 14px monospace; margin: 2em; }
  #metrics { display: grid; grid-template-columns: repeat(4, 12em); gap: .5em; }
  #metrics div { border: 1px solid #1f3a2e; padding: .4em; }
  #log { height: 14em; overflow-y: auto; border: 1px solid #1f3a2e; margin-top: 1em; padding: .4em; }
  input { background: #111820; color: inherit; border: 1px solid #1f3a2e; width: 30em; }
</style>
</head>
<body>
<h1>Dashwire</h1>
<div id="metrics"></div>
<div id="log"></div>
<p><input id="cmd" placeholder="type a command, e.g. help" autofocus></p>
<script>
  const metrics = {};
  const ws = new WebSocket(`ws://${location.host}/`);
  const log = (text) => {
    const el = document.getElementById("log");
    el.insertAdjacentHTML("beforeend", `<div>${text.replace(/</g, "&lt;")}</div>`);
    el.scrollTop = el.scrollHeight;
  };
  ws.onmessage = (event) => {
    const i = event.data.indexOf(":");
    const key = event.data.slice(0, i), value = event.data.slice(i + 1);
    if (key === "LOG") { log(value); return; }
    if (!metrics[key]) {
      metrics[key] = document.createElement("div");
      document.getElementById("metrics").appendChild(metrics[key]);
    }
    metrics[key].textContent = `${key} ${value}`;
  };
  ws.onclose = () => log("connection closed");
  document.getElementById("cmd").addEventListener("keydown", (e) => {
    if (e.key === "Enter" && e.target.value) { ws.send(e.target.value); e.target.value = ""; }
  });
</script>
</body>
</html>
"#;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    port: u16,
    asset: Option<PathBuf>,
    debug: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            port: value_of("--port")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            asset: value_of("--asset").map(PathBuf::from),
            debug: args.iter().any(|a| a == "--debug"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "dashwire=debug" } else { "dashwire=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Dashwire Dashboard ===\n");

    let state = Arc::new(SharedState::new());
    state.set_holo_result("IDLE");
    state.set_soul_state("AWAKE");
    state.set_net_online(true);
    state.set_process_count(4);

    let asset = match &args.asset {
        Some(path) => DashboardAsset::file(path),
        None => DashboardAsset::inline(PAGE),
    };

    // Replies produced on the blocking pool are broadcast from here.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();
    let commands = Arc::clone(&state);

    let dashboard = Dashboard::builder()
        .port(args.port)
        .asset(asset)
        .alias("/prime")
        .metrics_source(Arc::clone(&state))
        .on_command(move |command: &str| handle_command(&commands, &reply_tx, command))
        .start()
        .await?;
    let dashboard = Arc::new(dashboard);

    println!("[1] Dashboard ready");
    println!("    Page:      {}", dashboard.http_url());
    println!("    WebSocket: {}\n", dashboard.ws_url());

    let replies = {
        let dashboard = Arc::clone(&dashboard);
        tokio::spawn(async move {
            while let Some(line) = reply_rx.recv().await {
                dashboard.broadcast(&line).await;
            }
        })
    };
    let drift = tokio::spawn(drift(Arc::clone(&state)));

    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await.ok();

    drift.abort();
    replies.abort();
    dashboard.shutdown().await;
    println!("\n[2] Dashboard stopped");

    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn handle_command(
    state: &SharedState,
    replies: &mpsc::UnboundedSender<String>,
    command: &str,
) -> Result<()> {
    let command = command.trim();
    let (verb, rest) = command.split_once(' ').unwrap_or((command, ""));

    let reply = match verb.to_ascii_lowercase().as_str() {
        "help" => HELP.to_string(),
        "status" => format!(
            "STATUS: mode={} ticks={} generation={}",
            state.current_mode(),
            state.tick_count()?,
            state.generation()?
        ),
        "defense" => switch_mode(state, SystemMode::Defense),
        "dream" => switch_mode(state, SystemMode::Dreaming),
        "evolve" => {
            state.set_evolution_level(state.evolution_level()?.saturating_add(1));
            switch_mode(state, SystemMode::Evolving)
        }
        "neutral" => switch_mode(state, SystemMode::Neutral),
        "say" if !rest.is_empty() => format!("USER: {rest}"),
        _ => {
            return Err(Error::command(format!(
                "Unknown command: {command}. Type 'help'."
            )));
        }
    };

    replies
        .send(format!("LOG:{reply}"))
        .map_err(|_| Error::command("dashboard is shutting down"))
}

fn switch_mode(state: &SharedState, mode: SystemMode) -> String {
    state.set_mode(mode);
    format!("MODE: {mode}")
}

// ============================================================================
// Drift
// ============================================================================

/// Moves the shared state so the telemetry has something to show.
async fn drift(state: Arc<SharedState>) {
    let mut ticker = tokio::time::interval(DRIFT_PERIOD);
    let mut best = 0.0_f64;

    loop {
        ticker.tick().await;
        let tick = state.advance_tick();
        let phase = tick as f64 / 20.0;

        state.set_hyper_speed(0.5 + 0.4 * phase.sin());
        state.set_deformation(0.12 + 0.1 * (phase * 1.7).cos());
        state.set_data_mass(tick as f64 * 0.37);
        state.add_accumulator(if tick % 3 == 0 { -2 } else { 1 });
        state.set_peer_count(3 + (tick % 5) as u32);

        if state.current_mode() == SystemMode::Evolving {
            best = (best + 0.5).min(100.0);
            state.set_generation(state.generation().unwrap_or(0) + 1);
            state.set_best_score(best);
            state.set_entities_solved(state.entities_solved().unwrap_or(0).saturating_add(1));
            state.set_holo_result(format!("LATTICE-{}", tick % 97));
        }
    }
}
