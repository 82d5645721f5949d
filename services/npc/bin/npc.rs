//! Headless NPC runner.
//!
//! Loads configuration and a scene, spawns the NPC's remote dialogue identity,
//! then runs a fixed-rate simulation loop fed by console input until `/quit`
//! or Ctrl+C.

use anyhow::Context;
use clap::Parser;
use npc_core::{
    Agent, FunctionRegistry, Npc, RegistryConfig, dialogue_client::HttpDialogueClient,
};
use npc_service::{
    config::Config,
    console::ConsoleInput,
    presentation::{LogAnimator, TranscriptPrinter},
    scene::SceneFile,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Run a conversational NPC in a headless scene")]
struct Args {
    /// Scene file to load (overrides NPC_SCENE_PATH).
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Skip spawning the remote identity; commands still work locally.
    #[arg(long)]
    offline: bool,

    /// Simulation rate in ticks per second (overrides NPC_TICK_HZ).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    tick_hz: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    // --- 3. Build the Scene ---
    let scene = match args.scene.as_ref().or(config.scene_path.as_ref()) {
        Some(path) => SceneFile::load(path)?,
        None => {
            info!("No scene file given. Using the demo scene.");
            SceneFile::demo()
        }
    };
    let scene = scene.build()?;

    // --- 4. Wire the NPC ---
    let registry = FunctionRegistry::new(RegistryConfig {
        base_url: config.base_url,
        game_id: config.game_id,
        tts: config.tts,
    });
    let client = Arc::new(HttpDialogueClient::new(registry.base_url()));
    let name = config.persona.short_name.clone();
    let agent = Agent::new(
        name.clone(),
        scene.navigator,
        LogAnimator::new(name.clone()),
        scene.world,
        scene.settings,
    );
    let mut npc = Npc::new(
        agent,
        config.persona.clone(),
        client,
        registry.clone(),
        config.max_chat_entries,
    );

    if args.offline {
        warn!("Offline mode. Chat will not reach the dialogue service.");
    } else {
        // The spawn result is applied by the first tick after it lands.
        let _ = npc.start();
    }

    // --- 5. Run the Simulation Loop ---
    let tick_hz = args.tick_hz.unwrap_or(config.tick_hz);
    let dt = 1.0 / tick_hz as f32;
    let mut interval = tokio::time::interval(Duration::from_secs_f32(dt));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printer = TranscriptPrinter::default();
    let mut last_intent = npc.agent().intent().clone();

    info!(
        npc = %name,
        game_id = %registry.game_id(),
        base_url = %registry.base_url(),
        tick_hz,
        "NPC ready. Type to chat, /call <fn> [json], /reply <text>, /quit."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                npc.tick(dt);
                for line in printer.fresh_lines(npc.session().transcript()) {
                    println!("{}", line);
                }
                if npc.agent().intent() != &last_intent {
                    last_intent = npc.agent().intent().clone();
                    info!(npc = %name, intent = %last_intent, "Intent changed");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    info!("Input closed. Shutting down...");
                    break;
                };
                match ConsoleInput::parse(&line) {
                    Ok(ConsoleInput::Empty) => {}
                    Ok(ConsoleInput::Chat(text)) => {
                        npc.submit(&text);
                    }
                    Ok(ConsoleInput::Call(call)) => {
                        let delivered = registry.broadcast(call);
                        if delivered == 0 {
                            warn!("No registered agent handles that function");
                        }
                    }
                    Ok(ConsoleInput::Reply(text)) => {
                        let key = npc.session().session_id().unwrap_or(&name).to_string();
                        if let Err(e) = registry.deliver_reply(&key, text) {
                            error!(error = %e, "Failed to deliver reply");
                        }
                    }
                    Ok(ConsoleInput::Quit) => {
                        info!("Quit requested. Shutting down...");
                        break;
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal. Shutting down gracefully...");
                break;
            }
        }
    }

    Ok(())
}
