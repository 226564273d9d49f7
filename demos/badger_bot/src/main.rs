//! Badger Bot
//!
//! A small robot showing the Courier kernel end to end: pattern scripts,
//! a slash command, lifecycle subscriptions and the terminal adapter.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package badger-bot -- --config courier.toml
//! ```
//!
//! Then type into the terminal:
//!
//! ```text
//! I like badgers           → Send> Badgers? BADGERS? ...
//! courier open the pod bay doors
//! lulz                     → one of lol / rofl / lmao
//! /ping                    → Send> pong
//! /enter                   → a greeting
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use courier::prelude::*;
use parking_lot::Mutex;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "badger-bot", about = "A demonstration Courier robot")]
struct Args {
    /// Configuration file; searched in the usual places when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `dev` loads `courier.dev.toml` first.
    #[arg(short, long)]
    profile: Option<String>,

    /// Answer given to the ultimate question.
    #[arg(long, env = "BADGER_ANSWER")]
    answer: Option<String>,
}

// ============================================================================
// Scripts
// ============================================================================

fn badger() -> Script {
    Script::new("badger", "(?i)badger", ScriptKind::Send).handler(|_, _| async {
        Ok(vec![
            "Badgers? BADGERS? WE DON'T NEED NO STINKIN BADGERS".to_string(),
        ])
    })
}

fn doors() -> Script {
    Script::new("doors", "(?i)open the (.*) doors", ScriptKind::Respond)
        .example("open the pod bay doors")
        .trigger_on_mention(true)
        .handler(|_, subs: SubMatches| async move {
            let door = subs
                .first()
                .and_then(|m| m.get(1))
                .cloned()
                .unwrap_or_default();
            if door == "pod bay" {
                return Ok(vec!["I'm afraid I can't let you do that.".to_string()]);
            }
            Ok(vec![format!("Opening {door} doors")])
        })
}

fn lulz() -> Script {
    Script::new("lulz", "(?i)lulz", ScriptKind::Send)
        .handler(|_, _| async { Ok(vec!["lol".into(), "rofl".into(), "lmao".into()]) })
}

fn ultimate_question(answer: Option<String>) -> Script {
    Script::new(
        "Ultimate question",
        "(?i)what is the answer to the ultimate question of life",
        ScriptKind::Send,
    )
    .description("Answer to the ultimate question")
    .handler(move |_, _| {
        let reply = match &answer {
            Some(answer) => format!("{answer}, but what is the question?"),
            None => "Missing answer: set BADGER_ANSWER and try again".to_string(),
        };
        async move { Ok(vec![reply]) }
    })
}

/// `annoy me` / `unannoy me`: repeats a message every two seconds per channel.
fn annoy_scripts(robot: &Arc<Robot>) -> [Script; 2] {
    let annoyed: Arc<Mutex<HashSet<String>>> = Arc::default();

    let start = {
        let annoyed = annoyed.clone();
        let robot = Arc::downgrade(robot);
        Script::new("annoy", "(?i)^annoy me", ScriptKind::Send)
            .example("annoy me")
            .handler(move |envelope: Envelope, _| {
                let key = format!("{}{}", envelope.channel_name, envelope.channel_id);
                if annoyed.lock().insert(key.clone()) {
                    let annoyed = annoyed.clone();
                    let robot = robot.clone();
                    tokio::spawn(async move {
                        let noise = ["AAAAAAAAAAAEEEEEEEEEEEEEEEEEEEEEEEEIIIIIIIIHHHHHHHHHH".to_string()];
                        while annoyed.lock().contains(&key) {
                            let Some(robot) = robot.upgrade() else { break };
                            robot.send_messages(&envelope, &noise).await;
                            drop(robot);
                            tokio::time::sleep(Duration::from_secs(2)).await;
                        }
                    });
                }
                async { Ok(vec!["Hey, want to hear the most annoying sound in the world?".to_string()]) }
            })
    };

    let stop = Script::new("unannoy", "(?i)^unannoy me", ScriptKind::Send)
        .example("unannoy me")
        .handler(move |envelope: Envelope, _| {
            let key = format!("{}{}", envelope.channel_name, envelope.channel_id);
            let reply = if annoyed.lock().remove(&key) {
                "GUYS, GUYS, GUYS!"
            } else {
                "Not annoying you right now, am I?"
            };
            async move { Ok(vec![reply.to_string()]) }
        });

    [start, stop]
}

fn ping() -> SlashCommand {
    SlashCommand::new("Ping", "ping")
        .description("Checks the robot is alive")
        .handler(|_| async { Ok("pong".to_string()) })
}

// ============================================================================
// Lifecycle Listeners
// ============================================================================

/// Answers `name` events with a random pick from `replies`.
fn greet_on(robot: &Arc<Robot>, name: EventName, replies: &[&str]) {
    let mut subscription = robot.on(name);
    let robot = Arc::downgrade(robot);
    let replies: Vec<String> = replies.iter().map(|s| s.to_string()).collect();

    tokio::spawn(async move {
        while let Some(delivery) = subscription.recv().await {
            let event = delivery.into_event();
            let Some(robot) = robot.upgrade() else { break };
            if let Err(e) = robot.respond_messages(&event.envelope, &replies).await {
                error!(event = %name, error = %e, "Failed to greet");
            }
        }
    });
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = CourierRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;
    let robot = runtime.robot().clone();

    robot.use_middleware(AuthorizeMiddleware::new(runtime.config().authorize.clone()));

    robot.register_scripts([badger(), doors(), lulz(), ultimate_question(args.answer)])?;
    robot.register_scripts(annoy_scripts(&robot))?;
    robot.register_command(ping())?;

    greet_on(
        &robot,
        EventName::ChannelEnter,
        &["Hi", "Target Acquired", "Firing", "Hello friend.", "Gotcha", "I see you"],
    );
    greet_on(
        &robot,
        EventName::ChannelLeave,
        &["Are you still there?", "Target lost", "Searching"],
    );
    greet_on(&robot, EventName::UserOnline, &["Hello again", "It's been a while"]);

    runtime.register_adapter::<ShellAdapter>()?;

    info!(name = %robot.name(), "Badger bot ready");
    runtime.run().await?;
    Ok(())
}
