//! The built-in `help` script.

use std::sync::{Arc, Weak};

use courier_core::{RegistryResult, Script, ScriptKind};

use crate::robot::Robot;

const FOOTNOTE: &str = "`*`: Script will be only triggered when talking explicitly to the bot.";

impl Robot {
    /// Registers the `help` script listing every registered script.
    pub fn register_help(self: &Arc<Self>) -> RegistryResult<()> {
        let robot: Weak<Robot> = Arc::downgrade(self);
        let script = Script::new("help", "(?i)^help$", ScriptKind::Send)
            .description("Provide the list of available scripts")
            .trigger_on_mention(true)
            .handler(move |_, _| {
                let robot = robot.upgrade();
                async move { Ok(robot.map(|r| vec![r.help_text()]).unwrap_or_default()) }
            });
        self.register_script(script)
    }

    /// Renders the help listing.
    pub fn help_text(&self) -> String {
        let mut text = format!("Available scripts for {}:\n", self.name());
        for script in self.scripts.snapshot() {
            text.push_str(&format!("- {}", capitalize(&script.name)));
            if script.trigger_on_mention {
                text.push('*');
            }
            if script.example.is_empty() {
                text.push_str(&format!(" -- regex: `{}`", script.matcher));
            } else {
                text.push_str(&format!(" -- e.g.: `{}`", script.example));
            }
            if !script.description.is_empty() {
                text.push_str(&format!(" -- {}", capitalize(&script.description)));
            }
            text.push('\n');
        }
        text.push_str(FOOTNOTE);
        text
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
