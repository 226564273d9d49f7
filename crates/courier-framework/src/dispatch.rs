//! Inbound dispatch: pattern scripts and slash commands.
//!
//! # Script Dispatch
//!
//! For every script of the requested [`ScriptKind`], in registration order:
//!
//! 1. Skip it if it is mention-gated and the envelope is not mentioned
//! 2. Sanitize the message with the script's sanitizer
//! 3. Test the matcher; on a match extract every submatch
//! 4. Invoke the middleware-wrapped handler and collect its replies
//!
//! A failing handler is logged and contributes nothing; the remaining
//! scripts still run.

use courier_core::{Envelope, EventName, LifecycleEvent, ScriptKind, SlashCommandToken};
use serde_json::Value;
use tracing::{Instrument, debug, debug_span, error, trace};

use crate::error::{DispatchError, DispatchResult};
use crate::robot::Robot;

impl Robot {
    /// Runs every matching script of `kind` and aggregates their replies.
    pub async fn dispatch(&self, envelope: &Envelope, kind: ScriptKind) -> Vec<String> {
        let scripts = self.scripts.list_by_kind(kind);
        let mut outputs = Vec::new();

        for script in scripts {
            if script.trigger_on_mention && envelope.not_mentioned {
                trace!(script = %script.name, "Skipped, robot not mentioned");
                continue;
            }
            let (Some(pattern), Some(handler)) = (script.get_pattern(), script.get_handler())
            else {
                continue;
            };

            let text = script
                .get_sanitizer()
                .cloned()
                .unwrap_or_default()
                .apply(&envelope.message);
            if !pattern.is_match(&text) {
                continue;
            }

            debug!(script = %script.name, kind = %kind, "Script matched");
            let sub_matches = pattern.sub_matches(&text);
            let handler = self.script_chain.apply(&script, handler.clone());
            match handler(envelope.clone(), sub_matches).await {
                Ok(messages) => outputs.extend(messages),
                Err(e) => error!(script = %script.name, error = %e, "Script handler failed"),
            }
        }

        outputs
    }

    /// Handles one inbound message: publishes `received`, records the user,
    /// dispatches every output type and fans the replies out.
    pub async fn receive(&self, envelope: Envelope) {
        let span = debug_span!(
            "receive",
            channel = %envelope.channel_name,
            user = %envelope.user.name
        );
        async move {
            self.emit(LifecycleEvent::new(EventName::Received, envelope.clone()))
                .await;
            self.users.register(&envelope.user);

            let to_send = self.dispatch(&envelope, ScriptKind::Send).await;
            let to_respond = self.dispatch(&envelope, ScriptKind::Respond).await;
            let to_direct = self.dispatch(&envelope, ScriptKind::Direct).await;

            if to_send.is_empty() && to_respond.is_empty() && to_direct.is_empty() {
                debug!("No script matched");
                self.emit(LifecycleEvent::new(EventName::NoScriptFound, envelope.clone()))
                    .await;
            }

            self.send_messages(&envelope, &to_send).await;
            if let Err(e) = self.respond_messages(&envelope, &to_respond).await {
                error!(error = %e, "Failed to respond");
            }
            self.send_direct_messages(&envelope, &to_direct).await;
        }
        .instrument(span)
        .await
    }

    /// Runs the slash command `token` resolves to.
    ///
    /// Returns `Ok(None)` when the command produced no reply, otherwise the
    /// reply formatted by the originating adapter.
    pub async fn dispatch_command(
        &self,
        token: &SlashCommandToken,
        envelope: Envelope,
    ) -> DispatchResult<Option<Value>> {
        let adapter = self
            .find_adapter(&token.adapter_name)
            .filter(|a| a.as_slash_commands().is_some())
            .ok_or_else(|| DispatchError::AdapterNotFound {
                command: token.command_name.clone(),
            })?;
        let not_found = || DispatchError::CommandNotFound {
            command: token.command_name.clone(),
        };
        let command = self
            .commands
            .find_by_trigger(&token.command_name)
            .ok_or_else(not_found)?;
        let handler = command.get_handler().cloned().ok_or_else(not_found)?;

        debug!(command = %command.trigger, adapter = %adapter.name(), "Dispatching slash command");
        let handler = self.command_chain.apply(&command, handler);
        let result = handler(envelope)
            .await
            .map_err(|source| DispatchError::Handler {
                command: command.trigger.clone(),
                source,
            })?;

        if result.is_empty() {
            return Ok(None);
        }
        let support = adapter.as_slash_commands().ok_or_else(|| {
            DispatchError::AdapterNotFound {
                command: token.command_name.clone(),
            }
        })?;
        Ok(Some(support.format(&result)?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use courier_core::{BoxError, Script, SlashCommand, UserIdentity};
    use serde_json::json;

    use super::*;
    use crate::testing::RecordingAdapter;

    fn reply(name: &str, matcher: &str, kind: ScriptKind, out: &'static str) -> Script {
        Script::new(name, matcher, kind).handler(move |_, _| async move { Ok(vec![out.to_string()]) })
    }

    #[tokio::test]
    async fn test_dispatch_aggregates_matches_in_order() {
        let robot = Robot::new("bot");
        robot
            .register_scripts([
                reply("one", "hello", ScriptKind::Send, "first"),
                reply("two", "(?i)HELLO", ScriptKind::Send, "second"),
                reply("three", "bye", ScriptKind::Send, "nope"),
                reply("four", "hello", ScriptKind::Respond, "other type"),
            ])
            .unwrap();

        let out = robot.dispatch(&Envelope::new("hello world"), ScriptKind::Send).await;
        assert_eq!(out, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_mention_gating() {
        let robot = Robot::new("bot");
        robot
            .register_script(
                reply("doors", "(?i)open", ScriptKind::Send, "opening").trigger_on_mention(true),
            )
            .unwrap();

        let ignored = Envelope::new("open the doors").mentioned(false);
        assert!(robot.dispatch(&ignored, ScriptKind::Send).await.is_empty());

        let addressed = Envelope::new("open the doors").mentioned(true);
        assert_eq!(robot.dispatch(&addressed, ScriptKind::Send).await, ["opening"]);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_abort_dispatch() {
        let robot = Robot::new("bot");
        robot
            .register_script(
                Script::new("broken", "x", ScriptKind::Send)
                    .handler(|_, _| async { Err::<Vec<String>, BoxError>("boom".into()) }),
            )
            .unwrap();
        robot
            .register_script(reply("fine", "x", ScriptKind::Send, "ok"))
            .unwrap();

        assert_eq!(robot.dispatch(&Envelope::new("x"), ScriptKind::Send).await, ["ok"]);
    }

    #[tokio::test]
    async fn test_handler_sees_sanitized_sub_matches() {
        let robot = Robot::new("bot");
        robot
            .register_script(
                Script::new("echo", r"say (\w+ \w+)", ScriptKind::Send).handler(|_, subs| async move {
                    Ok(vec![subs[0][1].clone()])
                }),
            )
            .unwrap();

        let out = robot
            .dispatch(&Envelope::new("say   hello\tthere"), ScriptKind::Send)
            .await;
        assert_eq!(out, ["hello there"]);
    }

    #[tokio::test]
    async fn test_receive_fans_out_badger() {
        let robot = Robot::new("bot");
        let adapter = Arc::new(RecordingAdapter::new("recording"));
        robot.register_adapter(adapter.clone());
        robot
            .register_script(reply("badger", "(?i)badger", ScriptKind::Send, "BADGERS!"))
            .unwrap();

        robot.receive(Envelope::new("I love badgers")).await;

        assert_eq!(adapter.sent(), [("send".to_string(), "BADGERS!".to_string())]);
    }

    #[tokio::test]
    async fn test_receive_emits_no_script_found() {
        let robot = Arc::new(Robot::new("bot"));
        let mut received = robot.on(EventName::Received);
        let mut missing = robot.on(EventName::NoScriptFound);

        let task = {
            let robot = robot.clone();
            tokio::spawn(async move {
                robot
                    .receive(Envelope::new("nothing").with_user(UserIdentity::named("ann")))
                    .await
            })
        };

        assert_eq!(received.recv().await.unwrap().envelope.message, "nothing");
        assert_eq!(missing.recv().await.unwrap().name, EventName::NoScriptFound);
        task.await.unwrap();
        assert!(robot.users().get("ann").is_some());
    }

    #[tokio::test]
    async fn test_dispatch_command_ping() {
        let robot = Robot::new("bot");
        robot.register_adapter(Arc::new(RecordingAdapter::new("recording")));
        robot
            .register_command(
                SlashCommand::new("ping", "ping").handler(|_| async { Ok("pong".to_string()) }),
            )
            .unwrap();

        let token = SlashCommandToken::new("tok", "recording", "ping");
        let value = robot
            .dispatch_command(&token, Envelope::default())
            .await
            .unwrap();
        assert_eq!(value, Some(json!("pong")));
    }

    #[tokio::test]
    async fn test_dispatch_command_empty_result_is_none() {
        let robot = Robot::new("bot");
        robot.register_adapter(Arc::new(RecordingAdapter::new("recording")));
        robot
            .register_command(SlashCommand::new("quiet", "quiet").handler(|_| async { Ok(String::new()) }))
            .unwrap();

        let token = SlashCommandToken::new("tok", "recording", "quiet");
        assert_eq!(robot.dispatch_command(&token, Envelope::default()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dispatch_command_not_found() {
        let robot = Robot::new("bot");
        robot.register_adapter(Arc::new(RecordingAdapter::new("recording")));

        let unknown_adapter = SlashCommandToken::new("t", "nowhere", "ping");
        assert!(matches!(
            robot.dispatch_command(&unknown_adapter, Envelope::default()).await,
            Err(DispatchError::AdapterNotFound { .. })
        ));

        let unknown_command = SlashCommandToken::new("t", "recording", "ping");
        assert!(matches!(
            robot.dispatch_command(&unknown_command, Envelope::default()).await,
            Err(DispatchError::CommandNotFound { .. })
        ));
    }
}
