//! Access control for scripts and slash commands.
//!
//! ```toml
//! [[authorize.access_control]]
//! name = "deploy"
//! groups = ["ops"]
//! channels = ["C042"]
//!
//! [[authorize.groups]]
//! name = "ops"
//! users = ["ann", "U123"]
//! ```
//!
//! Entries no rule names are left untouched.

use std::sync::Arc;

use courier_core::{
    CommandHandler, Envelope, Script, ScriptHandler, SlashCommand, command_handler,
    script_handler,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::middleware::Middleware;

/// Access rules, usually read from the `authorize` config table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizeConfig {
    pub access_control: Vec<AccessControl>,
    pub groups: Vec<Group>,
}

/// Who may run the script or command called `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessControl {
    pub name: String,
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub channels: Vec<String>,
}

/// A named set of users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub name: String,
    pub users: Vec<String>,
}

impl AuthorizeConfig {
    pub fn rule(&self, name: &str) -> Option<&AccessControl> {
        self.access_control.iter().find(|ac| ac.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Returns whether `envelope` may run the entry called `name`.
    pub fn allows(&self, name: &str, envelope: &Envelope) -> bool {
        self.rule(name)
            .is_none_or(|rule| rule.grants(envelope, |group| self.group(group)))
    }
}

impl AccessControl {
    fn grants<'a>(&self, envelope: &Envelope, group: impl Fn(&str) -> Option<&'a Group>) -> bool {
        let user = &envelope.user;
        let is_user = |u: &String| !u.is_empty() && (*u == user.name || *u == user.id);

        self.channels
            .iter()
            .any(|c| !c.is_empty() && (*c == envelope.channel_name || *c == envelope.channel_id))
            || self.users.iter().any(is_user)
            || self
                .groups
                .iter()
                .filter_map(|name| group(name.as_str()))
                .any(|g| g.users.iter().any(is_user))
    }
}

/// Middleware dropping calls the [`AuthorizeConfig`] does not allow.
///
/// Denied scripts reply nothing, denied commands reply an empty string.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeMiddleware {
    config: Arc<AuthorizeConfig>,
}

impl AuthorizeMiddleware {
    pub fn new(config: AuthorizeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AuthorizeConfig {
        &self.config
    }
}

impl Middleware<Script, ScriptHandler> for AuthorizeMiddleware {
    fn wrap(&self, script: &Script, next: ScriptHandler) -> ScriptHandler {
        if self.config.rule(&script.name).is_none() {
            return next;
        }
        let config = self.config.clone();
        let name = script.name.clone();
        script_handler(move |envelope, subs| {
            let next = next.clone();
            let allowed = config.allows(&name, &envelope);
            if !allowed {
                debug!(script = %name, user = %envelope.user.name, "Script call denied");
            }
            async move {
                if allowed {
                    next(envelope, subs).await
                } else {
                    Ok(Vec::new())
                }
            }
        })
    }
}

impl Middleware<SlashCommand, CommandHandler> for AuthorizeMiddleware {
    fn wrap(&self, command: &SlashCommand, next: CommandHandler) -> CommandHandler {
        if self.config.rule(&command.trigger).is_none() {
            return next;
        }
        let config = self.config.clone();
        let trigger = command.trigger.clone();
        command_handler(move |envelope| {
            let next = next.clone();
            let allowed = config.allows(&trigger, &envelope);
            if !allowed {
                debug!(command = %trigger, user = %envelope.user.name, "Command call denied");
            }
            async move {
                if allowed {
                    next(envelope).await
                } else {
                    Ok(String::new())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use courier_core::{ScriptKind, UserIdentity};

    use super::*;
    use crate::robot::Robot;

    fn config() -> AuthorizeConfig {
        AuthorizeConfig {
            access_control: vec![
                AccessControl {
                    name: "deploy".into(),
                    users: vec!["root".into()],
                    groups: vec!["ops".into(), "ghost".into()],
                    channels: vec!["C042".into()],
                },
                AccessControl {
                    name: "ping".into(),
                    users: vec!["U1".into()],
                    ..Default::default()
                },
            ],
            groups: vec![Group {
                name: "ops".into(),
                users: vec!["ann".into()],
            }],
        }
    }

    fn from(user: &str) -> Envelope {
        Envelope::new("deploy").with_user(UserIdentity::named(user))
    }

    #[test]
    fn test_allows() {
        let config = config();
        assert!(config.allows("unrestricted", &from("anyone")));
        assert!(config.allows("deploy", &from("root")));
        assert!(config.allows("deploy", &from("ann")));
        assert!(!config.allows("deploy", &from("bob")));

        let mut in_channel = from("bob");
        in_channel.channel_id = "C042".into();
        assert!(config.allows("deploy", &in_channel));

        let by_id = Envelope::default().with_user(UserIdentity::named("x").with_id("U1"));
        assert!(config.allows("ping", &by_id));
    }

    #[test]
    fn test_anonymous_user_never_matches_empty_entries() {
        let config = AuthorizeConfig {
            access_control: vec![AccessControl {
                name: "deploy".into(),
                users: vec![String::new()],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(!config.allows("deploy", &Envelope::new("deploy")));
    }

    #[tokio::test]
    async fn test_denied_script_replies_nothing() {
        let robot = Robot::new("bot");
        robot.use_middleware(AuthorizeMiddleware::new(config()));
        robot
            .register_script(
                Script::new("deploy", "deploy", ScriptKind::Send)
                    .handler(|_, _| async { Ok(vec!["deployed".to_string()]) }),
            )
            .unwrap();

        assert!(robot.dispatch(&from("bob"), ScriptKind::Send).await.is_empty());
        assert_eq!(
            robot.dispatch(&from("ann"), ScriptKind::Send).await,
            ["deployed"]
        );
    }

    #[tokio::test]
    async fn test_denied_command_replies_empty() {
        let middleware = AuthorizeMiddleware::new(config());
        let command = SlashCommand::new("ping", "ping");
        let base = command_handler(|_| async { Ok("pong".to_string()) });
        let handler =
            <AuthorizeMiddleware as Middleware<SlashCommand, CommandHandler>>::wrap(
                &middleware,
                &command,
                base,
            );

        assert_eq!(handler(from("bob")).await.unwrap(), "");
        let allowed = Envelope::default().with_user(UserIdentity::named("x").with_id("U1"));
        assert_eq!(handler(allowed).await.unwrap(), "pong");
    }
}
