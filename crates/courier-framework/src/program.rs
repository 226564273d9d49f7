//! Scripts backed by external programs.
//!
//! A program speaks one JSON document in and one JSON document out per
//! invocation:
//!
//! ```text
//! stdin:  {"action":"register"}
//! stdout: [{"type":"send","name":"weather","matcher":"(?i)weather in (\\w+)"}]
//!
//! stdin:  {"action":"receive","data":{"message":"weather in Paris",...,"sub_match":[["weather in Paris","Paris"]]}}
//! stdout: ["Sunny in Paris"]
//! ```
//!
//! Every call spawns the program anew.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use courier_core::{BoxError, Envelope, Script, ScriptKind, SubMatches};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{ProgramError, ProgramResult};
use crate::robot::Robot;

/// An executable and its arguments, as listed under `program_scripts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramScript {
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A script definition returned by a program on `register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDefinition {
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub example: String,
    pub matcher: String,
    #[serde(default)]
    pub trigger_on_mention: bool,
}

#[derive(Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
enum ProgramRequest<'a> {
    Register,
    Receive(ReceivePayload<'a>),
}

#[derive(Serialize)]
struct ReceivePayload<'a> {
    #[serde(flatten)]
    envelope: &'a Envelope,
    sub_match: &'a SubMatches,
}

/// Talks to one program.
#[derive(Debug, Clone)]
pub struct ProgramBridge {
    program: ProgramScript,
}

impl ProgramBridge {
    pub fn new(program: ProgramScript) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &ProgramScript {
        &self.program
    }

    /// Asks the program for its script definitions.
    pub async fn definitions(&self) -> ProgramResult<Vec<ProgramDefinition>> {
        self.call(&ProgramRequest::Register).await
    }

    /// Forwards a matched envelope to the program and returns its replies.
    pub async fn receive(
        &self,
        envelope: &Envelope,
        sub_match: &SubMatches,
    ) -> ProgramResult<Vec<String>> {
        self.call(&ProgramRequest::Receive(ReceivePayload {
            envelope,
            sub_match,
        }))
        .await
    }

    /// Builds one script per definition, each handled by this program.
    pub async fn scripts(self: &Arc<Self>) -> ProgramResult<Vec<Script>> {
        let mut scripts = Vec::new();
        for definition in self.definitions().await? {
            for (field, value) in [("name", &definition.name), ("matcher", &definition.matcher)] {
                if value.is_empty() {
                    return Err(ProgramError::Definition {
                        path: self.program.path.clone(),
                        name: definition.name.clone(),
                        reason: format!("{field} must not be empty"),
                    });
                }
            }

            let bridge = Arc::clone(self);
            let script = Script::new(definition.name, definition.matcher, definition.kind)
                .description(definition.description)
                .example(definition.example)
                .trigger_on_mention(definition.trigger_on_mention)
                .handler(move |envelope, sub_match| {
                    let bridge = bridge.clone();
                    async move {
                        bridge
                            .receive(&envelope, &sub_match)
                            .await
                            .map_err(|e| Box::new(e) as BoxError)
                    }
                });
            scripts.push(script);
        }
        Ok(scripts)
    }

    async fn call<Req, Resp>(&self, request: &Req) -> ProgramResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let path = &self.program.path;
        let input = serde_json::to_vec(request).map_err(|source| ProgramError::Output {
            path: path.clone(),
            source,
        })?;

        debug!(program = %path.display(), "Invoking program");
        let mut child = Command::new(path)
            .args(&self.program.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProgramError::Spawn {
                path: path.clone(),
                source,
            })?;

        let io_error = |source| ProgramError::Io {
            path: path.clone(),
            source,
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await.map_err(io_error)?;
            stdin.shutdown().await.map_err(io_error)?;
        }
        let output = child.wait_with_output().await.map_err(io_error)?;

        if !output.status.success() {
            return Err(ProgramError::Exit {
                path: path.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        serde_json::from_slice(&output.stdout).map_err(|source| ProgramError::Output {
            path: path.clone(),
            source,
        })
    }
}

impl Robot {
    /// Registers the scripts of every program. A program that fails is
    /// logged and skipped. Returns the number of scripts registered.
    pub async fn register_programs(&self, programs: &[ProgramScript]) -> usize {
        let mut registered = 0;
        for program in programs {
            let bridge = Arc::new(ProgramBridge::new(program.clone()));
            let scripts = match bridge.scripts().await {
                Ok(scripts) => scripts,
                Err(e) => {
                    error!(
                        program = %program.path.display(),
                        error = %e,
                        "Failed to load program scripts"
                    );
                    continue;
                }
            };
            for script in scripts {
                let name = script.name.clone();
                match self.register_script(script) {
                    Ok(()) => registered += 1,
                    Err(e) => error!(
                        program = %program.path.display(),
                        script = %name,
                        error = %e,
                        "Failed to register program script"
                    ),
                }
            }
            info!(program = %program.path.display(), "Program scripts loaded");
        }
        registered
    }
}

#[cfg(all(test, unix))]
mod tests {
    use courier_core::UserIdentity;

    use super::*;

    fn sh(script: &str) -> ProgramScript {
        ProgramScript {
            path: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    const ECHO_PROGRAM: &str = r#"
        input=$(cat)
        case "$input" in
            *'"action":"register"'*)
                printf '%s\n' '[{"type":"send","name":"echo","matcher":"(?i)echo (\\w+)","example":"echo hi"}]' ;;
            *'"sub_match":[["echo hi","hi"]]'*)
                printf '%s\n' '["heard you"]' ;;
            *) exit 3 ;;
        esac
    "#;

    #[test]
    fn test_request_encoding() {
        let register = serde_json::to_value(ProgramRequest::Register).unwrap();
        assert_eq!(register, serde_json::json!({"action": "register"}));

        let envelope = Envelope::new("echo hi").with_user(UserIdentity::named("ann"));
        let subs = vec![vec!["echo hi".to_string(), "hi".to_string()]];
        let receive = serde_json::to_value(ProgramRequest::Receive(ReceivePayload {
            envelope: &envelope,
            sub_match: &subs,
        }))
        .unwrap();
        assert_eq!(receive["action"], "receive");
        assert_eq!(receive["data"]["message"], "echo hi");
        assert_eq!(receive["data"]["user"]["name"], "ann");
        assert_eq!(receive["data"]["sub_match"][0][1], "hi");
    }

    #[tokio::test]
    async fn test_definitions_and_receive() {
        let bridge = Arc::new(ProgramBridge::new(sh(ECHO_PROGRAM)));
        let definitions = bridge.definitions().await.unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].kind, ScriptKind::Send);
        assert_eq!(definitions[0].example, "echo hi");

        let envelope = Envelope::new("echo hi").with_user(UserIdentity::named("ann"));
        let subs = vec![vec!["echo hi".to_string(), "hi".to_string()]];
        assert_eq!(bridge.receive(&envelope, &subs).await.unwrap(), ["heard you"]);
    }

    #[tokio::test]
    async fn test_program_scripts_dispatch() {
        let robot = Robot::new("bot");
        assert_eq!(robot.register_programs(&[sh(ECHO_PROGRAM)]).await, 1);

        let envelope = Envelope::new("echo hi").with_user(UserIdentity::named("ann"));
        assert_eq!(robot.dispatch(&envelope, ScriptKind::Send).await, ["heard you"]);
    }

    #[tokio::test]
    async fn test_failures() {
        let bridge = ProgramBridge::new(sh("cat > /dev/null; echo oops >&2; exit 2"));
        assert!(matches!(
            bridge.definitions().await,
            Err(ProgramError::Exit { ref stderr, .. }) if stderr == "oops"
        ));

        let bridge = ProgramBridge::new(sh("cat > /dev/null; echo 'not json'"));
        assert!(matches!(bridge.definitions().await, Err(ProgramError::Output { .. })));

        let bridge = ProgramBridge::new(ProgramScript {
            path: "/nonexistent/courier-program".into(),
            args: Vec::new(),
        });
        assert!(matches!(bridge.definitions().await, Err(ProgramError::Spawn { .. })));

        let robot = Robot::new("bot");
        let programs = [sh("cat > /dev/null; exit 1"), sh(ECHO_PROGRAM)];
        assert_eq!(robot.register_programs(&programs).await, 1);
    }

    #[tokio::test]
    async fn test_empty_definition_rejected() {
        let bridge = Arc::new(ProgramBridge::new(sh(
            r#"cat > /dev/null; printf '%s\n' '[{"type":"send","name":"","matcher":"x"}]'"#,
        )));
        assert!(matches!(
            bridge.scripts().await,
            Err(ProgramError::Definition { .. })
        ));
    }
}
