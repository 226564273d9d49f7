//! Scripts whose handler lives behind an HTTP endpoint.
//!
//! The robot POSTs the envelope (flattened) plus `sub_match` to the script's
//! URL and expects `200` with a JSON array of strings back.

use std::collections::HashSet;
use std::time::Duration;

use courier_core::{BoxError, Envelope, Script, ScriptKind, SubMatches, script_handler};
use courier_framework::Robot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

/// A remote script definition as accepted by `/api/remote/scripts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteScript {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    pub matcher: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub trigger_on_mention: bool,
}

impl RemoteScript {
    fn validate(&self) -> Result<(), RemoteError> {
        if self.name.is_empty() {
            return Err(RemoteError::Invalid(String::from("name must not be empty")));
        }
        if self.url.is_empty() {
            return Err(RemoteError::Invalid(format!(
                "remote script '{}' has no url",
                self.name
            )));
        }
        if self.kind == ScriptKind::Direct {
            return Err(RemoteError::Invalid(format!(
                "remote script '{}' must be of type send or respond",
                self.name
            )));
        }
        Ok(())
    }

    fn key(&self) -> (String, String, ScriptKind) {
        (self.name.clone(), self.matcher.clone(), self.kind)
    }

    /// Builds the kernel script whose handler calls `self.url`.
    pub fn to_script(&self, client: &reqwest::Client) -> Script {
        let client = client.clone();
        let url = self.url.clone();
        Script::new(&self.name, &self.matcher, self.kind)
            .description(&self.description)
            .example(&self.example)
            .trigger_on_mention(self.trigger_on_mention)
            .with_handler(script_handler(move |envelope, sub_match| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    call_remote(&client, &url, &envelope, &sub_match)
                        .await
                        .map_err(|e| Box::new(e) as BoxError)
                }
            }))
    }
}

/// Failures of a remote script call.
#[derive(Debug, Error)]
pub enum RemoteCallError {
    #[error("request to remote script failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote script answered with status {0}")]
    Status(u16),
}

/// Failures of a remote script registry operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{0}")]
    Invalid(String),

    #[error("{} remote script(s) already exist", .0.len())]
    Conflict(Vec<RemoteScript>),

    #[error("unknown remote script(s): {}", .0.join(", "))]
    NotFound(Vec<String>),
}

#[derive(Serialize)]
struct RemotePayload<'a> {
    #[serde(flatten)]
    envelope: &'a Envelope,
    sub_match: &'a SubMatches,
}

async fn call_remote(
    client: &reqwest::Client,
    url: &str,
    envelope: &Envelope,
    sub_match: &SubMatches,
) -> Result<Vec<String>, RemoteCallError> {
    debug!(url = %url, "Calling remote script");
    let response = client
        .post(url)
        .json(&RemotePayload { envelope, sub_match })
        .send()
        .await?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(RemoteCallError::Status(status.as_u16()));
    }
    Ok(response.json().await?)
}

/// Builds the client used by remote script handlers.
pub fn build_client(skip_insecure: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(skip_insecure)
        .timeout(Duration::from_secs(30))
        .build()
}

/// In-memory set of remote scripts, mirrored into the robot's registry.
pub struct RemoteScripts {
    client: reqwest::Client,
    scripts: Mutex<Vec<RemoteScript>>,
}

impl RemoteScripts {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            scripts: Mutex::new(Vec::new()),
        }
    }

    pub fn list(&self) -> Vec<RemoteScript> {
        self.scripts.lock().clone()
    }

    /// Registers every definition or none of them.
    pub fn register(&self, robot: &Robot, batch: Vec<RemoteScript>) -> Result<(), RemoteError> {
        batch.iter().try_for_each(RemoteScript::validate)?;

        let mut scripts = self.scripts.lock();
        let mut seen = HashSet::new();
        let conflicts: Vec<RemoteScript> = batch
            .iter()
            .filter(|s| {
                !seen.insert(s.name.as_str())
                    || scripts.iter().any(|e| e.name == s.name)
                    || robot.scripts().find(|e| e.name == s.name).is_some()
            })
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(RemoteError::Conflict(conflicts));
        }

        for (index, remote) in batch.iter().enumerate() {
            if let Err(e) = robot.register_script(remote.to_script(&self.client)) {
                for done in &batch[..index] {
                    robot.scripts().unregister(&done.key());
                }
                return Err(RemoteError::Invalid(e.to_string()));
            }
        }

        for remote in &batch {
            info!(name = %remote.name, url = %remote.url, "Registered remote script");
        }
        scripts.extend(batch);
        Ok(())
    }

    /// Replaces existing definitions, matched by name.
    pub fn update(&self, robot: &Robot, batch: Vec<RemoteScript>) -> Result<(), RemoteError> {
        batch.iter().try_for_each(RemoteScript::validate)?;

        let mut scripts = self.scripts.lock();
        let unknown: Vec<String> = batch
            .iter()
            .filter(|s| !scripts.iter().any(|e| e.name == s.name))
            .map(|s| s.name.clone())
            .collect();
        if !unknown.is_empty() {
            return Err(RemoteError::NotFound(unknown));
        }

        let mut applied: Vec<(RemoteScript, RemoteScript)> = Vec::new();
        for remote in &batch {
            let Some(old) = scripts.iter().find(|e| e.name == remote.name).cloned() else {
                continue;
            };
            robot.scripts().unregister(&old.key());
            if let Err(e) = robot.register_script(remote.to_script(&self.client)) {
                // Restore the registry as it was before this call.
                self.restore(robot, &old);
                for (previous, new) in applied.into_iter().rev() {
                    robot.scripts().unregister(&new.key());
                    self.restore(robot, &previous);
                }
                return Err(RemoteError::Invalid(e.to_string()));
            }
            applied.push((old, remote.clone()));
        }

        for remote in batch {
            info!(name = %remote.name, url = %remote.url, "Updated remote script");
            if let Some(slot) = scripts.iter_mut().find(|e| e.name == remote.name) {
                *slot = remote;
            }
        }
        Ok(())
    }

    fn restore(&self, robot: &Robot, previous: &RemoteScript) {
        if let Err(e) = robot.register_script(previous.to_script(&self.client)) {
            error!(
                name = %previous.name,
                error = %e,
                "Failed to restore remote script, robot and store are out of sync"
            );
        }
    }

    /// Removes definitions by name.
    pub fn remove(&self, robot: &Robot, names: &[String]) -> Result<(), RemoteError> {
        let mut scripts = self.scripts.lock();
        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !scripts.iter().any(|e| &e.name == *name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(RemoteError::NotFound(unknown));
        }

        scripts.retain(|remote| {
            if names.contains(&remote.name) {
                robot.scripts().unregister(&remote.key());
                info!(name = %remote.name, "Removed remote script");
                false
            } else {
                true
            }
        });
        Ok(())
    }
}
