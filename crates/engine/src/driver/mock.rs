//! Scripted `anchore-cli` for driver tests
//!
//! [`ScriptedCli`] hands every call's user and subcommand to a responder.
//! [`engine_api`] builds a responder that answers account, image and system
//! commands like a healthy engine.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::json;

use super::{CliOutput, CliRunner};
use crate::EngineError;

/// The subcommand starts after `--json --u U --p P --url URL`
const SUBCOMMAND_OFFSET: usize = 7;

type Responder = Box<dyn Fn(&str, &[String]) -> CliOutput + Send + Sync>;

/// Runner backed by a responder function
pub struct ScriptedCli {
    responder: Responder,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedCli {
    /// The responder receives `(user, subcommand args)`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &[String]) -> CliOutput + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls whose leading arguments equal `command`
    pub fn count(&self, command: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.len() >= command.len() && call.iter().zip(command).all(|(a, b)| a == b))
            .count()
    }
}

impl CliRunner for ScriptedCli {
    async fn run(&self, args: Vec<String>) -> Result<CliOutput, EngineError> {
        let user = args.get(2).cloned().unwrap_or_default();
        let sub: Vec<String> = args.into_iter().skip(SUBCOMMAND_OFFSET).collect();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(sub.clone());
        }
        Ok((self.responder)(&user, &sub))
    }
}

#[derive(Default)]
struct ApiState {
    /// account name -> state
    accounts: BTreeMap<String, String>,
    /// account name -> users
    users: BTreeMap<String, Vec<String>>,
}

/// Responder that behaves like a healthy engine API
pub fn engine_api() -> impl Fn(&str, &[String]) -> CliOutput + Send + Sync + 'static {
    let state = Mutex::new(ApiState::default());
    move |user: &str, args: &[String]| {
        let Ok(mut state) = state.lock() else {
            return CliOutput::failed("");
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let admin = user == "admin";
        match args.as_slice() {
            ["account", "add", "--email", _, name] => {
                state.accounts.insert((*name).to_owned(), "enabled".to_owned());
                CliOutput::ok(json!({"name": name, "state": "enabled"}).to_string())
            }
            ["account", "get", name] => match state.accounts.get(*name) {
                Some(s) => CliOutput::ok(json!({"name": name, "state": s}).to_string()),
                None => CliOutput::failed(json!({"httpcode": 404, "message": "not found"}).to_string()),
            },
            ["account", verb @ ("enable" | "disable"), name] => {
                let new_state = if *verb == "enable" { "enabled" } else { "disabled" };
                state.accounts.insert((*name).to_owned(), new_state.to_owned());
                CliOutput::ok(json!({"name": name, "state": new_state}).to_string())
            }
            ["account", "del", "--dontask", name] => {
                if state.accounts.get(*name).map(String::as_str) == Some("enabled") {
                    CliOutput::failed(json!({
                        "httpcode": 400,
                        "message": "Invalid account state change requested. Cannot go from state enabled to state deleting"
                    }).to_string())
                } else {
                    state.accounts.insert((*name).to_owned(), "deleting".to_owned());
                    CliOutput::ok(json!({"name": name, "state": "deleting"}).to_string())
                }
            }
            ["account", "list"] | ["account", "user", "list", "--account", _] if !admin => {
                CliOutput::failed(json!({"httpcode": 403, "message": "Unauthorized"}).to_string())
            }
            ["account", "list"] => {
                let names: Vec<_> = state.accounts.keys().map(|n| json!({"name": n})).collect();
                CliOutput::ok(json!(names).to_string())
            }
            ["account", "user", "add", "--account", account, username, _password] => {
                state
                    .users
                    .entry((*account).to_owned())
                    .or_default()
                    .push((*username).to_owned());
                CliOutput::ok(
                    json!({"username": username, "created_at": "2020-03-01T00:00:00Z"}).to_string(),
                )
            }
            ["account", "user", "list"] => CliOutput::ok(json!([{"username": "admin"}]).to_string()),
            ["account", "user", "list", "--account", account] => {
                let users = state.users.get(*account).cloned().unwrap_or_default();
                CliOutput::ok(json!(users.iter().map(|u| json!({"username": u})).collect::<Vec<_>>()).to_string())
            }
            ["account", "user", "get" | "del", "--account", _, _]
            | ["account", "user", "setpassword", "--account", _, "--username", _, _]
            | ["account", "whoami"] => CliOutput::ok("{}"),
            ["image", "add", image] => {
                CliOutput::ok(json!([{"image_status": "active", "tag": image}]).to_string())
            }
            ["image", "wait", ..] => CliOutput::ok(json!([{"analysis_status": "analyzed"}]).to_string()),
            ["image", "get", _] => CliOutput::ok(json!([{"analysis_status": "analyzed"}]).to_string()),
            ["image", "content", _] => CliOutput::ok(json!(["os", "files"]).to_string()),
            ["image", "content", _, kind] => {
                CliOutput::ok(json!({"content": [{"type": kind}], "content_type": kind}).to_string())
            }
            ["image", "metadata", _] => CliOutput::ok(
                json!({"manifest": "", "docker_history": "", "dockerfile": ""}).to_string(),
            ),
            ["image", "metadata", _, kind] => {
                CliOutput::ok(json!({"metadata_type": kind, "metadata": ""}).to_string())
            }
            ["image", "list"] => CliOutput::ok(json!([{}, {}]).to_string()),
            ["image", "vuln", _, kind] => CliOutput::ok(
                json!({"vulnerability_type": kind, "vulnerabilities": []}).to_string(),
            ),
            ["image", "del", "--force", _] => CliOutput::ok(json!({"status": "deleting"}).to_string()),
            ["image", "del", _] => CliOutput::failed(
                json!({
                    "httpcode": 409,
                    "message": "cannot delete image that is the latest of its tags, and has active subscription"
                })
                .to_string(),
            ),
            ["system", "status"] => CliOutput::ok(
                json!({"service_states": [{"servicename": "apiext", "status": true}]}).to_string(),
            ),
            ["system", "feeds", "list"] => {
                CliOutput::ok(json!([{"name": "vulnerabilities"}, {"name": "nvdv2"}]).to_string())
            }
            _ => CliOutput::failed(json!({"httpcode": 400, "message": "unknown command"}).to_string()),
        }
    }
}
