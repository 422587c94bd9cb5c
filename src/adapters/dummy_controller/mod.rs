// Dummy controller adapter - Offline stand-in for the A3200

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::constants::ReturnCode;
use crate::domain::errors::DomainError;
use crate::ports::{CommandRecord, ControllerPort};

/// Replies for commands starting with `prefix`; the last reply is repeated
#[derive(Debug, Clone)]
struct ScriptedReply {
    prefix: String,
    replies: VecDeque<String>,
}

/// Version reported by the dummy controller
pub const DUMMY_VERSION: &str = "0.0.0.0";

const STATE_IDLE: i64 = 2;
const STATE_READY: i64 = 3;
const STATE_COMPLETE: i64 = 7;

/// Controller that echoes commands unless a scripted reply matches
///
/// Status queries are answered with zeros, except task states: `PROGRAM n LOAD`
/// makes task n ready, `START` completes it at once and `STOP` returns it to idle.
#[derive(Default)]
pub struct DummyControllerAdapter {
    script: Mutex<Vec<ScriptedReply>>,
    history: Mutex<Vec<CommandRecord>>,
    task_states: Mutex<BTreeMap<u8, i64>>,
}

impl DummyControllerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `replies` in order
    pub async fn respond_to(&self, prefix: &str, replies: &[&str]) {
        self.script.lock().await.push(ScriptedReply {
            prefix: prefix.to_string(),
            replies: replies.iter().map(|r| r.to_string()).collect(),
        });
    }

    /// Commands sent so far without terminators
    pub async fn commands(&self) -> Vec<String> {
        self.history
            .lock()
            .await
            .iter()
            .map(|r| r.command.trim_end().to_string())
            .collect()
    }

    async fn reply_for(&self, command: &str) -> String {
        let mut script = self.script.lock().await;
        for entry in script.iter_mut() {
            if command.starts_with(&entry.prefix) {
                let reply = if entry.replies.len() > 1 {
                    entry.replies.pop_front()
                } else {
                    entry.replies.front().cloned()
                };
                if let Some(reply) = reply {
                    return reply;
                }
            }
        }
        drop(script);
        self.simulate(command).await
    }

    async fn task_state(&self, target: &str) -> i64 {
        let states = self.task_states.lock().await;
        target
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(|id| states.get(&id).copied())
            .unwrap_or(STATE_IDLE)
    }

    async fn simulate(&self, command: &str) -> String {
        if command == "~VERSION" {
            return DUMMY_VERSION.to_string();
        }

        if let Some(rest) = command.strip_prefix("PROGRAM ") {
            let mut words = rest.split_whitespace();
            if let (Some(Ok(id)), Some(action)) = (words.next().map(str::parse::<u8>), words.next()) {
                let state = match action {
                    "LOAD" => Some(STATE_READY),
                    "START" => Some(STATE_COMPLETE),
                    "STOP" => Some(STATE_IDLE),
                    _ => None,
                };
                if let Some(state) = state {
                    self.task_states.lock().await.insert(id, state);
                }
            }
            return command.to_string();
        }

        if let Some(queries) = command.strip_prefix("~STATUS ") {
            let mut values = Vec::new();
            for query in queries.split(')') {
                let query = query.trim().trim_start_matches('(');
                if query.is_empty() {
                    continue;
                }
                let value = match query.split_once(',') {
                    Some((target, item)) if item.trim() == "TaskState" => self.task_state(target).await,
                    _ => 0,
                };
                values.push(value.to_string());
            }
            return values.join(" ");
        }

        if let Some(args) = command.strip_prefix("TASKSTATUS(") {
            return match args.split_once(',') {
                Some((target, item)) if item.trim_start().starts_with("DATAITEM_TaskState") => {
                    self.task_state(target).await.to_string()
                }
                _ => "0".to_string(),
            };
        }
        if command.starts_with("SYSTEMSTATUS(") || command.starts_with("AXISSTATUS(") {
            return "0".to_string();
        }

        command.to_string()
    }
}

#[async_trait]
impl ControllerPort for DummyControllerAdapter {
    async fn connect(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn send(&self, command: &str) -> Result<String, DomainError> {
        let command = command.trim_end_matches('\n');
        debug!(command, "Dummy controller");
        let mut record = CommandRecord::new(command);
        record.mark_sent();
        let reply = self.reply_for(command).await;
        record.mark_received(ReturnCode::Success, &reply);
        self.history.lock().await.push(record);
        Ok(reply)
    }

    async fn history(&self) -> Vec<CommandRecord> {
        self.history.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo() {
        let dummy = DummyControllerAdapter::new();
        assert_eq!(dummy.send("ENABLE X\n").await.unwrap(), "ENABLE X");
        assert_eq!(dummy.commands().await, vec!["ENABLE X"]);
        assert_eq!(dummy.history().await[0].return_code, Some(ReturnCode::Success));
    }

    #[tokio::test]
    async fn test_scripted_replies_repeat_last() {
        let dummy = DummyControllerAdapter::new();
        dummy.respond_to("~STATUS", &["0 2 0 0 0", "0 3 0 0 0"]).await;
        assert_eq!(dummy.send("~STATUS (2, TaskMode)").await.unwrap(), "0 2 0 0 0");
        assert_eq!(dummy.send("~STATUS (2, TaskMode)").await.unwrap(), "0 3 0 0 0");
        assert_eq!(dummy.send("~STATUS (2, TaskMode)").await.unwrap(), "0 3 0 0 0");
        assert_eq!(dummy.send("~VERSION").await.unwrap(), DUMMY_VERSION);
    }

    #[tokio::test]
    async fn test_task_model() {
        let dummy = DummyControllerAdapter::new();
        let query = "~STATUS (2, TaskMode) (2, TaskState) (2, TaskStatus0) (2, TaskStatus1) (2, TaskStatus2)";
        assert_eq!(dummy.send(query).await.unwrap(), "0 2 0 0 0");

        dummy.send("PROGRAM 2 LOAD \"/tmp/a.pgm\"").await.unwrap();
        assert_eq!(dummy.send(query).await.unwrap(), "0 3 0 0 0");
        assert_eq!(dummy.send("TASKSTATUS(2, DATAITEM_TaskState)").await.unwrap(), "3");

        dummy.send("PROGRAM 2 START").await.unwrap();
        assert_eq!(dummy.send(query).await.unwrap(), "0 7 0 0 0");
        assert_eq!(dummy.send("~STATUS (3, TaskState)").await.unwrap(), "2");
        assert_eq!(dummy.send("SYSTEMSTATUS(DATAITEM_Timer)").await.unwrap(), "0");
    }
}
