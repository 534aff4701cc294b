use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chronicle_store::{CreateSession, EventStore, SessionRecord};
use chronicle_types::{EventType, SessionId, SpawnType};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::linearizer::SessionLinearizer;

/// Outcome of a supervised subagent run.
#[derive(Debug, Clone, PartialEq)]
pub enum SubagentOutcome {
    Completed { result: String },
    Failed { error: String },
    TimedOut,
}

struct SubagentEntry {
    record: SessionRecord,
    task: String,
}

/// Tracks subagents spawned by one parent session: child session creation,
/// spawn/completion events on the parent chain, and the guardrail timeout.
///
/// Child sessions persist as their own chains; only lifecycle markers and
/// result notifications land on the parent. Subagent *process* management
/// (tmux, OS processes) is an external collaborator — this registry deals
/// in sessions and events.
pub struct SubagentManager {
    parent_session_id: SessionId,
    store: EventStore,
    linearizer: Arc<SessionLinearizer>,
    guardrail_timeout: Duration,
    active: HashMap<SessionId, SubagentEntry>,
    tmux_names: HashSet<String>,
}

impl SubagentManager {
    pub fn new(
        parent_session_id: SessionId,
        store: EventStore,
        linearizer: Arc<SessionLinearizer>,
        config: &Config,
    ) -> Self {
        Self {
            parent_session_id,
            store,
            linearizer,
            guardrail_timeout: Duration::from_secs(config.subagent_timeout_secs),
            active: HashMap::new(),
            tmux_names: HashSet::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Spawn a subagent session. A tmux spawn re-using a live session name
    /// fails; the caller gets the error before anything is persisted.
    pub fn spawn(
        &mut self,
        task: &str,
        spawn_type: SpawnType,
        name: Option<&str>,
        workspace_path: &str,
        working_directory: &str,
        model: &str,
    ) -> Result<SessionRecord> {
        if spawn_type == SpawnType::Tmux {
            let name = name.ok_or_else(|| {
                Error::InvalidParams("tmux subagents require a session name".to_string())
            })?;
            if !self.tmux_names.insert(name.to_string()) {
                return Err(Error::InvalidOperation(format!(
                    "tmux session name '{name}' is already in use"
                )));
            }
        }

        let (child, _) = self.store.create_session(&CreateSession {
            workspace_path: workspace_path.to_string(),
            working_directory: working_directory.to_string(),
            model: model.to_string(),
            title: name.map(str::to_string),
            parent_session_id: Some(self.parent_session_id.clone()),
            spawn_type: Some(spawn_type),
            spawn_task: Some(task.to_string()),
            ..CreateSession::default()
        })?;

        self.linearizer.append_linearized(
            &self.parent_session_id,
            EventType::SubagentSpawned,
            serde_json::json!({
                "subagentSessionId": child.id,
                "spawnType": spawn_type,
                "task": task,
                "name": name,
            }),
            None,
        )?;

        self.active.insert(
            child.id.clone(),
            SubagentEntry {
                record: child.clone(),
                task: task.to_string(),
            },
        );

        Ok(child)
    }

    /// Drive a subagent run under the guardrail timeout, persisting the
    /// terminal event on the parent chain. The future is the subagent's
    /// actual work (provider loop, tool execution); on timeout it is
    /// dropped and `subagent.failed` records `completionType = "timeout"`.
    pub async fn supervise<F>(&mut self, child_id: &SessionId, run: F) -> Result<SubagentOutcome>
    where
        F: std::future::Future<Output = std::result::Result<String, String>>,
    {
        let entry = self
            .active
            .get(child_id)
            .ok_or_else(|| Error::NotFound(format!("subagent {child_id}")))?;
        let task = entry.task.clone();

        let outcome = match tokio::time::timeout(self.guardrail_timeout, run).await {
            Ok(Ok(result)) => SubagentOutcome::Completed { result },
            Ok(Err(error)) => SubagentOutcome::Failed { error },
            Err(_) => SubagentOutcome::TimedOut,
        };

        match &outcome {
            SubagentOutcome::Completed { result } => {
                self.linearizer.append_linearized(
                    &self.parent_session_id,
                    EventType::SubagentCompleted,
                    serde_json::json!({
                        "subagentSessionId": child_id,
                        "completionType": "completed",
                        "resultSummary": result,
                    }),
                    None,
                )?;
                self.linearizer.append_linearized(
                    &self.parent_session_id,
                    EventType::NotificationSubagentResult,
                    serde_json::json!({
                        "subagentSessionId": child_id,
                        "task": task,
                        "result": result,
                    }),
                    None,
                )?;
            }
            SubagentOutcome::Failed { error } => {
                self.linearizer.append_linearized(
                    &self.parent_session_id,
                    EventType::SubagentFailed,
                    serde_json::json!({
                        "subagentSessionId": child_id,
                        "completionType": "error",
                        "error": error,
                    }),
                    None,
                )?;
            }
            SubagentOutcome::TimedOut => {
                self.linearizer.append_linearized(
                    &self.parent_session_id,
                    EventType::SubagentFailed,
                    serde_json::json!({
                        "subagentSessionId": child_id,
                        "completionType": "timeout",
                        "error": format!(
                            "subagent exceeded the {}s guardrail timeout",
                            self.guardrail_timeout.as_secs()
                        ),
                    }),
                    None,
                )?;
            }
        }

        self.release(child_id);
        Ok(outcome)
    }

    fn release(&mut self, child_id: &SessionId) {
        if let Some(entry) = self.active.remove(child_id)
            && let Some(title) = entry.record.title
        {
            self.tmux_names.remove(&title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_store::EventQuery;

    fn setup() -> (EventStore, Arc<SessionLinearizer>, SessionId) {
        let store = EventStore::open_in_memory().unwrap();
        let (parent, _) = store
            .create_session(&CreateSession {
                workspace_path: "/w".to_string(),
                working_directory: "/w".to_string(),
                model: "claude-haiku-4-5-20251001".to_string(),
                ..CreateSession::default()
            })
            .unwrap();
        let linearizer = Arc::new(SessionLinearizer::new(store.clone()));
        (store, linearizer, parent.id)
    }

    fn manager(
        store: &EventStore,
        linearizer: &Arc<SessionLinearizer>,
        parent: &SessionId,
        timeout_secs: u64,
    ) -> SubagentManager {
        let config = Config {
            subagent_timeout_secs: timeout_secs,
            ..Config::default()
        };
        SubagentManager::new(parent.clone(), store.clone(), linearizer.clone(), &config)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawn_creates_child_session_with_lineage() {
        let (store, linearizer, parent) = setup();
        let mut manager = manager(&store, &linearizer, &parent, 3_600);

        let child = manager
            .spawn("explore the store crate", SpawnType::Subsession, None, "/w", "/w", "claude-haiku-4-5-20251001")
            .unwrap();
        linearizer.wait_idle(&parent).await.unwrap();

        assert_eq!(child.parent_session_id.as_ref(), Some(&parent));
        assert_eq!(child.spawn_type, Some(SpawnType::Subsession));
        assert_eq!(child.spawn_task.as_deref(), Some("explore the store crate"));

        let spawned = store
            .get_events_by_session(
                &parent,
                &EventQuery {
                    types: Some(vec![EventType::SubagentSpawned]),
                    ..EventQuery::default()
                },
            )
            .unwrap();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].payload["subagentSessionId"], child.id.as_str());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_tmux_name_fails_spawn() {
        let (store, linearizer, parent) = setup();
        let mut manager = manager(&store, &linearizer, &parent, 3_600);

        manager
            .spawn("first", SpawnType::Tmux, Some("worker"), "/w", "/w", "m")
            .unwrap();
        let err = manager
            .spawn("second", SpawnType::Tmux, Some("worker"), "/w", "/w", "m")
            .unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completed_run_notifies_parent() {
        let (store, linearizer, parent) = setup();
        let mut manager = manager(&store, &linearizer, &parent, 3_600);

        let child = manager
            .spawn("summarize", SpawnType::Subsession, None, "/w", "/w", "m")
            .unwrap();
        let outcome = manager
            .supervise(&child.id, async { Ok("summary ready".to_string()) })
            .await
            .unwrap();
        linearizer.wait_idle(&parent).await.unwrap();

        assert_eq!(outcome, SubagentOutcome::Completed { result: "summary ready".to_string() });
        assert_eq!(manager.active_count(), 0);

        let notifications = store
            .get_events_by_session(
                &parent,
                &EventQuery {
                    types: Some(vec![
                        EventType::SubagentCompleted,
                        EventType::NotificationSubagentResult,
                    ]),
                    ..EventQuery::default()
                },
            )
            .unwrap();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[1].payload["result"], "summary ready");
    }

    #[tokio::test(start_paused = true)]
    async fn guardrail_timeout_fails_the_run() {
        let (store, linearizer, parent) = setup();
        let mut manager = manager(&store, &linearizer, &parent, 1);

        let child = manager
            .spawn("never finishes", SpawnType::Subsession, None, "/w", "/w", "m")
            .unwrap();
        let outcome = manager
            .supervise(&child.id, std::future::pending::<std::result::Result<String, String>>())
            .await
            .unwrap();
        linearizer.wait_idle(&parent).await.unwrap();

        assert_eq!(outcome, SubagentOutcome::TimedOut);

        let failed = store
            .get_events_by_session(
                &parent,
                &EventQuery {
                    types: Some(vec![EventType::SubagentFailed]),
                    ..EventQuery::default()
                },
            )
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].payload["completionType"], "timeout");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tmux_name_is_reusable_after_completion() {
        let (store, linearizer, parent) = setup();
        let mut manager = manager(&store, &linearizer, &parent, 3_600);

        let child = manager
            .spawn("first", SpawnType::Tmux, Some("worker"), "/w", "/w", "m")
            .unwrap();
        manager
            .supervise(&child.id, async { Ok("done".to_string()) })
            .await
            .unwrap();

        manager
            .spawn("second", SpawnType::Tmux, Some("worker"), "/w", "/w", "m")
            .unwrap();
        linearizer.wait_idle(&parent).await.unwrap();
    }
}
