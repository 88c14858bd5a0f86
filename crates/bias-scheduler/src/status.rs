//! Per-task status registry for observability.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub status: String,
    pub interval: String,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Default)]
pub struct SchedulerStatus {
    tasks: DashMap<String, TaskStatus>,
    started_at: std::sync::OnceLock<DateTime<Utc>>,
}

impl SchedulerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self) {
        let _ = self.started_at.set(Utc::now());
    }

    pub fn register(&self, task: &str, interval: &str) {
        self.tasks.insert(
            task.to_string(),
            TaskStatus {
                last_run: None,
                status: "idle".to_string(),
                interval: interval.to_string(),
                detail: None,
            },
        );
    }

    pub fn mark_running(&self, task: &str) {
        if let Some(mut entry) = self.tasks.get_mut(task) {
            entry.status = "running".to_string();
        }
    }

    pub fn mark_completed(&self, task: &str, detail: Option<String>) {
        if let Some(mut entry) = self.tasks.get_mut(task) {
            entry.status = "idle".to_string();
            entry.last_run = Some(Utc::now());
            entry.detail = detail;
        }
    }

    pub fn mark_error(&self, task: &str, error: String) {
        if let Some(mut entry) = self.tasks.get_mut(task) {
            entry.status = "error".to_string();
            entry.last_run = Some(Utc::now());
            entry.detail = Some(error);
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let tasks: serde_json::Map<String, serde_json::Value> = self
            .tasks
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    serde_json::to_value(entry.value()).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::json!({
            "scheduler_started": self.started_at.get().map(|t| t.to_rfc3339()),
            "tasks": tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lifecycle() {
        let status = SchedulerStatus::new();
        status.register("cta_scanner", "15-30 min (market hours)");
        status.mark_running("cta_scanner");
        status.mark_completed("cta_scanner", Some("3 signals".to_string()));

        let snapshot = status.snapshot();
        let task = &snapshot["tasks"]["cta_scanner"];
        assert_eq!(task["status"], "idle");
        assert_eq!(task["detail"], "3 signals");
        assert!(task["last_run"].is_string());
    }

    #[test]
    fn test_error_marking() {
        let status = SchedulerStatus::new();
        status.register("outcome_tracker", "hourly");
        status.mark_error("outcome_tracker", "db unavailable".to_string());
        let snapshot = status.snapshot();
        assert_eq!(snapshot["tasks"]["outcome_tracker"]["status"], "error");
    }
}
