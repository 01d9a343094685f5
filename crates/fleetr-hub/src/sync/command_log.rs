use std::collections::VecDeque;

use fleetr_shared::schemas::Command;
use serde_json::Value;

/// Append-only command history, ordered by dispatch. Entries are mutated in
/// place when a result arrives (matched by command id) but never removed by
/// correlation; a ring-buffer cap bounds total growth.
pub struct CommandLog {
    entries: VecDeque<Command>,
    cap: usize,
    total_dispatched: u64,
}

impl CommandLog {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap: cap.max(1),
            total_dispatched: 0,
        }
    }

    pub fn append(&mut self, command: Command) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(command);
        self.total_dispatched += 1;
    }

    /// Match a result back to its command. Best-effort: an unknown id (or
    /// one already evicted by the cap) is dropped and `false` returned.
    pub fn correlate(
        &mut self,
        command_id: &str,
        status: &str,
        result: Option<Value>,
        now: i64,
    ) -> bool {
        match self
            .entries
            .iter_mut()
            .rev()
            .find(|c| c.command_id == command_id)
        {
            Some(entry) => {
                entry.status = status.to_string();
                entry.result = result;
                entry.completed_at = Some(now);
                true
            }
            None => false,
        }
    }

    /// Most-recent-first, optionally filtered by target session.
    pub fn history(&self, device_id: Option<&str>, limit: usize) -> Vec<Command> {
        self.entries
            .iter()
            .rev()
            .filter(|c| device_id.is_none_or(|id| c.device_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of all commands ever dispatched, including evicted ones.
    pub fn total_dispatched(&self) -> u64 {
        self.total_dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(id: &str, device: &str) -> Command {
        Command {
            command_id: id.into(),
            device_id: device.into(),
            action: "ping".into(),
            payload: json!({}),
            status: "sent".into(),
            result: None,
            issued_at: 0,
            completed_at: None,
        }
    }

    #[test]
    fn correlate_updates_exactly_the_matching_entry() {
        let mut log = CommandLog::new(10);
        log.append(command("c1", "a"));
        log.append(command("c2", "a"));

        assert!(log.correlate("c1", "completed", Some(json!({"ok": true})), 99));

        let all = log.history(None, 10);
        let c1 = all.iter().find(|c| c.command_id == "c1").unwrap();
        let c2 = all.iter().find(|c| c.command_id == "c2").unwrap();
        assert_eq!(c1.status, "completed");
        assert_eq!(c1.result, Some(json!({"ok": true})));
        assert_eq!(c1.completed_at, Some(99));
        assert_eq!(c2.status, "sent");
        assert!(c2.result.is_none());
    }

    #[test]
    fn correlate_unknown_id_leaves_history_unchanged() {
        let mut log = CommandLog::new(10);
        log.append(command("c1", "a"));
        assert!(!log.correlate("missing", "completed", None, 99));
        let entry = &log.history(None, 10)[0];
        assert_eq!(entry.status, "sent");
        assert!(entry.completed_at.is_none());
    }

    #[test]
    fn history_filters_by_device_most_recent_first() {
        let mut log = CommandLog::new(10);
        log.append(command("c1", "a"));
        log.append(command("c2", "a"));
        log.append(command("c3", "b"));

        let filtered = log.history(Some("a"), 10);
        let ids: Vec<&str> = filtered.iter().map(|c| c.command_id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[test]
    fn history_limit_clamps_to_most_recent() {
        let mut log = CommandLog::new(10);
        for i in 0..5 {
            log.append(command(&format!("c{i}"), "a"));
        }
        let page = log.history(None, 1);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].command_id, "c4");
    }

    #[test]
    fn cap_evicts_oldest_entries() {
        let mut log = CommandLog::new(3);
        for i in 0..5 {
            log.append(command(&format!("c{i}"), "a"));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.total_dispatched(), 5);
        // c0/c1 are gone; a late result for an evicted command is dropped.
        assert!(!log.correlate("c0", "completed", None, 1));
        assert!(log.correlate("c4", "completed", None, 1));
    }
}
