//! `anchore-cli system` checks.

use serde_json::Value;
use tracing::{debug, info};

use super::{CliRunner, Driver, TestKind};

impl<R: CliRunner> Driver<R> {
    pub async fn system_suite(&mut self) {
        info!(suite = "system", "starting subcommands");
        self.system_status().await;
        self.system_feeds_list().await;
        info!(suite = "system", "finished subcommands");
    }

    /// Every reported service must be up.
    async fn system_status(&mut self) {
        let kind = TestKind::Positive;
        let ctx = self.root();
        match self.call(&ctx, &["system", "status"]).await {
            Ok(value) => {
                let states = value
                    .get("service_states")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let down: Vec<&str> = states
                    .iter()
                    .filter(|s| s.get("status").and_then(Value::as_bool) != Some(true))
                    .map(|s| s.get("servicename").and_then(Value::as_str).unwrap_or("unknown"))
                    .collect();
                if states.is_empty() {
                    self.ledger
                        .record("ok", "notok", kind, "system_status", "no services reported");
                } else if down.is_empty() {
                    let message = format!("{} services up", states.len());
                    self.ledger.record("ok", "ok", kind, "system_status", &message);
                } else {
                    let message = format!("services down: {}", down.join(", "));
                    self.ledger.record("ok", "notok", kind, "system_status", &message);
                }
            }
            Err(e) => {
                debug!(error = %e, "system status failed");
                self.ledger
                    .record_failure(kind, "system_status", "failed to get system status");
            }
        }
    }

    async fn system_feeds_list(&mut self) {
        let kind = TestKind::Positive;
        let ctx = self.root();
        match self.call(&ctx, &["system", "feeds", "list"]).await {
            Ok(value) => {
                let found = value.as_array().map_or(0, Vec::len);
                self.ledger
                    .record("ok", "ok", kind, "system_feeds_list", &format!("{found} feeds found"));
            }
            Err(e) => {
                debug!(error = %e, "system feeds list failed");
                self.ledger
                    .record_failure(kind, "system_feeds_list", "failed to list feeds");
            }
        }
    }
}
