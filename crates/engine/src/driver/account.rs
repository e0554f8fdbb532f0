//! `anchore-cli account` checks.

use serde_json::Value;
use tracing::{debug, info};

use super::{CliContext, CliRunner, Driver, FakeAccount, TestKind};

const ENABLED_TO_DELETING: &str =
    "Invalid account state change requested. Cannot go from state enabled to state deleting";

fn state_of(value: &Value) -> &str {
    value.get("state").and_then(Value::as_str).unwrap_or_default()
}

fn len_of(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}

impl<R: CliRunner> Driver<R> {
    /// Account lifecycle, listing, users and whoami.
    pub async fn account_suite(&mut self) {
        info!(suite = "account", "starting subcommands");
        let ctx = self.root();
        let account = FakeAccount::generate();

        self.account_add(&ctx, account.name.as_str(), account.email.as_str(), TestKind::Positive).await;
        self.account_get(&ctx, &account.name).await;
        self.account_set_enabled(&ctx, account.name.as_str(), false).await;
        self.account_set_enabled(&ctx, account.name.as_str(), true).await;
        self.account_del(&ctx, account.name.as_str(), TestKind::Negative).await;
        self.account_set_enabled(&ctx, account.name.as_str(), false).await;
        self.account_del(&ctx, account.name.as_str(), TestKind::Positive).await;
        self.account_list(TestKind::Positive).await;
        self.account_list(TestKind::Negative).await;
        self.account_user_suite().await;
        self.account_whoami().await;
        info!(suite = "account", "finished subcommands");
    }

    pub(crate) async fn account_add(
        &mut self,
        ctx: &CliContext,
        name: &str,
        email: &str,
        kind: TestKind,
    ) {
        match self.call(ctx, &["account", "add", "--email", email, name]).await {
            Ok(value) => {
                let state = state_of(&value);
                let message = format!("account: {name}; email: {email}; state: {state}");
                self.ledger.record("enabled", state, kind, "account_add", &message);
            }
            Err(e) => {
                debug!(error = %e, "account add failed");
                self.ledger
                    .record_failure(kind, "account_add", &format!("failed to add account {name}"));
            }
        }
    }

    async fn account_get(&mut self, ctx: &CliContext, name: &str) {
        let kind = TestKind::Positive;
        match self.call(ctx, &["account", "get", name]).await {
            Ok(value) => {
                let state = state_of(&value);
                let message = format!("account: {name}; state: {state}");
                self.ledger.record("enabled", state, kind, "account_get", &message);
            }
            Err(e) => {
                debug!(error = %e, "account get failed");
                self.ledger
                    .record_failure(kind, "account_get", &format!("failed to get account {name}"));
            }
        }
    }

    async fn account_set_enabled(&mut self, ctx: &CliContext, name: &str, enabled: bool) {
        let kind = TestKind::Positive;
        let (verb, action, desired) = if enabled {
            ("enable", "account_enable", "enabled")
        } else {
            ("disable", "account_disable", "disabled")
        };
        match self.call(ctx, &["account", verb, name]).await {
            Ok(value) => {
                let state = state_of(&value);
                let message = format!("account: {name}; state: {state}");
                self.ledger.record(desired, state, kind, action, &message);
            }
            Err(e) => {
                debug!(error = %e, "account {verb} failed");
                self.ledger
                    .record_failure(kind, action, &format!("failed to {verb} account {name}"));
            }
        }
    }

    /// Deleting an enabled account must be refused; a disabled one goes to `deleting`.
    async fn account_del(&mut self, ctx: &CliContext, name: &str, kind: TestKind) {
        match self.call(ctx, &["account", "del", "--dontask", name]).await {
            Ok(value) => {
                let state = state_of(&value);
                let message = format!("account: {name}; state: {state}");
                self.ledger.record("deleting", state, kind, "account_del", &message);
            }
            Err(e) if e.message() == Some(ENABLED_TO_DELETING) => {
                let message = format!("could not delete account: {name}");
                self.ledger.record("deleting", "enabled", kind, "account_del", &message);
            }
            Err(e) => {
                debug!(error = %e, "account del failed");
                self.ledger
                    .record_failure(kind, "account_del", &format!("failed to delete account {name}"));
            }
        }
    }

    /// Admin lists accounts; a non-admin user must be refused.
    async fn account_list(&mut self, kind: TestKind) {
        let ctx = match kind {
            TestKind::Positive => self.root(),
            TestKind::Negative => {
                let account = self.provision_account_with_user().await;
                self.root().as_user(account.user.as_str(), &account.password)
            }
        };

        match self.call(&ctx, &["account", "list"]).await {
            Ok(value) => {
                let message = format!("{} accounts found", len_of(&value));
                self.ledger.record("ok", "ok", kind, "account_list", &message);
            }
            Err(e) if kind == TestKind::Negative && e.is_unauthorized() => {
                self.ledger.record(
                    "ok",
                    "notok",
                    kind,
                    "account_list",
                    "non-admin user could not list accounts",
                );
            }
            Err(e) => {
                debug!(error = %e, "account list failed");
                self.ledger
                    .record_failure(kind, "account_list", "failed to list accounts");
            }
        }
    }

    /// Create an account with one user without recording anything.
    pub(crate) async fn provision_account_with_user(&mut self) -> FakeAccount {
        let ctx = self.root();
        let account = FakeAccount::generate();
        if let Err(e) = self
            .call(&ctx, &["account", "add", "--email", account.email.as_str(), account.name.as_str()])
            .await
        {
            debug!(account = %account.name, error = %e, "setup: account add failed");
        }
        if let Err(e) = self
            .call(
                &ctx,
                &[
                    "account",
                    "user",
                    "add",
                    "--account",
                    account.name.as_str(),
                    account.user.as_str(),
                    account.password.as_str(),
                ],
            )
            .await
        {
            debug!(account = %account.name, error = %e, "setup: user add failed");
        }
        account
    }

    async fn account_user_suite(&mut self) {
        info!(suite = "account user", "starting subcommands");
        self.account_user_list().await;

        let ctx = self.root();
        let account = FakeAccount::generate();
        self.account_add(&ctx, account.name.as_str(), account.email.as_str(), TestKind::Positive).await;
        self.account_user_add(&ctx, &account).await;

        self.account_user_simple("del").await;
        self.account_user_simple("get").await;
        self.account_user_simple("setpassword").await;
        info!(suite = "account user", "finished subcommands");
    }

    async fn account_user_add(&mut self, ctx: &CliContext, account: &FakeAccount) {
        let kind = TestKind::Positive;
        let args = [
            "account",
            "user",
            "add",
            "--account",
            account.name.as_str(),
            account.user.as_str(),
            account.password.as_str(),
        ];
        match self.call(ctx, &args).await {
            Ok(value) => {
                let created = value.get("created_at").and_then(Value::as_str).unwrap_or_default();
                let user = value.get("username").and_then(Value::as_str).unwrap_or_default();
                if !created.is_empty() && !user.is_empty() {
                    let message = format!("user: {user} added at {created}");
                    self.ledger.record("ok", "ok", kind, "account_user_add", &message);
                } else {
                    let message = format!("user not added; json response: {value}");
                    self.ledger.record("ok", "notok", kind, "account_user_add", &message);
                }
            }
            Err(e) => {
                debug!(error = %e, "account user add failed");
                let message = format!("failed to add user {} to account {}", account.user, account.name);
                self.ledger.record_failure(kind, "account_user_add", &message);
            }
        }
    }

    /// `account user list` as admin, for an account without users, for an
    /// account with a user, and as a non-admin user.
    async fn account_user_list(&mut self) {
        let action = "account_user_list";
        let ctx = self.root();

        match self.call(&ctx, &["account", "user", "list"]).await {
            Ok(value) if len_of(&value) > 0 => {
                let message = format!("{} users found", len_of(&value));
                self.ledger.record("ok", "ok", TestKind::Positive, action, &message);
            }
            Ok(_) => {
                self.ledger
                    .record("ok", "notok", TestKind::Positive, action, "no users found");
            }
            Err(e) => {
                debug!(error = %e, "account user list failed");
                self.ledger
                    .record_failure(TestKind::Positive, action, "failed to list users w/admin");
            }
        }

        let empty = FakeAccount::generate();
        if let Err(e) = self
            .call(&ctx, &["account", "add", "--email", empty.email.as_str(), empty.name.as_str()])
            .await
        {
            debug!(account = %empty.name, error = %e, "setup: account add failed");
        }
        match self
            .call(&ctx, &["account", "user", "list", "--account", empty.name.as_str()])
            .await
        {
            Ok(value) if len_of(&value) == 0 => {
                self.ledger
                    .record("ok", "notok", TestKind::Negative, action, "no users found (good)");
            }
            Ok(value) => {
                let message = format!("{} users found", len_of(&value));
                self.ledger.record("ok", "notok", TestKind::Positive, action, &message);
            }
            Err(e) => {
                debug!(error = %e, "account user list failed");
                self.ledger.record_failure(
                    TestKind::Positive,
                    action,
                    "failed to list users w/admin for account w/no users",
                );
            }
        }

        let populated = self.provision_account_with_user().await;
        match self
            .call(&ctx, &["account", "user", "list", "--account", populated.name.as_str()])
            .await
        {
            Ok(value) if len_of(&value) > 0 => {
                let message = format!("{} users found", len_of(&value));
                self.ledger.record("ok", "ok", TestKind::Positive, action, &message);
            }
            Ok(_) => {
                self.ledger
                    .record("ok", "notok", TestKind::Positive, action, "no users found");
            }
            Err(e) => {
                debug!(error = %e, "account user list failed");
                self.ledger.record_failure(
                    TestKind::Positive,
                    action,
                    "failed to list users w/admin for account w/a user",
                );
            }
        }

        let outsider = self.provision_account_with_user().await;
        let user_ctx = ctx.as_user(&outsider.user, &outsider.password);
        match self
            .call(&user_ctx, &["account", "user", "list", "--account", outsider.name.as_str()])
            .await
        {
            Ok(value) => {
                let message = format!(
                    "{} users found - but should have been refused",
                    len_of(&value)
                );
                self.ledger.record("ok", "ok", TestKind::Negative, action, &message);
            }
            Err(e) if e.is_unauthorized() => {
                self.ledger.record(
                    "ok",
                    "notok",
                    TestKind::Negative,
                    action,
                    "non-admin user could not list users (good)",
                );
            }
            Err(e) => {
                debug!(error = %e, "account user list failed");
                self.ledger.record_failure(
                    TestKind::Negative,
                    action,
                    "failed to list users w/a non admin user",
                );
            }
        }
    }

    /// `account user del|get|setpassword` on a freshly provisioned user.
    async fn account_user_simple(&mut self, verb: &str) {
        let kind = TestKind::Positive;
        let action = format!("account_user_{verb}");
        let account = self.provision_account_with_user().await;
        let ctx = self.root();

        let args: Vec<&str> = match verb {
            "setpassword" => vec![
                "account",
                "user",
                "setpassword",
                "--account",
                account.name.as_str(),
                "--username",
                account.user.as_str(),
                account.password.as_str(),
            ],
            _ => vec!["account", "user", verb, "--account", account.name.as_str(), account.user.as_str()],
        };

        match self.call(&ctx, &args).await {
            Ok(_) => {
                let message = format!("{verb} user {} in account {}", account.user, account.name);
                self.ledger.record("ok", "ok", kind, &action, &message);
            }
            Err(e) => {
                debug!(error = %e, "account user {verb} failed");
                let message = format!("failed to {verb} user {}", account.user);
                self.ledger.record_failure(kind, &action, &message);
            }
        }
    }

    async fn account_whoami(&mut self) {
        let kind = TestKind::Positive;
        self.provision_account_with_user().await;
        let ctx = self.root();
        match self.call(&ctx, &["account", "whoami"]).await {
            Ok(_) => {
                self.ledger
                    .record("ok", "ok", kind, "account_whoami", "account whoami called successfully");
            }
            Err(e) => {
                debug!(error = %e, "account whoami failed");
                self.ledger
                    .record_failure(kind, "account_whoami", "failed to call account whoami");
            }
        }
    }
}
