//! `anchore-cli image` checks.
//!
//! Images are added once per configured image; the content, metadata,
//! vulnerability and delete checks each pick one image at random and wait
//! for its analysis first. When that wait fails the check is skipped.

use serde_json::Value;
use tracing::{debug, info};

use super::{CliContext, CliRunner, Driver, TestKind};

const LATEST_WITH_SUBSCRIPTION: &str =
    "cannot delete image that is the latest of its tags, and has active subscription";

/// `image wait` arguments used by the wait check.
const WAIT_TIMEOUT: &str = "-1";
const WAIT_INTERVAL: &str = "5";

fn first_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value
        .get(0)
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

impl<R: CliRunner> Driver<R> {
    /// Add, analyze, inspect and delete the configured test images.
    pub async fn image_suite(&mut self) {
        info!(suite = "image", "starting subcommands");
        let ctx = self.root();
        self.image_add(&ctx).await;
        self.image_wait(&ctx).await;
        self.image_get(&ctx).await;
        self.image_content(&ctx).await;
        self.image_metadata(&ctx).await;
        self.image_list(&ctx).await;
        self.image_vuln(&ctx).await;
        self.image_del(&ctx, false, TestKind::Negative).await;
        self.image_del(&ctx, true, TestKind::Positive).await;
        info!(suite = "image", "finished subcommands");
    }

    /// Pick an image and block until it is analyzed. `None` skips the check.
    async fn analyzed_image(&self, ctx: &CliContext, action: &str) -> Option<String> {
        let Some(image) = self.pick_image() else {
            info!(action, "no test images configured, skipping");
            return None;
        };
        info!(action, image = %image, "waiting for image to be available");
        match self.call(ctx, &["image", "wait", image.as_str()]).await {
            Ok(_) => Some(image),
            Err(e) => {
                info!(action, image = %image, error = %e, "wait failed, skipping");
                None
            }
        }
    }

    async fn image_add(&mut self, ctx: &CliContext) {
        let kind = TestKind::Positive;
        for image in self.config.test_images.clone() {
            match self.call(ctx, &["image", "add", image.as_str()]).await {
                Ok(value) => {
                    let status = first_str(&value, "image_status");
                    info!(image = %image, status, "image added");
                    self.ledger
                        .record(status, "active", kind, "image_add", &format!("added image {image}"));
                }
                Err(e) => {
                    debug!(error = %e, "image add failed");
                    self.ledger
                        .record_failure(kind, "image_add", &format!("failed to add image {image}"));
                }
            }
        }
    }

    async fn image_wait(&mut self, ctx: &CliContext) {
        let kind = TestKind::Positive;
        let Some(image) = self.analyzed_image(ctx, "image_wait").await else {
            return;
        };
        let args = [
            "image",
            "wait",
            image.as_str(),
            "--timeout",
            WAIT_TIMEOUT,
            "--interval",
            WAIT_INTERVAL,
        ];
        match self.call(ctx, &args).await {
            Ok(value) => {
                let status = first_str(&value, "analysis_status");
                self.ledger
                    .record("analyzed", status, kind, "image_wait", &format!("waited for image {image}"));
            }
            Err(e) => info!(image = %image, error = %e, "image wait failed"),
        }
    }

    /// `image get` does not need the analysis to be finished.
    async fn image_get(&mut self, ctx: &CliContext) {
        let kind = TestKind::Positive;
        for image in self.config.test_images.clone() {
            match self.call(ctx, &["image", "get", image.as_str()]).await {
                Ok(_) => {
                    self.ledger
                        .record("ok", "ok", kind, "image_get", &format!("got image {image}"));
                }
                Err(e) => {
                    debug!(error = %e, "image get failed");
                    self.ledger
                        .record_failure(kind, "image_get", &format!("failed to get image {image}"));
                }
            }
        }
    }

    async fn image_content(&mut self, ctx: &CliContext) {
        let kind = TestKind::Positive;
        let Some(image) = self.analyzed_image(ctx, "image_content").await else {
            return;
        };

        let types: Vec<String> = match self.call(ctx, &["image", "content", image.as_str()]).await {
            Ok(value) => value
                .as_array()
                .map(|types| {
                    types
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                info!(image = %image, error = %e, "image content failed, skipping");
                return;
            }
        };
        if types.is_empty() {
            self.ledger.record_failure(
                kind,
                "image_content",
                &format!("no content types for image {image}"),
            );
            return;
        }
        info!(image = %image, types = ?types, "found content types");

        for content_type in &types {
            match self.call(ctx, &["image", "content", image.as_str(), content_type.as_str()]).await {
                Ok(value) => {
                    let found = value
                        .get("content")
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    info!(image = %image, content_type = %content_type, found, "content listed");
                }
                Err(e) => {
                    info!(image = %image, error = %e, "image content failed, skipping");
                    return;
                }
            }
        }
        self.ledger.record(
            "ok",
            "ok",
            kind,
            "image_content",
            "content types tested successfully",
        );
    }

    /// Every configured metadata type must be listed and retrievable.
    async fn image_metadata(&mut self, ctx: &CliContext) {
        let kind = TestKind::Positive;
        let Some(image) = self.analyzed_image(ctx, "image_metadata").await else {
            return;
        };

        let listed = match self.call(ctx, &["image", "metadata", image.as_str()]).await {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "image metadata failed");
                self.ledger.record_failure(
                    kind,
                    "image_metadata",
                    &format!("failed to get image metadata for {image}"),
                );
                return;
            }
        };

        let mut failed = false;
        for key in self.config.metadata_types.clone() {
            if listed.get(key.as_str()).is_none() {
                failed = true;
                self.ledger.record_failure(
                    kind,
                    "image_metadata",
                    &format!("{key} metadata type was not found for {image}"),
                );
            }
            match self.call(ctx, &["image", "metadata", image.as_str(), key.as_str()]).await {
                Ok(value) => {
                    let metadata_type = value
                        .get("metadata_type")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    if metadata_type != key {
                        failed = true;
                        self.ledger.record_failure(
                            kind,
                            "image_metadata",
                            &format!("{metadata_type} was not expected metadata type {key} for image {image}"),
                        );
                    }
                }
                Err(e) => {
                    debug!(error = %e, "image metadata failed");
                    failed = true;
                    self.ledger.record_failure(
                        kind,
                        "image_metadata",
                        &format!("failed to get {key} metadata for {image}"),
                    );
                }
            }
        }
        if !failed {
            self.ledger.record(
                "ok",
                "ok",
                kind,
                "image_metadata",
                "all expected metadata keys found",
            );
        }
    }

    async fn image_list(&mut self, ctx: &CliContext) {
        let kind = TestKind::Positive;
        match self.call(ctx, &["image", "list"]).await {
            Ok(value) => {
                let found = value.as_array().map_or(0, Vec::len);
                self.ledger
                    .record("ok", "ok", kind, "image_list", &format!("{found} images found"));
            }
            Err(e) => {
                debug!(error = %e, "image list failed");
                self.ledger
                    .record_failure(kind, "image_list", "failed to list images");
            }
        }
    }

    async fn image_vuln(&mut self, ctx: &CliContext) {
        let kind = TestKind::Positive;
        let Some(image) = self.analyzed_image(ctx, "image_vuln").await else {
            return;
        };

        let mut failed = false;
        for key in self.config.vulnerability_types.clone() {
            match self.call(ctx, &["image", "vuln", image.as_str(), key.as_str()]).await {
                Ok(value) => {
                    let vuln_type = value
                        .get("vulnerability_type")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let found = value
                        .get("vulnerabilities")
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    if vuln_type == key {
                        let message = format!("found {found} vuln of type {key} for image {image}");
                        self.ledger.record("ok", "ok", kind, "image_vuln", &message);
                    } else {
                        failed = true;
                        let message =
                            format!("{vuln_type} was not expected vuln type {key} for image {image}");
                        self.ledger.record_failure(kind, "image_vuln", &message);
                    }
                }
                Err(e) => {
                    debug!(error = %e, "image vuln failed");
                    self.ledger.record_failure(
                        kind,
                        "image_vuln",
                        &format!("failed to get vuln data for image {image}"),
                    );
                    return;
                }
            }
        }
        if !failed {
            self.ledger
                .record("ok", "ok", kind, "image_vuln", "all expected vuln types found");
        }
    }

    /// Without `--force` the engine must refuse to delete a subscribed image.
    async fn image_del(&mut self, ctx: &CliContext, force: bool, kind: TestKind) {
        let Some(image) = self.analyzed_image(ctx, "image_del").await else {
            return;
        };
        let args: Vec<&str> = if force {
            vec!["image", "del", "--force", image.as_str()]
        } else {
            vec!["image", "del", image.as_str()]
        };

        match self.call(ctx, &args).await {
            Ok(value) => {
                let status = value.get("status").and_then(Value::as_str).unwrap_or_default();
                self.ledger
                    .record("deleting", status, kind, "image_del", &format!("delete image {image}"));
            }
            Err(e) if e.message() == Some(LATEST_WITH_SUBSCRIPTION) => {
                if force {
                    self.ledger.record_failure(
                        kind,
                        "image_del",
                        &format!("could not delete image: {image}"),
                    );
                } else {
                    let message = format!("could not delete image without forcing: {image} (good)");
                    self.ledger.record("ok", "notok", kind, "image_del", &message);
                }
            }
            Err(e) => {
                debug!(error = %e, "image del failed");
                self.ledger
                    .record_failure(kind, "image_del", "failed to delete image");
            }
        }
    }
}
