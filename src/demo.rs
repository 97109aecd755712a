// src/demo.rs

//! Simulated image pipeline used by the `workchain` binary.
//!
//! The bodies only pass URIs around and sleep; no pixels are touched.

use std::time::Duration;

use anyhow::{Context, bail};
use tracing::info;

use crate::chain::{ExistingChainPolicy, Stage};
use crate::exec::{WorkContext, WorkFuture, Worker, WorkerRegistry};
use crate::work::{Constraint, Data, WorkRequest};

/// Unique chain name used by the image pipeline.
pub const IMAGE_MANIPULATION_WORK_NAME: &str = "image_manipulation_work";
/// Tag carried by the final save item.
pub const TAG_OUTPUT: &str = "OUTPUT";
/// Data key holding the image location.
pub const KEY_IMAGE_URI: &str = "image_uri";

pub const KIND_CLEANUP: &str = "cleanup";
pub const KIND_BLUR: &str = "blur";
pub const KIND_SAVE: &str = "save";

/// Removes temporary outputs of earlier runs.
#[derive(Debug, Clone)]
pub struct CleanupWorker {
    pub delay: Duration,
}

impl CleanupWorker {
    async fn run(&self, ctx: WorkContext) -> anyhow::Result<Data> {
        info!(item = %ctx.id, "cleaning up old temporary files");
        tokio::time::sleep(self.delay).await;
        Ok(Data::new())
    }
}

impl Worker for CleanupWorker {
    fn do_work(&self, ctx: WorkContext) -> WorkFuture<'_> {
        Box::pin(self.run(ctx))
    }
}

/// Produces a "blurred" copy of the input image URI.
#[derive(Debug, Clone)]
pub struct BlurWorker {
    pub delay: Duration,
}

impl BlurWorker {
    async fn run(&self, ctx: WorkContext) -> anyhow::Result<Data> {
        tokio::time::sleep(self.delay).await;

        let uri = match ctx.input.get_str(KEY_IMAGE_URI) {
            Some(uri) if !uri.trim().is_empty() => uri.to_string(),
            _ => bail!("invalid input uri"),
        };

        let output = blurred_uri(&uri);
        info!(item = %ctx.id, input = %uri, output = %output, "blurred image");
        Ok(Data::new().with(KEY_IMAGE_URI, output))
    }
}

impl Worker for BlurWorker {
    fn do_work(&self, ctx: WorkContext) -> WorkFuture<'_> {
        Box::pin(self.run(ctx))
    }
}

/// "Saves" the final image and reports where it went.
#[derive(Debug, Clone)]
pub struct SaveWorker {
    pub delay: Duration,
}

impl SaveWorker {
    async fn run(&self, ctx: WorkContext) -> anyhow::Result<Data> {
        tokio::time::sleep(self.delay).await;

        let uri = ctx
            .input
            .get_str(KEY_IMAGE_URI)
            .context("no image to save")?;
        let saved = format!("gallery://{}", uri.rsplit('/').next().unwrap_or(uri));
        info!(item = %ctx.id, image = %uri, saved = %saved, "saved image");
        Ok(Data::new().with(KEY_IMAGE_URI, saved))
    }
}

impl Worker for SaveWorker {
    fn do_work(&self, ctx: WorkContext) -> WorkFuture<'_> {
        Box::pin(self.run(ctx))
    }
}

fn blurred_uri(uri: &str) -> String {
    match uri.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => format!("{stem}-blur.{ext}"),
        _ => format!("{uri}-blur"),
    }
}

/// Workers for the three demo kinds, each sleeping `delay`.
pub fn demo_workers(delay: Duration) -> WorkerRegistry {
    WorkerRegistry::new()
        .with(KIND_CLEANUP, CleanupWorker { delay })
        .with(KIND_BLUR, BlurWorker { delay })
        .with(KIND_SAVE, SaveWorker { delay })
}

/// Stages of the image pipeline: cleanup, `blur_level` sequential blurs
/// (only the first gets the image URI), then a constrained, tagged save.
pub fn image_pipeline(blur_level: usize, image_uri: &str) -> Vec<Stage> {
    let mut stages: Vec<Stage> = vec![WorkRequest::new(KIND_CLEANUP).into()];

    for i in 0..blur_level.max(1) {
        let mut blur = WorkRequest::new(KIND_BLUR);
        if i == 0 {
            blur = blur.with_input(Data::new().with(KEY_IMAGE_URI, image_uri));
        }
        stages.push(blur.into());
    }

    stages.push(
        WorkRequest::new(KIND_SAVE)
            .with_tag(TAG_OUTPUT)
            .with_constraint(Constraint::Charging)
            .with_constraint(Constraint::StorageNotLow)
            .into(),
    );

    stages
}

/// Policy the image pipeline is submitted with.
pub const IMAGE_PIPELINE_POLICY: ExistingChainPolicy = ExistingChainPolicy::Replace;
