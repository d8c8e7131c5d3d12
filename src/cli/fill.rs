use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use page_model::PageDriver;
use profile_cache::UserProfileSnapshot;
use serde::Serialize;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::emit;
use super::runtime::{open_page, parse_url};
use crate::report::{Progress, SessionReport, StepReport};
use crate::session::FillSession;

#[derive(Args, Clone, Debug)]
pub struct FillArgs {
    /// Application page URL
    #[arg(long)]
    pub url: String,

    /// Saved HTML to serve at --url instead of fetching it
    #[arg(long, value_name = "FILE")]
    pub page: Option<PathBuf>,

    /// Profile JSON to fill from instead of the profile cache
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Fill the active step only, without advancing
    #[arg(long)]
    pub no_advance: bool,
}

#[derive(Serialize)]
struct StepOnly {
    step: StepReport,
    progress: Progress,
}

pub async fn cmd_fill(args: FillArgs, ctx: &CliContext) -> Result<()> {
    let url = parse_url(&args.url)?;
    let profile = match &args.profile {
        Some(path) => read_profile(path).await?,
        None => ctx
            .profile_cache()?
            .ensure_fresh(false)
            .await
            .context("no usable profile; pass --profile or run `profile refresh`")?,
    };

    let (browser, page) = open_page(&ctx.config().browser, args.page.as_deref(), &url).await?;
    let result = run_fill(page, &profile, args.no_advance, ctx).await;
    browser.shutdown().await;
    result
}

async fn run_fill(
    page: Arc<dyn PageDriver>,
    profile: &UserProfileSnapshot,
    no_advance: bool,
    ctx: &CliContext,
) -> Result<()> {
    let mut session = FillSession::start(page, ctx.library()?, ctx.config()).await?;

    let token = session.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next field");
            token.cancel();
        }
    });

    if no_advance {
        let step = session.fill_active_step(profile).await;
        watcher.abort();
        let step = step?;
        emit(
            ctx.output(),
            &StepOnly {
                step,
                progress: session.get_progress(),
            },
            |r| render_step(&r.step),
        )
    } else {
        let report = session.run_to_completion(profile).await;
        watcher.abort();
        let report = report?;
        info!(completed = report.completed, "fill finished");
        emit(ctx.output(), &report, render_report)
    }
}

async fn read_profile(path: &Path) -> Result<Arc<UserProfileSnapshot>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Arc::new(UserProfileSnapshot::from_raw(&value, Utc::now())?))
}

fn render_step(step: &StepReport) -> String {
    let mut out = format!("Step {}: {} of {} fields filled\n", step.step, step.filled(), step.fields.len());
    for field in &step.fields {
        let status = if field.success {
            "ok".to_string()
        } else {
            field
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "failed".to_string())
        };
        out.push_str(&format!("  {:<22} {}\n", field.field.as_str(), status));
    }
    out.trim_end().to_string()
}

fn render_report(report: &SessionReport) -> String {
    let mut out = String::new();
    for step in &report.steps {
        out.push_str(&render_step(step));
        out.push('\n');
    }
    let p = &report.progress;
    out.push_str(&format!(
        "Platform {}: {} transitions, {}/{} fields filled",
        p.platform, p.transitions, p.stats.successes, p.stats.attempts
    ));
    if report.completed {
        out.push_str("\nApplication submitted");
    } else if report.cancelled {
        out.push_str("\nCancelled");
    } else {
        out.push_str("\nIncomplete");
        if !report.blocked_by.is_empty() {
            out.push_str(&format!(", blocked by: {}", report.blocked_by.join(", ")));
        }
        if let Some(err) = &report.error {
            out.push_str(&format!(" ({err})"));
        }
    }
    out
}
