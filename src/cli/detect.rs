use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use cdp_driver::CdpPage;
use clap::Args;
use formpilot_core_types::SemanticFieldType;
use page_model::{PageDriver, PageQuery};
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;
use super::runtime::{open_page, parse_url};
use crate::session::FillSession;

#[derive(Args, Clone, Debug)]
pub struct DetectArgs {
    /// Application page URL
    #[arg(long)]
    pub url: String,

    /// Saved HTML to serve at --url instead of fetching it
    #[arg(long, value_name = "FILE")]
    pub page: Option<PathBuf>,

    /// Limit detection to these field types (repeatable)
    #[arg(long = "field", value_name = "TYPE")]
    pub fields: Vec<SemanticFieldType>,
}

#[derive(Serialize)]
struct DetectedField {
    field: SemanticFieldType,
    element: String,
    strategy: String,
    confidence: u8,
}

#[derive(Serialize)]
struct DetectReport {
    platform: String,
    detected: Vec<DetectedField>,
    missing: Vec<SemanticFieldType>,
}

pub async fn cmd_detect(args: DetectArgs, ctx: &CliContext) -> Result<()> {
    let url = parse_url(&args.url)?;
    let (browser, page) = open_page(&ctx.config().browser, args.page.as_deref(), &url).await?;
    let result = run_detect(page, args.fields, ctx).await;
    browser.shutdown().await;
    result
}

async fn run_detect(
    page: Arc<CdpPage>,
    fields: Vec<SemanticFieldType>,
    ctx: &CliContext,
) -> Result<()> {
    let driver: Arc<dyn PageDriver> = page.clone();
    let mut session = FillSession::start(driver, ctx.library()?, ctx.config()).await?;

    let fields = if fields.is_empty() {
        SemanticFieldType::ALL.to_vec()
    } else {
        fields
    };

    let mut report = DetectReport {
        platform: session.platform().to_string(),
        detected: Vec::new(),
        missing: Vec::new(),
    };
    for field in fields {
        match session.detect(field).await? {
            Some(result) => {
                let info = page.describe(result.element).await?;
                let mut element = info.tag.clone();
                if let Some(id) = &info.id {
                    element.push_str(&format!("#{id}"));
                }
                if let Some(name) = &info.name {
                    element.push_str(&format!("[name={name}]"));
                }
                report.detected.push(DetectedField {
                    field,
                    element,
                    strategy: result.strategy_used.name().to_string(),
                    confidence: result.confidence,
                });
            }
            None => report.missing.push(field),
        }
    }

    emit(ctx.output(), &report, |r| {
        let mut out = format!("Platform: {}\n", r.platform);
        for d in &r.detected {
            out.push_str(&format!(
                "  {:<22} {:<40} {} ({})\n",
                d.field.as_str(),
                d.element,
                d.strategy,
                d.confidence
            ));
        }
        out.push_str(&format!("{} detected, {} not found", r.detected.len(), r.missing.len()));
        out
    })
}
