use anyhow::Result;
use clap::Args;
use platform_registry::{CatalogOrigin, GENERIC_PLATFORM};
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;
use super::runtime::parse_url;

#[derive(Args, Clone, Debug)]
pub struct IdentifyArgs {
    /// Application page URL
    pub url: String,
}

#[derive(Serialize)]
struct IdentifyReport {
    url: String,
    platform: String,
    matched: bool,
    container: Option<String>,
    catalog: String,
    degraded: bool,
}

pub async fn cmd_identify(args: IdentifyArgs, ctx: &CliContext) -> Result<()> {
    let url = parse_url(&args.url)?;
    let library = ctx.library()?;
    let profile = library.identify(url.as_str());

    let report = IdentifyReport {
        url: url.to_string(),
        platform: profile
            .map(|p| p.identifier.clone())
            .unwrap_or_else(|| GENERIC_PLATFORM.to_string()),
        matched: profile.is_some(),
        container: profile.and_then(|p| p.container_path.clone()),
        catalog: match library.origin() {
            CatalogOrigin::Bundled => "bundled".to_string(),
            CatalogOrigin::File(path) => path.display().to_string(),
            CatalogOrigin::Fallback => "fallback".to_string(),
        },
        degraded: library.is_degraded(),
    };

    emit(ctx.output(), &report, |r| {
        let mut out = format!("Platform: {}", r.platform);
        if let Some(container) = &r.container {
            out.push_str(&format!("\nContainer: {container}"));
        }
        out.push_str(&format!("\nCatalog: {}", r.catalog));
        if r.degraded {
            out.push_str(" (degraded, generic rules only)");
        }
        out
    })
}
