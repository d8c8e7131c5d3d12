use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;

#[derive(Args, Clone, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub action: ProfileAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ProfileAction {
    /// Show the cached profile summary
    Show,
    /// Fetch the profile from the service now
    Refresh,
    /// Drop the cached profile
    Invalidate,
}

#[derive(Serialize)]
struct ProfileSummary {
    cached: bool,
    name: Option<String>,
    email: Option<String>,
    skills: usize,
    years_experience: Option<f64>,
    synced: Option<String>,
    fresh: bool,
    content_hash: Option<String>,
}

pub async fn cmd_profile(args: ProfileArgs, ctx: &CliContext) -> Result<()> {
    let cache = ctx.profile_cache()?;
    let snapshot = match args.action {
        ProfileAction::Show => cache.cached().await?,
        ProfileAction::Refresh => Some(cache.ensure_fresh(true).await?),
        ProfileAction::Invalidate => {
            cache.invalidate().await?;
            println!("Profile cache cleared");
            return Ok(());
        }
    };

    let now = Utc::now();
    let summary = match snapshot {
        Some(snapshot) => {
            let age = (now - snapshot.last_synced_at).to_std().unwrap_or_default();
            ProfileSummary {
                cached: true,
                name: snapshot.full_name(),
                email: snapshot.email.clone(),
                skills: snapshot.skills.len(),
                years_experience: Some(snapshot.years_experience),
                synced: Some(format!(
                    "{} ago",
                    humantime::format_duration(std::time::Duration::from_secs(age.as_secs()))
                )),
                fresh: cache.is_fresh(&snapshot, now),
                content_hash: Some(snapshot.content_hash.chars().take(12).collect()),
            }
        }
        None => ProfileSummary {
            cached: false,
            name: None,
            email: None,
            skills: 0,
            years_experience: None,
            synced: None,
            fresh: false,
            content_hash: None,
        },
    };

    emit(ctx.output(), &summary, |s| {
        if !s.cached {
            return "No cached profile".to_string();
        }
        format!(
            "Profile: {}\nEmail: {}\nSkills: {}\nExperience: {} years\nSynced: {}{}\nHash: {}",
            s.name.as_deref().unwrap_or("-"),
            s.email.as_deref().unwrap_or("-"),
            s.skills,
            s.years_experience.unwrap_or_default(),
            s.synced.as_deref().unwrap_or("-"),
            if s.fresh { "" } else { " (stale)" },
            s.content_hash.as_deref().unwrap_or("-"),
        )
    })
}
