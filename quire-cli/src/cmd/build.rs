use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgMatches, Command};
use log::info;
use quire_core::SiteBuilder;
use quire_core::store::DiskStore;

use super::{generate, prerender, sitemap};
use crate::config::load_config;
use crate::logging::{format_elapsed_time, print_title};

pub fn make_subcommand() -> Command {
    Command::new("build").about("Generate modules, write the sitemap and pre-render every page")
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let start = Instant::now();
    let config = load_config(args)?;
    let store = DiskStore;

    print_title("building site");
    let site = SiteBuilder::from_config(&config)
        .build(&store)
        .with_context(|| format!("failed to load {}", config.paths.content.display()))?;

    generate::run(&site, &store)?;
    sitemap::run(&site, &store)?;
    let pages = prerender::run(&site, &store).await?;

    info!(
        target: "build",
        "{} pages built in {}",
        pages,
        format_elapsed_time(start.elapsed())
    );
    Ok(())
}
