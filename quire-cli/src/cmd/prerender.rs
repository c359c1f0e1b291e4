use anyhow::Result;
use clap::{ArgMatches, Command};
use quire_core::store::DiskStore;
use quire_core::{Site, SiteBuilder};

use crate::config::load_config;

pub fn make_subcommand() -> Command {
    Command::new("prerender").about("Render every route into an index.html under the dist directory")
}

pub async fn run(site: &Site, store: &DiskStore) -> Result<usize> {
    let app = site.app(store)?;
    let written = site.prerender(store, app.as_ref()).await?;
    Ok(written.len())
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let store = DiskStore;
    let site = SiteBuilder::from_config(&config).build(&store)?;
    run(&site, &store).await?;
    Ok(())
}
