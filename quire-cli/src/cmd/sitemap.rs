use anyhow::Result;
use clap::{ArgMatches, Command};
use quire_core::store::DiskStore;
use quire_core::{Site, SiteBuilder};

use crate::config::load_config;

pub fn make_subcommand() -> Command {
    Command::new("sitemap").about("Write sitemap.xml listing every route")
}

pub fn run(site: &Site, store: &DiskStore) -> Result<()> {
    site.write_sitemap(store)?;
    Ok(())
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let store = DiskStore;
    let site = SiteBuilder::from_config(&config).build(&store)?;
    run(&site, &store)
}
