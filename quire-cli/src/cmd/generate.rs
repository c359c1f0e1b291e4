use anyhow::Result;
use clap::{ArgMatches, Command};
use log::info;
use quire_core::store::DiskStore;
use quire_core::{Site, SiteBuilder};

use crate::config::load_config;

pub fn make_subcommand() -> Command {
    Command::new("generate").about("Write one module per post plus the index modules")
}

pub fn run(site: &Site, store: &DiskStore) -> Result<usize> {
    let written = site.generate_modules(store)?;
    info!(target: "generate", "{} modules written", written.len());
    Ok(written.len())
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let store = DiskStore;
    let site = SiteBuilder::from_config(&config).build(&store)?;
    run(&site, &store)?;
    Ok(())
}
