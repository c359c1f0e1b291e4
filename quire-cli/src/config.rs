use std::path::Path;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches};
use config::{Config as ConfigBuilder, Environment, File};
use quire_core::config::Config;

pub const DEFAULT_CONFIG_FILE: &str = "./quire.toml";

/// Flags accepted by every subcommand, mapped to the config key they override.
const OVERRIDES: &[(&str, &str, &str)] = &[
    ("content", "paths.content", "Directory holding the markdown posts"),
    ("templates", "paths.templates", "Directory holding module and shell templates"),
    ("generated", "paths.generated", "Where generated modules are written"),
    ("dist", "paths.dist", "Where pre-rendered pages are written"),
    ("public", "paths.public", "Where sitemap.xml is written"),
    ("base-url", "site.base_url", "Absolute URL the site is served from"),
];

pub fn global_args() -> Vec<Arg> {
    let mut args = vec![
        Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("Configuration file")
            .default_value(DEFAULT_CONFIG_FILE)
            .global(true),
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .help("Only print errors")
            .action(ArgAction::SetTrue)
            .global(true),
    ];

    for (name, _, help) in OVERRIDES {
        let value_name = if *name == "base-url" { "URL" } else { "DIR" };
        args.push(
            Arg::new(*name)
                .long(*name)
                .value_name(value_name)
                .help(*help)
                .global(true),
        );
    }
    args
}

/// Load configuration with cascading precedence:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (`QUIRE_SITE__BASE_URL` and friends)
/// 3. Configuration file, if present
/// 4. Defaults (lowest priority)
pub fn load_config(args: &ArgMatches) -> Result<Config> {
    let config_file = args
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_FILE);

    let mut builder = ConfigBuilder::builder()
        .add_source(ConfigBuilder::try_from(&Config::default())?);

    let path = Path::new(config_file);
    if path.exists() {
        builder = builder.add_source(File::from(path));
    } else {
        log::debug!(target: "config", "{} not found, using defaults", path.display());
    }

    builder = builder.add_source(
        Environment::with_prefix("QUIRE")
            .prefix_separator("_")
            .separator("__"),
    );

    for (name, key, _) in OVERRIDES {
        if let Some(value) = args.try_get_one::<String>(name).unwrap_or(None) {
            builder = builder.set_override(*key, value.as_str())?;
        }
    }

    builder
        .build()?
        .try_deserialize()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}
