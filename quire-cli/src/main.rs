use anyhow::Result;
use clap::Command;

mod cmd {
    pub mod build;
    pub mod generate;
    pub mod prerender;
    pub mod sitemap;
}
mod config;
mod logging;

fn cli() -> Command {
    Command::new("quire")
        .about("Static generation for a markdown blog")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(config::global_args())
        .subcommand(cmd::generate::make_subcommand())
        .subcommand(cmd::sitemap::make_subcommand())
        .subcommand(cmd::prerender::make_subcommand())
        .subcommand(cmd::build::make_subcommand())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    logging::init_logging(matches.get_flag("quiet"));

    match matches.subcommand() {
        Some(("generate", args)) => cmd::generate::execute(args),
        Some(("sitemap", args)) => cmd::sitemap::execute(args),
        Some(("prerender", args)) => cmd::prerender::execute(args).await,
        Some(("build", args)) => cmd::build::execute(args).await,
        _ => unreachable!("clap requires a subcommand"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_global_flags_reach_subcommands() {
        let matches = cli()
            .try_get_matches_from(["quire", "build", "--quiet", "--base-url", "https://rhg.dev"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "build");
        assert!(args.get_flag("quiet"));
        assert_eq!(
            args.get_one::<String>("base-url").map(String::as_str),
            Some("https://rhg.dev")
        );
    }
}
