use anyhow::Context;
use clap::Parser;
use sbml2dae::changelog::Changelog;
use sbml2dae::utils::error::ConvertError;
use sbml2dae::utils::logger;

#[derive(Parser)]
#[command(name = "changelog-lint")]
#[command(about = "Check a Keep a Changelog file")]
struct Args {
    /// Changelog to check
    #[arg(default_value = "CHANGELOG.md")]
    path: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let text = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path))?;
    let changelog = Changelog::parse(&text);
    tracing::debug!(
        "Parsed {} releases and {} links from {}",
        changelog.releases.len(),
        changelog.links.len(),
        args.path
    );

    match changelog.validate() {
        Ok(()) => {
            println!("{}: {} releases OK", args.path, changelog.releases.len());
            Ok(())
        }
        Err(ConvertError::ChangelogError { problems }) => {
            for problem in &problems {
                println!("{}: {}", args.path, problem);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
