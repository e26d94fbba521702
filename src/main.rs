use clap::Parser;
use sbml2dae::utils::error::ConvertError;
use sbml2dae::utils::{logger, validation::Validate};
use sbml2dae::{CliConfig, ConvertEngine, ConvertPipeline, LocalStorage};

fn fail(stage: &str, e: &ConvertError) -> ! {
    tracing::error!(
        "{} failed: {} (Category: {:?}, Severity: {:?})",
        stage,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    std::process::exit(e.exit_code().unwrap_or(1));
}

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting sbml2dae {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("CLI config: {:?}", cli);

    let config = match cli.resolve().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => fail("Configuration", &e),
    };

    // Relative paths resolve against the working directory.
    let storage = LocalStorage::new(String::new());
    let engine = ConvertEngine::new(ConvertPipeline::new(storage, config));

    if cli.dry_run {
        tracing::info!("Dry run: no files will be written");
        match engine.build().await {
            Ok(model) => {
                println!("Model '{}'", model.name);
                for state in &model.states {
                    println!(
                        "  {:<24} {:<10} {}",
                        state.id,
                        state.state_type.as_str(),
                        state.equation
                    );
                }
                println!("  {} parameters", model.parameters.len());
            }
            Err(e) => fail("Conversion", &e),
        }
        return;
    }

    match engine.run().await {
        Ok(report) => {
            tracing::info!(
                "Converted '{}' in {:?}",
                report.model_name,
                report.elapsed
            );
            println!(
                "✅ {}: {} ODE, {} algebraic, {} assignment states, {} parameters",
                report.model_name,
                report.ode_states,
                report.algebraic_states,
                report.assignment_states,
                report.parameters
            );
            for file in &report.files {
                println!("📁 {}", file);
            }
        }
        Err(e) => fail("Conversion", &e),
    }
}
