mod app;
mod cli;

use clap::Parser;
use cli::{Cli, Command, RunArgs};
use graxy_core::config::Config;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Run(args) => cmd_run(args),
        Command::CheckConfig(args) => cmd_check_config(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    // Peek at the config file for logging settings before the subscriber exists.
    let (to_file, log_dir) = Config::load(&args.config)
        .map(|c| (c.logging_to_file, c.log_dir))
        .unwrap_or((false, None));
    let _guard =
        graxy_core::lifecycle::logging::init_logging(&args.log_level, to_file, log_dir.as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let application = app::Application::build(&args)?;
        application.serve().await
    })
}

fn cmd_check_config(args: RunArgs) -> anyhow::Result<()> {
    let config = app::effective_config(&Config::load(&args.config)?, &args);

    println!("config:      {}", args.config);
    println!("listen:      {}:{}", config.host, config.port);
    println!("upstream:    {}", config.openai_base_url);
    println!("model:       {} (temperature {})", config.model, config.temperature);
    println!("cors origin: {}", config.cors.allow_origin);
    println!(
        "credential:  {}",
        if config.api_key().is_some() {
            "configured"
        } else {
            "MISSING (requests will fail with 500)"
        }
    );
    Ok(())
}
