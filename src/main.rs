// src/main.rs

use podexec::{cli, config, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("podexec error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    let cfg = config::load_or_default(args.config.as_deref())?;
    logging::init_logging(
        args.log_level,
        cfg.logging.level,
        args.log_format.unwrap_or(cfg.logging.format),
    )?;
    run(args, cfg).await
}
