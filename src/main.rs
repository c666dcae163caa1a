use clap::Parser;
use tokio_util::sync::CancellationToken;

use javarun::config::CliArgs;
use javarun::pipeline::Pipeline;
use javarun::sandbox::ArtifactStore;
use javarun::sandbox::reaper::{reaper, sweep};
use javarun::web_server::build_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().expect("Failed to load configuration");

    let scratch_dir = config
        .scratch
        .resolve_dir()
        .expect("Failed to resolve scratch directory");
    let store = ArtifactStore::open(&scratch_dir).expect("Failed to open scratch directory");
    log::info!("Using scratch directory {}", scratch_dir.display());

    // Leftovers from a previous run that crashed mid-request
    match sweep(&scratch_dir, config.scratch.max_age()) {
        Ok(n) => log::info!("Startup sweep removed {n} stale artifact(s)"),
        Err(e) => log::warn!("Startup sweep failed: {e:#}"),
    }

    log::warn!(
        "Submissions run as the service user; the pattern filter is not a sandbox, \
         run this behind an OS-level jail"
    );

    let shutdown_token = CancellationToken::new();
    let pipeline = Pipeline::new(&config, store);

    // ======= PREPARATION END, EXECUTION START =======

    let reaper_task = tokio::spawn(reaper(
        scratch_dir,
        config.scratch.sweep_interval(),
        config.scratch.max_age(),
        shutdown_token.clone(),
    ));

    let server = build_server(config.server, pipeline)?;
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    // ===== EXECUTION END, WAITING FOR SHUTDOWN ======

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
    }

    // 1. Shutdown actix-web server gracefully
    server_handle.stop(true).await;

    // 2. Stop the reaper
    shutdown_token.cancel();
    match reaper_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("Reaper finished with error: {e:#}"),
        Err(e) => log::error!("Reaper handle failed: {e:?}"),
    }

    log::info!("Shutdown complete");
    Ok(())
}
