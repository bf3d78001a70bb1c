use std::path::Path;

use burnin_media::ExternalTool;
use burnin_storage::S3Store;
use burnin_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tool(&config.probe_program).await?;
    ensure_tool(&config.compositor_program).await?;
    ensure_env_present(&[
        "REDIS_URL",
        "PROJECT_ID",
        "QUEUE_TOPIC",
        "QUEUE_SUBSCRIPTION",
        "STORAGE_ENDPOINT_URL",
        "STORAGE_ACCESS_KEY_ID",
        "STORAGE_SECRET_ACCESS_KEY",
        "STORAGE_BUCKET",
    ])?;
    ensure_storage().await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

async fn ensure_tool(program: &str) -> anyhow::Result<()> {
    let output = ExternalTool::new(program)
        .run(["-version"])
        .await
        .map_err(|e| anyhow::anyhow!("{} not available: {}", program, e))?;

    if !output.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            program,
            output.exit_code
        ));
    }
    Ok(())
}

async fn ensure_storage() -> anyhow::Result<()> {
    let store = S3Store::from_env()?;
    store
        .check_connectivity()
        .await
        .map_err(|e| anyhow::anyhow!("storage not reachable: {}", e))?;
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
