//! Environment and plan self-check.
//!
//! Verifies the encoder toolchain is present, the work directory is
//! writable, and that every catalog template produces a consistent render
//! plan for a synthetic photo set.

use std::path::Path;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_engine::{allocate, build_plan, EngineConfig};
use reel_models::{catalog, EncodingOptions, PhotoOrigin, ResolvedPhoto};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::from_env();
    println!(
        "reel-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );

    ensure_workdir(&config.work_dir).await?;
    ensure_tool("ffmpeg")?;
    ensure_tool("ffprobe")?;
    check_catalog_plans()?;

    println!("reel-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}

fn ensure_tool(name: &str) -> anyhow::Result<()> {
    which::which(name).map_err(|_| anyhow::anyhow!("{} not available on PATH", name))?;
    Ok(())
}

fn check_catalog_plans() -> anyhow::Result<()> {
    let photos: Vec<ResolvedPhoto> = (0..4)
        .map(|i| ResolvedPhoto::new(format!("/tmp/selfcheck_{i}.jpg"), PhotoOrigin::Local, 0))
        .collect();

    for template in catalog::all() {
        let allocations = allocate(template, &photos)
            .map_err(|e| anyhow::anyhow!("allocation failed for {}: {}", template.id, e))?;
        let plan = build_plan(&allocations, &EncodingOptions::default(), None);

        let planned = plan.total_duration();
        let declared = template.total_duration();
        if (planned - declared).abs() > 1e-6 {
            return Err(anyhow::anyhow!(
                "template {} plans {}s but declares {}s",
                template.id,
                planned,
                declared
            ));
        }

        println!(
            "reel-selfcheck: template {} -> {} segments, {:.1}s",
            template.id,
            plan.segments.len(),
            planned
        );
    }

    Ok(())
}
