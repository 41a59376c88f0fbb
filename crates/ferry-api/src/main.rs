use ferry_core::Config;

// Use mimalloc as the global allocator for lower fragmentation under many
// concurrent chunk buffers, especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = ferry_api::setup::initialize_app(config.clone()).await?;

    ferry_api::setup::server::start_server(&config, app).await?;

    Ok(())
}
