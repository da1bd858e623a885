use print_hub::{Config, Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 日志)
    setup_environment();

    print_banner();
    tracing::info!("🦀 Crab Print Hub starting...");

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 初始化状态 (数据库、渲染器、队列)
    let state = ServerState::initialize(&config)?;

    // 4. 启动 HTTP 服务器 (同时启动打印队列)
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
