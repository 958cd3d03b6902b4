//! # API 网关
//!
//! 服务入口：初始化日志 → 加载配置 → 装配网关 → 开始服务。

use api_gateway::logging::{LogComponent, LogStage};
use api_gateway::{linfo, lerror};

#[tokio::main]
async fn main() -> api_gateway::Result<()> {
    api_gateway::logging::init_logging();

    let config = match api_gateway::config::load_config() {
        Ok(config) => config,
        Err(e) => {
            lerror!(
                "system",
                LogStage::Configuration,
                LogComponent::Main,
                "config_load_failed",
                &format!("配置加载失败: {e}")
            );
            return Err(e);
        }
    };

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "starting",
        &format!(
            "API 网关启动，端口 {}，上游 {} 个",
            config.serve.port,
            config.serve.upstreams.len()
        )
    );

    api_gateway::server::run(config).await
}
