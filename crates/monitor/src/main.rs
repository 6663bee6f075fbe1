/// QOS 行情监控
///
/// 连接行情服务，订阅配置中的品种并输出推送，Ctrl-C 退出

use client::{ConnectionEvent, PushCategory, PushData, WsClient};
use tracing::{info, warn};

mod config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;

    // 初始化日志
    // 可以通过环境变量 RUST_LOG 覆盖配置中的日志级别，例如：
    // RUST_LOG=client=debug qos-monitor
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    info!("🚀 启动 QOS 行情监控...");

    let codes = cfg.code_list();
    if codes.is_empty() {
        anyhow::bail!("QOS_CODES 没有有效的品种代码");
    }

    let client = WsClient::new(cfg.client_config());

    // 注册推送回调
    client.on(PushCategory::Snapshot, |data| async move { log_push(data) }).await;
    client.on(PushCategory::Trade, |data| async move { log_push(data) }).await;
    client.on(PushCategory::Depth, |data| async move { log_push(data) }).await;

    // 输出连接事件
    let mut events = client.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ConnectionEvent::Connected(g) => info!("✅ 已连接: generation={}", g),
                ConnectionEvent::Disconnected(g) => warn!("连接断开: generation={}", g),
                ConnectionEvent::Reconnected(g) => info!("✅ 已重连: generation={}", g),
            }
        }
    });

    client.connect().await?;
    info!("🎯 连接到行情服务: {}", cfg.ws_url);

    for instrument in client.request_instrument_info(&codes).await? {
        info!(
            "📌 {} {} 交易所={} 币种={}",
            instrument.code,
            instrument.name_en.as_deref().unwrap_or("-"),
            instrument.exchange.as_deref().unwrap_or("-"),
            instrument.trade_currency.as_deref().unwrap_or("-"),
        );
    }

    for chunk in codes.chunks(client.connection().config().max_sub_codes) {
        client.subscribe_snapshot(chunk).await?;
        client.subscribe_trades(chunk).await?;
        client.subscribe_depth(chunk).await?;
    }
    info!("📊 已订阅 {} 个品种，按 Ctrl-C 退出", codes.len());

    tokio::signal::ctrl_c().await?;
    info!("正在退出...");
    client.disconnect().await;

    Ok(())
}

fn log_push(data: PushData) -> anyhow::Result<()> {
    match &data {
        PushData::Snapshot(s) => info!(
            "[快照] {} 最新={} 开={} 高={} 低={} 量={}",
            s.code, s.last_price, s.open, s.high, s.low, s.volume
        ),
        PushData::Trade(t) => info!(
            "[逐笔] {} 价={} 量={} 方向={:?}",
            t.code,
            t.price,
            t.volume,
            t.trade_direction()
        ),
        PushData::Depth(d) => info!(
            "[盘口] {} 买一={} 卖一={}",
            d.code,
            d.best_bid().map(|l| l.price.as_str()).unwrap_or("-"),
            d.best_ask().map(|l| l.price.as_str()).unwrap_or("-"),
        ),
        PushData::KLine(k) => info!("[K线] {} 收={} ts={}", k.code, k.close, k.timestamp),
    }
    Ok(())
}
