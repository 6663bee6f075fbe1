/// WebSocket 行情客户端
///
/// 面向调用方的接口：每种请求一个方法，订阅前校验品种数量

use common::constants::KLineType;
use common::models::{InstrumentInfo, KLine, MarketDepth, QuoteSnapshot, TradeTick};
use common::utils::{parse_klines, parse_records, validate_codes};
use common::{PushCategory, PushData, RequestKind, Result, WsRequest};
use serde_json::Value;
use std::future::Future;
use tokio::sync::broadcast;
use tracing::info;

use super::connection::{ClientState, ConnectionEvent, ConnectionManager};
use super::registry::{callback, PushCallback};
use super::subscriptions::Subscription;
use crate::config::ClientConfig;

/// WebSocket 行情客户端
#[derive(Clone)]
pub struct WsClient {
    manager: ConnectionManager,
}

impl WsClient {
    /// 创建客户端，首次调用网络接口时才建立连接
    pub fn new(config: ClientConfig) -> Self {
        Self {
            manager: ConnectionManager::new(config),
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.manager
    }

    /// 建立连接
    pub async fn connect(&self) -> Result<()> {
        self.manager.connect().await
    }

    /// 断开连接
    pub async fn disconnect(&self) {
        self.manager.disconnect().await
    }

    /// 发送心跳
    pub async fn heartbeat(&self) -> Result<()> {
        self.manager.heartbeat().await
    }

    /// 注册推送回调
    ///
    /// `category` 可以是名称（`snapshot` / `trade` / `depth` / `kline`）或协议标签（`S` / `T` / `D` / `K`）
    ///
    /// 回调在分发任务中按顺序执行，响应也由同一任务唤醒。回调内直接等待
    /// `request_*` 会阻塞到请求超时，需要发请求时用 `tokio::spawn` 放到独立任务中
    pub async fn register(&self, category: &str, callback: PushCallback) -> Result<()> {
        self.manager.registry().register(category, callback).await
    }

    /// 以异步闭包注册推送回调，执行方式同 [`WsClient::register`]
    pub async fn on<F, Fut>(&self, category: PushCategory, f: F)
    where
        F: Fn(PushData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.manager
            .registry()
            .register_category(category, callback(f))
            .await
    }

    pub async fn state(&self) -> ClientState {
        self.manager.state().await
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.manager.events()
    }

    pub fn pending_count(&self) -> usize {
        self.manager.pending_count()
    }

    pub fn reconnect_count(&self) -> u64 {
        self.manager.reconnect_count()
    }

    /// 当前生效的订阅
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.manager.book().snapshot().await
    }

    /// 发送请求并取出响应数据
    async fn request(&self, request: WsRequest) -> Result<Option<Value>> {
        let response = self.manager.send_correlated(request).await?;
        response.into_data()
    }

    /// 订阅类请求：先校验品种数量，成功后记入订阅记录
    async fn subscribe(&self, request: WsRequest) -> Result<()> {
        if let Some(codes) = &request.codes {
            validate_codes(codes, self.manager.config().max_sub_codes)?;
        }
        self.change_subscription(request).await
    }

    async fn change_subscription(&self, request: WsRequest) -> Result<()> {
        let kind = request.kind;
        self.request(request.clone()).await?;
        self.manager.book().apply(&request).await;
        info!("订阅变更成功: type={}, codes={:?}", kind.as_str(), request.codes.unwrap_or_default());
        Ok(())
    }

    /// 订阅实时快照
    pub async fn subscribe_snapshot(&self, codes: &[String]) -> Result<()> {
        self.subscribe(WsRequest::with_codes(RequestKind::Snapshot, codes)).await
    }

    /// 取消订阅实时快照
    pub async fn unsubscribe_snapshot(&self, codes: &[String]) -> Result<()> {
        self.change_subscription(WsRequest::with_codes(RequestKind::SnapshotCancel, codes))
            .await
    }

    /// 订阅逐笔成交
    pub async fn subscribe_trades(&self, codes: &[String]) -> Result<()> {
        self.subscribe(WsRequest::with_codes(RequestKind::Trade, codes)).await
    }

    /// 取消订阅逐笔成交
    pub async fn unsubscribe_trades(&self, codes: &[String]) -> Result<()> {
        self.change_subscription(WsRequest::with_codes(RequestKind::TradeCancel, codes))
            .await
    }

    /// 订阅盘口
    pub async fn subscribe_depth(&self, codes: &[String]) -> Result<()> {
        self.subscribe(WsRequest::with_codes(RequestKind::Depth, codes)).await
    }

    /// 取消订阅盘口
    pub async fn unsubscribe_depth(&self, codes: &[String]) -> Result<()> {
        self.change_subscription(WsRequest::with_codes(RequestKind::DepthCancel, codes))
            .await
    }

    /// 订阅K线
    pub async fn subscribe_kline(&self, codes: &[String], ktype: KLineType) -> Result<()> {
        self.subscribe(WsRequest::kline_subscription(RequestKind::KLine, codes, ktype))
            .await
    }

    /// 取消订阅K线
    pub async fn unsubscribe_kline(&self, codes: &[String], ktype: KLineType) -> Result<()> {
        self.change_subscription(WsRequest::kline_subscription(
            RequestKind::KLineCancel,
            codes,
            ktype,
        ))
        .await
    }

    /// 请求实时快照
    pub async fn request_snapshot(&self, codes: &[String]) -> Result<Vec<QuoteSnapshot>> {
        let data = self
            .request(WsRequest::with_codes(RequestKind::ReqSnapshot, codes))
            .await?;
        parse_records(data)
    }

    /// 请求逐笔成交，`count` 超过 50 时按 50 处理
    pub async fn request_trades(&self, codes: &[String], count: u32) -> Result<Vec<TradeTick>> {
        let data = self.request(WsRequest::trades(codes, count)).await?;
        parse_records(data)
    }

    /// 请求盘口
    pub async fn request_depth(&self, codes: &[String]) -> Result<Vec<MarketDepth>> {
        let data = self
            .request(WsRequest::with_codes(RequestKind::ReqDepth, codes))
            .await?;
        parse_records(data)
    }

    /// 请求K线
    pub async fn request_kline(
        &self,
        codes: &[String],
        ktype: KLineType,
        count: u32,
    ) -> Result<Vec<KLine>> {
        let data = self.request(WsRequest::kline(codes, ktype, count)).await?;
        parse_klines(data)
    }

    /// 请求历史K线，`end_time` 为秒级时间戳
    pub async fn request_history_kline(
        &self,
        codes: &[String],
        ktype: KLineType,
        end_time: i64,
        count: u32,
    ) -> Result<Vec<KLine>> {
        let data = self
            .request(WsRequest::history_kline(codes, ktype, end_time, count))
            .await?;
        parse_klines(data)
    }

    /// 请求品种基础信息
    pub async fn request_instrument_info(&self, codes: &[String]) -> Result<Vec<InstrumentInfo>> {
        let data = self
            .request(WsRequest::with_codes(RequestKind::ReqInfo, codes))
            .await?;
        parse_records(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Error;

    #[tokio::test]
    async fn test_subscription_limit_checked_before_connect() {
        // 地址不可达：若校验前尝试连接，会得到连接错误而不是数量错误
        let config = ClientConfig::new("k")
            .with_ws_url("ws://127.0.0.1:1/ws")
            .with_max_sub_codes(2);
        let client = WsClient::new(config);
        let codes: Vec<String> = ["A.US", "B.US", "C.US"].iter().map(|c| c.to_string()).collect();

        let err = client.subscribe_snapshot(&codes).await.unwrap_err();
        assert!(matches!(err, Error::SubscriptionLimit { count: 3, max: 2 }));

        let err = client.subscribe_kline(&codes, KLineType::Min1).await.unwrap_err();
        assert!(matches!(err, Error::SubscriptionLimit { .. }));

        assert_eq!(client.state().await, ClientState::Disconnected);
        assert_eq!(client.connection().generation(), 0);
    }

    #[tokio::test]
    async fn test_register_rejects_unknown_category() {
        let client = WsClient::new(ClientConfig::new("k"));
        let cb = callback(|_| async { Ok::<(), anyhow::Error>(()) });
        assert!(matches!(
            client.register("orderbook", cb.clone()).await,
            Err(Error::UnsupportedCategory(_))
        ));
        client.register("kline", cb).await.unwrap();
        assert_eq!(
            client
                .connection()
                .registry()
                .callback_count(PushCategory::KLine)
                .await,
            1
        );
    }
}
