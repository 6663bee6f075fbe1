/// 连接管理
///
/// 持有唯一的 WebSocket 连接，负责建立 / 断开连接、心跳、接收与断线重连

use common::ws_rpc::codec;
use common::{Error, Frame, Result, WsRequest, WsResponse};
use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dispatch;
use super::pending::PendingRequests;
use super::registry::SubscriptionRegistry;
use super::subscriptions::SubscriptionBook;
use crate::config::ClientConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 等待发送任务发出关闭帧的时间
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// 连接生命周期事件，携带连接代数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected(u64),
    Disconnected(u64),
    Reconnected(u64),
}

/// 一次已建立的连接
struct Link {
    generation: u64,
    /// 发送任务的消息通道
    outbound: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
}

/// 连接管理器
#[derive(Clone)]
pub struct ConnectionManager {
    config: Arc<ClientConfig>,

    /// 连接状态
    state: Arc<RwLock<ClientState>>,

    /// 当前连接，同时串行化 connect / disconnect
    link: Arc<Mutex<Option<Link>>>,

    /// 待响应请求
    pending: Arc<PendingRequests>,

    /// 推送回调
    registry: Arc<SubscriptionRegistry>,

    /// 生效中的订阅
    book: Arc<SubscriptionBook>,

    /// 为 false 时不再自动重连（显式断开后）
    auto_reconnect: Arc<AtomicBool>,

    generation: Arc<AtomicU64>,
    reconnects: Arc<AtomicU64>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig) -> Self {
        install_crypto_provider();
        let (events, _) = broadcast::channel(64);
        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(ClientState::Disconnected)),
            link: Arc::new(Mutex::new(None)),
            pending: Arc::new(PendingRequests::new()),
            registry: Arc::new(SubscriptionRegistry::new()),
            book: Arc::new(SubscriptionBook::new()),
            auto_reconnect: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            reconnects: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn book(&self) -> &Arc<SubscriptionBook> {
        &self.book
    }

    /// 获取当前状态
    pub async fn state(&self) -> ClientState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.is_some()
    }

    /// 订阅连接生命周期事件
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// 自动重连成功的次数
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// 当前连接代数，从未连接时为 0
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn set_state(&self, state: ClientState) {
        *self.state.write().await = state;
    }

    fn emit(&self, event: ConnectionEvent) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.events.send(event);
    }

    /// 建立连接，已连接时直接返回
    pub async fn connect(&self) -> Result<()> {
        self.auto_reconnect.store(true, Ordering::SeqCst);
        self.open(false).await.map(|_| ())
    }

    /// 建立连接并启动发送、接收、分发与心跳任务
    ///
    /// 返回新连接的代数；已连接或重连已被取消时返回 `None`
    async fn open(&self, reconnecting: bool) -> Result<Option<u64>> {
        let mut link = self.link.lock().await;
        if link.is_some() {
            return Ok(None);
        }
        if reconnecting && !self.auto_reconnect.load(Ordering::SeqCst) {
            debug!("连接已被显式断开，放弃重连");
            return Ok(None);
        }

        self.set_state(ClientState::Connecting).await;
        info!("尝试连接到行情服务: {}", self.config.ws_url);

        let url = self.config.connect_url();
        let connecting = connect_async(url.as_str());
        let ws_stream = match tokio::time::timeout(self.config.connect_timeout, connecting).await {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                self.set_state(ClientState::Disconnected).await;
                return Err(e.into());
            }
            Err(_) => {
                self.set_state(ClientState::Disconnected).await;
                return Err(Error::Connection(format!(
                    "连接超时: {:?}",
                    self.config.connect_timeout
                )));
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (ws_sender, ws_receiver) = ws_stream.split();
        let cancel = CancellationToken::new();

        // 发送任务是写端的唯一持有者
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(self.clone().write_loop(
            ws_sender,
            outbound_rx,
            cancel.clone(),
            generation,
        ));

        // 接收任务按到达顺序入队，分发任务逐帧路由
        let (frames_tx, frames_rx) = mpsc::unbounded_channel::<Frame>();
        tokio::spawn(dispatch::run(frames_rx, self.pending.clone(), self.registry.clone()));
        tokio::spawn(self.clone().receive_loop(ws_receiver, frames_tx, cancel.clone(), generation));

        tokio::spawn(heartbeat_loop(
            outbound.clone(),
            self.config.heartbeat_interval,
            cancel.clone(),
        ));

        *link = Some(Link {
            generation,
            outbound,
            cancel,
            writer,
        });
        self.set_state(ClientState::Connected).await;
        info!("✅ WebSocket 连接成功: generation={}", generation);
        self.emit(ConnectionEvent::Connected(generation));

        Ok(Some(generation))
    }

    /// 断开连接，任意状态下都可调用
    ///
    /// 停止所有任务、发送关闭帧，等待中的请求立即以 `ConnectionClosed` 结束，
    /// 同时停止正在进行的重连并清空订阅记录
    pub async fn disconnect(&self) {
        self.auto_reconnect.store(false, Ordering::SeqCst);
        self.teardown(None).await;
        self.book.clear().await;
    }

    /// 拆除连接；指定代数时只拆除该代连接
    async fn teardown(&self, generation: Option<u64>) -> bool {
        let mut guard = self.link.lock().await;
        let matches = match (guard.as_ref(), generation) {
            (Some(link), Some(g)) => link.generation == g,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return false;
        }
        let Some(link) = guard.take() else {
            return false;
        };

        self.set_state(ClientState::Closing).await;
        link.cancel.cancel();
        drop(link.outbound);
        if tokio::time::timeout(CLOSE_TIMEOUT, link.writer).await.is_err() {
            warn!("关闭连接超时: generation={}", link.generation);
        }

        let failed = self.pending.fail_all();
        if failed > 0 {
            warn!("连接断开，{} 个待响应请求已失败", failed);
        }

        self.set_state(ClientState::Disconnected).await;
        info!("连接已断开: generation={}", link.generation);
        self.emit(ConnectionEvent::Disconnected(link.generation));
        true
    }

    /// 重连：拆除旧连接，等待固定间隔后重新连接，失败则无限重试
    ///
    /// 接收任务与重连互相启动，这里返回装箱的 future
    fn reconnect(self, generation: u64) -> BoxFuture<'static, ()> {
        async move {
            if !self.teardown(Some(generation)).await {
                debug!("连接已被拆除，跳过重连: generation={}", generation);
                return;
            }

            let generation = loop {
                warn!("{:?} 后重新连接...", self.config.reconnect_interval);
                tokio::time::sleep(self.config.reconnect_interval).await;

                if !self.auto_reconnect.load(Ordering::SeqCst) {
                    debug!("重连已取消");
                    return;
                }

                match self.open(true).await {
                    Ok(Some(new_generation)) => {
                        self.reconnects.fetch_add(1, Ordering::SeqCst);
                        info!("✅ 重连成功: generation={}", new_generation);
                        self.emit(ConnectionEvent::Reconnected(new_generation));
                        break new_generation;
                    }
                    Ok(None) => {
                        if !self.auto_reconnect.load(Ordering::SeqCst) {
                            return;
                        }
                        debug!("连接已由其他调用恢复");
                        break self.generation();
                    }
                    Err(e) => {
                        error!("重连失败: {}", e);
                    }
                }
            };

            if self.config.resubscribe_on_reconnect {
                self.resubscribe(generation).await;
            }
        }
        .boxed()
    }

    /// 在指定代数的连接上按订阅记录重新发送订阅请求
    ///
    /// 不会建立新连接；显式断开或连接代数变化后立即停止
    async fn resubscribe(&self, generation: u64) {
        let requests = self.book.resubscribe_requests(self.config.max_sub_codes).await;
        if requests.is_empty() {
            return;
        }
        info!("恢复订阅: {} 个请求", requests.len());
        for request in requests {
            if !self.auto_reconnect.load(Ordering::SeqCst) || self.generation() != generation {
                debug!("连接已变化，停止恢复订阅: generation={}", generation);
                return;
            }
            let kind = request.kind;
            let result = self
                .exchange(Some(generation), request)
                .await
                .and_then(WsResponse::into_data);
            match result {
                Ok(_) => debug!("恢复订阅成功: type={}", kind.as_str()),
                Err(e) if e.is_transport() => {
                    warn!("连接已断开，停止恢复订阅: type={}, error={}", kind.as_str(), e);
                    return;
                }
                Err(e) => warn!("恢复订阅失败: type={}, error={}", kind.as_str(), e),
            }
        }
    }

    /// 连接异常中断：取消该代连接的任务并启动一次重连
    ///
    /// 接收与发送任务都可能触发，令牌已取消时不再重复
    fn connection_lost(&self, generation: u64, cancel: &CancellationToken, reason: &str) {
        if cancel.is_cancelled() {
            return;
        }
        cancel.cancel();
        warn!("连接中断: generation={}, reason={}", generation, reason);
        tokio::spawn(self.clone().reconnect(generation));
    }

    /// 接收任务：读取连接上的消息直到连接关闭
    ///
    /// 非显式断开导致的结束会触发一次重连
    async fn receive_loop(
        self,
        mut ws_receiver: SplitStream<WsStream>,
        frames: mpsc::UnboundedSender<Frame>,
        cancel: CancellationToken,
        generation: u64,
    ) {
        let reason = loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("接收任务结束: generation={}", generation);
                    return;
                }
                msg = ws_receiver.next() => msg,
            };

            match msg {
                Some(Ok(msg)) => match codec::decode(msg) {
                    Ok(Some(frame)) => {
                        if frames.send(frame).is_err() {
                            break "分发任务已退出".to_string();
                        }
                    }
                    Ok(None) => {}
                    Err(Error::ConnectionClosed) => break "服务端关闭连接".to_string(),
                    Err(e) => warn!("解析消息失败: {}", e),
                },
                Some(Err(e)) => break format!("接收消息错误: {}", e),
                None => break "连接已关闭".to_string(),
            }
        };
        drop(frames);
        self.connection_lost(generation, &cancel, &reason);
    }

    /// 发送任务：串行写出消息，结束时发送关闭帧
    ///
    /// 写入失败视为连接中断
    async fn write_loop(
        self,
        mut ws_sender: SplitSink<WsStream, Message>,
        mut outbound: mpsc::UnboundedReceiver<Message>,
        cancel: CancellationToken,
        generation: u64,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = outbound.recv() => match msg {
                    Some(msg) => {
                        if let Err(e) = ws_sender.send(msg).await {
                            error!("发送消息失败: {}", e);
                            let reason = format!("发送消息错误: {}", e);
                            self.connection_lost(generation, &cancel, &reason);
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        if let Err(e) = ws_sender.close().await {
            debug!("关闭连接: {}", e);
        }
        debug!("发送任务结束: generation={}", generation);
    }

    /// 发送一条不需要响应的消息
    pub async fn send(&self, request: &WsRequest) -> Result<()> {
        self.send_on(None, request).await
    }

    /// 写入当前连接；指定代数时连接必须仍是该代
    async fn send_on(&self, generation: Option<u64>, request: &WsRequest) -> Result<()> {
        let message = codec::encode(request)?;
        let link = self.link.lock().await;
        let link = link
            .as_ref()
            .filter(|link| generation.map_or(true, |g| link.generation == g))
            .ok_or(Error::ConnectionClosed)?;
        link.outbound
            .send(message)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// 发送心跳
    pub async fn heartbeat(&self) -> Result<()> {
        self.connect().await?;
        self.send(&WsRequest::heartbeat()).await
    }

    /// 发送关联请求并等待匹配的响应，未连接时先建立连接
    pub async fn send_correlated(&self, request: WsRequest) -> Result<WsResponse> {
        self.connect().await?;
        self.exchange(None, request).await
    }

    /// 登记、发送并等待响应，不会建立连接
    async fn exchange(
        &self,
        generation: Option<u64>,
        mut request: WsRequest,
    ) -> Result<WsResponse> {
        let waiter = self.pending.register()?;
        request.reqid = Some(waiter.reqid());
        debug!("发送请求: type={}, reqid={}", request.kind.as_str(), waiter.reqid());
        self.send_on(generation, &request).await?;

        waiter.wait(self.config.request_timeout).await
    }
}

/// 心跳任务：按固定间隔发送心跳，失败只记录日志
async fn heartbeat_loop(
    outbound: mpsc::UnboundedSender<Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let sent = codec::encode(&WsRequest::heartbeat())
                    .and_then(|msg| outbound.send(msg).map_err(|_| Error::ConnectionClosed));
                match sent {
                    Ok(()) => debug!("发送心跳"),
                    Err(e) => warn!("发送心跳失败: {}", e),
                }
            }
        }
    }
    debug!("心跳任务结束");
}

/// wss 连接需要进程级的 rustls 加密实现
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // 其他组件已安装时返回错误，沿用已安装的实现
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
