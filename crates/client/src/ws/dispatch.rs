/// 入站帧分发
///
/// 接收任务把解码后的帧按到达顺序放入队列，分发任务是队列的唯一消费者

use common::ws_rpc::PushFrame;
use common::{Frame, PushCategory, WsResponse};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::pending::PendingRequests;
use super::registry::SubscriptionRegistry;

/// 单个帧的路由结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// 心跳响应，直接丢弃
    Heartbeat,
    /// 唤醒了对应的关联请求
    Resolved(u32),
    /// 交给订阅注册表，附带成功投递次数
    Delivered(PushCategory, usize),
    /// 无法识别或没有匹配的请求
    Dropped,
}

/// 路由单个入站帧
///
/// 携带 `reqid` 的帧先尝试唤醒待响应请求，没有匹配时再按 `tp` 处理
pub async fn route(
    frame: Frame,
    pending: &PendingRequests,
    registry: &SubscriptionRegistry,
) -> Route {
    match frame {
        Frame::HeartbeatAck => Route::Heartbeat,
        Frame::Correlated { reqid, value } => {
            if pending.contains(reqid) && pending.resolve(WsResponse::from_value(reqid, &value)) {
                return Route::Resolved(reqid);
            }
            match Frame::uncorrelated(value) {
                Frame::Push(push) => deliver(push, registry).await,
                _ => {
                    debug!("未找到对应的待响应请求: reqid={}", reqid);
                    Route::Dropped
                }
            }
        }
        Frame::Push(push) => deliver(push, registry).await,
        Frame::Unknown(value) => {
            debug!("忽略无法识别的消息: {}", value);
            Route::Dropped
        }
    }
}

async fn deliver(push: PushFrame, registry: &SubscriptionRegistry) -> Route {
    match PushCategory::from_tag(&push.tp) {
        Some(category) => {
            let delivered = registry.dispatch(category, push.data).await;
            Route::Delivered(category, delivered)
        }
        None => {
            debug!("忽略未知推送类型: tp={}", push.tp);
            Route::Dropped
        }
    }
}

/// 分发任务：逐帧处理直到接收任务关闭队列
pub(crate) async fn run(
    mut frames: mpsc::UnboundedReceiver<Frame>,
    pending: Arc<PendingRequests>,
    registry: Arc<SubscriptionRegistry>,
) {
    while let Some(frame) = frames.recv().await {
        route(frame, &pending, &registry).await;
    }
    debug!("分发任务结束");
}
