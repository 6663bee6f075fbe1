/// 当前生效的订阅记录
///
/// 订阅成功后记入，取消订阅后移除，重连后据此恢复订阅

use common::{RequestKind, WsRequest};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SubscriptionKey {
    kind: RequestKind,
    kt: Option<u32>,
}

/// 一类订阅及其品种
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// 订阅请求类型（`S` / `T` / `D` / `K`）
    pub kind: RequestKind,
    /// K线周期，仅 K线订阅有值
    pub kline_type: Option<u32>,
    pub codes: Vec<String>,
}

#[derive(Default)]
pub struct SubscriptionBook {
    entries: RwLock<HashMap<SubscriptionKey, BTreeSet<String>>>,
}

impl SubscriptionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功的订阅或取消订阅
    pub async fn apply(&self, request: &WsRequest) {
        let codes = match &request.codes {
            Some(codes) => codes,
            None => return,
        };

        let mut entries = self.entries.write().await;
        if request.kind.is_subscribe() {
            let key = SubscriptionKey {
                kind: request.kind,
                kt: request.kt,
            };
            entries.entry(key).or_default().extend(codes.iter().cloned());
        } else if let Some(kind) = subscribe_kind_of(request.kind) {
            let key = SubscriptionKey { kind, kt: request.kt };
            if let Some(set) = entries.get_mut(&key) {
                for code in codes {
                    set.remove(code);
                }
                if set.is_empty() {
                    entries.remove(&key);
                }
            }
        }
    }

    /// 重新订阅所需的请求，每个请求最多 `max_codes` 个品种
    pub async fn resubscribe_requests(&self, max_codes: usize) -> Vec<WsRequest> {
        self.snapshot()
            .await
            .into_iter()
            .flat_map(|sub| {
                sub.codes
                    .chunks(max_codes.max(1))
                    .map(|chunk| {
                        let mut request = WsRequest::with_codes(sub.kind, chunk);
                        request.kt = sub.kline_type;
                        request
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// 按请求类型排序的订阅列表
    pub async fn snapshot(&self) -> Vec<Subscription> {
        let entries = self.entries.read().await;
        let mut subs: Vec<Subscription> = entries
            .iter()
            .map(|(key, codes)| Subscription {
                kind: key.kind,
                kline_type: key.kt,
                codes: codes.iter().cloned().collect(),
            })
            .collect();
        subs.sort_by(|a, b| {
            (a.kind.as_str(), a.kline_type).cmp(&(b.kind.as_str(), b.kline_type))
        });
        subs
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn subscribe_kind_of(cancel: RequestKind) -> Option<RequestKind> {
    [
        RequestKind::Snapshot,
        RequestKind::Trade,
        RequestKind::Depth,
        RequestKind::KLine,
    ]
    .into_iter()
    .find(|kind| kind.cancel_kind() == Some(cancel))
}
