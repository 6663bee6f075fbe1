/// 推送订阅注册表
///
/// 按推送类型保存回调，注册顺序即投递顺序

use common::{PushCategory, PushData, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// 推送回调
pub type PushCallback =
    Arc<dyn Fn(PushData) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 推送订阅注册表
pub struct SubscriptionRegistry {
    callbacks: RwLock<HashMap<PushCategory, Vec<PushCallback>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        let callbacks = PushCategory::ALL
            .iter()
            .map(|category| (*category, Vec::new()))
            .collect();
        Self {
            callbacks: RwLock::new(callbacks),
        }
    }

    /// 按名称或协议标签注册回调，未知类型返回 `UnsupportedCategory`
    pub async fn register(&self, category: &str, callback: PushCallback) -> Result<()> {
        let category: PushCategory = category.parse()?;
        self.register_category(category, callback).await;
        Ok(())
    }

    pub async fn register_category(&self, category: PushCategory, callback: PushCallback) {
        let mut callbacks = self.callbacks.write().await;
        callbacks.entry(category).or_default().push(callback);
        debug!("注册推送回调: category={}", category);
    }

    /// 清除某一推送类型的全部回调，返回清除的数量
    pub async fn clear(&self, category: PushCategory) -> usize {
        let mut callbacks = self.callbacks.write().await;
        callbacks
            .get_mut(&category)
            .map(|list| std::mem::take(list).len())
            .unwrap_or(0)
    }

    pub async fn callback_count(&self, category: PushCategory) -> usize {
        let callbacks = self.callbacks.read().await;
        callbacks.get(&category).map(Vec::len).unwrap_or(0)
    }

    /// 将推送数据转换为对应模型并依次投递给回调
    ///
    /// 数组逐条投递；单条记录解析失败只跳过该记录。
    /// 回调返回错误或 panic 都只记录日志，不影响后续回调。
    /// 返回成功投递的次数
    pub async fn dispatch(&self, category: PushCategory, payload: Value) -> usize {
        // 复制一份回调列表，回调执行期间不持有锁
        let callbacks = {
            let callbacks = self.callbacks.read().await;
            callbacks.get(&category).cloned().unwrap_or_default()
        };
        if callbacks.is_empty() {
            debug!("没有注册的回调，丢弃推送: category={}", category);
            return 0;
        }

        let records = match payload {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };

        let mut delivered = 0;
        for raw in records {
            let data = match PushData::from_raw(category, raw) {
                Ok(data) => data,
                Err(e) => {
                    error!("解析推送数据失败: category={}, error={}", category, e);
                    continue;
                }
            };

            for callback in &callbacks {
                let call = AssertUnwindSafe(async { callback(data.clone()).await });
                match call.catch_unwind().await {
                    Ok(Ok(())) => delivered += 1,
                    Ok(Err(e)) => {
                        error!(
                            "推送回调执行失败: category={}, code={}, error={}",
                            category,
                            data.code(),
                            e
                        );
                    }
                    Err(_) => {
                        error!("推送回调 panic: category={}, code={}", category, data.code());
                    }
                }
            }
        }
        delivered
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 将异步闭包包装为 `PushCallback`
pub fn callback<F, Fut>(f: F) -> PushCallback
where
    F: Fn(PushData) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |data| f(data).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Error;
    use serde_json::json;
    use std::sync::Mutex;

    fn snapshot(code: &str) -> Value {
        json!({
            "c": code, "lp": "1", "o": "1", "h": "1", "l": "1",
            "ts": 1, "v": "1", "t": "1", "s": 0
        })
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> PushCallback {
        let log = log.clone();
        callback(move |data| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{}:{}", name, data.code()));
                Ok::<(), anyhow::Error>(())
            }
        })
    }

    #[tokio::test]
    async fn test_register_unknown_category() {
        let registry = SubscriptionRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = registry.register("news", recorder(&log, "a")).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedCategory(_)));
        for category in PushCategory::ALL {
            assert_eq!(registry.callback_count(category).await, 0);
        }
    }

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register("snapshot", recorder(&log, "first")).await.unwrap();
        registry.register("S", recorder(&log, "second")).await.unwrap();

        let delivered = registry
            .dispatch(PushCategory::Snapshot, json!([snapshot("AAPL.US"), snapshot("TSLA.US")]))
            .await;
        assert_eq!(delivered, 4);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:AAPL.US", "second:AAPL.US", "first:TSLA.US", "second:TSLA.US"]
        );
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_stop_others() {
        let registry = SubscriptionRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry
            .register_category(
                PushCategory::Snapshot,
                callback(|_| async { Err::<(), _>(anyhow::anyhow!("boom")) }),
            )
            .await;
        registry
            .register_category(
                PushCategory::Snapshot,
                callback(|data| async move {
                    if data.code().is_empty() {
                        return Ok::<(), anyhow::Error>(());
                    }
                    panic!("callback panicked")
                }),
            )
            .await;
        registry.register("snapshot", recorder(&log, "ok")).await.unwrap();

        let delivered = registry.dispatch(PushCategory::Snapshot, snapshot("AAPL.US")).await;
        assert_eq!(delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec!["ok:AAPL.US"]);
    }

    #[tokio::test]
    async fn test_bad_record_is_skipped() {
        let registry = SubscriptionRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register("snapshot", recorder(&log, "a")).await.unwrap();

        let delivered = registry
            .dispatch(PushCategory::Snapshot, json!([{"c": "BAD.US"}, snapshot("AAPL.US")]))
            .await;
        assert_eq!(delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec!["a:AAPL.US"]);
    }

    #[tokio::test]
    async fn test_clear_category() {
        let registry = SubscriptionRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register("depth", recorder(&log, "a")).await.unwrap();
        registry.register("depth", recorder(&log, "b")).await.unwrap();
        assert_eq!(registry.callback_count(PushCategory::Depth).await, 2);

        assert_eq!(registry.clear(PushCategory::Depth).await, 2);
        assert_eq!(registry.dispatch(PushCategory::Depth, json!([])).await, 0);
        assert!(log.lock().unwrap().is_empty());
    }
}
