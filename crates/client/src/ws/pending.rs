/// 请求关联器
///
/// 分配请求 ID，登记等待响应的请求，按 `reqid` 唤醒或超时清理

use common::constants::REQID_MODULUS;
use common::{Error, Result, WsResponse};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// 响应等待器
type ResponseWaiter = oneshot::Sender<Result<WsResponse>>;

struct Entry {
    /// 登记令牌，防止 ID 复用后被旧的等待方误删
    token: u64,
    waiter: ResponseWaiter,
}

struct Inner {
    counter: u32,
    next_token: u64,
    entries: HashMap<u32, Entry>,
}

/// 待响应请求表
pub struct PendingRequests {
    modulus: u32,
    inner: Mutex<Inner>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::with_modulus(REQID_MODULUS)
    }

    /// 指定 ID 取模基数，ID 取值范围为 `1..modulus`
    pub fn with_modulus(modulus: u32) -> Self {
        Self {
            modulus: modulus.max(2),
            inner: Mutex::new(Inner {
                counter: 0,
                next_token: 0,
                entries: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 分配下一个请求 ID 并登记等待器
    ///
    /// 仍在等待中的 ID 会被跳过；全部占满时返回 `TooManyPending`
    pub fn register(self: &Arc<Self>) -> Result<PendingRequest> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.lock();

        let capacity = self.modulus - 1;
        let mut reqid = None;
        for _ in 0..capacity {
            inner.counter = if inner.counter + 1 >= self.modulus {
                1
            } else {
                inner.counter + 1
            };
            if !inner.entries.contains_key(&inner.counter) {
                reqid = Some(inner.counter);
                break;
            }
        }
        let reqid = reqid.ok_or(Error::TooManyPending(inner.entries.len()))?;

        inner.next_token += 1;
        let token = inner.next_token;
        inner.entries.insert(reqid, Entry { token, waiter: tx });

        Ok(PendingRequest {
            reqid,
            token,
            rx,
            owner: self.clone(),
        })
    }

    /// 用响应唤醒对应的等待方，没有匹配的请求时返回 false
    pub fn resolve(&self, response: WsResponse) -> bool {
        let entry = self.lock().entries.remove(&response.reqid);
        match entry {
            Some(entry) => {
                let reqid = response.reqid;
                if entry.waiter.send(Ok(response)).is_err() {
                    debug!("等待方已放弃请求: reqid={}", reqid);
                }
                true
            }
            None => false,
        }
    }

    /// 是否存在等待中的请求
    pub fn contains(&self, reqid: u32) -> bool {
        self.lock().entries.contains_key(&reqid)
    }

    /// 以 `ConnectionClosed` 结束所有等待中的请求，返回结束的数量
    pub fn fail_all(&self) -> usize {
        let drained: Vec<(u32, Entry)> = self.lock().entries.drain().collect();
        let count = drained.len();
        for (reqid, entry) in drained {
            debug!("清理待响应请求: reqid={}", reqid);
            let _ = entry.waiter.send(Err(Error::ConnectionClosed));
        }
        count
    }

    /// 待响应请求数量
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, reqid: u32, token: u64) {
        let mut inner = self.lock();
        if inner.entries.get(&reqid).is_some_and(|e| e.token == token) {
            inner.entries.remove(&reqid);
        }
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

/// 一次已登记的关联请求
///
/// 被丢弃时自动从请求表中移除自己的登记
pub struct PendingRequest {
    reqid: u32,
    token: u64,
    rx: oneshot::Receiver<Result<WsResponse>>,
    owner: Arc<PendingRequests>,
}

impl PendingRequest {
    pub fn reqid(&self) -> u32 {
        self.reqid
    }

    /// 等待响应，超时后移除登记并返回 `RequestTimeout`
    pub async fn wait(mut self, timeout: Duration) -> Result<WsResponse> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.owner.remove(self.reqid, self.token);
                Err(Error::RequestTimeout {
                    reqid: self.reqid,
                    timeout,
                })
            }
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.owner.remove(self.reqid, self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(reqid: u32) -> WsResponse {
        serde_json::from_value(serde_json::json!({"reqid": reqid, "data": [reqid]})).unwrap()
    }

    #[test]
    fn test_ids_start_at_one_and_wrap() {
        let pending = Arc::new(PendingRequests::with_modulus(4));
        let ids: Vec<u32> = (0..6)
            .map(|_| pending.register().unwrap().reqid())
            .collect();
        // 每次登记后立即丢弃，ID 按 1..4 循环
        assert_eq!(ids, vec![1, 2, 3, 1, 2, 3]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pending_ids_are_skipped() {
        let pending = Arc::new(PendingRequests::with_modulus(4));
        let first = pending.register().unwrap();
        let second = pending.register().unwrap();
        let third = pending.register().unwrap();
        assert_eq!((first.reqid(), second.reqid(), third.reqid()), (1, 2, 3));

        assert!(matches!(pending.register(), Err(Error::TooManyPending(3))));

        drop(second);
        let reused = pending.register().unwrap();
        assert_eq!(reused.reqid(), 2);
        assert_eq!(pending.len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_delivers_matching_response() {
        let pending = Arc::new(PendingRequests::new());
        let a = pending.register().unwrap();
        let b = pending.register().unwrap();

        assert!(pending.resolve(response(b.reqid())));
        assert!(!pending.resolve(response(9999)));

        let resp = b.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(resp.reqid, 2);
        assert_eq!(pending.len(), 1);
        assert!(pending.contains(a.reqid()));
    }

    #[tokio::test]
    async fn test_timeout_removes_entry() {
        let pending = Arc::new(PendingRequests::with_modulus(3));
        let req = pending.register().unwrap();
        let reqid = req.reqid();

        match req.wait(Duration::from_millis(20)).await {
            Err(Error::RequestTimeout { reqid: id, .. }) => assert_eq!(id, reqid),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(pending.is_empty());

        // 回绕后复用同一个 ID 不会冲突
        let _next = pending.register().unwrap();
        let again = pending.register().unwrap();
        assert_eq!(again.reqid(), reqid);
        assert!(pending.resolve(response(reqid)));
        assert_eq!(again.wait(Duration::from_secs(1)).await.unwrap().reqid, reqid);
    }

    #[tokio::test]
    async fn test_fail_all() {
        let pending = Arc::new(PendingRequests::new());
        let a = pending.register().unwrap();
        let b = pending.register().unwrap();

        assert_eq!(pending.fail_all(), 2);
        assert!(pending.is_empty());
        assert!(matches!(
            a.wait(Duration::from_secs(1)).await,
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            b.wait(Duration::from_secs(1)).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_stale_guard_does_not_remove_reused_id() {
        let pending = Arc::new(PendingRequests::with_modulus(2));
        let old = pending.register().unwrap();
        assert_eq!(old.reqid(), 1);

        // 模拟旧请求已被响应移除，之后同一 ID 被重新登记
        assert!(pending.resolve(response(1)));
        let fresh = pending.register().unwrap();
        assert_eq!(fresh.reqid(), 1);

        drop(old);
        assert!(pending.contains(1));
        drop(fresh);
        assert!(pending.is_empty());
    }
}
