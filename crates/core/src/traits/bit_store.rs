use std::time::Duration;

use async_trait::async_trait;

use crate::FastgetsResult;

/// 共享位数组存储
///
/// 只暴露“测试并置位”这一个原子操作：调用方无法分开读、写，
/// 因此两个并发调用者不可能同时观察到同一组位“未设置”。
#[async_trait]
pub trait BitStore: Send + Sync {
    /// 将 `key` 上所有 `offsets` 处的位置为1，返回调用前这些位是否已全部为1。
    ///
    /// `ttl` 仅在位数组首次创建时生效；为 `None` 时永久保留。
    async fn test_and_set_bits(
        &self,
        key: &str,
        offsets: &[u64],
        ttl: Option<Duration>,
    ) -> FastgetsResult<bool>;
}
