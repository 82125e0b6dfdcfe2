use std::time::Duration;

use async_trait::async_trait;
use fastgets_core::traits::BitStore;
use fastgets_core::FastgetsResult;

use super::{storage_error, RedisStore};

#[async_trait]
impl BitStore for RedisStore {
    async fn test_and_set_bits(
        &self,
        key: &str,
        offsets: &[u64],
        ttl: Option<Duration>,
    ) -> FastgetsResult<bool> {
        let ttl_seconds = ttl.map(|ttl| ttl.as_secs().max(1)).unwrap_or(0);

        let mut invocation = self.scripts.test_and_set_bits.prepare_invoke();
        invocation.key(self.keys.bitmap(key)).arg(ttl_seconds);
        for offset in offsets {
            invocation.arg(*offset);
        }

        let mut conn = self.connection();
        let all_set: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error("bit test-and-set"))?;
        Ok(all_set == 1)
    }
}
