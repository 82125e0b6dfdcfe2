use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use fastgets_core::config::DedupConfig;
use fastgets_core::traits::BitStore;
use fastgets_core::FastgetsResult;

/// Redis 单个位图最多 2^32 位
pub const MAX_BITS: u64 = 1 << 32;

/// 共享的布隆过滤器
///
/// 对外只提供 [`DedupFilter::contains_or_add`]：检查与写入在存储端一次完成，
/// 两个并发调用者不会同时得到“新键”。没有漏判，误判率由配置决定。
#[derive(Clone)]
pub struct DedupFilter {
    bits: Arc<dyn BitStore>,
    key: String,
    num_bits: u64,
    num_hashes: u32,
    ttl: Option<Duration>,
}

impl DedupFilter {
    pub fn new(bits: Arc<dyn BitStore>, config: &DedupConfig) -> Self {
        let (num_bits, num_hashes) = optimal_parameters(config.capacity, config.error_rate);
        debug!(
            "去重过滤器 {}: {} 位, {} 个哈希函数",
            config.key, num_bits, num_hashes
        );
        Self {
            bits,
            key: config.key.clone(),
            num_bits,
            num_hashes,
            ttl: config.ttl(),
        }
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// `true` 表示键已存在（应跳过），`false` 表示本次新加入。
    ///
    /// 存储不可达时返回错误，绝不把键当作新键。
    pub async fn contains_or_add(&self, key: &[u8]) -> FastgetsResult<bool> {
        let offsets = self.offsets(key);
        self.bits
            .test_and_set_bits(&self.key, &offsets, self.ttl)
            .await
    }

    /// Kirsch-Mitzenmacher 双重哈希：`h1 + i * h2 (mod m)`
    fn offsets(&self, key: &[u8]) -> Vec<u64> {
        let digest = Sha256::digest(key);
        let h1 = u64::from_be_bytes(digest_word(&digest, 0));
        // 步长为奇数，避免退化为同一个位置
        let h2 = u64::from_be_bytes(digest_word(&digest, 8)) | 1;

        (0..u64::from(self.num_hashes))
            .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits)
            .collect()
    }
}

fn digest_word(digest: &[u8], start: usize) -> [u8; 8] {
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[start..start + 8]);
    word
}

/// 根据容量与误判率计算位数与哈希函数个数
pub fn optimal_parameters(capacity: u64, error_rate: f64) -> (u64, u32) {
    let n = capacity.max(1) as f64;
    let ln2 = std::f64::consts::LN_2;

    let bits = (-n * error_rate.ln() / (ln2 * ln2)).ceil();
    let num_bits = (bits as u64).clamp(8, MAX_BITS);
    let num_hashes = ((num_bits as f64 / n) * ln2).round().max(1.0) as u32;

    (num_bits, num_hashes)
}

/// 去重键的十六进制 SHA-256 摘要，作为任务指纹保存
pub fn fingerprint(key: &[u8]) -> String {
    hex::encode(Sha256::digest(key))
}
