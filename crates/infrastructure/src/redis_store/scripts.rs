//! Lua scripts for the operations that must be atomic on the Redis side.

use redis::Script;

/// Pops the oldest queued id and marks it RUNNING. Ids whose hash is gone or
/// no longer QUEUED are discarded.
///
/// KEYS: queued zset. ARGV: task key prefix, instance index key, instance id, started_at.
const CLAIM_OLDEST: &str = r#"
while true do
  local popped = redis.call('ZPOPMIN', KEYS[1])
  if #popped == 0 then
    return false
  end
  local id = popped[1]
  local task_key = ARGV[1] .. id
  if redis.call('HGET', task_key, 'state') == 'QUEUED' then
    redis.call('HSET', task_key, 'state', 'RUNNING', 'instance_id', ARGV[3], 'started_at', ARGV[4])
    redis.call('ZADD', ARGV[2], popped[2], id)
    return redis.call('HGETALL', task_key)
  end
end
"#;

/// KEYS: task hash. ARGV: target state, finished_at, outcome field, outcome JSON.
const FINISH_TASK: &str = r#"
if redis.call('HGET', KEYS[1], 'state') ~= 'RUNNING' then
  return false
end
redis.call('HSET', KEYS[1], 'state', ARGV[1], 'finished_at', ARGV[2], ARGV[3], ARGV[4])
return redis.call('HGETALL', KEYS[1])
"#;

/// KEYS: job docs, job names. ARGV: id, name, JSON. Returns the replaced id.
const REPLACE_JOB: &str = r#"
local previous = redis.call('HGET', KEYS[2], ARGV[2])
if previous then
  redis.call('HDEL', KEYS[1], previous)
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
redis.call('HSET', KEYS[2], ARGV[2], ARGV[1])
return previous
"#;

/// KEYS: job docs, job names. ARGV: name.
const DELETE_JOB_BY_NAME: &str = r#"
local id = redis.call('HGET', KEYS[2], ARGV[1])
if not id then
  return 0
end
redis.call('HDEL', KEYS[2], ARGV[1])
redis.call('HDEL', KEYS[1], id)
return 1
"#;

/// KEYS: job docs, job names. ARGV: id.
const DELETE_JOB_BY_ID: &str = r#"
local doc = redis.call('HGET', KEYS[1], ARGV[1])
if not doc then
  return 0
end
local name = cjson.decode(doc)['name']
if redis.call('HGET', KEYS[2], name) == ARGV[1] then
  redis.call('HDEL', KEYS[2], name)
end
redis.call('HDEL', KEYS[1], ARGV[1])
return 1
"#;

/// KEYS: script log hash. ARGV: end_at, traceback JSON or empty.
/// Returns -1 when missing, 0 when already finished, 1 on success.
const FINISH_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
if redis.call('HSETNX', KEYS[1], 'end_at', ARGV[1]) == 0 then
  return 0
end
if ARGV[2] ~= '' then
  redis.call('HSET', KEYS[1], 'traceback', ARGV[2])
end
return 1
"#;

/// KEYS: bitmap. ARGV: ttl seconds (0 keeps forever), offsets...
/// Returns 1 when every bit was already set.
const TEST_AND_SET_BITS: &str = r#"
local existed = redis.call('EXISTS', KEYS[1])
local all_set = 1
for i = 2, #ARGV do
  if redis.call('SETBIT', KEYS[1], ARGV[i], 1) == 0 then
    all_set = 0
  end
end
local ttl = tonumber(ARGV[1])
if existed == 0 and ttl > 0 then
  redis.call('EXPIRE', KEYS[1], ttl)
end
return all_set
"#;

pub struct Scripts {
    pub claim_oldest: Script,
    pub finish_task: Script,
    pub replace_job: Script,
    pub delete_job_by_name: Script,
    pub delete_job_by_id: Script,
    pub finish_script: Script,
    pub test_and_set_bits: Script,
}

impl Scripts {
    pub fn load() -> Self {
        Self {
            claim_oldest: Script::new(CLAIM_OLDEST),
            finish_task: Script::new(FINISH_TASK),
            replace_job: Script::new(REPLACE_JOB),
            delete_job_by_name: Script::new(DELETE_JOB_BY_NAME),
            delete_job_by_id: Script::new(DELETE_JOB_BY_ID),
            finish_script: Script::new(FINISH_SCRIPT),
            test_and_set_bits: Script::new(TEST_AND_SET_BITS),
        }
    }
}
