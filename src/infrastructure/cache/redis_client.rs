// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use redis::AsyncCommands;

/// Redis客户端
///
/// 提供对Redis数据库的异步操作接口，供去重缓存与优先级队列共用
#[derive(Clone)]
pub struct RedisClient {
    /// Redis客户端
    client: redis::Client,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// 检查连接是否可用
    pub async fn ping(&self) -> Result<()> {
        let mut con = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut con).await?;
        Ok(())
    }

    /// 获取指定键的值
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.connection().await?;
        let value: Option<String> = con.get(key).await?;
        Ok(value)
    }

    /// 追加到列表尾部，返回列表长度
    pub async fn rpush(&self, key: &str, value: &str) -> Result<usize> {
        let mut con = self.connection().await?;
        let len: usize = con.rpush(key, value).await?;
        Ok(len)
    }

    /// 插入到列表头部，返回列表长度
    pub async fn lpush(&self, key: &str, value: &str) -> Result<usize> {
        let mut con = self.connection().await?;
        let len: usize = con.lpush(key, value).await?;
        Ok(len)
    }

    /// 按给定顺序阻塞弹出首个非空列表的头部元素
    ///
    /// # 参数
    ///
    /// * `keys` - 列表键，靠前的优先
    /// * `timeout_secs` - 服务端阻塞时长（秒），支持小数
    ///
    /// # 返回值
    ///
    /// * `Ok(Some((key, value)))` - 弹出的列表键与元素
    /// * `Ok(None)` - 超时无数据
    pub async fn blpop(&self, keys: &[String], timeout_secs: f64) -> Result<Option<(String, String)>> {
        let mut con = self.connection().await?;
        let popped: Option<(String, String)> = con.blpop(keys, timeout_secs).await?;
        Ok(popped)
    }

    /// 非阻塞弹出列表头部元素
    pub async fn lpop(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.connection().await?;
        let value: Option<String> = con.lpop(key, None).await?;
        Ok(value)
    }

    /// 获取列表长度
    pub async fn llen(&self, key: &str) -> Result<usize> {
        let mut con = self.connection().await?;
        let len: usize = con.llen(key).await?;
        Ok(len)
    }

    /// 执行 Lua 脚本（单键单参数）
    ///
    /// 脚本以 EVALSHA 执行，服务端缺少缓存时自动回退到 EVAL
    pub async fn eval_script(
        &self,
        script: &redis::Script,
        key: &str,
        args: &[String],
    ) -> Result<Option<String>> {
        let mut con = self.connection().await?;
        let mut invocation = script.key(key);
        for arg in args {
            invocation.arg(arg);
        }
        let value: Option<String> = invocation.invoke_async(&mut con).await?;
        Ok(value)
    }
}
