use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use super::{ChannelError, ShardChannel, ShardConnector};
use crate::cluster::types::ShardEndpoint;
use crate::dispatch::command::{CommandSpec, ReplyValue};

/// Connects to Redis shards over the asynchronous multiplexed client.
pub struct RedisConnector;

#[async_trait]
impl ShardConnector for RedisConnector {
    async fn connect(
        &self,
        endpoint: &ShardEndpoint,
    ) -> Result<Box<dyn ShardChannel>, ChannelError> {
        let url = format!("redis://{}:{}/", endpoint.address, endpoint.port);
        let client = redis::Client::open(url).map_err(classify)?;
        let mut conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(classify)?;

        // Verify the connection actually works before publishing it as live.
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(classify)?;

        Ok(Box::new(RedisChannel { conn }))
    }
}

struct RedisChannel {
    conn: MultiplexedConnection,
}

#[async_trait]
impl ShardChannel for RedisChannel {
    async fn execute(&mut self, spec: &CommandSpec) -> Result<ReplyValue, ChannelError> {
        let value = match spec {
            CommandSpec::FieldCounts {
                distribution,
                fields,
            } => {
                let mut pipe = redis::pipe();
                pipe.atomic();
                for field in fields {
                    pipe.cmd("ZSCORE").arg(distribution).arg(field);
                }
                pipe.cmd("ZCARD").arg(distribution);
                pipe.cmd("GET").arg(z_key(distribution));
                pipe.cmd("GET").arg(t_key(distribution));
                pipe.query_async::<_, redis::Value>(&mut self.conn).await
            }

            CommandSpec::RangeWithScores { distribution } => {
                let mut pipe = redis::pipe();
                pipe.atomic();
                pipe.cmd("GET").arg(t_key(distribution));
                pipe.cmd("ZRANGE")
                    .arg(distribution)
                    .arg(0)
                    .arg(-1)
                    .arg("WITHSCORES");
                pipe.query_async::<_, redis::Value>(&mut self.conn).await
            }

            CommandSpec::TopScores {
                distribution,
                limit,
            } => {
                let mut pipe = redis::pipe();
                pipe.atomic();
                pipe.cmd("ZREVRANGEBYSCORE")
                    .arg(distribution)
                    .arg("+INF")
                    .arg("-INF")
                    .arg("WITHSCORES")
                    .arg("LIMIT")
                    .arg(0)
                    .arg(*limit);
                pipe.cmd("ZCARD").arg(distribution);
                pipe.cmd("GET").arg(z_key(distribution));
                pipe.cmd("GET").arg(t_key(distribution));
                pipe.query_async::<_, redis::Value>(&mut self.conn).await
            }

            CommandSpec::Increment {
                distribution,
                fields,
                amount,
                t,
            } => {
                let mut pipe = redis::pipe();
                pipe.atomic();
                for field in fields {
                    pipe.cmd("ZINCRBY").arg(distribution).arg(*amount).arg(field);
                }
                pipe.cmd("INCRBY")
                    .arg(z_key(distribution))
                    .arg(*amount * fields.len() as i64);
                pipe.cmd("SETNX").arg(t_key(distribution)).arg(*t);
                pipe.query_async::<_, redis::Value>(&mut self.conn).await
            }

            CommandSpec::WriteCounts {
                distribution,
                entries,
                z,
                t,
                expire_secs,
            } => {
                let mut pipe = redis::pipe();
                pipe.atomic();
                for (bin, count) in entries {
                    if *count == 0 {
                        pipe.cmd("ZREM").arg(distribution).arg(bin);
                    } else {
                        pipe.cmd("ZADD").arg(distribution).arg(*count).arg(bin);
                    }
                }
                pipe.cmd("SET").arg(z_key(distribution)).arg(*z);
                pipe.cmd("SET").arg(t_key(distribution)).arg(*t);
                add_expiry(&mut pipe, distribution, *expire_secs);
                pipe.query_async::<_, redis::Value>(&mut self.conn).await
            }

            CommandSpec::Expire {
                distribution,
                expire_secs,
            } => {
                let mut pipe = redis::pipe();
                pipe.atomic();
                add_expiry(&mut pipe, distribution, *expire_secs);
                pipe.query_async::<_, redis::Value>(&mut self.conn).await
            }

            CommandSpec::KeyspaceSize => {
                redis::cmd("DBSIZE")
                    .query_async::<_, redis::Value>(&mut self.conn)
                    .await
            }
        };

        value.map(convert).map_err(classify)
    }
}

fn z_key(distribution: &str) -> String {
    format!("{}._Z", distribution)
}

fn t_key(distribution: &str) -> String {
    format!("{}._T", distribution)
}

fn add_expiry(pipe: &mut redis::Pipeline, distribution: &str, expire_secs: i64) {
    pipe.cmd("EXPIRE").arg(distribution).arg(expire_secs);
    pipe.cmd("EXPIRE").arg(z_key(distribution)).arg(expire_secs);
    pipe.cmd("EXPIRE").arg(t_key(distribution)).arg(expire_secs);
}

fn convert(value: redis::Value) -> ReplyValue {
    match value {
        redis::Value::Nil => ReplyValue::Nil,
        redis::Value::Int(value) => ReplyValue::Integer(value),
        redis::Value::Data(bytes) => {
            ReplyValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        redis::Value::Bulk(items) => {
            ReplyValue::Sequence(items.into_iter().map(convert).collect())
        }
        redis::Value::Status(status) => ReplyValue::Text(status),
        redis::Value::Okay => ReplyValue::Text("OK".to_string()),
    }
}

fn classify(error: redis::RedisError) -> ChannelError {
    if error.is_io_error() || error.is_connection_dropped() {
        ChannelError::Io(error.to_string())
    } else {
        ChannelError::Protocol(error.to_string())
    }
}
