//! Registry client and remote object handles
//!
//! Every remote handle owns its own TCP connection, so polling on one
//! handle never blocks traffic on another. Requests are strictly
//! sequential per connection; correlation ids exist so a mismatched
//! reply is detected rather than silently misattributed.

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use hive_core::config::PollConfig;
use hive_core::{RegistryEndpoint, RegistryError};
use hive_protocol::{
    AccessorInfo, ErrorCode, Frame, FrameCodec, Message, ObjectOp, Reply, RequestId, Value,
};

/// Authenticated connection to the registry server
pub struct RegistryClient {
    framed: Framed<TcpStream, FrameCodec>,
    next_id: u32,
}

impl RegistryClient {
    /// Connect and perform the token handshake.
    ///
    /// A connect failure is terminal for the calling process: the
    /// registry endpoint was captured at spawn time, so there is nothing
    /// to retry against.
    pub async fn connect(endpoint: &RegistryEndpoint) -> Result<Self, RegistryError> {
        let stream = TcpStream::connect(endpoint.address())
            .await
            .map_err(|e| RegistryError::Unreachable(format!("{}: {}", endpoint.address(), e)))?;
        let mut framed = Framed::new(stream, FrameCodec::new());

        framed
            .send(Frame::new(
                RequestId::HANDSHAKE,
                Message::Hello {
                    token: endpoint.token.clone(),
                },
            ))
            .await?;

        match next_frame(&mut framed).await? {
            Message::HelloAck { accepted: true, .. } => Ok(Self {
                framed,
                next_id: 1,
            }),
            Message::HelloAck {
                accepted: false, ..
            } => Err(RegistryError::AuthenticationFailed),
            other => Err(RegistryError::Remote(format!(
                "unexpected handshake reply: {:?}",
                other.message_type()
            ))),
        }
    }

    /// Published accessors, in the order the coordinator registered them
    pub async fn list_accessors(&mut self) -> Result<Vec<AccessorInfo>, RegistryError> {
        match self.call(Message::ListAccessors).await? {
            Message::Accessors(accessors) => Ok(accessors),
            other => Err(unexpected(&other)),
        }
    }

    async fn invoke(&mut self, accessor: &str, op: ObjectOp) -> Result<Reply, RegistryError> {
        match self
            .call(Message::Invoke {
                accessor: accessor.to_string(),
                op,
            })
            .await?
        {
            Message::Reply(reply) => Ok(reply),
            other => Err(unexpected(&other)),
        }
    }

    async fn call(&mut self, message: Message) -> Result<Message, RegistryError> {
        let request_id = RequestId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);

        self.framed.send(Frame::new(request_id, message)).await?;

        let frame = match self.framed.next().await {
            Some(frame) => frame?,
            None => return Err(RegistryError::ConnectionClosed),
        };
        if frame.request_id != request_id {
            return Err(RegistryError::Remote(format!(
                "reply for {} while awaiting {}",
                frame.request_id, request_id
            )));
        }
        match frame.message {
            Message::Error { code, message } => Err(remote_error(code, message)),
            message => Ok(message),
        }
    }
}

async fn next_frame(
    framed: &mut Framed<TcpStream, FrameCodec>,
) -> Result<Message, RegistryError> {
    match framed.next().await {
        Some(frame) => Ok(frame?.message),
        None => Err(RegistryError::ConnectionClosed),
    }
}

fn remote_error(code: ErrorCode, message: String) -> RegistryError {
    match code {
        ErrorCode::UnknownAccessor => RegistryError::UnknownAccessor(message),
        ErrorCode::AuthenticationFailed | ErrorCode::AuthenticationRequired => {
            RegistryError::AuthenticationFailed
        }
        _ => RegistryError::Remote(message),
    }
}

fn unexpected(message: &Message) -> RegistryError {
    RegistryError::Remote(format!("unexpected reply: {:?}", message.message_type()))
}

/// Polling cadence shared by every remote handle
#[derive(Debug, Clone, Copy)]
struct Poll {
    interval: Duration,
    deadline: Option<Duration>,
}

impl Poll {
    fn from_config(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            deadline: config.deadline(),
        }
    }

    /// Fail once `started` is older than the deadline, if one is set
    fn check(&self, started: Instant, what: &str) -> Result<(), RegistryError> {
        if let Some(deadline) = self.deadline {
            if started.elapsed() >= deadline {
                return Err(RegistryError::DeadlineExceeded {
                    what: what.to_string(),
                    deadline,
                });
            }
        }
        Ok(())
    }
}

/// Remote handle to a registry lock
pub struct RemoteLock {
    client: RegistryClient,
    accessor: String,
    poll: Poll,
}

impl RemoteLock {
    /// Open a dedicated connection for this lock accessor
    pub async fn open(
        endpoint: &RegistryEndpoint,
        accessor: &str,
        config: &PollConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            client: RegistryClient::connect(endpoint).await?,
            accessor: accessor.to_string(),
            poll: Poll::from_config(config),
        })
    }

    /// Single acquisition attempt
    pub async fn try_acquire(&mut self) -> Result<bool, RegistryError> {
        match self.client.invoke(&self.accessor, ObjectOp::TryAcquire).await? {
            Reply::Bool(won) => Ok(won),
            reply => Err(RegistryError::Remote(format!("bad reply: {:?}", reply))),
        }
    }

    /// Poll until the lock is won
    pub async fn acquire(&mut self) -> Result<(), RegistryError> {
        let started = Instant::now();
        loop {
            if self.try_acquire().await? {
                return Ok(());
            }
            self.poll.check(started, &self.accessor)?;
            tokio::time::sleep(self.poll.interval).await;
        }
    }

    /// Release the lock
    pub async fn release(&mut self) -> Result<(), RegistryError> {
        self.client.invoke(&self.accessor, ObjectOp::Release).await?;
        Ok(())
    }

    /// Whether the lock is currently held by anyone
    pub async fn locked(&mut self) -> Result<bool, RegistryError> {
        match self.client.invoke(&self.accessor, ObjectOp::IsLocked).await? {
            Reply::Bool(held) => Ok(held),
            reply => Err(RegistryError::Remote(format!("bad reply: {:?}", reply))),
        }
    }
}

/// Remote handle to a registry event
pub struct RemoteEvent {
    client: RegistryClient,
    accessor: String,
    poll: Poll,
}

impl RemoteEvent {
    /// Open a dedicated connection for this event accessor
    pub async fn open(
        endpoint: &RegistryEndpoint,
        accessor: &str,
        config: &PollConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            client: RegistryClient::connect(endpoint).await?,
            accessor: accessor.to_string(),
            poll: Poll::from_config(config),
        })
    }

    /// Set the flag for every waiter
    pub async fn set(&mut self) -> Result<(), RegistryError> {
        self.client.invoke(&self.accessor, ObjectOp::Set).await?;
        Ok(())
    }

    /// Clear the flag
    pub async fn clear(&mut self) -> Result<(), RegistryError> {
        self.client.invoke(&self.accessor, ObjectOp::Clear).await?;
        Ok(())
    }

    /// Whether the flag is set
    pub async fn is_set(&mut self) -> Result<bool, RegistryError> {
        match self.client.invoke(&self.accessor, ObjectOp::IsSet).await? {
            Reply::Bool(set) => Ok(set),
            reply => Err(RegistryError::Remote(format!("bad reply: {:?}", reply))),
        }
    }

    /// Poll until the flag is set
    pub async fn wait(&mut self) -> Result<(), RegistryError> {
        let started = Instant::now();
        loop {
            if self.is_set().await? {
                return Ok(());
            }
            self.poll.check(started, &self.accessor)?;
            tokio::time::sleep(self.poll.interval).await;
        }
    }
}

/// Remote handle to a registry queue
pub struct RemoteQueue {
    client: RegistryClient,
    accessor: String,
    poll: Poll,
}

impl RemoteQueue {
    /// Open a dedicated connection for this queue accessor
    pub async fn open(
        endpoint: &RegistryEndpoint,
        accessor: &str,
        config: &PollConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            client: RegistryClient::connect(endpoint).await?,
            accessor: accessor.to_string(),
            poll: Poll::from_config(config),
        })
    }

    /// Append `value` `times` times
    pub async fn put(&mut self, value: Value, times: u32) -> Result<(), RegistryError> {
        self.client
            .invoke(&self.accessor, ObjectOp::Put { value, times })
            .await?;
        Ok(())
    }

    /// Pop the front, or the last-seen value when empty
    pub async fn get(&mut self) -> Result<Option<Value>, RegistryError> {
        match self.client.invoke(&self.accessor, ObjectOp::Get).await? {
            Reply::Item(item) => Ok(item),
            reply => Err(RegistryError::Remote(format!("bad reply: {:?}", reply))),
        }
    }

    /// Drain the queue and return its final element
    pub async fn get_last(&mut self) -> Result<Option<Value>, RegistryError> {
        match self.client.invoke(&self.accessor, ObjectOp::GetLast).await? {
            Reply::Item(item) => Ok(item),
            reply => Err(RegistryError::Remote(format!("bad reply: {:?}", reply))),
        }
    }

    /// Number of queued items
    pub async fn len(&mut self) -> Result<u64, RegistryError> {
        match self.client.invoke(&self.accessor, ObjectOp::Len).await? {
            Reply::Count(count) => Ok(count),
            reply => Err(RegistryError::Remote(format!("bad reply: {:?}", reply))),
        }
    }

    /// Start mirroring appends into the counter sub-queue
    pub async fn attach_counter(&mut self) -> Result<(), RegistryError> {
        self.client
            .invoke(&self.accessor, ObjectOp::AttachCounter)
            .await?;
        Ok(())
    }

    /// Stop mirroring and discard the counter
    pub async fn detach_counter(&mut self) -> Result<(), RegistryError> {
        self.client
            .invoke(&self.accessor, ObjectOp::DetachCounter)
            .await?;
        Ok(())
    }

    /// Drain the counter sub-queue, keeping it attached
    pub async fn reset_counter(&mut self) -> Result<(), RegistryError> {
        self.client
            .invoke(&self.accessor, ObjectOp::ResetCounter)
            .await?;
        Ok(())
    }

    /// Snapshot of the counter sub-queue
    pub async fn counter_items(&mut self) -> Result<Vec<Value>, RegistryError> {
        match self
            .client
            .invoke(&self.accessor, ObjectOp::CounterItems)
            .await?
        {
            Reply::Items(items) => Ok(items),
            reply => Err(RegistryError::Remote(format!("bad reply: {:?}", reply))),
        }
    }

    /// Poll until the counter holds exactly `count` items, then return
    /// them all
    pub async fn wait_for_count(&mut self, count: usize) -> Result<Vec<Value>, RegistryError> {
        let started = Instant::now();
        loop {
            let items = self.counter_items().await?;
            if items.len() == count {
                return Ok(items);
            }
            self.poll
                .check(started, &format!("barrier count {}", count))?;
            tokio::time::sleep(self.poll.interval).await;
        }
    }
}
