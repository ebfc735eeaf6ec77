use std::ops::DerefMut;

use async_trait::async_trait;

use rbac0_core::AppResult;

/// Hands out the connection a pooled call runs against.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Connection type the backend operations take.
    type Connection: Send;

    /// Borrowed connection, returned to the source when dropped.
    type Lease: DerefMut<Target = Self::Connection> + Send;

    /// Borrows a connection for the duration of one call.
    async fn acquire(&self) -> AppResult<Self::Lease>;
}
