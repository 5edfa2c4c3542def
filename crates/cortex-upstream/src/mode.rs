//! Mode whose activation depends on an upstream service

use crate::caller::UpstreamCaller;
use crate::error::BoxError;
use async_trait::async_trait;
use cortex_core::{ActivationContext, Capabilities, Mode, ModeDescriptor, ModeError, ModeState};
use futures::future::BoxFuture;
use futures::{FutureExt, TryFutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type ConnectFn =
    Arc<dyn Fn(ActivationContext) -> BoxFuture<'static, Result<ModeState, BoxError>> + Send + Sync>;

/// Mode adapter that connects through an [`UpstreamCaller`] on activation
///
/// The descriptor is always marked as requiring network, so an
/// `UpstreamMode` can never be designated as the safe mode.
pub struct UpstreamMode {
    descriptor: ModeDescriptor,
    caller: Arc<UpstreamCaller>,
    connect: ConnectFn,
}

impl fmt::Debug for UpstreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamMode")
            .field("descriptor", &self.descriptor)
            .field("upstream", &self.caller.name())
            .finish_non_exhaustive()
    }
}

impl UpstreamMode {
    /// Create adapter; `connect` is retried by the caller's policy
    pub fn new<F, Fut, E>(descriptor: ModeDescriptor, caller: Arc<UpstreamCaller>, connect: F) -> Self
    where
        F: Fn(ActivationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ModeState, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let connect: ConnectFn = Arc::new(move |ctx| {
            connect(ctx)
                .map_err(|e| -> BoxError { e.into() })
                .boxed()
        });
        Self {
            descriptor: descriptor.with_capabilities(Capabilities::none().with_network()),
            caller,
            connect,
        }
    }

    /// Caller shared with other modes of the same upstream
    #[inline]
    #[must_use]
    pub fn caller(&self) -> &Arc<UpstreamCaller> {
        &self.caller
    }
}

#[async_trait]
impl Mode for UpstreamMode {
    fn descriptor(&self) -> &ModeDescriptor {
        &self.descriptor
    }

    async fn activate(&self, ctx: ActivationContext) -> Result<ModeState, ModeError> {
        let state = self
            .caller
            .call(|| (self.connect)(ctx.clone()))
            .await?;
        Ok(state)
    }
}
