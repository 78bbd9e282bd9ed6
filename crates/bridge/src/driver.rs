//! [`Driver`] implementation backed by one bridge process per session.

use std::sync::Arc;

use async_trait::async_trait;

use wg_domain::config::DriverConfig;
use wg_sessions::{CreateRequest, Driver, DriverError, DriverHandle, EventSink};

use crate::protocol::{BridgeCommand, PuppeteerOptions};
use crate::transport::BridgeProcess;

pub struct StdioDriver {
    config: DriverConfig,
}

impl StdioDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Driver for StdioDriver {
    async fn create(
        &self,
        request: CreateRequest,
        events: EventSink,
    ) -> Result<Arc<dyn DriverHandle>, DriverError> {
        let (process, startup) = BridgeProcess::spawn(&self.config, &request.session_name, events)?;

        process
            .write(&BridgeCommand::Create {
                session: request.session_name.clone(),
                auto_close: request.inactivity_timeout.as_millis() as u64,
                puppeteer_options: PuppeteerOptions::from(&request.launch),
            })
            .await?;

        match startup.await {
            Ok(Ok(())) => {
                tracing::info!(session = %request.session_name, "bridge session ready");
                Ok(Arc::new(BridgeHandle { process }))
            }
            Ok(Err(e)) => {
                process.shutdown().await;
                Err(e)
            }
            Err(_) => Err(DriverError::Exited),
        }
    }
}

/// Authenticated session living in a bridge process.
pub struct BridgeHandle {
    process: BridgeProcess,
}

#[async_trait]
impl DriverHandle for BridgeHandle {
    async fn send_text(&self, to: &str, text: &str) -> Result<(), DriverError> {
        self.process
            .request(|id| BridgeCommand::SendText {
                id,
                to: to.to_owned(),
                text: text.to_owned(),
            })
            .await
    }

    async fn logout(&self) -> Result<(), DriverError> {
        self.process.request(|id| BridgeCommand::Logout { id }).await?;
        tracing::info!(session = %self.process.session(), "bridge session logged out");
        self.process.shutdown().await;
        Ok(())
    }
}
