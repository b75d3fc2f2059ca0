use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::CaptureState;

use super::loop_worker::{ScrollLoop, ScrollRequest};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// What a background run hands back: the loop, with its finished session, and
/// the captured states.
pub struct ScrollOutcome {
    pub scroll_loop: ScrollLoop,
    pub states: Result<Vec<CaptureState>>,
}

/// Owns a [`ScrollLoop`] running on its own task.
#[derive(Default)]
pub struct ScrollController {
    handle: Option<JoinHandle<ScrollOutcome>>,
    cancel_token: Option<CancellationToken>,
}

impl ScrollController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(&mut self, mut scroll_loop: ScrollLoop, request: ScrollRequest) -> Result<()> {
        if self.handle.is_some() {
            bail!("scroll loop already running");
        }
        request.validate()?;

        if scroll_loop.cancel_token().is_cancelled() {
            scroll_loop.reset();
        }
        let cancel_token = scroll_loop.cancel_token();

        let handle = tokio::spawn(async move {
            let states = scroll_loop.run(request).await;
            ScrollOutcome { scroll_loop, states }
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("scroll loop task started");
        Ok(())
    }

    /// Ask the loop to stop at its next check without waiting for it.
    pub fn cancel(&self) {
        if let Some(token) = &self.cancel_token {
            token.cancel();
        }
    }

    /// Wait for the loop to end on its own. `None` when nothing was started.
    pub async fn join(&mut self) -> Result<Option<ScrollOutcome>> {
        self.cancel_token = None;
        match self.handle.take() {
            Some(handle) => handle
                .await
                .context("scroll loop task failed to join")
                .map(Some),
            None => Ok(None),
        }
    }

    /// Cancel the loop and wait for it to wind down.
    pub async fn stop(&mut self) -> Result<Option<ScrollOutcome>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
            log_info!("stop requested for scroll loop task");
        }
        self.join().await
    }
}
