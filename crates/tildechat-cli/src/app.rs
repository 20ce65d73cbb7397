//! Terminal chat session
//!
//! Each line read from the input is typed into the view and submitted with
//! the submit key. Mutations run as local tasks so a slow send never blocks
//! reading the next line.

use std::io::Write;

use futures::future::join_all;
use tildechat_core::{ChatController, ChatView, DataClient, SUBMIT_KEY};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::terminal::TerminalView;

/// A chat controller driving a terminal view
pub struct TerminalChat<W: Write + 'static> {
    controller: ChatController<TerminalView<W>>,
}

impl<W: Write + 'static> TerminalChat<W> {
    pub fn new(client: DataClient, config: &AppConfig, output: W) -> Self {
        let view = TerminalView::new(output, &config.terminal);
        Self {
            controller: ChatController::new(client, view, config.chat.clone()),
        }
    }

    pub fn controller(&self) -> &ChatController<TerminalView<W>> {
        &self.controller
    }

    /// Mount, submit every input line until end of input or Ctrl-C, then
    /// unmount.
    ///
    /// Must run inside a `tokio::task::LocalSet`. At end of input the sends
    /// still in flight are awaited; an interrupt abandons them.
    pub async fn run<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        if let Err(e) = self.controller.mount() {
            warn!("Chat started without live messages: {}", e);
        }

        let mut lines = input.lines();
        let mut in_flight = InFlight::default();
        let outcome = loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(handle) = self.submit(&line) {
                            in_flight.push(handle);
                        }
                    }
                    Ok(None) => {
                        debug!("End of input, waiting for {} sends", in_flight.len());
                        in_flight.finish().await;
                        break Ok(());
                    }
                    Err(e) => break Err(e.into()),
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break Ok(());
                }
            }
        };

        self.controller.unmount();
        outcome
    }

    fn submit(&self, line: &str) -> Option<JoinHandle<()>> {
        self.controller.view().set_input_value(line);
        self.controller
            .handle_keydown(SUBMIT_KEY)
            .map(tokio::task::spawn_local)
    }
}

/// Sends spawned for submitted lines. Finished ones are dropped on each push.
#[derive(Default)]
struct InFlight {
    handles: Vec<JoinHandle<()>>,
}

impl InFlight {
    fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
    }

    fn len(&self) -> usize {
        self.handles.len()
    }

    async fn finish(&mut self) {
        join_all(self.handles.drain(..)).await;
    }
}
