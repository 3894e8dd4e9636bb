//! Owns the listener set for a process (spec.md §9's "global listener
//! list" design note, made an instance rather than a `static`).

use tokio::task::JoinSet;

use crate::config::Configuration;
use crate::error::ServerError;
use crate::listener::Listener;

pub struct App {
    listeners: Vec<Listener>,
}

impl App {
    pub fn new(configs: Vec<Configuration>) -> Self {
        Self { listeners: configs.into_iter().map(Listener::new).collect() }
    }

    /// Runs every listener's accept loop concurrently until all of them
    /// stop (normally only once `shutdown` is called).
    pub async fn run(&self) -> Result<(), ServerError> {
        let mut set = JoinSet::new();
        for listener in self.listeners.iter().cloned() {
            set.spawn(async move { listener.run().await });
        }

        while let Some(result) = set.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => eprintln!("listener exited with an error: {e}"),
                Err(e) => eprintln!("listener task panicked: {e}"),
            }
        }
        Ok(())
    }

    /// Signals every listener to stop accepting new connections.
    /// Already-accepted connections finish on their own.
    pub fn shutdown(&self) {
        for listener in &self.listeners {
            listener.request_shutdown();
        }
    }
}
