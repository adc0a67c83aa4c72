use bannerscope_core::AuditError;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::page::Page;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::shared::to_audit_error;

enum Traffic {
    Started(String),
    Ended(String),
}

/// Request ids the page has sent but not yet finished or failed.
#[derive(Debug, Default)]
pub struct InFlight {
    pending: HashSet<String>,
}

impl InFlight {
    /// Redirects reuse the request id, so a repeated start counts once.
    pub fn started(&mut self, request_id: impl Into<String>) {
        self.pending.insert(request_id.into());
    }

    pub fn ended(&mut self, request_id: &str) {
        self.pending.remove(request_id);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Counts in-flight requests of one tab from Network domain events.
/// Listening stops when the monitor is dropped.
pub struct NetworkMonitor {
    count: watch::Receiver<usize>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    /// Must be attached before navigation so the document request is seen.
    pub async fn attach(page: &Page) -> Result<Self, AuditError> {
        page.execute(EnableParams::default())
            .await
            .map_err(|e| to_audit_error(e, "NetworkEnable"))?;

        let sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| to_audit_error(e, "NetworkListen"))?;
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| to_audit_error(e, "NetworkListen"))?;
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| to_audit_error(e, "NetworkListen"))?;

        let mut traffic = stream::select_all([
            sent.map(|e| Traffic::Started(e.request_id.inner().clone())).boxed(),
            finished.map(|e| Traffic::Ended(e.request_id.inner().clone())).boxed(),
            failed.map(|e| Traffic::Ended(e.request_id.inner().clone())).boxed(),
        ]);

        let (tx, count) = watch::channel(0);
        let task = tokio::spawn(async move {
            let mut in_flight = InFlight::default();
            while let Some(event) = traffic.next().await {
                match event {
                    Traffic::Started(id) => in_flight.started(id),
                    Traffic::Ended(id) => in_flight.ended(&id),
                }
                if tx.send(in_flight.len()).is_err() {
                    break;
                }
            }
        });

        Ok(Self { count, task })
    }

    pub fn in_flight(&self) -> usize {
        *self.count.borrow()
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_until_every_request_ends() {
        let mut in_flight = InFlight::default();
        in_flight.started("1");
        in_flight.started("2");
        in_flight.started("2");
        assert_eq!(in_flight.len(), 2);

        in_flight.ended("1");
        in_flight.ended("unknown");
        assert_eq!(in_flight.len(), 1);

        in_flight.ended("2");
        assert!(in_flight.is_empty());
    }
}
