// Long-poll endpoint
//
// event/observe, served from the observe host with the extended timeout.

use tracing::debug;

use crate::client::{BackendClient, OBSERVE_PATH};
use crate::error::Error;
use crate::models::ObserveResponse;

impl BackendClient {
    /// Wait for events after `counter`.
    ///
    /// `GET event/observe`. A request held past the observe timeout comes
    /// back as an empty response with no counter.
    pub async fn observe(&self, session: &str, counter: Option<u64>) -> Result<ObserveResponse, Error> {
        debug!(?counter, "observing");
        let counter = counter.map(|c| c.to_string());
        let mut params = vec![("session", session)];
        if let Some(ref counter) = counter {
            params.push(("counter", counter.as_str()));
        }
        self.get(OBSERVE_PATH, &params).await
    }
}
