//! HTTP adapters for the capability channel.
//!
//! - `ReqwestSeedClient` - posts the capability catalog to the seed URI
//! - `ReqwestEventQueue` - one long-poll round trip against the event queue
//!
//! Both speak JSON. Capability URIs are bearer credentials, so neither
//! adapter puts a URI into a log line or an error message.

mod event_queue;
mod seed;

pub use event_queue::ReqwestEventQueue;
pub use seed::ReqwestSeedClient;

use std::time::Duration;

use reqwest::Client;

fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}
