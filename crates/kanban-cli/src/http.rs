//! HTTP transport for a board served by the Trac kanban plugin.

use std::time::Duration;

use kanban_core::model::catalog::CatalogPayload;
use kanban_core::sync::{ColumnDiff, TicketDiff};
use kanban_core::{BoardSnapshot, SyncClient, TicketId};
use serde::de::DeserializeOwned;
use tracing::debug;

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{method} {url} failed: {message}")]
    Request {
        method: &'static str,
        url: String,
        message: String,
    },
    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Blocking client for one board.
#[derive(Debug)]
pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    board: String,
}

impl HttpClient {
    pub fn new(base_url: &str, board: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            board: board.to_string(),
        }
    }

    pub fn catalog_url(&self) -> String {
        format!("{}/kanbanboard/", self.base_url)
    }

    pub fn board_url(&self) -> String {
        format!("{}/kanbanboard/{}", self.base_url, self.board)
    }

    fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, HttpError> {
        let mut request = self.agent.get(url).set("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }
        debug!(url, "GET");
        let response = request.call().map_err(|err| HttpError::Request {
            method: "GET",
            url: url.to_string(),
            message: err.to_string(),
        })?;
        decode(url, response)
    }

    fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        body: impl serde::Serialize,
    ) -> Result<T, HttpError> {
        debug!(url, "POST");
        let response = self
            .agent
            .post(url)
            .set("Accept", "application/json")
            .send_json(body)
            .map_err(|err| HttpError::Request {
                method: "POST",
                url: url.to_string(),
                message: err.to_string(),
            })?;
        decode(url, response)
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T, HttpError> {
    response.into_json::<T>().map_err(|source| HttpError::Decode {
        url: url.to_string(),
        source,
    })
}

/// `1,2,3` for the `tickets` query parameter.
pub fn ticket_list(ids: &[TicketId]) -> String {
    ids.iter()
        .map(|id| id.get().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl SyncClient for HttpClient {
    type Error = HttpError;

    fn fetch_catalog(&mut self) -> Result<CatalogPayload, HttpError> {
        self.get(&self.catalog_url(), &[])
    }

    fn fetch_board(&mut self, detailed: &[TicketId]) -> Result<BoardSnapshot, HttpError> {
        let query = if detailed.is_empty() {
            Vec::new()
        } else {
            vec![("tickets", ticket_list(detailed))]
        };
        self.get(&self.board_url(), &query)
    }

    fn send_column_diffs(&mut self, diffs: &[ColumnDiff]) -> Result<BoardSnapshot, HttpError> {
        self.post(&self.board_url(), diffs)
    }

    fn send_ticket_diff(&mut self, diff: &TicketDiff) -> Result<BoardSnapshot, HttpError> {
        self.post(&format!("{}/ticket", self.board_url()), diff)
    }

    fn link_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, HttpError> {
        self.get(&self.board_url(), &[("add", id.get().to_string())])
    }

    fn unlink_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, HttpError> {
        self.get(&self.board_url(), &[("remove", id.get().to_string())])
    }
}
