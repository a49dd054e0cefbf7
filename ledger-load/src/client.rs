use crate::payload::LedgerRequest;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Thin HTTP binding of the ledger contract.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: Client,
    base_url: Arc<str>,
}

impl LedgerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue `request` and return the response status once the body has been read.
    pub async fn send(&self, request: &LedgerRequest) -> Result<u16, reqwest::Error> {
        let url = format!("{}{}", self.base_url, request.path());
        let builder = match request {
            LedgerRequest::Charge(body) => self.http.post(url).json(body),
            LedgerRequest::Withdraw(body) => self.http.post(url).json(body),
            LedgerRequest::GetBalance { .. } | LedgerRequest::GetTransactions { .. } => {
                self.http.get(url).query(&request.query())
            }
        };

        let res = builder.send().await?;
        let status = res.status().as_u16();
        res.bytes().await?;
        Ok(status)
    }

    /// Probe `GET /health`. Any HTTP response means the target is reachable.
    pub async fn preflight(&self) -> Result<u16, reqwest::Error> {
        let res = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(res.status().as_u16())
    }
}
