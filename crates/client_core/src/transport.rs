use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{Todo, TodoId, TodoOrder},
    error::{ApiError, ApiException},
    protocol::{
        todo_path, UpdateDoneRequest, UpdateOrderRequest, UpdateOrderResponse, TODOS_ORDER_ROUTE,
        TODOS_ROUTE,
    },
};
use tracing::debug;
use url::Url;

use crate::error::TransportError;

/// The three remote operations the reconciliation core depends on.
#[async_trait]
pub trait TodoTransport: Send + Sync {
    /// Raw list payload; shape validation belongs to the caller.
    async fn fetch_all(&self) -> Result<Value, TransportError>;
    async fn update_order(&self, order: &TodoOrder) -> Result<TodoOrder, TransportError>;
    async fn update_done(&self, id: TodoId, done: bool) -> Result<Todo, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    /// `base_url` may carry a path prefix such as `http://host/api`; routes
    /// resolve beneath it.
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Rejected(format!("invalid endpoint '{path}': {e}")))
    }
}

#[async_trait]
impl TodoTransport for HttpTransport {
    async fn fetch_all(&self) -> Result<Value, TransportError> {
        let url = self.endpoint(TODOS_ROUTE)?;
        debug!(%url, "fetching todos");
        let response = send(self.http.get(url)).await?;
        decode(response).await
    }

    async fn update_order(&self, order: &TodoOrder) -> Result<TodoOrder, TransportError> {
        let url = self.endpoint(TODOS_ORDER_ROUTE)?;
        debug!(%url, len = order.len(), "updating order");
        let response = send(self.http.put(url).json(&UpdateOrderRequest {
            order: order.clone(),
        }))
        .await?;
        let body: UpdateOrderResponse = decode(response).await?;
        Ok(body.order)
    }

    async fn update_done(&self, id: TodoId, done: bool) -> Result<Todo, TransportError> {
        let url = self.endpoint(&todo_path(id))?;
        debug!(%url, done, "updating todo");
        let response = send(self.http.put(url).json(&UpdateDoneRequest { done })).await?;
        decode(response).await
    }
}

async fn send(request: RequestBuilder) -> Result<Response, TransportError> {
    let response = request
        .send()
        .await
        .map_err(|e| TransportError::Unavailable(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ApiError>().await {
        Ok(body) => ApiException::from(body).to_string(),
        Err(_) => status.to_string(),
    };
    Err(classify(status, message))
}

fn classify(status: StatusCode, message: String) -> TransportError {
    if status == StatusCode::NOT_FOUND {
        TransportError::NotFound(message)
    } else if status.is_client_error() {
        TransportError::Rejected(message)
    } else {
        TransportError::Unavailable(message)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::Unavailable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Malformed(e.to_string()))
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
