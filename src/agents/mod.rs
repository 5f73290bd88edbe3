use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Response, StatusCode, Uri};

use crate::Result;

mod http;
pub use http::HttpAgent;

/// Transport between the page controller and the PLC web server.
#[async_trait]
pub trait PlcAgent: Send + Sync {
    /// POST a plain text body; the response body is read and dropped.
    async fn post(&self, url: &Uri, body: String) -> Result<StatusCode>;

    /// GET a resource, collecting the whole body.
    async fn get(&self, url: &Uri) -> Result<Response<Vec<u8>>>;
}

#[async_trait]
impl<A: PlcAgent + ?Sized> PlcAgent for Arc<A> {
    async fn post(&self, url: &Uri, body: String) -> Result<StatusCode> {
        (**self).post(url, body).await
    }

    async fn get(&self, url: &Uri) -> Result<Response<Vec<u8>>> {
        (**self).get(url).await
    }
}
