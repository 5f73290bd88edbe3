use async_trait::async_trait;

use hyper::{ Body, Client, Method, Request, Response, StatusCode, Uri };
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::http::uri::Scheme;
#[cfg(feature = "tls")]
use hyper_tls::HttpsConnector;
use tracing::debug;

use crate::{ Error, ErrorKind, Result };
use super::PlcAgent;

#[cfg(feature = "tls")]
type Connector = HttpsConnector<HttpConnector>;
#[cfg(not(feature = "tls"))]
type Connector = HttpConnector;

type HttpClient = Client<Connector, Body>;

/// Same content type a browser uses for a `fetch` with a string body.
pub const TEXT_PLAIN: &str = "text/plain;charset=UTF-8";

#[cfg(feature = "tls")]
fn connector() -> Connector {
    HttpsConnector::new()
}

#[cfg(not(feature = "tls"))]
fn connector() -> Connector {
    HttpConnector::new()
}

/// https urls need the `tls` feature.
fn check_scheme(url: &Uri) -> Result<()> {
    if cfg!(not(feature = "tls")) && url.scheme() == Some(&Scheme::HTTPS) {
        return Err(Error::new(ErrorKind::UrlError, format!("{} needs a build with the tls feature", url)));
    }
    Ok(())
}

/// hyper backed agent
pub struct HttpAgent {
    client: HttpClient
}

impl HttpAgent {
    pub fn new() -> HttpAgent {
        HttpAgent {
            client: Client::builder().build(connector())
        }
    }
}

impl Default for HttpAgent {
    fn default() -> Self {
        HttpAgent::new()
    }
}

#[async_trait]
impl PlcAgent for HttpAgent {
    async fn post(&self, url: &Uri, body: String) -> Result<StatusCode> {
        check_scheme(url)?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(url.clone())
            .header(CONTENT_TYPE, TEXT_PLAIN)
            .body(Body::from(body))?;

        let resp = self.client.request(req).await?;
        let status = resp.status();

        //== drain so the connection can be reused
        hyper::body::to_bytes(resp.into_body()).await?;

        debug!(url = %url, status = status.as_u16(), "post done");
        Ok(status)
    }

    async fn get(&self, url: &Uri) -> Result<Response<Vec<u8>>> {
        check_scheme(url)?;
        let resp = self.client.get(url.clone()).await?;
        let (parts, body) = resp.into_parts();
        let bytes = hyper::body::to_bytes(body).await?;

        debug!(url = %url, status = parts.status.as_u16(), len = bytes.len(), "get done");
        Ok(Response::from_parts(parts, bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_http_is_always_accepted() {
        let url: Uri = "http://192.168.0.1/awp/app/index.html".parse().unwrap();
        assert!(check_scheme(&url).is_ok());
    }

    #[cfg(not(feature = "tls"))]
    #[tokio::test]
    async fn https_without_tls_names_the_feature() {
        let url: Uri = "https://192.168.0.1/awp/app/data/data.html".parse().unwrap();
        let agent = HttpAgent::new();

        let err = agent.get(&url).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UrlError);
        assert!(err.msg.contains("tls feature"), "{}", err.msg);

        let err = agent.post(&url, "\"db2\".data1=1".to_string()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UrlError);
    }

    #[cfg(feature = "tls")]
    #[test]
    fn https_accepted_with_tls() {
        let url: Uri = "https://192.168.0.1/awp/app/index.html".parse().unwrap();
        assert!(check_scheme(&url).is_ok());
    }
}
