use serde::{ de::DeserializeOwned, Deserialize, Deserializer };
use serde_json::Value;
use hyper::Response;

pub trait FromJsonResponse {
    fn from_json<T: DeserializeOwned>(self) -> serde_json::Result<Response<T>>;
}

impl FromJsonResponse for Response<Vec<u8>> {
    fn from_json<T: DeserializeOwned>(self) -> serde_json::Result<Response<T>> {
        let (parts, body) = self.into_parts();
        let body = serde_json::from_slice(&body)?;
        Ok(Response::from_parts(parts, body))
    }
}

/// Render a json scalar the way it would show up as page text.
pub fn scalar_text<'de, D>(d: D) -> std::result::Result<String, D::Error>
    where D: Deserializer<'de>
{
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(serde::de::Error::custom("expected a scalar value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Snapshot;

    #[test]
    fn decodes_body_keeping_status() {
        let resp = Response::builder()
            .status(200)
            .body(br#"{"data1":"1","data2":"2","data3":"3","data4":4.5}"#.to_vec())
            .unwrap();

        let resp = resp.from_json::<Snapshot>().unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body().data4, "4.5");
    }

    #[test]
    fn html_body_fails_to_decode() {
        let resp = Response::builder()
            .status(200)
            .body(b"<html></html>".to_vec())
            .unwrap();

        assert!(resp.from_json::<Snapshot>().is_err());
    }
}
