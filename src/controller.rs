use hyper::{StatusCode, Uri};
use tracing::{debug, warn};

use crate::agents::PlcAgent;
use crate::de::FromJsonResponse;
use crate::page::Page;
use crate::{Field, Result, Snapshot};

pub const DEFAULT_DB: &str = "db2";

const PAGE_FILE: &str = "index.html";
const DATA_FILE: &str = "data/data.html";

/// Which POST parameter name each field is written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMapping {
    /// Every field is written under `data1`'s key. This is what the
    /// deployed page does; sending data2..data4 overwrites data1 on the PLC.
    Legacy,
    /// Each field is written under its own key.
    PerField
}

impl Default for KeyMapping {
    fn default() -> Self {
        KeyMapping::Legacy
    }
}

/// Result of a poll that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// displays were rewritten from this snapshot
    Updated(Snapshot),
    /// server answered with a non-ok status, nothing was touched
    Status(StatusCode)
}

/// Poll url for a page url: the first `index.html` becomes `data/data.html`.
pub fn poll_url_for(location: &str) -> String {
    location.replacen(PAGE_FILE, DATA_FILE, 1)
}

fn parse_url(url: &str) -> Result<Uri> {
    // fragments never go on the wire
    let url = url.split('#').next().unwrap_or_default();
    Ok(url.parse::<Uri>()?)
}

pub struct PageController<A, P> {
    agent: A,
    page: P,
    location: String,
    post_url: Uri,
    poll_url: Uri,
    db: String,
    keys: KeyMapping
}

impl<A, P> PageController<A, P>
    where A: PlcAgent, P: Page
{
    /// Controller for the page served at `location`.
    pub fn new(agent: A, page: P, location: &str) -> Result<Self> {
        Ok(PageController {
            agent,
            page,
            location: location.to_string(),
            post_url: parse_url(location)?,
            poll_url: parse_url(&poll_url_for(location))?,
            db: DEFAULT_DB.to_string(),
            keys: KeyMapping::default()
        })
    }

    /// Name of the data block holding the fields.
    pub fn db<T: Into<String>>(mut self, db: T) -> Self {
        self.db = db.into();
        self
    }

    pub fn key_mapping(mut self, keys: KeyMapping) -> Self {
        self.keys = keys;
        self
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn poll_url(&self) -> &Uri {
        &self.poll_url
    }

    /// POST parameter name `field` is written under, e.g. `"db2".data1`.
    pub fn param_key(&self, field: Field) -> String {
        let target = match self.keys {
            KeyMapping::Legacy => Field::Data1,
            KeyMapping::PerField => field
        };
        format!("\"{}\".{}", self.db, target.name())
    }

    /// Body posted for `field` carrying `value`.
    pub fn post_body(&self, field: Field, value: &str) -> String {
        format!("{}={}", self.param_key(field), value)
    }

    /// Post the current value of the field's output control to the page url.
    ///
    /// The server's answer is not looked at, only transport failures are
    /// reported.
    pub async fn send(&self, field: Field) -> Result<()> {
        let value = self.page.value(&field.output_id())?;
        let body = self.post_body(field, &value);

        debug!(field = %field, body = %body, "sending");
        let status = self.agent.post(&self.post_url, body).await?;
        debug!(field = %field, status = status.as_u16(), "sent");

        Ok(())
    }

    /// Fetch the data endpoint and copy its four values into the displays.
    pub async fn poll(&self) -> Result<PollOutcome> {
        let response = self.agent.get(&self.poll_url).await?;

        let status = response.status();
        if !status.is_success() {
            warn!(code = status.as_u16(), "error on poll code:{}", status.as_u16());
            return Ok(PollOutcome::Status(status));
        }

        let snapshot = response.from_json::<Snapshot>()?.into_body();
        for field in Field::ALL.iter() {
            self.page.set_content(&field.display_id(), snapshot.get(*field))?;
        }

        Ok(PollOutcome::Updated(snapshot))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use hyper::Response;

    use crate::page::MemoryPage;
    use crate::{Error, ErrorKind};

    /// Agent that records requests and replays canned GET responses.
    #[derive(Default)]
    pub(crate) struct MockAgent {
        pub posts: Mutex<Vec<(Uri, String)>>,
        pub gets: Mutex<Vec<Uri>>,
        pub replies: Mutex<VecDeque<(u16, String)>>
    }

    impl MockAgent {
        pub fn reply(&self, status: u16, body: &str) {
            self.replies.lock().unwrap().push_back((status, body.to_string()));
        }
    }

    #[async_trait]
    impl PlcAgent for MockAgent {
        async fn post(&self, url: &Uri, body: String) -> Result<StatusCode> {
            self.posts.lock().unwrap().push((url.clone(), body));
            Ok(StatusCode::OK)
        }

        async fn get(&self, url: &Uri) -> Result<Response<Vec<u8>>> {
            self.gets.lock().unwrap().push(url.clone());
            let (status, body) = self.replies.lock().unwrap().pop_front()
                .ok_or_else(|| Error::new(ErrorKind::HttpError, "connect failure"))?;
            Ok(Response::builder().status(status).body(body.into_bytes())?)
        }
    }

    /// Writer collecting formatted log lines.
    #[derive(Clone, Default)]
    pub(crate) struct Capture(pub Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    const PAGE: &str = "http://192.168.0.1/awp/app/index.html";
    const BODY: &str = r#"{"data1":"a","data2":"b","data3":"c","data4":"d"}"#;

    fn controller() -> (Arc<MockAgent>, PageController<Arc<MockAgent>, MemoryPage>) {
        let agent = Arc::new(MockAgent::default());
        let ctl = PageController::new(agent.clone(), MemoryPage::with_fields(), PAGE).unwrap();
        (agent, ctl)
    }

    fn displays(ctl: &PageController<Arc<MockAgent>, MemoryPage>) -> Vec<String> {
        Field::ALL.iter()
            .map(|f| ctl.page().value(&f.display_id()).unwrap())
            .collect()
    }

    #[test]
    fn poll_url_replaces_page_file() {
        assert_eq!(poll_url_for("http://plc/app/index.html"), "http://plc/app/data/data.html");
        assert_eq!(poll_url_for("http://plc/index.html?x=index.html"), "http://plc/data/data.html?x=index.html");
        assert_eq!(poll_url_for("http://plc/app/"), "http://plc/app/");
    }

    #[test]
    fn fragment_is_dropped() {
        let agent = MockAgent::default();
        let ctl = PageController::new(agent, MemoryPage::new(), "http://plc/app/index.html#top").unwrap();
        assert_eq!(ctl.poll_url().to_string(), "http://plc/app/data/data.html");
    }

    #[test]
    fn invalid_location_is_rejected() {
        let res = PageController::new(MockAgent::default(), MemoryPage::new(), "http://bad host/");
        assert_eq!(res.err().map(|e| e.kind), Some(ErrorKind::UrlError));
    }

    #[test]
    fn legacy_keys_all_use_data1() {
        let (_, ctl) = controller();
        for field in Field::ALL.iter() {
            assert_eq!(ctl.param_key(*field), "\"db2\".data1");
        }
    }

    #[test]
    fn per_field_keys() {
        let (_, ctl) = controller();
        let ctl = ctl.key_mapping(KeyMapping::PerField).db("plc_io");
        assert_eq!(ctl.param_key(Field::Data3), "\"plc_io\".data3");
        assert_eq!(ctl.post_body(Field::Data4, "9"), "\"plc_io\".data4=9");
    }

    #[tokio::test]
    async fn send_posts_output_value_to_page() {
        let (agent, ctl) = controller();

        for (i, field) in Field::ALL.iter().enumerate() {
            let value = format!("v{}", i);
            ctl.page().set_content(&field.output_id(), &value).unwrap();
            ctl.send(*field).await.unwrap();
        }

        let posts = agent.posts.lock().unwrap();
        assert_eq!(posts.len(), 4);
        for (i, (url, body)) in posts.iter().enumerate() {
            assert_eq!(url.to_string(), PAGE);
            assert_eq!(body, &format!("\"db2\".data1=v{}", i));
        }
        assert_eq!(displays(&ctl), vec![""; 4]);
    }

    #[tokio::test]
    async fn send_without_output_control_fails() {
        let (agent, ctl) = controller();
        ctl.page().remove("data2_out");

        let err = ctl.send(Field::Data2).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingElement);
        assert!(agent.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn poll_updates_displays() {
        let (agent, ctl) = controller();
        agent.reply(200, BODY);

        let outcome = ctl.poll().await.unwrap();
        assert!(matches!(outcome, PollOutcome::Updated(_)));
        assert_eq!(displays(&ctl), vec!["a", "b", "c", "d"]);
        assert_eq!(agent.gets.lock().unwrap()[0].to_string(), "http://192.168.0.1/awp/app/data/data.html");
    }

    #[tokio::test]
    async fn repeated_polls_are_idempotent() {
        let (agent, ctl) = controller();
        agent.reply(200, BODY);
        agent.reply(200, BODY);

        ctl.poll().await.unwrap();
        ctl.poll().await.unwrap();
        assert_eq!(displays(&ctl), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn not_found_leaves_displays_and_warns() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (agent, ctl) = controller();
        for field in Field::ALL.iter() {
            ctl.page().set_content(&field.display_id(), "old").unwrap();
        }
        agent.reply(404, "<html>not found</html>");

        let outcome = ctl.poll().await.unwrap();
        assert_eq!(outcome, PollOutcome::Status(StatusCode::NOT_FOUND));
        assert_eq!(displays(&ctl), vec!["old"; 4]);

        let logs = capture.text();
        assert!(logs.contains("WARN"));
        assert!(logs.contains("error on poll code:404"));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let (agent, ctl) = controller();
        agent.reply(200, "not json");

        let err = ctl.poll().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecodeError);
        assert_eq!(displays(&ctl), vec![""; 4]);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let (_, ctl) = controller();
        let err = ctl.poll().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::HttpError);
    }
}
