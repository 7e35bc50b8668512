// API client module: a small blocking HTTP client that drives the
// HumanizeAI Pro job endpoints. One client instance owns one session id and
// one cookie jar; every call runs to completion on the calling thread.

use crate::config::{ClientConfig, PollSettings};
use crate::error::{excerpt, HumanizeError, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::blocking::{Client, Response};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, AUTHORIZATION,
    CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE, DNT, ORIGIN, REFERER, USER_AGENT,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Length of a generated session id, matching what the web app sends.
pub const SESSION_ID_LEN: usize = 30;

const USER_INFO_PATH: &str = "/api/user/getuserinfo";
const PROCESS_PATH: &str = "/api/process_free";

const OP_ACCOUNT: &str = "getuserinfo";
const OP_START: &str = "start job";
const OP_POLL: &str = "poll";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";

/// Client bound to one credential and one session id.
pub struct HumanizeClient {
    client: Client,
    base_url: String,
    token: String,
    session_id: String,
    poll: PollSettings,
}

/// Parameters of one humanization job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub text: String,
    pub model: String,
    pub ultra: bool,
    pub keywords: Vec<String>,
    pub trial_number: u32,
    pub alg: u32,
    pub is_logged: bool,
}

impl JobRequest {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        JobRequest {
            text: text.into(),
            model: model.into(),
            ultra: false,
            keywords: Vec::new(),
            trial_number: 0,
            alg: 0,
            is_logged: true,
        }
    }

    pub fn ultra(mut self, ultra: bool) -> Self {
        self.ultra = ultra;
        self
    }

    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

/// Opaque job id handed out by the service. Echoed back exactly as received,
/// so it keeps its JSON form rather than being coerced to a string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobHandle(Value);

impl From<&str> for JobHandle {
    fn from(id: &str) -> Self {
        JobHandle(Value::String(id.to_string()))
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// Account fields as returned by the service (credits, subscription, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountInfo(Map<String, Value>);

impl AccountInfo {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

impl fmt::Display for AccountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&line)
    }
}

/// One entry of the `result` list. Only `text` is relied on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultVersion {
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A finished job: never empty, the last version is the final output.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    versions: Vec<ResultVersion>,
}

impl JobResult {
    pub fn versions(&self) -> &[ResultVersion] {
        &self.versions
    }

    pub fn final_text(&self) -> &str {
        // Construction guarantees at least one version.
        self.versions.last().map(|v| v.text.as_str()).unwrap_or_default()
    }

    pub fn into_final_text(mut self) -> String {
        self.versions.pop().map(|v| v.text).unwrap_or_default()
    }
}

/// What a single poll response says about the job.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    Pending,
    Complete(JobResult),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartPayload<'a> {
    cache_mode: &'static str,
    text: &'a str,
    trial_number: u32,
    alg: u32,
    session_id: &'a str,
    keywords: &'a [String],
    model: &'a str,
    is_logged: bool,
    ultra: bool,
}

// The web app repeats the bearer token inside the poll body. Whether the
// service needs it is unknown, so it is sent the same way.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PollPayload<'a> {
    cache_mode: &'static str,
    completion_id: &'a JobHandle,
    token: &'a str,
    session_id: &'a str,
    keywords: &'a [String],
}

/// Random alphanumeric id of [`SESSION_ID_LEN`] chars.
pub fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Headers the browser sends with every request, plus the bearer token.
fn browser_headers(base_url: &str, token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static("\"Chromium\";v=\"139\", \"Not;A=Brand\";v=\"99\""),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"macOS\""));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

    let origin = HeaderValue::from_str(base_url)
        .map_err(|_| HumanizeError::InvalidHeader { header: "origin" })?;
    let referer = HeaderValue::from_str(&format!("{base_url}/"))
        .map_err(|_| HumanizeError::InvalidHeader { header: "referer" })?;
    headers.insert(ORIGIN, origin);
    headers.insert(REFERER, referer);

    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| HumanizeError::InvalidHeader { header: "authorization" })?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    Ok(headers)
}

/// Undo a content encoding the HTTP stack left in place. Brotli gets a real
/// decoder; anything else is accepted only if the bytes are already JSON.
pub fn decode_content<'a>(encoding: Option<&str>, raw: &'a [u8]) -> Result<Cow<'a, [u8]>> {
    let encoding = match encoding {
        None => return Ok(Cow::Borrowed(raw)),
        Some(e) if e.is_empty() || e.eq_ignore_ascii_case("identity") => {
            return Ok(Cow::Borrowed(raw))
        }
        Some(e) => e,
    };

    if encoding.eq_ignore_ascii_case("br") {
        let mut decoded = Vec::new();
        match brotli::Decompressor::new(raw, 4096).read_to_end(&mut decoded) {
            Ok(_) => return Ok(Cow::Owned(decoded)),
            Err(e) => debug!(error = %e, "brotli decode failed, trying raw body"),
        }
    }

    if serde_json::from_slice::<Value>(raw).is_ok() {
        return Ok(Cow::Borrowed(raw));
    }
    Err(HumanizeError::UnsupportedEncoding {
        encoding: encoding.to_string(),
    })
}

/// Error text the service put in a failed response: the JSON `error` field
/// when there is one, else the body itself.
fn server_error_text(body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        if let Some(err) = map.get("error") {
            return value_text(err);
        }
    }
    excerpt(&String::from_utf8_lossy(body))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Classify one poll response body.
pub fn interpret_poll(body: &Map<String, Value>) -> Result<PollStatus> {
    if let Some(err) = body.get("error") {
        return Err(HumanizeError::Server {
            error: value_text(err),
            message: body.get("message").map(value_text),
        });
    }

    let Some(result) = body.get("result") else {
        return Ok(PollStatus::Pending);
    };

    let versions: Vec<ResultVersion> =
        serde_json::from_value(result.clone()).map_err(|e| HumanizeError::MalformedResult {
            detail: format!("{e}: {}", excerpt(&result.to_string())),
        })?;
    if versions.is_empty() {
        return Err(HumanizeError::MalformedResult {
            detail: "result list is empty".into(),
        });
    }
    Ok(PollStatus::Complete(JobResult { versions }))
}

impl HumanizeClient {
    /// Build a client from `config`. A session id is generated unless the
    /// config supplies one.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let headers = browser_headers(&base_url, &config.token)?;

        let mut builder = Client::builder().default_headers(headers).cookie_store(true);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(HumanizeError::ClientBuild)?;

        let session_id = config.session_id.unwrap_or_else(generate_session_id);
        debug!(%session_id, %base_url, "client ready");
        Ok(HumanizeClient {
            client,
            base_url,
            token: config.token,
            session_id,
            poll: config.poll,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read the response body, undoing any leftover encoding. Non-success
    /// statuses become `Status` errors carrying the server's error text.
    fn read_body(&self, operation: &'static str, res: Response) -> Result<Vec<u8>> {
        let status = res.status();
        let encoding = res
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string());
        let raw = res.bytes().map_err(HumanizeError::network(operation))?;

        if !status.is_success() {
            let body = decode_content(encoding.as_deref(), &raw).unwrap_or(Cow::Borrowed(&raw[..]));
            return Err(HumanizeError::Status {
                operation,
                status: status.as_u16(),
                message: server_error_text(&body),
            });
        }
        Ok(decode_content(encoding.as_deref(), &raw)?.into_owned())
    }

    fn post_json<T: Serialize>(
        &self,
        operation: &'static str,
        payload: &T,
    ) -> Result<Map<String, Value>> {
        let res = self
            .client
            .post(self.url(PROCESS_PATH))
            .json(payload)
            .send()
            .map_err(HumanizeError::network(operation))?;
        let body = self.read_body(operation, res)?;
        serde_json::from_slice(&body).map_err(HumanizeError::decode(operation))
    }

    /// Fetch account status. Advisory: callers may log a failure and go on.
    pub fn fetch_account_status(&self) -> Result<AccountInfo> {
        let res = self
            .client
            .post(self.url(USER_INFO_PATH))
            .body("")
            .send()
            .map_err(HumanizeError::network(OP_ACCOUNT))?;
        let body = self.read_body(OP_ACCOUNT, res)?;
        serde_json::from_slice(&body).map_err(HumanizeError::decode(OP_ACCOUNT))
    }

    /// Submit a job and return the handle used to poll for it.
    pub fn start_job(&self, job: &JobRequest) -> Result<JobHandle> {
        let payload = StartPayload {
            cache_mode: "start",
            text: &job.text,
            trial_number: job.trial_number,
            alg: job.alg,
            session_id: &self.session_id,
            keywords: &job.keywords,
            model: &job.model,
            is_logged: job.is_logged,
            ultra: job.ultra,
        };
        let body = self.post_json(OP_START, &payload)?;
        match body.get("completionId") {
            Some(id) if !id.is_null() => Ok(JobHandle(id.clone())),
            _ => Err(HumanizeError::MissingField {
                operation: OP_START,
                field: "completionId",
                body: excerpt(&Value::Object(body).to_string()),
            }),
        }
    }

    /// Poll until the job finishes, the service reports an error, or
    /// `timeout` has passed since the first attempt. At least one poll is
    /// always sent, and none after the budget is spent.
    pub fn poll_for_result(
        &self,
        handle: &JobHandle,
        keywords: &[String],
        interval: Duration,
        timeout: Duration,
    ) -> Result<String> {
        let payload = PollPayload {
            cache_mode: "get",
            completion_id: handle,
            token: &self.token,
            session_id: &self.session_id,
            keywords,
        };

        let started = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            // The first attempt always goes out; later ones only inside the budget.
            if attempts > 0 && started.elapsed() >= timeout {
                return Err(HumanizeError::Timeout { timeout, attempts });
            }
            attempts += 1;
            let body = self.post_json(OP_POLL, &payload)?;
            if let PollStatus::Complete(result) = interpret_poll(&body)? {
                info!(%handle, attempts, versions = result.versions().len(), "job finished");
                return Ok(result.into_final_text());
            }

            debug!(%handle, attempts, "job still running");
            thread::sleep(interval);
        }
    }

    /// Full flow: optional account check, start, poll. Only start and poll
    /// failures abort.
    pub fn humanize(&self, job: &JobRequest, check_account: bool) -> Result<String> {
        info!(model = %job.model, ultra = job.ultra, "starting humanization");

        if check_account {
            match self.fetch_account_status() {
                Ok(account) => info!(%account, "account status"),
                Err(e) => warn!(error = %e, "could not get account status"),
            }
        }

        let handle = self.start_job(job)?;
        info!(%handle, "job started");

        self.poll_for_result(&handle, &job.keywords, self.poll.interval, self.poll.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn session_id_is_alphanumeric_and_fixed_length() {
        let id = generate_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn explicit_session_id_is_kept() {
        let mut config = ClientConfig::new("tok");
        config.session_id = Some("fixedSession".into());
        let client = HumanizeClient::new(config).unwrap();
        assert_eq!(client.session_id(), "fixedSession");
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = HumanizeClient::new(ClientConfig::new("bad\ntoken")).err().unwrap();
        assert!(matches!(
            err,
            HumanizeError::InvalidHeader {
                header: "authorization"
            }
        ));
    }

    #[test]
    fn accept_encoding_only_offers_decodable_encodings() {
        let headers = browser_headers("https://www.humanizeai.pro", "tok").unwrap();
        assert_eq!(headers[ACCEPT_ENCODING], "gzip, deflate, br");
        assert_eq!(headers[REFERER], "https://www.humanizeai.pro/");
    }

    #[test]
    fn start_payload_shape() {
        let keywords = vec!["Earth".to_string()];
        let payload = StartPayload {
            cache_mode: "start",
            text: "hello",
            trial_number: 0,
            alg: 0,
            session_id: "S1",
            keywords: &keywords,
            model: "free1",
            is_logged: true,
            ultra: false,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "cacheMode": "start",
                "text": "hello",
                "trialNumber": 0,
                "alg": 0,
                "sessionId": "S1",
                "keywords": ["Earth"],
                "model": "free1",
                "isLogged": true,
                "ultra": false
            })
        );
    }

    #[test]
    fn poll_payload_echoes_handle_and_token() {
        let handle = JobHandle(json!(4711));
        let payload = PollPayload {
            cache_mode: "get",
            completion_id: &handle,
            token: "tok",
            session_id: "S1",
            keywords: &[],
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "cacheMode": "get",
                "completionId": 4711,
                "token": "tok",
                "sessionId": "S1",
                "keywords": []
            })
        );
    }

    #[test]
    fn pending_when_neither_error_nor_result() {
        let status = interpret_poll(&as_map(json!({"status": "processing"}))).unwrap();
        assert_eq!(status, PollStatus::Pending);
    }

    #[test]
    fn last_version_wins() {
        let body = as_map(json!({"result": [{"text": "A"}, {"text": "B", "score": 0.9}]}));
        match interpret_poll(&body).unwrap() {
            PollStatus::Complete(result) => {
                assert_eq!(result.versions().len(), 2);
                assert_eq!(result.final_text(), "B");
                assert_eq!(result.versions()[1].extra.get("score"), Some(&json!(0.9)));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn empty_result_is_malformed() {
        let err = interpret_poll(&as_map(json!({"result": []}))).unwrap_err();
        assert!(matches!(err, HumanizeError::MalformedResult { .. }));
    }

    #[test]
    fn version_without_text_is_malformed() {
        let err = interpret_poll(&as_map(json!({"result": [{"text": "A"}, {"body": "B"}]})))
            .unwrap_err();
        assert!(matches!(err, HumanizeError::MalformedResult { .. }));

        let err = interpret_poll(&as_map(json!({"result": null}))).unwrap_err();
        assert!(matches!(err, HumanizeError::MalformedResult { .. }));
    }

    #[test]
    fn error_field_beats_result() {
        let body = as_map(json!({"error": "failed", "message": "model busy", "result": [{"text": "A"}]}));
        match interpret_poll(&body).unwrap_err() {
            HumanizeError::Server { error, message } => {
                assert_eq!(error, "failed");
                assert_eq!(message.as_deref(), Some("model busy"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn server_error_text_prefers_error_field() {
        assert_eq!(server_error_text(br#"{"error":"Invalid token"}"#), "Invalid token");
        assert_eq!(server_error_text(b"Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn decode_content_handles_brotli() {
        let json_body = br#"{"credits":42}"#;
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(json_body).unwrap();
        }
        let decoded = decode_content(Some("br"), &compressed).unwrap();
        assert_eq!(&decoded[..], &json_body[..]);
    }

    #[test]
    fn decode_content_accepts_mislabelled_json() {
        let body = br#"{"credits":42}"#;
        let decoded = decode_content(Some("zstd"), body).unwrap();
        assert_eq!(&decoded[..], &body[..]);
        assert!(matches!(decode_content(None, body).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn decode_content_reports_unsupported_encoding() {
        let err = decode_content(Some("zstd"), &[0x28, 0xb5, 0x2f, 0xfd, 0x00]).unwrap_err();
        match err {
            HumanizeError::UnsupportedEncoding { encoding } => assert_eq!(encoding, "zstd"),
            other => panic!("expected unsupported encoding, got {other:?}"),
        }
    }

    #[test]
    fn job_request_defaults() {
        let job = JobRequest::new("text", "free1");
        assert!(job.is_logged);
        assert_eq!(job.trial_number, 0);
        assert_eq!(job.alg, 0);
        assert!(job.keywords.is_empty());
        assert!(!job.ultra);
    }

    #[test]
    fn handle_display_is_verbatim() {
        assert_eq!(JobHandle::from("abc-1").to_string(), "abc-1");
        assert_eq!(JobHandle(json!(12)).to_string(), "12");
    }
}
