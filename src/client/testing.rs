use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::*;

pub(crate) const BASE_URL: &str = "https://example.invalid/api";

/// Records every request and answers from a queue; once the queue is drained it keeps
/// returning the fallback response.
#[derive(Clone)]
pub(crate) struct FakeTransport {
    state: Arc<Mutex<FakeTransportState>>,
}

struct FakeTransportState {
    requests: Vec<HttpRequest>,
    responses: VecDeque<Result<HttpResponse, String>>,
    fallback: HttpResponse,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeTransportState {
                requests: Vec::new(),
                responses: VecDeque::new(),
                fallback: HttpResponse {
                    status: 200,
                    body: r#"{"messages": []}"#.to_owned(),
                },
            })),
        }
    }

    pub(crate) fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(Ok(HttpResponse {
                status,
                body: body.into(),
            }));
        self
    }

    pub(crate) fn fail(&self, message: impl Into<String>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(Err(message.into()));
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub(crate) fn gateway(&self) -> Gateway {
        Gateway {
            base_url: BASE_URL.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            http: Arc::new(self.clone()),
        }
    }
}

impl HttpTransport for FakeTransport {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        Box::pin(async move {
            let next = {
                let mut state = self.state.lock().unwrap();
                state.requests.push(request);
                state
                    .responses
                    .pop_front()
                    .unwrap_or_else(|| Ok(state.fallback.clone()))
            };
            next.map_err(Box::<dyn StdError + Send + Sync>::from)
        })
    }
}

pub(crate) fn query(request: &HttpRequest) -> Vec<(String, String)> {
    request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub(crate) fn assert_param(request: &HttpRequest, key: &str, value: &str) {
    let params = query(request);
    assert!(
        params.iter().any(|(k, v)| k == key && v == value),
        "missing param {key}={value}; got: {params:?}"
    );
}

pub(crate) fn assert_basic_auth(request: &HttpRequest, username: &str, token: &str) {
    let (user, tok) = request
        .basic_auth
        .as_ref()
        .expect("request should carry basic auth");
    assert_eq!(user.as_str(), username);
    assert_eq!(tok.as_str(), token);
}

pub(crate) fn session() -> Session {
    Session::from_parts("ssc", "tok-1", "key-1").unwrap()
}
