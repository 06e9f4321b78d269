//! `WebSession`: both collaborator traits over the platform's browser-facing
//! JSON endpoints.
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_warn};
use follow_core::{Direction, Extent, Identifier, TargetProfile};
use futures_util::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, LOCATION, REFERER, SET_COOKIE, USER_AGENT,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::{DriverError, FailureKind, RelationSource, SeverStep, TargetDriver, TargetPage};

#[derive(Debug, Clone)]
pub struct WebSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    /// Users requested per relation page.
    pub page_size: u32,
    pub user_agent: String,
    pub app_id: String,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.instagram.com/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
            page_size: 200,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
            app_id: "936619743392459".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub session_id: String,
    pub csrf_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("session_id", &"<redacted>")
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    data: Option<ProfileData>,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    user: Option<WebUser>,
}

#[derive(Debug, Deserialize)]
struct WebUser {
    id: String,
    is_private: Option<bool>,
    followed_by_viewer: Option<bool>,
    edge_follow: Option<EdgeCount>,
    edge_followed_by: Option<EdgeCount>,
}

#[derive(Debug, Deserialize)]
struct EdgeCount {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct FriendshipPage {
    #[serde(default)]
    users: Vec<PageUser>,
    next_max_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PageUser {
    username: String,
}

/// Top-level fields of any API reply. User-authored text (names, bios)
/// lives deeper in the payload and never lands here.
#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    status: Option<String>,
    message: Option<String>,
    require_login: Option<bool>,
    feedback_title: Option<String>,
    feedback_message: Option<String>,
}

impl ApiStatus {
    fn notice(&self) -> String {
        [&self.message, &self.feedback_title, &self.feedback_message]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug)]
struct ListView {
    user_id: String,
    direction: Direction,
    expected: Option<usize>,
    cursor: Option<String>,
    pages: u32,
    exhausted: bool,
    handles: Vec<String>,
}

#[derive(Debug)]
struct TargetView {
    user_id: Option<String>,
    profile: TargetProfile,
}

/// One authenticated web session.
///
/// The "current content" handed to rate-signal checks is the platform's own
/// notice on the last response: the body of an error reply, or the status
/// fields of a successful one. Payload data is never exposed, and the notice
/// is cleared whenever no fresh response backs it.
pub struct WebSession {
    client: reqwest::Client,
    settings: WebSettings,
    base: Url,
    credentials: Credentials,
    user_ids: HashMap<Identifier, String>,
    list: Option<ListView>,
    target: Option<TargetView>,
    notice: String,
}

impl WebSession {
    /// Build the client and, when no CSRF token was supplied, pick one up
    /// from the landing page's cookies.
    pub async fn connect(
        settings: WebSettings,
        credentials: Credentials,
    ) -> Result<Self, DriverError> {
        let mut base = Url::parse(&settings.base_url)
            .map_err(|err| DriverError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = build_client(&settings, &base)?;
        let mut session = Self {
            client,
            settings,
            base,
            credentials,
            user_ids: HashMap::new(),
            list: None,
            target: None,
            notice: String::new(),
        };
        if session.credentials.csrf_token.is_none() {
            session.credentials.csrf_token = session.fetch_csrf_token().await;
            if session.credentials.csrf_token.is_none() {
                engine_warn!("No CSRF token available; unfollow requests will likely be refused");
            }
        }
        Ok(session)
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    async fn fetch_csrf_token(&self) -> Option<String> {
        let response = self
            .client
            .get(self.base.clone())
            .header(COOKIE, self.cookie_header())
            .send()
            .await
            .ok()?;
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| {
                let pair = cookie.split(';').next()?.trim();
                pair.strip_prefix("csrftoken=").map(str::to_string)
            })
            .filter(|token| !token.is_empty())
    }

    fn cookie_header(&self) -> String {
        match &self.credentials.csrf_token {
            Some(token) => format!("sessionid={}; csrftoken={}", self.credentials.session_id, token),
            None => format!("sessionid={}", self.credentials.session_id),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriverError> {
        self.base
            .join(path)
            .map_err(|err| DriverError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    /// Send `request`, record its notice, and fail on anything but a
    /// non-empty success.
    async fn execute(&mut self, request: RequestBuilder) -> Result<String, DriverError> {
        self.notice.clear();
        let response = request
            .header(COOKIE, self.cookie_header())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || redirects_to_login(&response) {
            return Err(DriverError::new(
                FailureKind::Unauthenticated,
                format!("{} from {}", status, response.url()),
            ));
        }

        let body = read_capped(response, self.settings.max_bytes).await?;
        let api: ApiStatus = serde_json::from_str(&body).unwrap_or_default();
        if !status.is_success() {
            self.notice = format!("{status} {body}");
            if api.require_login == Some(true) {
                return Err(DriverError::new(FailureKind::Unauthenticated, "login required"));
            }
            return Err(DriverError::new(
                FailureKind::HttpStatus(status.as_u16()),
                api.message.unwrap_or_else(|| status.to_string()),
            ));
        }

        self.notice = api.notice();
        if body.trim().is_empty() {
            return Err(DriverError::new(FailureKind::EmptyResponse, "empty body"));
        }
        Ok(body)
    }

    async fn lookup(&mut self, handle: &Identifier) -> Result<WebUser, DriverError> {
        let mut url = self.endpoint("api/v1/users/web_profile_info/")?;
        url.query_pairs_mut().append_pair("username", handle.as_str());
        let referer = self.endpoint(&format!("{}/", handle.as_str()))?;
        let body = self
            .execute(self.client.get(url).header(REFERER, referer.as_str()))
            .await?;

        let envelope: ProfileEnvelope = decode(&body)?;
        let user = envelope.data.and_then(|data| data.user).ok_or_else(|| {
            DriverError::new(
                FailureKind::ContainerMissing,
                format!("no profile for @{handle}"),
            )
        })?;
        self.user_ids.insert(handle.clone(), user.id.clone());
        Ok(user)
    }

    async fn fetch_page(&mut self) -> Result<(), DriverError> {
        let Some(view) = self.list.as_ref() else {
            return Err(DriverError::new(FailureKind::ContainerMissing, "no list is open"));
        };
        let mut url = self.endpoint(&format!(
            "api/v1/friendships/{}/{}/",
            view.user_id,
            view.direction.as_str()
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("count", &self.settings.page_size.to_string());
            if let Some(cursor) = &view.cursor {
                query.append_pair("max_id", cursor);
            }
        }

        let body = match self.execute(self.client.get(url)).await {
            Ok(body) => body,
            Err(err) if err.kind == FailureKind::HttpStatus(429) => {
                engine_debug!("Relation page throttled: {}", err);
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let page: FriendshipPage = decode(&body)?;
        let Some(view) = self.list.as_mut() else {
            return Ok(());
        };
        view.pages += 1;
        view.handles.extend(page.users.into_iter().map(|user| user.username));
        view.cursor = page.next_max_id.and_then(cursor_string);
        view.exhausted = view.cursor.is_none();
        Ok(())
    }
}

#[async_trait]
impl RelationSource for WebSession {
    async fn open(&mut self, handle: &Identifier, direction: Direction) -> Result<(), DriverError> {
        self.list = None;
        let user = self.lookup(handle).await?;
        let count = match direction {
            Direction::Following => user.edge_follow,
            Direction::Followers => user.edge_followed_by,
        };
        self.list = Some(ListView {
            user_id: user.id,
            direction,
            expected: count.and_then(|c| usize::try_from(c.count).ok()),
            cursor: None,
            pages: 0,
            exhausted: false,
            handles: Vec::new(),
        });
        Ok(())
    }

    async fn expected_count(&mut self) -> Option<usize> {
        self.list.as_ref().and_then(|view| view.expected)
    }

    async fn advance(&mut self) -> Result<(), DriverError> {
        match self.list.as_ref() {
            None => Err(DriverError::new(FailureKind::ContainerMissing, "no list is open")),
            Some(view) if view.exhausted => {
                // Nothing was requested, so there is nothing new to scan.
                self.notice.clear();
                Ok(())
            }
            Some(_) => self.fetch_page().await,
        }
    }

    async fn extent(&mut self) -> Result<Extent, DriverError> {
        let view = self
            .list
            .as_ref()
            .ok_or_else(|| DriverError::new(FailureKind::ContainerMissing, "no list is open"))?;
        Ok(if view.exhausted {
            Extent::End
        } else {
            match &view.cursor {
                Some(cursor) => Extent::Cursor(cursor.clone()),
                None => Extent::Offset(u64::from(view.pages)),
            }
        })
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        Ok(self.notice.clone())
    }

    async fn extract(&mut self) -> Result<Vec<String>, DriverError> {
        self.list
            .as_ref()
            .map(|view| view.handles.clone())
            .ok_or_else(|| DriverError::new(FailureKind::ContainerMissing, "no list is open"))
    }
}

#[async_trait]
impl TargetDriver for WebSession {
    async fn visit(&mut self, target: &Identifier) -> Result<(), DriverError> {
        self.target = None;
        let view = match self.lookup(target).await {
            Ok(user) => TargetView {
                user_id: Some(user.id),
                profile: TargetProfile {
                    private: user.is_private,
                    related: user.followed_by_viewer,
                },
            },
            // The throttled reply stays the notice so the caller can detect it.
            Err(err) if err.kind == FailureKind::HttpStatus(429) => TargetView {
                user_id: self.user_ids.get(target).cloned(),
                profile: TargetProfile::default(),
            },
            Err(err) => return Err(err),
        };
        self.target = Some(view);
        Ok(())
    }

    async fn inspect(&mut self, target: &Identifier) -> Result<TargetPage, DriverError> {
        let view = self.target.as_ref().ok_or_else(|| {
            DriverError::new(FailureKind::ContainerMissing, format!("@{target} was not loaded"))
        })?;
        Ok(TargetPage {
            content: self.notice.clone(),
            profile: view.profile,
        })
    }

    async fn begin_sever(&mut self, target: &Identifier) -> Result<SeverStep, DriverError> {
        let user_id = self
            .target
            .as_ref()
            .and_then(|view| view.user_id.clone())
            .or_else(|| self.user_ids.get(target).cloned())
            .ok_or_else(|| {
                DriverError::new(
                    FailureKind::InteractionFailed,
                    format!("no user id known for @{target}"),
                )
            })?;

        let url = self.endpoint(&format!("api/v1/friendships/destroy/{user_id}/"))?;
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user_id", &user_id)
            .finish();
        let referer = self.endpoint(&format!("{}/", target.as_str()))?;
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(REFERER, referer.as_str())
            .body(form);
        if let Some(token) = &self.credentials.csrf_token {
            request = request.header("X-CSRFToken", token.as_str());
        }

        let body = self.execute(request).await?;
        let reply: ApiStatus = decode(&body)?;
        match reply.status.as_deref() {
            None | Some("ok") => Ok(SeverStep::Done),
            Some(other) => Err(DriverError::new(
                FailureKind::InteractionFailed,
                reply.message.unwrap_or_else(|| format!("status {other}")),
            )),
        }
    }

    async fn confirm_sever(&mut self, _target: &Identifier) -> Result<(), DriverError> {
        // A single API call needs no confirmation step.
        Ok(())
    }

    async fn current_content(&mut self) -> Result<String, DriverError> {
        Ok(self.notice.clone())
    }
}

fn build_client(settings: &WebSettings, base: &Url) -> Result<reqwest::Client, DriverError> {
    let mut headers = HeaderMap::new();
    let header = |value: &str| {
        HeaderValue::from_str(value)
            .map_err(|err| DriverError::new(FailureKind::InvalidUrl, err.to_string()))
    };
    headers.insert(USER_AGENT, header(&settings.user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(REFERER, header(base.as_str())?);
    headers.insert("x-ig-app-id", header(&settings.app_id)?);
    headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));

    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .default_headers(headers)
        .build()
        .map_err(|err| DriverError::new(FailureKind::Network, err.to_string()))
}

fn redirects_to_login(response: &reqwest::Response) -> bool {
    response.status().is_redirection()
        && response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|location| location.contains("/accounts/login"))
}

async fn read_capped(response: reqwest::Response, max_bytes: u64) -> Result<String, DriverError> {
    if let Some(content_len) = response.content_length() {
        if content_len > max_bytes {
            return Err(DriverError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(content_len),
                },
                "response too large",
            ));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let next_len = bytes.len() as u64 + chunk.len() as u64;
        if next_len > max_bytes {
            return Err(DriverError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(next_len),
                },
                "response too large",
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn decode<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, DriverError> {
    serde_json::from_str(body).map_err(|err| DriverError::new(FailureKind::Decode, err.to_string()))
}

fn cursor_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        return DriverError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return DriverError::new(FailureKind::InvalidUrl, err.to_string());
    }
    DriverError::new(FailureKind::Network, err.to_string())
}
