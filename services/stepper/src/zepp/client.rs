//! HTTP client for the Zepp endpoints

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, LOCATION, USER_AGENT,
};
use reqwest::{Client, StatusCode, redirect};
use serde_json::Value;
use tracing::{debug, info};
use url::form_urlencoded;

use super::{TokenGrant, ZeppApi, crypto, payload};
use crate::error::ApiError;
use crate::models::AccountConfig;

const APP_NAME: &str = "com.xiaomi.hm.health";
const APP_VERSION: &str = "6.14.0";
const APP_USER_AGENT: &str = "MiFit6.14.0 (OPD2413; Android 15; Density/2.625)";
const LOGIN_USER_AGENT: &str = "MiFit6.14.0 (M2007J1SC; Android 12; Density/2.75)";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
const REGISTRATION_REDIRECT: &str =
    "https://s3-us-west-2.amazonaws.com/hm-registration/successsignin.html";

/// Endpoint URLs, overridable for staging setups
#[derive(Debug, Clone)]
pub struct ZeppEndpoints {
    pub registrations: String,
    pub login: String,
    pub user_info: String,
    pub band_data: String,
}

impl Default for ZeppEndpoints {
    fn default() -> Self {
        Self {
            registrations: "https://api-user.zepp.com/v2/registrations/tokens".to_string(),
            login: "https://account.huami.com/v2/client/login".to_string(),
            user_info: "https://api-mifit-cn3.zepp.com/huami.health.getUserInfo.json".to_string(),
            band_data: "https://api-mifit-cn.huami.com/v1/data/band_data.json".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ZeppClient {
    http: Client,
    endpoints: ZeppEndpoints,
}

impl ZeppClient {
    /// Build a client whose every request times out after `timeout`
    ///
    /// Redirects are never followed: the access code is read from the
    /// `Location` header of the identity endpoint's 303.
    pub fn new(timeout: Duration, endpoints: ZeppEndpoints) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.8"));
        headers.insert("app_name", HeaderValue::from_static(APP_NAME));
        headers.insert("appname", HeaderValue::from_static(APP_NAME));
        headers.insert("appplatform", HeaderValue::from_static("android_phone"));
        headers.insert(USER_AGENT, HeaderValue::from_static(APP_USER_AGENT));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self { http, endpoints })
    }
}

fn login_form(account: &AccountConfig) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("emailOrPhone", &account.login_name())
        .append_pair("password", &account.password)
        .append_pair("state", "REDIRECTION")
        .append_pair("client_id", "HuaMi")
        .append_pair("country_code", "CN")
        .append_pair("token", "access")
        .append_pair("redirect_uri", REGISTRATION_REDIRECT)
        .finish()
}

fn third_name(account: &AccountConfig) -> &'static str {
    if account.is_email() {
        "email"
    } else {
        "huami_phone"
    }
}

/// Pull the access code out of the identity endpoint's redirect target
pub fn parse_access_code(location: &str) -> Result<String, ApiError> {
    static ACCESS: OnceLock<Regex> = OnceLock::new();
    static ERROR: OnceLock<Regex> = OnceLock::new();

    let access = ACCESS
        .get_or_init(|| Regex::new(r"access=([^&\s]+)").expect("Failed to compile access regex"));
    if let Some(code) = access.captures(location).and_then(|c| c.get(1)) {
        return Ok(code.as_str().to_string());
    }

    let error = ERROR
        .get_or_init(|| Regex::new(r"error=([^&\s]+)").expect("Failed to compile error regex"));
    match error.captures(location).and_then(|c| c.get(1)) {
        Some(code) if code.as_str().contains("401") || code.as_str().contains("auth_failed") => {
            Err(ApiError::Rejected)
        }
        Some(code) => Err(ApiError::UnexpectedResponse(format!(
            "identity endpoint returned error {}",
            code.as_str()
        ))),
        None => Err(ApiError::UnexpectedResponse(
            "identity endpoint redirect carried no access code".to_string(),
        )),
    }
}

fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read the token grant out of the account endpoint's response body
pub fn parse_grant(body: &Value) -> Result<TokenGrant, ApiError> {
    let info = &body["token_info"];
    if body["result"] != "ok" || !info.is_object() {
        return Err(ApiError::UnexpectedResponse(format!(
            "token grant refused: {body}"
        )));
    }

    let field = |name: &str| {
        json_string(&info[name]).ok_or_else(|| {
            ApiError::UnexpectedResponse(format!("token grant is missing {name}"))
        })
    };

    Ok(TokenGrant {
        login_token: field("login_token")?,
        app_token: field("app_token")?,
        user_id: field("user_id")?,
    })
}

/// Whether the vendor accepted a band data upload
pub fn check_submission(body: &Value) -> Result<(), ApiError> {
    if body["code"] == 1 {
        return Ok(());
    }
    let message = body["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    Err(ApiError::Submission(message))
}

#[async_trait]
impl ZeppApi for ZeppClient {
    async fn fetch_access_code(&self, account: &AccountConfig) -> Result<String, ApiError> {
        let body = crypto::encrypt_login_form(&login_form(account));

        let response = self
            .http
            .post(&self.endpoints.registrations)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(USER_AGENT, LOGIN_USER_AGENT)
            .header("x-hm-ekv", "1")
            .header("hm-privacy-ceip", "false")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Rejected);
        }
        if status != StatusCode::SEE_OTHER {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::UnexpectedResponse(format!(
                "identity endpoint answered {status}: {text}"
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::UnexpectedResponse("identity endpoint sent no Location header".into())
            })?;

        let code = parse_access_code(location)?;
        info!(account = %account.masked(), "Obtained access code");
        Ok(code)
    }

    async fn grant_tokens(
        &self,
        account: &AccountConfig,
        access_code: &str,
        device_id: &str,
    ) -> Result<TokenGrant, ApiError> {
        let form = [
            ("app_name", APP_NAME),
            ("app_version", APP_VERSION),
            ("code", access_code),
            ("country_code", "CN"),
            ("device_id", device_id),
            ("device_model", "phone"),
            ("grant_type", "access_token"),
            ("third_name", third_name(account)),
        ];

        let body: Value = self
            .http
            .post(&self.endpoints.login)
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        let grant = parse_grant(&body)?;
        info!(account = %account.masked(), "Obtained login and app tokens");
        Ok(grant)
    }

    async fn probe_app_token(&self, app_token: &str) -> Result<bool, ApiError> {
        let response = self
            .http
            .get(&self.endpoints.user_info)
            .query(&[("apptoken", app_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("App token probe answered {}", response.status());
            return Ok(false);
        }

        let body: Value = response.json().await?;
        Ok(body["message"] == "success")
    }

    async fn submit_steps(
        &self,
        app_token: &str,
        user_id: &str,
        steps: u32,
        date: NaiveDate,
    ) -> Result<(), ApiError> {
        let now = Utc::now().timestamp_millis();
        let nonce = uuid::Uuid::new_v4().to_string();
        let form = payload::submission_form(user_id, steps, date, now);

        let body: Value = self
            .http
            .post(&self.endpoints.band_data)
            .query(&[("t", now.to_string()), ("r", nonce)])
            .header("apptoken", app_token)
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        check_submission(&body)
    }
}
