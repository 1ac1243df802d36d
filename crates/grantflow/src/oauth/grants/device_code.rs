//! Device authorization grant (RFC 8628).
//!
//! # Flow
//!
//! 1. The device requests a device code and a user code
//! 2. The user enters the user code at the verification URI and approves or
//!    denies the request
//! 3. The device polls the token endpoint until a decision is recorded
//!
//! Polling faster than the advertised interval yields `slow_down`.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::generator::{generate_token, generate_user_code};
use crate::oauth::grants::{
    GrantContext, PreviousCredential, TokenGrant, ValidatedTokenRequest, check_client_grant_type,
    token_json_response,
};
use crate::oauth::request::OAuth2Request;
use crate::oauth::response::OAuth2Response;
use crate::oauth::scope::Scope;
use crate::types::{DeviceCredential, DeviceStatus, GrantType, TokenEndpointAuthMethod, User};

const AUTH_METHODS: &[TokenEndpointAuthMethod] = &[
    TokenEndpointAuthMethod::ClientSecretBasic,
    TokenEndpointAuthMethod::ClientSecretPost,
    TokenEndpointAuthMethod::None,
];

/// Device authorization response (RFC 8628 Section 3.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorizationResponse {
    /// Code the device polls with.
    pub device_code: String,

    /// Code the user enters.
    pub user_code: String,

    /// Where the user enters the code.
    pub verification_uri: String,

    /// Verification URI with the user code filled in.
    pub verification_uri_complete: String,

    /// Lifetime of both codes in seconds.
    pub expires_in: u64,

    /// Minimum polling interval in seconds.
    pub interval: u64,
}

/// Handler for `grant_type=urn:ietf:params:oauth:grant-type:device_code`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCodeGrant;

impl DeviceCodeGrant {
    /// Starts a device authorization.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` or `unauthorized_client` for client failures,
    /// and `invalid_scope` for unsupported scopes.
    pub async fn create_device_authorization(
        &self,
        ctx: &GrantContext,
        request: &OAuth2Request,
    ) -> OAuth2Result<DeviceAuthorizationResponse> {
        let client = ctx.authenticate_client(request, AUTH_METHODS).await?.client;
        check_client_grant_type(&client, GrantType::DeviceCode)?;

        let requested = request.scope();
        ctx.validate_requested_scope(&requested)?;

        let config = &ctx.config.device;
        let now = OffsetDateTime::now_utc();
        let lifetime = time::Duration::try_from(config.lifetime).unwrap_or(time::Duration::MAX);
        let credential = DeviceCredential {
            device_code: generate_token(ctx.config.tokens.token_length),
            user_code: generate_user_code(config.user_code_length),
            client_id: client.client_id.clone(),
            scope: client.allowed_scope(&requested).to_string(),
            issued_at: now,
            expires_at: now.saturating_add(lifetime),
            interval: config.interval.as_secs(),
            status: DeviceStatus::Pending,
        };
        ctx.devices()?.save_device(&credential).await?;
        tracing::info!(client_id = %client.client_id, "Device authorization started");

        let verification_uri_complete = url::Url::parse_with_params(
            &config.verification_uri,
            [("user_code", credential.user_code.as_str())],
        )
        .map(String::from)
        .unwrap_or_else(|_| config.verification_uri.clone());

        Ok(DeviceAuthorizationResponse {
            device_code: credential.device_code,
            user_code: credential.user_code,
            verification_uri: config.verification_uri.clone(),
            verification_uri_complete,
            expires_in: config.lifetime.as_secs(),
            interval: credential.interval,
        })
    }

    /// Records the user's decision for a user code.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for an unknown user code, `expired_token`
    /// when the code has expired and `access_denied` for an inactive user.
    pub async fn record_decision(
        &self,
        ctx: &GrantContext,
        user_code: &str,
        user: Option<&User>,
    ) -> OAuth2Result<()> {
        let devices = ctx.devices()?;
        let credential = devices
            .query_user_code(user_code)
            .await?
            .ok_or_else(|| OAuth2Error::invalid_request("Invalid \"user_code\""))?;
        if credential.is_expired() {
            return Err(OAuth2Error::expired_token());
        }

        let status = match user {
            Some(user) if user.active => DeviceStatus::Approved {
                user_id: user.id.clone(),
            },
            Some(_) => return Err(OAuth2Error::access_denied("The user is not active")),
            None => DeviceStatus::Denied,
        };
        let approved = matches!(status, DeviceStatus::Approved { .. });
        if !devices.set_status(user_code, status).await? {
            return Err(OAuth2Error::invalid_request("Invalid \"user_code\""));
        }
        tracing::info!(client_id = %credential.client_id, approved, "Device authorization decided");
        Ok(())
    }
}

/// Renders a device authorization response as `200` JSON.
#[must_use]
pub fn device_authorization_json(response: &DeviceAuthorizationResponse) -> OAuth2Response {
    OAuth2Response::json(
        StatusCode::OK,
        serde_json::to_value(response).unwrap_or_default(),
    )
}

#[async_trait]
impl TokenGrant for DeviceCodeGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::DeviceCode
    }

    fn auth_methods(&self) -> &[TokenEndpointAuthMethod] {
        AUTH_METHODS
    }

    async fn validate_token_request(
        &self,
        ctx: &GrantContext,
        request: &OAuth2Request,
    ) -> OAuth2Result<ValidatedTokenRequest> {
        let client = ctx
            .authenticate_client(request, self.auth_methods())
            .await?
            .client;
        check_client_grant_type(&client, GrantType::DeviceCode)?;

        let device_code = request
            .device_code()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"device_code\" in request"))?;

        let devices = ctx.devices()?;
        let credential = devices
            .query_device(device_code)
            .await?
            .ok_or_else(|| OAuth2Error::invalid_request("Invalid \"device_code\" in request"))?;

        if !credential.check_client(&client.client_id) {
            return Err(OAuth2Error::unauthorized_client(
                "The device code was issued to another client",
            ));
        }
        if credential.is_expired() {
            return Err(OAuth2Error::expired_token());
        }

        let user_id = match &credential.status {
            DeviceStatus::Approved { user_id } => user_id,
            DeviceStatus::Denied => {
                return Err(OAuth2Error::access_denied("The user denied the request"));
            }
            DeviceStatus::Pending => {
                let now = OffsetDateTime::now_utc();
                let interval = time::Duration::seconds(
                    i64::try_from(credential.interval).unwrap_or(i64::MAX),
                );
                let previous = devices.record_poll(device_code, now).await?;
                if previous.is_some_and(|at| now < at.saturating_add(interval)) {
                    return Err(OAuth2Error::slow_down());
                }
                return Err(OAuth2Error::authorization_pending());
            }
        };

        let user = ctx
            .users()?
            .find_user(user_id)
            .await?
            .filter(|user| user.active)
            .ok_or_else(|| OAuth2Error::access_denied("The approving user is no longer valid"))?;

        Ok(ValidatedTokenRequest {
            scope: client.allowed_scope(&Scope::parse(&credential.scope)),
            include_refresh_token: client.check_grant_type(GrantType::RefreshToken),
            client,
            grant_type: GrantType::DeviceCode,
            user: Some(user),
            previous: PreviousCredential::DeviceCode(credential.device_code),
        })
    }

    async fn create_token_response(
        &self,
        ctx: &GrantContext,
        validated: ValidatedTokenRequest,
    ) -> OAuth2Result<OAuth2Response> {
        if let PreviousCredential::DeviceCode(device_code) = &validated.previous
            && ctx.devices()?.remove_device(device_code).await?.is_none()
        {
            return Err(OAuth2Error::invalid_grant("The device code was already used"));
        }

        let token = ctx
            .issue_token(
                &validated.client,
                GrantType::DeviceCode,
                validated.user.as_ref(),
                &validated.scope,
                validated.include_refresh_token,
            )
            .await?;
        Ok(token_json_response(&token))
    }
}
