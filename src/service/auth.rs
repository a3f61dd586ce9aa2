//! # Log-on Flow
//!
//! Credentials go out in `ClientLogon`; the server answers with
//! `ClientLogOnResponse` and may later push a login key or a machine-auth
//! blob. Each push is acknowledged and surfaced as an [`Event`] so the
//! caller can persist it.
//!
//! ## Result Handling
//! - `OK`: session id and SteamID are adopted, heartbeat starts, [`Event::LoggedOn`]
//! - `AccountLogonDenied`, `AccountLoginDeniedNeedTwoFactor`, `TwoFactorCodeMismatch`:
//!   [`Event::SteamGuardRequired`], connection kept for a retry
//! - `Fail`, `ServiceUnavailable`, `TryAnotherCM`: [`Event::SteamFailure`], server will drop us
//! - anything else: [`Event::LogOnFailed`] and disconnect

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::emsg::{EMsg, EResult};
use crate::protocol::message::ProtoMessage;
use crate::protocol::messages::{MsgClientLogOnResponse, MsgClientLoggedOff, MsgClientNewLoginKey};
use crate::protocol::packet::Packet;
use crate::protocol::proto::{
    CMsgClientAccountInfo, CMsgClientLogOff, CMsgClientLoggedOff, CMsgClientLogon,
    CMsgClientLogonResponse, CMsgClientNewLoginKey, CMsgClientNewLoginKeyAccepted,
    CMsgClientUpdateMachineAuth, CMsgClientUpdateMachineAuthResponse,
};
use crate::service::client::Client;
use crate::service::events::{Event, LoggedOn, SteamGuardKind};
use crate::steamid::{instance, EAccountType, SteamId};
use crate::utils::crypto::sha1;
use std::fmt;
use tracing::{debug, info, instrument, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Credentials for [`Client::log_on`].
///
/// A username plus either a password or a login key is required. Secrets
/// are zeroed on drop.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct LogOnDetails {
    pub username: String,
    pub password: Option<String>,
    /// Key from a previous [`Event::LoginKey`], used instead of the password.
    pub login_key: Option<String>,
    /// Steam Guard code mailed to the account.
    pub auth_code: Option<String>,
    /// Code from the mobile authenticator.
    pub two_factor_code: Option<String>,
    /// SHA-1 of the sentry file from a previous [`Event::MachineAuthUpdate`].
    pub sentry_hash: Option<Vec<u8>>,
    /// Overrides the configured default when set.
    pub should_remember_password: Option<bool>,
}

impl LogOnDetails {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
            login_key: None,
            auth_code: None,
            two_factor_code: None,
            sentry_hash: None,
            should_remember_password: None,
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn login_key(mut self, key: impl Into<String>) -> Self {
        self.login_key = Some(key.into());
        self
    }

    pub fn auth_code(mut self, code: impl Into<String>) -> Self {
        self.auth_code = Some(code.into());
        self
    }

    pub fn two_factor_code(mut self, code: impl Into<String>) -> Self {
        self.two_factor_code = Some(code.into());
        self
    }

    pub fn sentry_hash(mut self, hash: impl Into<Vec<u8>>) -> Self {
        self.sentry_hash = Some(hash.into());
        self
    }

    pub fn remember_password(mut self, remember: bool) -> Self {
        self.should_remember_password = Some(remember);
        self
    }

    /// Checks that enough credentials are present to attempt a log-on.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(ProtocolError::MissingCredentials(
                constants::ERR_MISSING_USERNAME,
            ));
        }

        let has_password = self.password.as_deref().is_some_and(|p| !p.is_empty());
        let has_key = self.login_key.as_deref().is_some_and(|k| !k.is_empty());
        if !has_password && !has_key {
            return Err(ProtocolError::MissingCredentials(
                constants::ERR_MISSING_SECRET,
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for LogOnDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogOnDetails")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("login_key", &self.login_key.as_ref().map(|_| "<redacted>"))
            .field("auth_code", &self.auth_code.is_some())
            .field("two_factor_code", &self.two_factor_code.is_some())
            .field("sentry_hash", &self.sentry_hash.as_ref().map(hex::encode))
            .field("should_remember_password", &self.should_remember_password)
            .finish()
    }
}

impl Client {
    /// Sends `ClientLogon` with `details`.
    ///
    /// The outcome arrives as an event. Before sending, the SteamID is set
    /// to an unassigned individual desktop account so the request carries a
    /// consistent session stamp.
    ///
    /// # Errors
    /// `MissingCredentials` for incomplete details, `NotConnected` without a
    /// session, and KeyValue errors from the machine-id payload.
    #[instrument(skip(self, details), fields(username = %details.username))]
    pub fn log_on(&self, details: &LogOnDetails) -> Result<()> {
        details.validate()?;
        if !self.connected() {
            return Err(ProtocolError::NotConnected);
        }

        let login = &self.config().login;
        let machine_id = self.machine_id().machine_id().auth_payload()?;

        let logon = CMsgClientLogon {
            protocol_version: Some(login.protocol_version),
            client_language: Some(login.client_language.clone()),
            should_remember_password: Some(
                details
                    .should_remember_password
                    .unwrap_or(login.should_remember_password),
            ),
            machine_id: Some(machine_id),
            account_name: Some(details.username.clone()),
            password: details.password.clone(),
            login_key: details.login_key.clone(),
            eresult_sentryfile: Some(if details.sentry_hash.is_some() {
                u32::from(EResult::OK) as i32
            } else {
                u32::from(EResult::FileNotFound) as i32
            }),
            sha_sentryfile: details.sentry_hash.clone(),
            auth_code: details.auth_code.clone(),
            two_factor_code: details.two_factor_code.clone(),
            ..Default::default()
        };

        self.set_steam_id(SteamId::new(
            EAccountType::Individual,
            self.config().connection.universe,
            0,
            instance::DESKTOP,
        ));

        debug!("sending log-on request");
        self.write(ProtoMessage::new(EMsg::ClientLogon, logon));
        Ok(())
    }

    /// Asks the server to end the logged-on session.
    pub fn log_off(&self) {
        self.write(ProtoMessage::new(EMsg::ClientLogOff, CMsgClientLogOff {}));
    }
}

/// Packet handler for the log-on family of messages.
pub(crate) fn handle_packet(client: &Client, packet: &Packet) {
    let outcome = match packet.emsg() {
        EMsg::ClientLogOnResponse => handle_log_on_response(client, packet),
        EMsg::ClientNewLoginKey => handle_login_key(client, packet),
        EMsg::ClientLoggedOff => handle_logged_off(client, packet),
        EMsg::ClientUpdateMachineAuth => handle_update_machine_auth(client, packet),
        EMsg::ClientAccountInfo => handle_account_info(client, packet),
        _ => Ok(()),
    };

    if let Err(e) = outcome {
        client.report(e);
    }
}

/// The parts of a log-on response that drive the flow, whichever shape
/// it arrived in.
struct LogOnOutcome {
    result: EResult,
    extended_result: EResult,
    account_flags: u32,
    session_id: i32,
    steam_id: SteamId,
    client_supplied_steam_id: SteamId,
    heartbeat_seconds: u32,
    web_login_nonce: Option<String>,
    body: CMsgClientLogonResponse,
}

fn read_log_on_response(packet: &Packet) -> Result<LogOnOutcome> {
    if packet.is_proto() {
        let msg = packet.read_proto::<CMsgClientLogonResponse>()?;
        let body = msg.body;
        return Ok(LogOnOutcome {
            result: EResult::from(body.eresult()),
            extended_result: EResult::from(body.eresult_extended()),
            account_flags: body.account_flags(),
            session_id: msg.header.proto.client_sessionid(),
            steam_id: SteamId::from_u64(msg.header.proto.steamid()),
            client_supplied_steam_id: SteamId::from_u64(body.client_supplied_steamid()),
            heartbeat_seconds: u32::try_from(body.out_of_game_heartbeat_seconds()).unwrap_or(0),
            web_login_nonce: body.webapi_authenticate_user_nonce.clone(),
            body,
        });
    }

    let msg = packet.read_client_struct::<MsgClientLogOnResponse>()?;
    let heartbeat_seconds = u32::try_from(msg.body.out_of_game_heartbeat_rate_sec).unwrap_or(0);
    Ok(LogOnOutcome {
        result: msg.body.result,
        extended_result: EResult::Invalid,
        account_flags: 0,
        session_id: msg.header.session_id,
        steam_id: msg.header.steam_id,
        client_supplied_steam_id: msg.body.client_supplied_steam_id,
        heartbeat_seconds,
        web_login_nonce: None,
        body: CMsgClientLogonResponse {
            eresult: Some(u32::from(msg.body.result) as i32),
            out_of_game_heartbeat_seconds: Some(msg.body.out_of_game_heartbeat_rate_sec),
            in_game_heartbeat_seconds: Some(msg.body.in_game_heartbeat_rate_sec),
            client_supplied_steamid: Some(msg.body.client_supplied_steam_id.as_u64()),
            ..Default::default()
        },
    })
}

fn handle_log_on_response(client: &Client, packet: &Packet) -> Result<()> {
    let outcome = read_log_on_response(packet)?;
    let result = outcome.result;

    match result {
        EResult::OK => {
            client.set_session_id(outcome.session_id);
            client.set_steam_id(outcome.steam_id);
            client.set_web_login_nonce(outcome.web_login_nonce);
            client.start_heartbeat(outcome.heartbeat_seconds);

            info!(steam_id = %outcome.steam_id, "logged on");
            client.emit(Event::LoggedOn(Box::new(LoggedOn {
                result,
                extended_result: outcome.extended_result,
                account_flags: outcome.account_flags,
                steam_id: outcome.steam_id,
                client_supplied_steam_id: outcome.client_supplied_steam_id,
                heartbeat_seconds: outcome.heartbeat_seconds,
                body: outcome.body,
            })));
        }
        EResult::Fail | EResult::ServiceUnavailable | EResult::TryAnotherCM => {
            warn!(?result, "log-on failed on the server side");
            client.emit(Event::SteamFailure { result });
        }
        other => {
            if let Some(kind) = SteamGuardKind::from_result(other) {
                info!(?kind, "Steam Guard code required");
                client.emit(Event::SteamGuardRequired {
                    kind,
                    result: other,
                });
            } else {
                warn!(result = ?other, "log-on rejected");
                client.emit(Event::LogOnFailed { result: other });
                client.disconnect();
            }
        }
    }
    Ok(())
}

fn handle_login_key(client: &Client, packet: &Packet) -> Result<()> {
    let (unique_id, login_key) = if packet.is_proto() {
        let body = packet.read_proto::<CMsgClientNewLoginKey>()?.body;
        (body.unique_id(), body.login_key().to_string())
    } else {
        let body = packet.read_client_struct::<MsgClientNewLoginKey>()?.body;
        let end = body
            .login_key
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(body.login_key.len());
        (
            body.unique_id,
            String::from_utf8_lossy(&body.login_key[..end]).into_owned(),
        )
    };

    client.write(ProtoMessage::new(
        EMsg::ClientNewLoginKeyAccepted,
        CMsgClientNewLoginKeyAccepted {
            unique_id: Some(unique_id),
        },
    ));

    debug!(unique_id, "login key received");
    client.emit(Event::LoginKey {
        unique_id,
        login_key,
    });
    Ok(())
}

fn handle_logged_off(client: &Client, packet: &Packet) -> Result<()> {
    let result = if packet.is_proto() {
        EResult::from(packet.read_proto::<CMsgClientLoggedOff>()?.body.eresult())
    } else {
        packet.read_client_struct::<MsgClientLoggedOff>()?.body.result
    };

    info!(?result, "logged off");
    client.emit(Event::LoggedOff { result });
    Ok(())
}

/// Hashes the whole packet, echoes the hash to the server against the
/// request's job and surfaces it as the new sentry hash.
fn handle_update_machine_auth(client: &Client, packet: &Packet) -> Result<()> {
    let request = packet.read_proto::<CMsgClientUpdateMachineAuth>()?.body;
    let hash = sha1(packet.data());

    let response = CMsgClientUpdateMachineAuthResponse {
        filename: request.filename.clone(),
        eresult: Some(u32::from(EResult::OK)),
        filesize: request.cubtowrite,
        sha_file: Some(hash.to_vec()),
        offset: request.offset,
        cubwrote: request.cubtowrite,
    };
    client.write(
        ProtoMessage::new(EMsg::ClientUpdateMachineAuthResponse, response)
            .with_target_job(packet.source_job()),
    );

    debug!(hash = %hex::encode(hash), "machine auth updated");
    client.emit(Event::MachineAuthUpdate { hash });
    Ok(())
}

fn handle_account_info(client: &Client, packet: &Packet) -> Result<()> {
    let body = packet.read_proto::<CMsgClientAccountInfo>()?.body;
    client.emit(Event::AccountInfo {
        persona_name: body.persona_name().to_string(),
        country: body.ip_country().to_string(),
        count_authed_computers: body.count_authed_computers(),
        account_flags: body.account_flags(),
    });
    Ok(())
}
