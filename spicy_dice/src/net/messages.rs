//! JSON envelopes exchanged over a client connection.
//!
//! Every frame is `{ "type": <kind>, "payload": <kind-specific> }`. Inbound
//! envelopes keep their tag as a string so an unknown kind can be reported
//! back to the client as an error instead of failing the whole frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use crate::game::{
    errors::{GameError, GameResult},
    models::{EndPlayRequest, PlayRequest, PlayerId, WalletRequest},
};

/// Envelope tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Wallet,
    Play,
    EndPlay,
    Error,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Play => "play",
            Self::EndPlay => "endplay",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet" => Ok(Self::Wallet),
            "play" => Ok(Self::Play),
            "endplay" => Ok(Self::EndPlay),
            "error" => Ok(Self::Error),
            other => Err(GameError::InvalidInput(format!(
                "Unknown message type: {other}"
            ))),
        }
    }
}

/// Envelope as received from a client, before its payload is interpreted
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// A decoded client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Wallet(WalletRequest),
    Play(PlayRequest),
    EndPlay(EndPlayRequest),
}

impl ClientRequest {
    /// Tag of the envelope the response is sent under
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Wallet(_) => MessageType::Wallet,
            Self::Play(_) => MessageType::Play,
            Self::EndPlay(_) => MessageType::EndPlay,
        }
    }

    pub fn client_id(&self) -> PlayerId {
        match self {
            Self::Wallet(request) => request.client_id,
            Self::Play(request) => request.client_id,
            Self::EndPlay(request) => request.client_id,
        }
    }
}

impl InboundEnvelope {
    /// Interpret the payload according to the tag
    ///
    /// # Errors
    ///
    /// * `GameError::InvalidInput` - Unknown tag, an inbound `error` tag, or a
    ///   payload that does not match the tag
    pub fn into_request(self) -> GameResult<ClientRequest> {
        match self.kind.parse::<MessageType>()? {
            MessageType::Wallet => serde_json::from_value(self.payload)
                .map(ClientRequest::Wallet)
                .map_err(|_| GameError::InvalidInput("Invalid wallet payload".to_string())),
            MessageType::Play => serde_json::from_value(self.payload)
                .map(ClientRequest::Play)
                .map_err(|_| GameError::InvalidInput("Invalid play payload".to_string())),
            MessageType::EndPlay => serde_json::from_value(self.payload)
                .map(ClientRequest::EndPlay)
                .map_err(|_| GameError::InvalidInput("Invalid end-play payload".to_string())),
            MessageType::Error => Err(GameError::InvalidInput(format!(
                "Unknown message type: {}",
                self.kind
            ))),
        }
    }
}

/// Envelope sent to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub payload: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(kind: MessageType, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            kind,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// `error` envelope carrying the sanitized view of `err`
    pub fn error(err: &GameError) -> Self {
        let payload = err.payload();
        Self {
            kind: MessageType::Error,
            payload: serde_json::json!({
                "code": payload.code,
                "message": payload.message,
                "details": payload.details,
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{BetType, PlayResponse, errors::codes};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn inbound(value: Value) -> InboundEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_play_request() {
        let request = inbound(json!({
            "type": "play",
            "payload": { "client_id": 7, "bet_amount": 25.5, "bet_type": "odd" }
        }))
        .into_request()
        .unwrap();

        assert_eq!(
            request,
            ClientRequest::Play(PlayRequest {
                client_id: 7,
                bet_amount: Decimal::new(255, 1),
                bet_type: BetType::Odd,
            })
        );
        assert_eq!(request.message_type(), MessageType::Play);
    }

    #[test]
    fn test_decode_endplay_request() {
        let request = inbound(json!({ "type": "endplay", "payload": { "client_id": 3 } }))
            .into_request()
            .unwrap();
        assert_eq!(request, ClientRequest::EndPlay(EndPlayRequest { client_id: 3 }));
    }

    #[test]
    fn test_unknown_type_is_invalid_input() {
        let err = inbound(json!({ "type": "deposit", "payload": {} }))
            .into_request()
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_INPUT);
        assert!(err.to_string().contains("Unknown message type: deposit"));
    }

    #[test]
    fn test_inbound_error_tag_rejected() {
        let err = inbound(json!({ "type": "error", "payload": {} }))
            .into_request()
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
    }

    #[test]
    fn test_malformed_payload_names_kind() {
        let err = inbound(json!({ "type": "play", "payload": { "client_id": "x" } }))
            .into_request()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid play payload"));

        let err = inbound(json!({ "type": "wallet" })).into_request().unwrap_err();
        assert!(err.to_string().contains("Invalid wallet payload"));
    }

    #[test]
    fn test_bet_type_is_case_sensitive() {
        let err = inbound(json!({
            "type": "play",
            "payload": { "client_id": 1, "bet_amount": 10, "bet_type": "EVEN" }
        }))
        .into_request()
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
    }

    #[test]
    fn test_outbound_envelope_shape() {
        let envelope = Envelope::new(
            MessageType::Play,
            &PlayResponse {
                dice_result: 4,
                won: true,
                balance: Decimal::from(300),
                bet_amount: Decimal::from(100),
            },
        )
        .unwrap();

        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "play");
        assert_eq!(value["payload"]["dice_result"], 4);
        assert_eq!(value["payload"]["won"], true);
        assert_eq!(value["payload"]["balance"].as_f64(), Some(300.0));
    }

    #[test]
    fn test_error_envelope() {
        let envelope = Envelope::error(&GameError::UserNotFound(9));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["code"], 1004);
        assert!(value["payload"]["message"].is_string());
        assert!(value["payload"]["details"].is_string());
    }

    #[test]
    fn test_message_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(MessageType::EndPlay).unwrap(),
            json!("endplay")
        );
        assert_eq!("endplay".parse::<MessageType>().unwrap(), MessageType::EndPlay);
    }
}
