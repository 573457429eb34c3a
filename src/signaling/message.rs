//! Signaling wire messages
//!
//! One JSON object per frame, discriminated by `type`:
//!
//! ```text
//! {"type":"auth","token":"..."}
//! {"type":"join","userId":"u1","contextId":"post-9"}
//! {"type":"offer","sdp":"v=0...","to":"u2","from":"u1","contextId":"post-9"}
//! {"type":"ice-candidate","candidate":{"candidate":"...","sdpMid":"0","sdpMLineIndex":0},...}
//! {"type":"call-accepted"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// A connectivity candidate proposed during negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate line (`candidate:...`)
    pub candidate: String,
    /// Media stream identification tag
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the m-line the candidate belongs to
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

/// Addressing carried by every call-scoped message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub to: String,
    pub from: String,
    pub context_id: String,
}

impl Route {
    pub fn new(
        to: impl Into<String>,
        from: impl Into<String>,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            context_id: context_id.into(),
        }
    }
}

/// Borrowed view of a message's addressing fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRef<'a> {
    pub to: Option<&'a str>,
    pub from: Option<&'a str>,
    pub context_id: Option<&'a str>,
}

/// Message exchanged with the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingMessage {
    /// Presents the bearer token; first frame on every connection
    Auth { token: String },

    /// Announces the user in a call/broadcast context; second frame
    #[serde(rename_all = "camelCase")]
    Join { user_id: String, context_id: String },

    #[serde(rename_all = "camelCase")]
    Offer {
        sdp: String,
        to: String,
        from: String,
        context_id: String,
    },

    #[serde(rename_all = "camelCase")]
    Answer {
        sdp: String,
        to: String,
        from: String,
        context_id: String,
    },

    #[serde(rename_all = "camelCase")]
    IceCandidate {
        candidate: IceCandidate,
        to: String,
        from: String,
        context_id: String,
    },

    /// Callee picked up. Routing fields are optional on the wire.
    #[serde(rename_all = "camelCase")]
    CallAccepted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_id: Option<String>,
    },

    /// Callee declined. Routing fields are optional on the wire.
    #[serde(rename_all = "camelCase")]
    CallRejected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_id: Option<String>,
    },
}

impl SignalingMessage {
    pub fn auth(token: impl Into<String>) -> Self {
        SignalingMessage::Auth {
            token: token.into(),
        }
    }

    pub fn join(user_id: impl Into<String>, context_id: impl Into<String>) -> Self {
        SignalingMessage::Join {
            user_id: user_id.into(),
            context_id: context_id.into(),
        }
    }

    pub fn offer(sdp: impl Into<String>, route: Route) -> Self {
        SignalingMessage::Offer {
            sdp: sdp.into(),
            to: route.to,
            from: route.from,
            context_id: route.context_id,
        }
    }

    pub fn answer(sdp: impl Into<String>, route: Route) -> Self {
        SignalingMessage::Answer {
            sdp: sdp.into(),
            to: route.to,
            from: route.from,
            context_id: route.context_id,
        }
    }

    pub fn ice_candidate(candidate: IceCandidate, route: Route) -> Self {
        SignalingMessage::IceCandidate {
            candidate,
            to: route.to,
            from: route.from,
            context_id: route.context_id,
        }
    }

    pub fn call_accepted(route: Route) -> Self {
        SignalingMessage::CallAccepted {
            to: Some(route.to),
            from: Some(route.from),
            context_id: Some(route.context_id),
        }
    }

    pub fn call_rejected(route: Route) -> Self {
        SignalingMessage::CallRejected {
            to: Some(route.to),
            from: Some(route.from),
            context_id: Some(route.context_id),
        }
    }

    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Auth { .. } => "auth",
            SignalingMessage::Join { .. } => "join",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidate { .. } => "ice-candidate",
            SignalingMessage::CallAccepted { .. } => "call-accepted",
            SignalingMessage::CallRejected { .. } => "call-rejected",
        }
    }

    /// Addressing fields, `None` for `auth`/`join`
    pub fn route(&self) -> Option<RouteRef<'_>> {
        match self {
            SignalingMessage::Auth { .. } | SignalingMessage::Join { .. } => None,
            SignalingMessage::Offer {
                to,
                from,
                context_id,
                ..
            }
            | SignalingMessage::Answer {
                to,
                from,
                context_id,
                ..
            }
            | SignalingMessage::IceCandidate {
                to,
                from,
                context_id,
                ..
            } => Some(RouteRef {
                to: Some(to),
                from: Some(from),
                context_id: Some(context_id),
            }),
            SignalingMessage::CallAccepted {
                to,
                from,
                context_id,
            }
            | SignalingMessage::CallRejected {
                to,
                from,
                context_id,
            } => Some(RouteRef {
                to: to.as_deref(),
                from: from.as_deref(),
                context_id: context_id.as_deref(),
            }),
        }
    }

    /// Serialize to a JSON text frame
    pub fn encode(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(MessageError::Encode)
    }

    /// Parse a JSON text frame
    pub fn decode(frame: &str) -> Result<Self, MessageError> {
        serde_json::from_str(frame).map_err(MessageError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Route {
        Route::new("u2", "u1", "post-9")
    }

    #[test]
    fn test_join_uses_camel_case() {
        let frame = SignalingMessage::join("u1", "post-9").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["type"], "join");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["contextId"], "post-9");
    }

    #[test]
    fn test_ice_candidate_wire_shape() {
        let mut candidate = IceCandidate::new("candidate:1 1 udp 2122260223 10.0.0.2 54400 typ host");
        candidate.sdp_mid = Some("0".into());
        candidate.sdp_m_line_index = Some(0);

        let frame = SignalingMessage::ice_candidate(candidate, route())
            .encode()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["type"], "ice-candidate");
        assert_eq!(value["candidate"]["sdpMid"], "0");
        assert_eq!(value["candidate"]["sdpMLineIndex"], 0);
        assert_eq!(value["to"], "u2");
        assert_eq!(value["from"], "u1");
    }

    #[test]
    fn test_decode_bare_call_accepted() {
        let msg = SignalingMessage::decode(r#"{"type":"call-accepted"}"#).unwrap();
        assert_eq!(
            msg,
            SignalingMessage::CallAccepted {
                to: None,
                from: None,
                context_id: None
            }
        );

        let route = msg.route().unwrap();
        assert!(route.to.is_none());
        assert!(route.context_id.is_none());
    }

    #[test]
    fn test_decode_offer() {
        let msg = SignalingMessage::decode(
            r#"{"type":"offer","sdp":"v=0","to":"u2","from":"u1","contextId":"post-9"}"#,
        )
        .unwrap();

        assert_eq!(msg.kind(), "offer");
        assert_eq!(msg, SignalingMessage::offer("v=0", route()));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(matches!(
            SignalingMessage::decode(r#"{"type":"hello"}"#),
            Err(MessageError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_routing() {
        // offers must name both ends
        assert!(SignalingMessage::decode(r#"{"type":"offer","sdp":"v=0"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(SignalingMessage::decode("not json").is_err());
        assert!(SignalingMessage::decode(r#"{"token":"abc"}"#).is_err());
    }

    #[test]
    fn test_auth_join_have_no_route() {
        assert!(SignalingMessage::auth("t").route().is_none());
        assert!(SignalingMessage::join("u1", "c").route().is_none());
    }
}
