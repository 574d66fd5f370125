//! Session state driven by sidecar lifecycle frames.

use wagpt_channels::SessionState;

use crate::types::SidecarMessage;

/// Where `msg` moves a session currently in `current`. Frames that carry no
/// lifecycle meaning leave it unchanged.
#[must_use]
pub fn next_state(current: SessionState, msg: &SidecarMessage) -> SessionState {
    match msg {
        SidecarMessage::Qr { .. }
        | SidecarMessage::Authenticated { .. }
        | SidecarMessage::Reconnecting { .. } => SessionState::Authenticating,
        SidecarMessage::Connected { .. } => SessionState::Ready,
        SidecarMessage::AuthFailure { .. }
        | SidecarMessage::Disconnected { .. }
        | SidecarMessage::LoggedOut { .. } => SessionState::Disconnected,
        SidecarMessage::StatusResponse { connected, .. } => {
            match (current, *connected) {
                (SessionState::Ready, false) => SessionState::Disconnected,
                (SessionState::Authenticating, true) => SessionState::Ready,
                _ => current,
            }
        },
        SidecarMessage::InboundMessage { .. }
        | SidecarMessage::SendResult { .. }
        | SidecarMessage::Error { .. }
        | SidecarMessage::Unknown => current,
    }
}

/// The steps from `current` to `target` through allowed transitions. No
/// state leads back to `Uninitialized`.
#[must_use]
pub fn transition_path(current: SessionState, target: SessionState) -> Vec<SessionState> {
    use SessionState::*;

    match (current, target) {
        _ if current == target => Vec::new(),
        (_, Uninitialized) => Vec::new(),
        (Uninitialized | Disconnected, Ready) => vec![Authenticating, Ready],
        (Uninitialized, Disconnected) => vec![Authenticating, Disconnected],
        (Ready, Authenticating) => vec![Disconnected, Authenticating],
        _ => vec![target],
    }
}
