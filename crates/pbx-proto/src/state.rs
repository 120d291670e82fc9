//! Telephone unit states as they appear on the wire.

use std::fmt;

/// The state of a telephone unit.
///
/// State names are protocol-visible: every reply line begins with the wire
/// name of the unit's resulting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuState {
    /// Handset resting on the switchhook; the only state a unit can be
    /// dialed in.
    OnHook,
    /// Handset lifted, ready to dial.
    DialTone,
    /// An incoming call is ringing; picking up answers it.
    Ringing,
    /// An outgoing call is ringing at the far end.
    RingBack,
    /// In an active call with a peer.
    Connected,
    /// The dialed extension was busy, occupied, or the unit's own.
    BusySignal,
    /// A dial could not be routed to any extension.
    Error,
}

impl TuState {
    /// The protocol spelling of this state.
    pub fn wire_name(self) -> &'static str {
        match self {
            TuState::OnHook => "ON_HOOK",
            TuState::DialTone => "DIAL_TONE",
            TuState::Ringing => "RINGING",
            TuState::RingBack => "RING_BACK",
            TuState::Connected => "CONNECTED",
            TuState::BusySignal => "BUSY_SIGNAL",
            TuState::Error => "ERROR",
        }
    }

    /// Parse a wire name back into a state.
    pub fn from_wire(name: &str) -> Option<TuState> {
        Some(match name {
            "ON_HOOK" => TuState::OnHook,
            "DIAL_TONE" => TuState::DialTone,
            "RINGING" => TuState::Ringing,
            "RING_BACK" => TuState::RingBack,
            "CONNECTED" => TuState::Connected,
            "BUSY_SIGNAL" => TuState::BusySignal,
            "ERROR" => TuState::Error,
            _ => return None,
        })
    }
}

impl fmt::Display for TuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
