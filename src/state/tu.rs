//! Telephone unit state machine.
//!
//! A `TelephoneUnit` is the simulated handset bound to one client
//! connection. Each unit carries a single mutex over its state, extension,
//! peer link, and detached flag; every operation mutates those under one
//! critical section and reports the unit's resulting state to its own
//! session before returning, even when nothing changed. A second reply
//! goes to the peer only when the peer's observable state changed too.
//!
//! # Locking
//!
//! Operations that touch two units (answering a ring, hanging up on a
//! peer, dialing, chatting) acquire both unit locks before mutating
//! either, always in ascending connection-id order regardless of which
//! side initiated. The registry lock is never held while a unit lock is
//! taken.
//!
//! Ownership is shared: the session task, the registry table, and a live
//! peer link each hold an `Arc` to the unit, so a unit is freed exactly
//! once, when the last of those lets go, and never while a call still
//! references it. Peer `Arc`s taken out of a torn-down link are dropped
//! only after both guards are released.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use pbx_proto::{Reply, TuState};

use crate::error::CallError;

use super::ConnId;
use super::session::SessionHandle;

/// The simulated handset for one client connection.
pub struct TelephoneUnit {
    id: ConnId,
    session: SessionHandle,
    call: Mutex<CallState>,
}

/// Everything the unit's lock guards. State, extension, peer link, and
/// the detached flag always mutate together.
struct CallState {
    state: TuState,
    extension: Option<u32>,
    peer: Option<Arc<TelephoneUnit>>,
    /// Set when the registry drops the unit; a detached unit can no
    /// longer be rung even if a dialer resolved it just beforehand.
    detached: bool,
}

impl TelephoneUnit {
    /// Create a unit for a fresh session, on hook and unassigned.
    pub fn new(session: SessionHandle) -> Arc<TelephoneUnit> {
        Arc::new(TelephoneUnit {
            id: session.id(),
            session,
            call: Mutex::new(CallState {
                state: TuState::OnHook,
                extension: None,
                peer: None,
                detached: false,
            }),
        })
    }

    /// Stable connection id, also the lock-ordering key.
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// The unit's session handle.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Current state.
    pub fn state(&self) -> TuState {
        self.call.lock().state
    }

    /// The extension assigned at registration, if any.
    pub fn extension(&self) -> Option<u32> {
        self.call.lock().extension
    }

    /// Connection id of the current call peer, if any.
    pub fn peer_id(&self) -> Option<ConnId> {
        self.call.lock().peer.as_ref().map(|peer| peer.id)
    }

    /// Assign the extension and notify the session of its state.
    ///
    /// Called by the registry only, once per unit; this is the single
    /// path out of the unassigned condition.
    pub(crate) fn assign_extension(&self, extension: u32) {
        let mut call = self.call.lock();
        debug_assert!(call.extension.is_none(), "extension is assigned exactly once");
        call.extension = Some(extension);
        self.session.notify(Reply::state_with(call.state, extension));
    }

    /// Mark the unit unplugged from the registry.
    pub(crate) fn detach(&self) {
        self.call.lock().detached = true;
    }

    /// Lift the handset.
    ///
    /// On hook this opens a dial tone; ringing it answers the call,
    /// moving both sides to connected. Any other state is unchanged and
    /// re-reported.
    pub fn pickup(self: &Arc<Self>) -> TuState {
        loop {
            let mut call = self.call.lock();
            match call.state {
                TuState::OnHook => {
                    call.state = TuState::DialTone;
                    self.session.notify(Reply::state(TuState::DialTone));
                    return TuState::DialTone;
                }
                TuState::Ringing => {
                    let Some(peer) = call.peer.clone() else {
                        // Ringing always carries a peer; report rather
                        // than invent a transition.
                        self.notify_current(&call);
                        return call.state;
                    };
                    drop(call);
                    let (mut call, mut peer_call) = lock_pair(self, &peer);
                    if call.state != TuState::Ringing || !is_linked_to(&call, &peer) {
                        // The call changed shape while the locks were
                        // reacquired; settle against the new state.
                        drop(peer_call);
                        drop(call);
                        continue;
                    }
                    call.state = TuState::Connected;
                    peer_call.state = TuState::Connected;
                    self.session
                        .notify(Reply::state_with(TuState::Connected, peer.id));
                    peer.session
                        .notify(Reply::state_with(TuState::Connected, self.id));
                    return TuState::Connected;
                }
                _ => {
                    self.notify_current(&call);
                    return call.state;
                }
            }
        }
    }

    /// Replace the handset.
    ///
    /// Always lands on hook. A connected or ringing peer is released to
    /// dial tone; a peer still hearing ring-back is taken on hook with
    /// us. Idempotent from every state.
    pub fn hangup(self: &Arc<Self>) -> TuState {
        loop {
            let mut call = self.call.lock();
            let peer = match call.state {
                TuState::Connected | TuState::Ringing | TuState::RingBack => call.peer.clone(),
                _ => None,
            };
            let Some(peer) = peer else {
                call.state = TuState::OnHook;
                self.session.notify(Reply::State {
                    state: TuState::OnHook,
                    param: call.extension,
                });
                return TuState::OnHook;
            };
            drop(call);

            let (mut call, mut peer_call) = lock_pair(self, &peer);
            let paired = matches!(
                call.state,
                TuState::Connected | TuState::Ringing | TuState::RingBack
            );
            if !paired || !is_linked_to(&call, &peer) {
                drop(peer_call);
                drop(call);
                continue;
            }

            let abandoned_ring = call.state == TuState::RingBack;
            call.state = TuState::OnHook;
            let released_self = call.peer.take();
            let released_peer = peer_call.peer.take();
            self.session.notify(Reply::State {
                state: TuState::OnHook,
                param: call.extension,
            });
            if abandoned_ring {
                // The callee's phone stops ringing and goes back on hook.
                peer_call.state = TuState::OnHook;
                peer.session.notify(Reply::State {
                    state: TuState::OnHook,
                    param: peer_call.extension,
                });
            } else {
                peer_call.state = TuState::DialTone;
                peer.session.notify(Reply::state(TuState::DialTone));
            }
            drop(peer_call);
            drop(call);
            // The link's shared ownership is released only after both
            // guards are gone.
            drop(released_self);
            drop(released_peer);
            return TuState::OnHook;
        }
    }

    /// Dial a resolved target, or none if no extension could be resolved.
    ///
    /// Only a unit hearing a dial tone can dial. Dialing oneself, or any
    /// target that is not free and on hook, yields a busy signal; an
    /// unresolvable target is the one path into the error state. The
    /// target's own lock is the authority on whether it can ring: a
    /// target that unregistered after the registry lookup is treated as
    /// unresolvable.
    pub fn dial(self: &Arc<Self>, target: Option<Arc<TelephoneUnit>>) -> TuState {
        let mut call = self.call.lock();
        if call.state != TuState::DialTone {
            self.notify_current(&call);
            return call.state;
        }
        let Some(target) = target else {
            return self.dial_failed(call);
        };
        if target.id == self.id {
            call.state = TuState::BusySignal;
            self.session.notify(Reply::state(TuState::BusySignal));
            return TuState::BusySignal;
        }
        drop(call);

        let (mut call, mut target_call) = lock_pair(self, &target);
        if call.state != TuState::DialTone {
            self.notify_current(&call);
            return call.state;
        }
        if target_call.detached {
            // Unplugged between registry lookup and lock acquisition;
            // there is nothing left to ring.
            return self.dial_failed(call);
        }
        if target_call.state != TuState::OnHook || target_call.peer.is_some() {
            call.state = TuState::BusySignal;
            self.session.notify(Reply::state(TuState::BusySignal));
            return TuState::BusySignal;
        }
        call.state = TuState::RingBack;
        target_call.state = TuState::Ringing;
        call.peer = Some(Arc::clone(&target));
        target_call.peer = Some(Arc::clone(self));
        self.session.notify(Reply::state(TuState::RingBack));
        target.session.notify(Reply::state(TuState::Ringing));
        TuState::RingBack
    }

    fn dial_failed(&self, mut call: MutexGuard<'_, CallState>) -> TuState {
        call.state = TuState::Error;
        self.session.notify(Reply::state(TuState::Error));
        TuState::Error
    }

    /// Relay a chat line to the call peer.
    ///
    /// Requires a connected call; the peer receives the message verbatim
    /// and the sender gets its usual state echo. In any other state
    /// nothing is sent and the current state is re-reported.
    pub fn chat(self: &Arc<Self>, message: &str) -> Result<(), CallError> {
        loop {
            let call = self.call.lock();
            if call.state != TuState::Connected {
                self.notify_current(&call);
                return Err(CallError::NotConnected);
            }
            let Some(peer) = call.peer.clone() else {
                self.notify_current(&call);
                return Err(CallError::NotConnected);
            };
            drop(call);

            let (call, peer_call) = lock_pair(self, &peer);
            if call.state != TuState::Connected || !is_linked_to(&call, &peer) {
                drop(peer_call);
                drop(call);
                continue;
            }
            peer.session.notify(Reply::Chat(message.to_string()));
            self.session
                .notify(Reply::state_with(TuState::Connected, peer.id));
            return Ok(());
        }
    }

    /// Report the current state to the unit's own session.
    fn notify_current(&self, call: &CallState) {
        let reply = match call.state {
            TuState::OnHook => Reply::State {
                state: TuState::OnHook,
                param: call.extension,
            },
            TuState::Connected => Reply::State {
                state: TuState::Connected,
                param: call.peer.as_ref().map(|peer| peer.id),
            },
            state => Reply::state(state),
        };
        self.session.notify(reply);
    }
}

impl Drop for TelephoneUnit {
    fn drop(&mut self) {
        tracing::trace!(conn = self.id, "telephone unit released");
    }
}

fn is_linked_to(call: &CallState, peer: &Arc<TelephoneUnit>) -> bool {
    call.peer
        .as_ref()
        .is_some_and(|linked| Arc::ptr_eq(linked, peer))
}

/// Acquire two units' locks in ascending id order, whichever side is
/// operating. Guards come back in argument order.
fn lock_pair<'a>(
    a: &'a TelephoneUnit,
    b: &'a TelephoneUnit,
) -> (MutexGuard<'a, CallState>, MutexGuard<'a, CallState>) {
    debug_assert_ne!(a.id, b.id, "a unit never pairs with itself");
    if a.id < b.id {
        let first = a.call.lock();
        let second = b.call.lock();
        (first, second)
    } else {
        let second = b.call.lock();
        let first = a.call.lock();
        (first, second)
    }
}
