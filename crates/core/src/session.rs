//! The rendezvous state machine: handshake, turn-taking, suspension, and
//! the buffer/waiter bookkeeping that lets two independent requests swap
//! payloads without ever sharing a thread.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Mutex};

use crate::error::{Error, Result};

/// Which of the two participants a request belongs to.
///
/// `A` is whoever's request reached the session first; `B` is everyone
/// else. The label has no meaning beyond "the other one".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The side this request is not.
    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// The terminal value a suspended request is woken up with.
///
/// A plain timeout is not represented here: it is detected by racing the
/// channel against a deadline timer and re-checking the channel under the
/// session lock (see [`Session::process_request`]), so it never needs its
/// own signal. `Closed` is the only value a session ever pushes through the
/// channel itself, sent when the session is evicted while someone waits.
enum DeliveryOutcome {
    Payload(String),
    Closed,
}

type Waiter = oneshot::Sender<DeliveryOutcome>;

struct Inner {
    side_a_connected: bool,
    side_b_connected: bool,
    next_expected: Side,
    pending_for_a: Option<Waiter>,
    pending_for_b: Option<Waiter>,
    buffer_for_a: Option<String>,
    buffer_for_b: Option<String>,
    last_activity_at: DateTime<Utc>,
    /// Bumped every time a side's waiter slot is (re)installed, so a
    /// disconnect cleanup spawned for an older waiter can tell it no
    /// longer owns the slot and must not clear someone else's.
    waiter_gen_a: u64,
    waiter_gen_b: u64,
}

impl Inner {
    fn waiter_slot(&mut self, side: Side) -> &mut Option<Waiter> {
        match side {
            Side::A => &mut self.pending_for_a,
            Side::B => &mut self.pending_for_b,
        }
    }

    fn buffer_slot(&mut self, side: Side) -> &mut Option<String> {
        match side {
            Side::A => &mut self.buffer_for_a,
            Side::B => &mut self.buffer_for_b,
        }
    }

    fn waiter_generation(&self, side: Side) -> u64 {
        match side {
            Side::A => self.waiter_gen_a,
            Side::B => self.waiter_gen_b,
        }
    }

    /// Install a fresh waiter generation for `side`, returning its id.
    fn new_waiter_generation(&mut self, side: Side) -> u64 {
        let slot = match side {
            Side::A => &mut self.waiter_gen_a,
            Side::B => &mut self.waiter_gen_b,
        };
        *slot = slot.wrapping_add(1);
        *slot
    }
}

/// Minimal, non-sensitive metadata for admin enumeration.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionMetadata {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// One rendezvous instance, addressed by its [`id`](Session::id).
///
/// All state transitions happen under `inner`'s lock; the suspension a
/// request performs while waiting for its counterpart happens strictly
/// after the lock is released (see [`Session::process_request`]).
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    handshake_timeout: Duration,
    turn_timeout: Duration,
    inner: Mutex<Inner>,
    /// Lets a suspended wait reach back into its own `Arc` from `Drop`
    /// without the public API having to take `self: Arc<Self>` everywhere.
    self_weak: Weak<Session>,
}

impl Session {
    pub fn new(id: String, handshake_timeout: Duration, turn_timeout: Duration) -> Arc<Self> {
        let now = Utc::now();
        Arc::new_cyclic(|weak| Self {
            id,
            created_at: now,
            handshake_timeout,
            turn_timeout,
            inner: Mutex::new(Inner {
                side_a_connected: false,
                side_b_connected: false,
                next_expected: Side::A,
                pending_for_a: None,
                pending_for_b: None,
                buffer_for_a: None,
                buffer_for_b: None,
                last_activity_at: now,
                waiter_gen_a: 0,
                waiter_gen_b: 0,
            }),
            self_weak: weak.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn metadata(&self) -> SessionMetadata {
        let inner = self.inner.lock().await;
        SessionMetadata {
            id: self.id.clone(),
            created_at: self.created_at,
            last_activity_at: inner.last_activity_at,
        }
    }

    pub async fn last_activity_at(&self) -> DateTime<Utc> {
        self.inner.lock().await.last_activity_at
    }

    /// Complete any outstanding waiters with [`Error::Closed`] so their
    /// holders observe failure instead of hanging forever. Called by the
    /// registry when this session is evicted, either by the TTL reaper or
    /// by an explicit close.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(tx) = inner.pending_for_a.take() {
            let _ = tx.send(DeliveryOutcome::Closed);
        }
        if let Some(tx) = inner.pending_for_b.take() {
            let _ = tx.send(DeliveryOutcome::Closed);
        }
    }

    /// Run one step of the rendezvous protocol for `content`, returning
    /// the counterpart's payload once it arrives.
    ///
    /// `sender_side` is the optional `|A`/`|B` hint from the `model`
    /// field. It is only consulted once both sides are connected — the
    /// handshake and the second-ever request always play their fixed
    /// roles regardless of the hint (there is no "other side" to contradict
    /// yet).
    pub async fn process_request(
        &self,
        content: String,
        sender_side: Option<Side>,
    ) -> Result<String> {
        enum Next {
            Immediate(String),
            Suspend {
                rx: oneshot::Receiver<DeliveryOutcome>,
                side: Side,
                deadline: Duration,
                generation: u64,
            },
        }

        let next = {
            let mut inner = self.inner.lock().await;
            inner.last_activity_at = Utc::now();

            if !inner.side_a_connected {
                // Fresh: this request becomes the handshake. Its content
                // is discarded; it waits for B's first real message.
                inner.side_a_connected = true;
                let (tx, rx) = oneshot::channel();
                inner.pending_for_a = Some(tx);
                let generation = inner.new_waiter_generation(Side::A);
                inner.next_expected = Side::B;
                Next::Suspend {
                    rx,
                    side: Side::A,
                    deadline: self.handshake_timeout,
                    generation,
                }
            } else if !inner.side_b_connected {
                // Second ever request: completes A's handshake, then
                // waits for A's next payload.
                inner.side_b_connected = true;
                if let Some(tx) = inner.pending_for_a.take() {
                    let _ = tx.send(DeliveryOutcome::Payload(content));
                }
                let (tx, rx) = oneshot::channel();
                inner.pending_for_b = Some(tx);
                let generation = inner.new_waiter_generation(Side::B);
                inner.next_expected = Side::A;
                Next::Suspend {
                    rx,
                    side: Side::B,
                    deadline: self.turn_timeout,
                    generation,
                }
            } else {
                // Both connected: honor an explicit side hint, else fall
                // back to whoever is tracked as next.
                let side = sender_side.unwrap_or(inner.next_expected);
                let opposite = side.opposite();

                if let Some(tx) = inner.waiter_slot(opposite).take() {
                    let _ = tx.send(DeliveryOutcome::Payload(content));
                } else {
                    let slot = inner.buffer_slot(opposite);
                    debug_assert!(
                        slot.is_none(),
                        "buffer overwrite for side {opposite:?}: invariants forbid a second \
                         unconsumed payload arriving before the first is read"
                    );
                    *slot = Some(content);
                }

                inner.next_expected = opposite;

                if let Some(buffered) = inner.buffer_slot(side).take() {
                    Next::Immediate(buffered)
                } else {
                    debug_assert!(
                        inner.waiter_slot(side).is_none(),
                        "waiter overwrite for side {side:?}: invariants forbid a second \
                         concurrent request on the same side before the first is resolved"
                    );
                    let (tx, rx) = oneshot::channel();
                    *inner.waiter_slot(side) = Some(tx);
                    let generation = inner.new_waiter_generation(side);
                    Next::Suspend {
                        rx,
                        side,
                        deadline: self.turn_timeout,
                        generation,
                    }
                }
            }
        };

        match next {
            Next::Immediate(payload) => Ok(payload),
            Next::Suspend {
                mut rx,
                side,
                deadline,
                generation,
            } => {
                // Arms a best-effort cleanup for the case the *entire*
                // future driving this call is dropped before either branch
                // below resolves — a client disconnecting mid-wait. Both
                // branches disarm it once they have settled the waiter
                // slot themselves.
                let mut guard = WaiterGuard::new(self.self_weak.clone(), side, generation);
                let sleep = tokio::time::sleep(deadline);
                tokio::pin!(sleep);

                tokio::select! {
                    result = &mut rx => {
                        guard.disarm();
                        match result {
                            Ok(DeliveryOutcome::Payload(payload)) => Ok(payload),
                            Ok(DeliveryOutcome::Closed) => Err(Error::Closed),
                            Err(_sender_dropped) => Err(Error::Closed),
                        }
                    }
                    _ = &mut sleep => {
                        // The deadline and a delivery may have raced. Settle
                        // it under the session lock: whichever of "deliver"
                        // and "declare timeout" acquired the lock first wins,
                        // and the other observes a consistent outcome —
                        // either the payload already sent on `rx`, or a
                        // cleared slot that the deliverer will buffer into.
                        let mut inner = self.inner.lock().await;
                        let outcome = match rx.try_recv() {
                            Ok(DeliveryOutcome::Payload(payload)) => Ok(payload),
                            Ok(DeliveryOutcome::Closed) => Err(Error::Closed),
                            Err(oneshot::error::TryRecvError::Closed) => Err(Error::Closed),
                            Err(oneshot::error::TryRecvError::Empty) => {
                                inner.waiter_slot(side).take();
                                Err(Error::Timeout)
                            }
                        };
                        drop(inner);
                        guard.disarm();
                        outcome
                    }
                }
            }
        }
    }
}

/// Best-effort cleanup for a waiter slot whose owning future was dropped
/// without running to completion (a client disconnecting mid-wait). This
/// is the natural Tokio cancellation signal spec.md §9 asks implementations
/// to compose with: the handler future simply stops being polled, and this
/// guard's `Drop` is what notices. Unlike the timeout path in
/// [`Session::process_request`], this cleanup cannot be made atomic with a
/// concurrent delivery — `Drop` cannot await the session lock — so on the
/// rare race where a counterpart delivers in the same instant a client
/// disconnects, the payload may be dropped rather than buffered. Accepted
/// as a best-effort tradeoff for a case with no observer left to notice.
///
/// `generation` pins this guard to the specific waiter it armed for: if the
/// client reconnects and installs a new waiter before this guard's spawned
/// cleanup runs, the generation will have moved on and the cleanup leaves
/// the new waiter alone instead of clearing it out from under the
/// reconnected request.
struct WaiterGuard {
    session: Weak<Session>,
    side: Side,
    generation: u64,
    armed: bool,
}

impl WaiterGuard {
    fn new(session: Weak<Session>, side: Side, generation: u64) -> Self {
        Self {
            session,
            side,
            generation,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(session) = self.session.upgrade() else {
            return;
        };
        let side = self.side;
        let generation = self.generation;
        tokio::spawn(async move {
            let mut inner = session.inner.lock().await;
            if inner.waiter_generation(side) == generation {
                inner.waiter_slot(side).take();
            }
        });
    }
}
