//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  CHECK_LINK ──[down]──▶ ACQUIRE_LINK ──[budget spent]──▶ FALLBACK_PENDING
//!    │    ▲                    │                                 │
//!  [up]   │                [joined]                         [timeout]
//!    │    │                    ▼                                 ▼
//!    └────┼──────────▶ CHECK_REACHABILITY                     restart
//!         │                 │          │
//!         ├─[unreachable]───┘    [reachable]
//!         │                            ▼
//!         └────────[serviced]────── STEADY
//! ```
//!
//! `Steady` hands back to `CheckLink` after every servicing pass, so the
//! link is re-validated each cycle.  `FallbackPending` has no way out
//! other than a restart.

use super::context::LinkContext;
use super::{ConnectionState, StateDescriptor};
use crate::drivers::led_patterns::PatternId;
use crate::timing::Deadline;
use log::{error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; ConnectionState::COUNT] {
    [
        // Index 0: CheckLink
        StateDescriptor {
            id: ConnectionState::CheckLink,
            name: "CheckLink",
            on_enter: None,
            on_exit: None,
            on_update: check_link_update,
        },
        // Index 1: AcquireLink
        StateDescriptor {
            id: ConnectionState::AcquireLink,
            name: "AcquireLink",
            on_enter: Some(acquire_link_enter),
            on_exit: Some(acquire_link_exit),
            on_update: acquire_link_update,
        },
        // Index 2: CheckReachability
        StateDescriptor {
            id: ConnectionState::CheckReachability,
            name: "CheckReachability",
            on_enter: None,
            on_exit: None,
            on_update: check_reachability_update,
        },
        // Index 3: Steady
        StateDescriptor {
            id: ConnectionState::Steady,
            name: "Steady",
            on_enter: Some(steady_enter),
            on_exit: None,
            on_update: steady_update,
        },
        // Index 4: FallbackPending
        StateDescriptor {
            id: ConnectionState::FallbackPending,
            name: "FallbackPending",
            on_enter: Some(fallback_enter),
            on_exit: None,
            on_update: fallback_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_LINK
// ═══════════════════════════════════════════════════════════════════════════

fn check_link_update(ctx: &mut LinkContext<'_>) -> Option<ConnectionState> {
    if ctx.hw.is_associated() {
        ctx.led.set_link_pattern(PatternId::Off, ctx.now_ms);
        Some(ConnectionState::CheckReachability)
    } else {
        ctx.led.set_link_pattern(PatternId::Solid, ctx.now_ms);
        Some(ConnectionState::AcquireLink)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ACQUIRE_LINK: bounded association polling, one poll per retry window
// ═══════════════════════════════════════════════════════════════════════════

fn acquire_link_enter(ctx: &mut LinkContext<'_>) {
    ctx.link.attempts = 0;
    ctx.link.time_sync_started = false;
    ctx.link.last_reachable_ms = None;
    ctx.link.retry_deadline = Some(Deadline::after(
        ctx.now_ms,
        ctx.config.association_retry_ms,
    ));
    ctx.led
        .set_link_pattern(PatternId::AssociationBlink, ctx.now_ms);

    info!(
        "ACQUIRE_LINK: joining '{}' ({} polls, {} ms apart)",
        ctx.config.ssid, ctx.config.association_attempts, ctx.config.association_retry_ms
    );
    if let Err(e) = ctx
        .hw
        .begin_association(&ctx.config.ssid, &ctx.config.password)
    {
        // Keep polling: the budget still bounds the wait.
        warn!("ACQUIRE_LINK: {}", e);
    }
}

fn acquire_link_exit(ctx: &mut LinkContext<'_>) {
    ctx.link.retry_deadline = None;
}

fn acquire_link_update(ctx: &mut LinkContext<'_>) -> Option<ConnectionState> {
    if ctx.hw.is_associated() {
        ctx.link.associations = ctx.link.associations.wrapping_add(1);
        ctx.led.set_link_pattern(PatternId::Off, ctx.now_ms);
        info!(
            "ACQUIRE_LINK: associated after {} failed polls",
            ctx.link.attempts
        );
        return Some(ConnectionState::CheckReachability);
    }

    let deadline = ctx
        .link
        .retry_deadline
        .unwrap_or_else(|| Deadline::immediate(ctx.now_ms));
    if !deadline.expired(ctx.now_ms) {
        return None;
    }

    ctx.link.attempts = ctx.link.attempts.saturating_add(1);
    if ctx.link.attempts >= ctx.config.association_attempts.max(1) {
        warn!(
            "ACQUIRE_LINK: '{}' not joined after {} polls, falling back",
            ctx.config.ssid, ctx.link.attempts
        );
        return Some(ConnectionState::FallbackPending);
    }
    ctx.link.retry_deadline = Some(Deadline::after(
        ctx.now_ms,
        ctx.config.association_retry_ms,
    ));
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_REACHABILITY: failures retry from the top, never escalate
// ═══════════════════════════════════════════════════════════════════════════

fn check_reachability_update(ctx: &mut LinkContext<'_>) -> Option<ConnectionState> {
    let interval_ms = ctx
        .config
        .reachability_recheck_secs
        .saturating_mul(1_000);
    if ctx.link.reachability_fresh(ctx.now_ms, interval_ms) {
        return Some(ConnectionState::Steady);
    }

    if ctx.hw.check_upstream(
        &ctx.config.reachability_host,
        ctx.config.reachability_port,
    ) {
        ctx.link.last_reachable_ms = Some(ctx.now_ms);
        Some(ConnectionState::Steady)
    } else {
        ctx.link.last_reachable_ms = None;
        warn!(
            "CHECK_REACHABILITY: {}:{} unreachable, rechecking link",
            ctx.config.reachability_host, ctx.config.reachability_port
        );
        Some(ConnectionState::CheckLink)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  STEADY: servicing happens in the supervisor before this runs
// ═══════════════════════════════════════════════════════════════════════════

fn steady_enter(ctx: &mut LinkContext<'_>) {
    if !ctx.link.time_sync_started {
        ctx.hw.start_time_sync();
        ctx.link.time_sync_started = true;
        info!("STEADY: time sync started");
    }
}

fn steady_update(_ctx: &mut LinkContext<'_>) -> Option<ConnectionState> {
    Some(ConnectionState::CheckLink)
}

// ═══════════════════════════════════════════════════════════════════════════
//  FALLBACK_PENDING: local access point, restart on timeout
// ═══════════════════════════════════════════════════════════════════════════

fn fallback_enter(ctx: &mut LinkContext<'_>) {
    ctx.led.set_link_pattern(PatternId::Solid, ctx.now_ms);
    if !ctx.link.access_point_started {
        match ctx
            .hw
            .start_access_point(&ctx.access_point.ssid, &ctx.access_point.password)
        {
            Ok(()) => info!("FALLBACK: access point '{}' up", ctx.access_point.ssid),
            Err(e) => error!("FALLBACK: access point failed: {}", e),
        }
        ctx.link.access_point_started = true;
    }
    let timeout_ms = ctx.config.fallback_timeout_secs.saturating_mul(1_000);
    ctx.link.fallback_deadline = Some(Deadline::after(ctx.now_ms, timeout_ms));
    warn!(
        "FALLBACK: restarting in {} s unless reconfigured",
        ctx.config.fallback_timeout_secs
    );
}

fn fallback_update(ctx: &mut LinkContext<'_>) -> Option<ConnectionState> {
    let expired = ctx
        .link
        .fallback_deadline
        .is_some_and(|d| d.expired(ctx.now_ms));
    if expired && !ctx.link.restart_issued {
        ctx.link.restart_issued = true;
        warn!("FALLBACK: timeout, restarting");
        ctx.hw.restart();
    }
    None
}
