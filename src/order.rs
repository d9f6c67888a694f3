//! Order maintenance for a user's notes.
//!
//! Pinned and unpinned notes form two groups, and inside each group the
//! `order` values are exactly `0..k`. Every operation here that changes an
//! order keeps that true, and does its reads and writes in one atomic unit
//! holding the lock of each group it touches.

use crate::auth::RequestContext;
use crate::errors::ServerError;
use crate::models::note::{Note, Position, ValidNote};
use crate::store::{in_transaction, NoteStore, OrderTx};

/// Attempts made for a unit that keeps losing a race with a pin toggle.
pub const MAX_ATTEMPTS: u32 = 3;

fn with_retry<T>(mut unit: impl FnMut() -> Result<T, ServerError>) -> Result<T, ServerError> {
    let mut attempt = 1;
    loop {
        match unit() {
            Err(ServerError::GroupConflict) if attempt < MAX_ATTEMPTS => {
                log::warn!("note group changed mid-unit, retrying (attempt {attempt})");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Clamps a requested slot into `0..group_len`.
pub fn clamp_order(new_order: i64, group_len: i32) -> i32 {
    let last = i64::from(group_len.max(1) - 1);
    new_order.clamp(0, last) as i32
}

fn not_found(note_id: &str) -> ServerError {
    ServerError::NotFound(note_id.to_owned())
}

/// Locks the group `group` names and re-reads the note under that lock.
///
/// When the note turned out to live in the other group, `group` is updated
/// and the unit is abandoned so the retry locks the right one.
fn lock_note_group(
    tx: &mut dyn OrderTx,
    note_id: &str,
    group: &mut bool,
) -> Result<Position, ServerError> {
    tx.lock_group(*group)?;
    let position = tx.position(note_id)?.ok_or_else(|| not_found(note_id))?;
    if position.pinned != *group {
        *group = position.pinned;
        return Err(ServerError::GroupConflict);
    }
    Ok(position)
}

/// Moves one note from `from` to slot `to` of the same group, sliding the
/// notes in between one slot toward the gap it left.
fn move_within_group(
    tx: &mut dyn OrderTx,
    note_id: &str,
    from: Position,
    to: i32,
) -> Result<(), ServerError> {
    let current = from.sort_order;
    if to > current {
        tx.shift(from.pinned, current + 1, to, -1)?;
    } else if to < current {
        tx.shift(from.pinned, to, current - 1, 1)?;
    } else {
        return Ok(());
    }

    tx.place(
        note_id,
        Position {
            sort_order: to,
            pinned: from.pinned,
        },
    )
}

/// Moves `note_id` to `new_order` inside its own pin-group.
///
/// Out-of-range targets are clamped to the ends of the group. Only `order`
/// fields change; `updated_at` is left alone.
pub fn reorder(
    store: &dyn NoteStore,
    ctx: &RequestContext,
    note_id: &str,
    new_order: i64,
) -> Result<(), ServerError> {
    let current = store
        .find_order_and_pinned(ctx.user_id(), note_id)?
        .ok_or_else(|| not_found(note_id))?;

    if new_order == i64::from(current.sort_order) {
        return Ok(());
    }

    let mut group = current.pinned;
    with_retry(|| {
        in_transaction(store, ctx.user_id(), |tx| {
            let position = lock_note_group(tx, note_id, &mut group)?;
            let target = clamp_order(new_order, tx.group_len(position.pinned)?);
            log::debug!(
                "moving note {note_id} from {} to {target} (pinned: {})",
                position.sort_order,
                position.pinned
            );
            move_within_group(tx, note_id, position, target)
        })
    })
}

/// Creates an unpinned note at the end of the unpinned group.
pub fn create(
    store: &dyn NoteStore,
    ctx: &RequestContext,
    content: ValidNote,
) -> Result<Note, ServerError> {
    in_transaction(store, ctx.user_id(), |tx| {
        tx.lock_group(false)?;
        let next = tx.max_order(false)?.map_or(0, |o| o + 1);
        let note = Note::new(ctx.user_id(), content.clone(), next);
        tx.insert(&note)?;
        Ok(note)
    })
}

/// Appends every note in `contents` to the unpinned group, in order, as one
/// unit. Either all of them are created or none is.
pub fn create_all(
    store: &dyn NoteStore,
    ctx: &RequestContext,
    contents: &[ValidNote],
) -> Result<Vec<Note>, ServerError> {
    in_transaction(store, ctx.user_id(), |tx| {
        tx.lock_group(false)?;
        let next = tx.max_order(false)?.map_or(0, |o| o + 1);
        let mut created = Vec::with_capacity(contents.len());
        for (offset, content) in (0..).zip(contents) {
            let note = Note::new(ctx.user_id(), content.clone(), next + offset);
            tx.insert(&note)?;
            created.push(note);
        }
        Ok(created)
    })
}

/// Deletes a note and closes the gap it leaves in its group.
pub fn remove(
    store: &dyn NoteStore,
    ctx: &RequestContext,
    note_id: &str,
) -> Result<(), ServerError> {
    let current = store
        .find_order_and_pinned(ctx.user_id(), note_id)?
        .ok_or_else(|| not_found(note_id))?;

    let mut group = current.pinned;
    with_retry(|| {
        in_transaction(store, ctx.user_id(), |tx| {
            let position = lock_note_group(tx, note_id, &mut group)?;
            if tx.delete(note_id)? == 0 {
                return Err(not_found(note_id));
            }
            tx.shift(position.pinned, position.sort_order + 1, i32::MAX, -1)?;
            Ok(())
        })
    })
}

/// Pins or unpins a note. The note joins the end of its new group and the
/// group it left is compacted.
pub fn set_pinned(
    store: &dyn NoteStore,
    ctx: &RequestContext,
    note_id: &str,
    pinned: bool,
) -> Result<Note, ServerError> {
    let current = store
        .find_order_and_pinned(ctx.user_id(), note_id)?
        .ok_or_else(|| not_found(note_id))?;

    if current.pinned != pinned {
        in_transaction(store, ctx.user_id(), |tx| {
            // both groups, always unpinned first
            tx.lock_group(false)?;
            tx.lock_group(true)?;

            let position = tx.position(note_id)?.ok_or_else(|| not_found(note_id))?;
            if position.pinned == pinned {
                return Ok(());
            }

            let target = tx.max_order(pinned)?.map_or(0, |o| o + 1);
            tx.place(
                note_id,
                Position {
                    sort_order: target,
                    pinned,
                },
            )?;
            tx.shift(position.pinned, position.sort_order + 1, i32::MAX, -1)?;
            Ok(())
        })?;
    }

    store
        .find(ctx.user_id(), note_id)?
        .ok_or_else(|| not_found(note_id))
}
