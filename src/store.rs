//! Durable note and user collections.
//!
//! Everything that changes a note's `order` or `pinned` goes through
//! [`NoteStore::atomically`], which hands the caller an [`OrderTx`] and
//! commits only if the work returns `Ok`.

use crate::errors::ServerError;
use crate::models::note::{Note, Position, ValidNote};
use crate::models::user::User;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A unit of work run inside [`NoteStore::atomically`].
pub type Work<'a> = &'a mut dyn FnMut(&mut dyn OrderTx) -> Result<(), ServerError>;

/// Transactional handle scoped to one user's notes.
///
/// Reads made after [`OrderTx::lock_group`] see every commit that finished
/// before the lock was granted, and no other unit can change that group
/// until this one ends.
pub trait OrderTx {
    fn lock_group(&mut self, pinned: bool) -> Result<(), ServerError>;

    fn position(&mut self, note_id: &str) -> Result<Option<Position>, ServerError>;

    fn group_len(&mut self, pinned: bool) -> Result<i32, ServerError>;

    fn max_order(&mut self, pinned: bool) -> Result<Option<i32>, ServerError>;

    /// Adds `delta` to the order of every note in the group whose order lies
    /// in `from..=to`. Returns how many notes moved.
    fn shift(&mut self, pinned: bool, from: i32, to: i32, delta: i32)
        -> Result<usize, ServerError>;

    fn place(&mut self, note_id: &str, position: Position) -> Result<(), ServerError>;

    fn insert(&mut self, note: &Note) -> Result<(), ServerError>;

    fn delete(&mut self, note_id: &str) -> Result<usize, ServerError>;
}

pub trait NoteStore: Send + Sync {
    fn find_order_and_pinned(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> Result<Option<Position>, ServerError>;

    fn find(&self, user_id: &str, note_id: &str) -> Result<Option<Note>, ServerError>;

    /// Pinned notes first, then unpinned, each by ascending order.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<Note>, ServerError>;

    fn update_content(
        &self,
        user_id: &str,
        note_id: &str,
        content: &ValidNote,
    ) -> Result<Option<Note>, ServerError>;

    /// Runs `work` as one atomic unit: either every write it made becomes
    /// visible together, or none does.
    fn atomically(&self, user_id: &str, work: Work) -> Result<(), ServerError>;
}

/// [`NoteStore::atomically`] for work that produces a value.
pub fn in_transaction<T>(
    store: &dyn NoteStore,
    user_id: &str,
    mut work: impl FnMut(&mut dyn OrderTx) -> Result<T, ServerError>,
) -> Result<T, ServerError> {
    let mut output = None;
    store.atomically(user_id, &mut |tx| {
        output = Some(work(tx)?);
        Ok(())
    })?;

    match output {
        Some(value) => Ok(value),
        None => unreachable!("unit of work committed without running"),
    }
}

pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, ServerError>;

    fn insert_user(&self, user: &User) -> Result<(), ServerError>;
}
