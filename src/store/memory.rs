use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use super::{NoteStore, OrderTx, UserStore, Work};
use crate::errors::ServerError;
use crate::models::note::{Note, Position, ValidNote};
use crate::models::user::User;

/// In-process store.
///
/// Each user gets a [`Shelf`] of committed notes plus one lock per pin-group.
/// A unit of work holds only the group locks it asks for and stages its
/// writes, which are merged into the shelf when the work succeeds. Reads
/// outside a unit never wait for one.
#[derive(Default)]
pub struct MemoryStore {
    shelves: Mutex<HashMap<String, Arc<Shelf>>>,
    users: Mutex<Vec<User>>,
}

#[derive(Default)]
struct Shelf {
    unpinned: Mutex<()>,
    pinned: Mutex<()>,
    notes: Mutex<Vec<Note>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicking unit never reaches the merge, so the data is still whole
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shelf {
    fn group(&self, pinned: bool) -> &Mutex<()> {
        if pinned {
            &self.pinned
        } else {
            &self.unpinned
        }
    }

    fn notes(&self) -> MutexGuard<'_, Vec<Note>> {
        lock(&self.notes)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shelf(&self, user_id: &str) -> Arc<Shelf> {
        Arc::clone(lock(&self.shelves).entry(user_id.to_owned()).or_default())
    }

    fn existing(&self, user_id: &str) -> Option<Arc<Shelf>> {
        lock(&self.shelves).get(user_id).cloned()
    }

    fn users(&self) -> MutexGuard<'_, Vec<User>> {
        lock(&self.users)
    }
}

impl NoteStore for MemoryStore {
    fn find_order_and_pinned(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> Result<Option<Position>, ServerError> {
        Ok(self
            .find(user_id, note_id)?
            .map(|n| Position::from((n.sort_order, n.pinned))))
    }

    fn find(&self, user_id: &str, note_id: &str) -> Result<Option<Note>, ServerError> {
        Ok(self
            .existing(user_id)
            .and_then(|shelf| shelf.notes().iter().find(|n| n.id == note_id).cloned()))
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<Note>, ServerError> {
        let mut result = match self.existing(user_id) {
            Some(shelf) => shelf.notes().clone(),
            None => Vec::new(),
        };
        result.sort_by_key(|n| (!n.pinned, n.sort_order));
        Ok(result)
    }

    fn update_content(
        &self,
        user_id: &str,
        note_id: &str,
        content: &ValidNote,
    ) -> Result<Option<Note>, ServerError> {
        let shelf = match self.existing(user_id) {
            Some(shelf) => shelf,
            None => return Ok(None),
        };
        let mut notes = shelf.notes();
        Ok(notes.iter_mut().find(|n| n.id == note_id).map(|n| {
            n.title = content.title.clone();
            n.content = content.content.clone();
            n.updated_at = SystemTime::now();
            n.clone()
        }))
    }

    fn atomically(&self, user_id: &str, work: Work) -> Result<(), ServerError> {
        let shelf = self.shelf(user_id);
        let mut tx = MemoryTx {
            shelf: &shelf,
            held: Vec::new(),
            staged: Vec::new(),
        };
        work(&mut tx)?;

        let MemoryTx { held, staged, .. } = tx;
        let locked: Vec<bool> = held.iter().map(|(pinned, _)| *pinned).collect();
        merge(&mut shelf.notes(), &locked, staged);
        Ok(())
    }
}

/// Replaces the committed notes of the `locked` groups with `staged`.
///
/// Only `order` and `pinned` are taken from the staged copies, so a content
/// edit that landed while the unit ran is kept.
fn merge(committed: &mut Vec<Note>, locked: &[bool], staged: Vec<Note>) {
    let mut staged: HashMap<String, Note> =
        staged.into_iter().map(|n| (n.id.clone(), n)).collect();
    committed.retain_mut(|note| {
        if !locked.contains(&note.pinned) {
            return true;
        }
        match staged.remove(&note.id) {
            Some(moved) => {
                note.sort_order = moved.sort_order;
                note.pinned = moved.pinned;
                true
            }
            None => false,
        }
    });
    committed.extend(staged.into_values());
}

impl UserStore for MemoryStore {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, ServerError> {
        Ok(self.users().iter().find(|u| u.email == email).cloned())
    }

    fn insert_user(&self, user: &User) -> Result<(), ServerError> {
        let mut users = self.users();
        if users.iter().any(|u| u.email == user.email) {
            return Err(ServerError::EmailTaken);
        }
        users.push(user.clone());
        Ok(())
    }
}

/// A unit of work over one user's shelf.
///
/// `staged` holds a private copy of every note in the groups named by
/// `held`. Groups that are not held are read straight from the shelf, and
/// writing to one takes its lock first.
struct MemoryTx<'a> {
    shelf: &'a Shelf,
    held: Vec<(bool, MutexGuard<'a, ()>)>,
    staged: Vec<Note>,
}

impl MemoryTx<'_> {
    fn holds(&self, pinned: bool) -> bool {
        self.held.iter().any(|(group, _)| *group == pinned)
    }

    fn group_orders(&mut self, pinned: bool) -> Result<Vec<i32>, ServerError> {
        self.lock_group(pinned)?;
        Ok(self
            .staged
            .iter()
            .filter(|n| n.pinned == pinned)
            .map(|n| n.sort_order)
            .collect())
    }
}

impl OrderTx for MemoryTx<'_> {
    fn lock_group(&mut self, pinned: bool) -> Result<(), ServerError> {
        if self.holds(pinned) {
            return Ok(());
        }
        let shelf = self.shelf;
        let guard = lock(shelf.group(pinned));
        self.staged.extend(
            shelf
                .notes()
                .iter()
                .filter(|n| n.pinned == pinned)
                .cloned(),
        );
        self.held.push((pinned, guard));
        Ok(())
    }

    fn position(&mut self, note_id: &str) -> Result<Option<Position>, ServerError> {
        let staged = self.staged.iter().find(|n| n.id == note_id).cloned();
        let note = match staged {
            Some(note) => Some(note),
            None => self
                .shelf
                .notes()
                .iter()
                .find(|n| n.id == note_id && !self.holds(n.pinned))
                .cloned(),
        };
        Ok(note.map(|n| Position::from((n.sort_order, n.pinned))))
    }

    fn group_len(&mut self, pinned: bool) -> Result<i32, ServerError> {
        Ok(self.group_orders(pinned)?.len() as i32)
    }

    fn max_order(&mut self, pinned: bool) -> Result<Option<i32>, ServerError> {
        Ok(self.group_orders(pinned)?.into_iter().max())
    }

    fn shift(
        &mut self,
        pinned: bool,
        from: i32,
        to: i32,
        delta: i32,
    ) -> Result<usize, ServerError> {
        self.lock_group(pinned)?;
        let mut moved = 0;
        for note in self
            .staged
            .iter_mut()
            .filter(|n| n.pinned == pinned && (from..=to).contains(&n.sort_order))
        {
            note.sort_order += delta;
            moved += 1;
        }
        Ok(moved)
    }

    fn place(&mut self, note_id: &str, position: Position) -> Result<(), ServerError> {
        let current = self
            .position(note_id)?
            .ok_or_else(|| ServerError::NotFound(note_id.to_owned()))?;
        // unpinned before pinned
        for pinned in [false, true] {
            if pinned == current.pinned || pinned == position.pinned {
                self.lock_group(pinned)?;
            }
        }
        match self.staged.iter_mut().find(|n| n.id == note_id) {
            Some(note) => {
                note.sort_order = position.sort_order;
                note.pinned = position.pinned;
                Ok(())
            }
            None => Err(ServerError::NotFound(note_id.to_owned())),
        }
    }

    fn insert(&mut self, note: &Note) -> Result<(), ServerError> {
        self.lock_group(note.pinned)?;
        self.staged.push(note.clone());
        Ok(())
    }

    fn delete(&mut self, note_id: &str) -> Result<usize, ServerError> {
        match self.position(note_id)? {
            Some(position) => self.lock_group(position.pinned)?,
            None => return Ok(0),
        }
        let before = self.staged.len();
        self.staged.retain(|n| n.id != note_id);
        Ok(before - self.staged.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::auth::RequestContext;
    use crate::models::note::ReqNote;
    use crate::order;

    fn note(user_id: &str, order: i32) -> Note {
        let content = ReqNote {
            title: Some(format!("note {order}")),
            content: Some("body".into()),
        }
        .validate()
        .unwrap();
        Note::new(user_id, content, order)
    }

    #[test]
    fn failed_unit_leaves_store_untouched() {
        let store = MemoryStore::new();
        let a = note("u1", 0);
        let b = note("u1", 1);
        store
            .atomically("u1", &mut |tx| {
                tx.insert(&a)?;
                tx.insert(&b)
            })
            .unwrap();

        let result = store.atomically("u1", &mut |tx| {
            tx.shift(false, 0, 1, 5)?;
            tx.delete(&a.id)?;
            Err(ServerError::DieselError)
        });

        assert!(matches!(result, Err(ServerError::DieselError)));
        let orders: Vec<i32> = store
            .list_by_user("u1")
            .unwrap()
            .iter()
            .map(|n| n.sort_order)
            .collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn notes_are_scoped_to_their_owner() {
        let store = MemoryStore::new();
        let mine = note("u1", 0);
        store.atomically("u1", &mut |tx| tx.insert(&mine)).unwrap();

        assert!(store.find("u2", &mine.id).unwrap().is_none());
        assert!(store.list_by_user("u2").unwrap().is_empty());

        let mut deleted = 0;
        store
            .atomically("u2", &mut |tx| {
                deleted = tx.delete(&mine.id)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(deleted, 0);
        assert!(store.find("u1", &mine.id).unwrap().is_some());
    }

    #[test]
    fn list_puts_pinned_group_first() {
        let store = MemoryStore::new();
        let a = note("u1", 0);
        let b = note("u1", 1);
        let mut p = note("u1", 0);
        p.pinned = true;
        store
            .atomically("u1", &mut |tx| {
                tx.insert(&a)?;
                tx.insert(&b)?;
                tx.insert(&p)
            })
            .unwrap();

        let ids: Vec<String> = store
            .list_by_user("u1")
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![p.id, a.id, b.id]);
    }

    #[test]
    fn open_unit_does_not_hold_up_other_users_or_groups() {
        let store = Arc::new(MemoryStore::new());
        let (a, b) = (note("u1", 0), note("u1", 1));
        let (mut p, mut q) = (note("u1", 0), note("u1", 1));
        p.pinned = true;
        q.pinned = true;
        let (x, y) = (note("u2", 0), note("u2", 1));
        store
            .atomically("u1", &mut |tx| {
                for n in [&a, &b, &p, &q] {
                    tx.insert(n)?;
                }
                Ok(())
            })
            .unwrap();
        store
            .atomically("u2", &mut |tx| {
                tx.insert(&x)?;
                tx.insert(&y)
            })
            .unwrap();

        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.atomically("u1", &mut |tx| {
                    tx.lock_group(false)?;
                    held_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
            })
        };
        held_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let store = Arc::clone(&store);
            let (y_id, q_id) = (y.id.clone(), q.id.clone());
            thread::spawn(move || {
                let other_user =
                    order::reorder(store.as_ref(), &RequestContext::new("u2".into()), &y_id, 0);
                let other_group =
                    order::reorder(store.as_ref(), &RequestContext::new("u1".into()), &q_id, 0);
                let listed = store.list_by_user("u1").map(|notes| notes.len());
                done_tx.send((other_user, other_group, listed)).unwrap();
            });
        }
        let outcome = done_rx.recv_timeout(Duration::from_secs(5));
        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();

        let (other_user, other_group, listed) = outcome.expect("work waited for the open unit");
        other_user.unwrap();
        other_group.unwrap();
        assert_eq!(listed.unwrap(), 4);
        assert_eq!(store.find_order_and_pinned("u2", &y.id).unwrap(), Some((0, false).into()));
        assert_eq!(store.find_order_and_pinned("u1", &q.id).unwrap(), Some((0, true).into()));
        assert_eq!(store.find_order_and_pinned("u1", &a.id).unwrap(), Some((0, false).into()));
    }

    #[test]
    fn content_edit_during_a_unit_survives_its_commit() {
        let store = MemoryStore::new();
        let (a, b) = (note("u1", 0), note("u1", 1));
        store
            .atomically("u1", &mut |tx| {
                tx.insert(&a)?;
                tx.insert(&b)
            })
            .unwrap();

        let edit = ReqNote {
            title: Some("edited".into()),
            content: Some("new body".into()),
        }
        .validate()
        .unwrap();
        store
            .atomically("u1", &mut |tx| {
                tx.lock_group(false)?;
                store.update_content("u1", &a.id, &edit)?;
                tx.place(&a.id, (1, false).into())?;
                tx.place(&b.id, (0, false).into())
            })
            .unwrap();

        let stored = store.find("u1", &a.id).unwrap().unwrap();
        assert_eq!(stored.title, "edited");
        assert_eq!(stored.sort_order, 1);
    }
}
