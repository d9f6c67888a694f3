use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Integer, Text};
use std::time::SystemTime;

use super::{NoteStore, OrderTx, UserStore, Work};
use crate::errors::ServerError;
use crate::models::note::{Note, Position, ValidNote};
use crate::models::user::User;
use crate::schema::{notes, users};

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        PgStore { pool }
    }
}

impl NoteStore for PgStore {
    fn find_order_and_pinned(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> Result<Option<Position>, ServerError> {
        let mut connection = self.pool.get()?;

        Ok(notes::table
            .filter(notes::id.eq(note_id))
            .filter(notes::user_id.eq(user_id))
            .select((notes::sort_order, notes::pinned))
            .first::<(i32, bool)>(&mut connection)
            .optional()?
            .map(Position::from))
    }

    fn find(&self, user_id: &str, note_id: &str) -> Result<Option<Note>, ServerError> {
        let mut connection = self.pool.get()?;

        Ok(notes::table
            .filter(notes::id.eq(note_id))
            .filter(notes::user_id.eq(user_id))
            .first::<Note>(&mut connection)
            .optional()?)
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<Note>, ServerError> {
        let mut connection = self.pool.get()?;

        Ok(notes::table
            .filter(notes::user_id.eq(user_id))
            .order((notes::pinned.desc(), notes::sort_order.asc()))
            .load::<Note>(&mut connection)?)
    }

    fn update_content(
        &self,
        user_id: &str,
        note_id: &str,
        content: &ValidNote,
    ) -> Result<Option<Note>, ServerError> {
        let mut connection = self.pool.get()?;

        Ok(diesel::update(
            notes::table
                .filter(notes::id.eq(note_id))
                .filter(notes::user_id.eq(user_id)),
        )
        .set((
            notes::title.eq(&content.title),
            notes::content.eq(&content.content),
            notes::updated_at.eq(SystemTime::now()),
        ))
        .get_result::<Note>(&mut connection)
        .optional()?)
    }

    fn atomically(&self, user_id: &str, work: Work) -> Result<(), ServerError> {
        let mut pooled = self.pool.get()?;
        let connection: &mut PgConnection = &mut pooled;

        connection.transaction::<_, ServerError, _>(|conn| work(&mut PgTx { conn, user_id }))
    }
}

impl UserStore for PgStore {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, ServerError> {
        let mut connection = self.pool.get()?;

        Ok(users::table
            .filter(users::email.eq(email))
            .first::<User>(&mut connection)
            .optional()?)
    }

    fn insert_user(&self, user: &User) -> Result<(), ServerError> {
        let mut connection = self.pool.get()?;

        let inserted = diesel::insert_into(users::table)
            .values(user)
            .execute(&mut connection);
        match inserted {
            // users.email is the only unique key besides the id
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(ServerError::EmailTaken)
            }
            result => result.map(|_| ()).map_err(ServerError::from),
        }
    }
}

struct PgTx<'a> {
    conn: &'a mut PgConnection,
    user_id: &'a str,
}

impl OrderTx for PgTx<'_> {
    fn lock_group(&mut self, pinned: bool) -> Result<(), ServerError> {
        // held until the surrounding transaction commits or rolls back
        diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1), $2)")
            .bind::<Text, _>(self.user_id)
            .bind::<Integer, _>(pinned as i32)
            .execute(self.conn)?;
        Ok(())
    }

    fn position(&mut self, note_id: &str) -> Result<Option<Position>, ServerError> {
        Ok(notes::table
            .filter(notes::id.eq(note_id))
            .filter(notes::user_id.eq(self.user_id))
            .select((notes::sort_order, notes::pinned))
            .first::<(i32, bool)>(self.conn)
            .optional()?
            .map(Position::from))
    }

    fn group_len(&mut self, pinned: bool) -> Result<i32, ServerError> {
        let count = notes::table
            .filter(notes::user_id.eq(self.user_id))
            .filter(notes::pinned.eq(pinned))
            .count()
            .get_result::<i64>(self.conn)?;
        Ok(count as i32)
    }

    fn max_order(&mut self, pinned: bool) -> Result<Option<i32>, ServerError> {
        Ok(notes::table
            .filter(notes::user_id.eq(self.user_id))
            .filter(notes::pinned.eq(pinned))
            .select(diesel::dsl::max(notes::sort_order))
            .first::<Option<i32>>(self.conn)?)
    }

    fn shift(
        &mut self,
        pinned: bool,
        from: i32,
        to: i32,
        delta: i32,
    ) -> Result<usize, ServerError> {
        Ok(diesel::update(
            notes::table
                .filter(notes::user_id.eq(self.user_id))
                .filter(notes::pinned.eq(pinned))
                .filter(notes::sort_order.between(from, to)),
        )
        .set(notes::sort_order.eq(notes::sort_order + delta))
        .execute(self.conn)?)
    }

    fn place(&mut self, note_id: &str, position: Position) -> Result<(), ServerError> {
        let updated = diesel::update(
            notes::table
                .filter(notes::id.eq(note_id))
                .filter(notes::user_id.eq(self.user_id)),
        )
        .set((
            notes::sort_order.eq(position.sort_order),
            notes::pinned.eq(position.pinned),
        ))
        .execute(self.conn)?;

        match updated {
            0 => Err(ServerError::NotFound(note_id.to_owned())),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, note: &Note) -> Result<(), ServerError> {
        diesel::insert_into(notes::table)
            .values(note)
            .execute(self.conn)?;
        Ok(())
    }

    fn delete(&mut self, note_id: &str) -> Result<usize, ServerError> {
        Ok(diesel::delete(
            notes::table
                .filter(notes::id.eq(note_id))
                .filter(notes::user_id.eq(self.user_id)),
        )
        .execute(self.conn)?)
    }
}
