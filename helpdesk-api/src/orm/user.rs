use chrono::Utc;
use diesel::prelude::*;

use crate::models::{NewUser, Role, Technician, User, UserInput};
use crate::orm::last_insert_rowid;
use crate::schema::users;

/// Inserts a new user and returns the stored row.
pub fn insert_user(conn: &mut SqliteConnection, input: UserInput) -> QueryResult<User> {
    let new_user = NewUser {
        name: input.name,
        email: input.email,
        password_hash: input.password_hash,
        role: input.role,
        created_at: Utc::now().naive_utc(),
    };

    diesel::insert_into(users::table)
        .values(&new_user)
        .execute(conn)?;

    let id = last_insert_rowid(conn)?;
    users::table.find(id).select(User::as_select()).first(conn)
}

pub fn get_user(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Option<User>> {
    users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn get_user_by_email(conn: &mut SqliteConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::email.eq(email))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn list_all_users(conn: &mut SqliteConnection) -> QueryResult<Vec<User>> {
    users::table
        .order(users::id.asc())
        .select(User::as_select())
        .load(conn)
}

/// Ids of every user holding `role`.
pub fn user_ids_with_role(conn: &mut SqliteConnection, role: Role) -> QueryResult<Vec<i32>> {
    users::table
        .filter(users::role.eq(role))
        .order(users::id.asc())
        .select(users::id)
        .load(conn)
}

/// Staff members a ticket can be assigned to, ordered by name.
pub fn list_technicians(conn: &mut SqliteConnection) -> QueryResult<Vec<Technician>> {
    users::table
        .filter(users::role.eq_any(Role::STAFF))
        .order((users::name.asc(), users::id.asc()))
        .select(Technician::as_select())
        .load(conn)
}

pub fn update_password(
    conn: &mut SqliteConnection,
    user_id: i32,
    password_hash: &str,
) -> QueryResult<usize> {
    diesel::update(users::table.find(user_id))
        .set(users::password_hash.eq(password_hash))
        .execute(conn)
}

pub fn update_role(conn: &mut SqliteConnection, user_id: i32, role: Role) -> QueryResult<usize> {
    diesel::update(users::table.find(user_id))
        .set(users::role.eq(role))
        .execute(conn)
}

/// Deletes a user. Sessions and notifications cascade; rows that record the
/// user's work (tickets, comments, uploads, history) make the delete fail
/// with a foreign key violation.
pub fn delete_user(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<usize> {
    diesel::delete(users::table.find(user_id)).execute(conn)
}
