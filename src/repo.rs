//! Owner-scoped persistence for todos and their attachments.
//!
//! Every todo operation here takes the owning user id and folds it into the
//! query predicate alongside the todo id. Nothing in this module (except the
//! administrative `list_all`) can see another user's rows, so tenant
//! isolation does not depend on handler discipline.

use diesel::prelude::*;

use crate::models::{Attachment, NewAttachment, NewTodo, NewUser, Todo, User};
use crate::schema::{attachments, todos, users};

pub type TodoWithAttachments = (Todo, Vec<Attachment>);

/// Partial update payload. An absent title leaves the stored title alone;
/// `status` is always written, even when false.
#[derive(Debug, Default)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub status: bool,
}

pub fn find_user_by_username(
    conn: &mut PgConnection,
    username: &str,
) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(username))
        .first(conn)
        .optional()
}

pub fn create_user(
    conn: &mut PgConnection,
    username: &str,
    password_hash: &str,
) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values(&NewUser {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        })
        .get_result(conn)
}

/// Unscoped listing, for administrative tooling only. Never reachable from
/// a user-facing route.
pub fn list_all(conn: &mut PgConnection) -> QueryResult<Vec<Todo>> {
    todos::table.load(conn)
}

pub fn list_by_owner(
    conn: &mut PgConnection,
    owner_id: i64,
) -> QueryResult<Vec<TodoWithAttachments>> {
    let owned: Vec<Todo> = todos::table
        .filter(todos::user_id.eq(owner_id))
        .load(conn)?;

    let grouped = Attachment::belonging_to(&owned)
        .order(attachments::attachment_order.asc())
        .load::<Attachment>(conn)?
        .grouped_by(&owned);

    Ok(owned.into_iter().zip(grouped).collect())
}

pub fn get_by_id(
    conn: &mut PgConnection,
    todo_id: i64,
    owner_id: i64,
) -> QueryResult<Option<TodoWithAttachments>> {
    let todo: Option<Todo> = todos::table
        .filter(todos::id.eq(todo_id))
        .filter(todos::user_id.eq(owner_id))
        .first(conn)
        .optional()?;

    let Some(todo) = todo else {
        return Ok(None);
    };

    let files: Vec<Attachment> = Attachment::belonging_to(&todo)
        .order(attachments::attachment_order.asc())
        .load(conn)?;

    Ok(Some((todo, files)))
}

pub fn create(conn: &mut PgConnection, title: &str, owner_id: i64) -> QueryResult<Todo> {
    diesel::insert_into(todos::table)
        .values(&NewTodo {
            title: title.to_string(),
            user_id: owner_id,
        })
        .get_result(conn)
}

/// Applies a partial update. Returns `None` when no row matches the
/// (todo_id, owner_id) predicate.
pub fn update(
    conn: &mut PgConnection,
    todo_id: i64,
    owner_id: i64,
    changes: TodoChanges,
) -> QueryResult<Option<Todo>> {
    let target = todos::table
        .filter(todos::id.eq(todo_id))
        .filter(todos::user_id.eq(owner_id));
    let now = chrono::Utc::now().naive_utc();

    let title = changes.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let updated = match title {
        Some(title) => diesel::update(target)
            .set((
                todos::title.eq(title),
                todos::status.eq(changes.status),
                todos::updated_at.eq(now),
            ))
            .execute(conn)?,
        None => diesel::update(target)
            .set((todos::status.eq(changes.status), todos::updated_at.eq(now)))
            .execute(conn)?,
    };

    if updated == 0 {
        return Ok(None);
    }

    todos::table
        .filter(todos::id.eq(todo_id))
        .filter(todos::user_id.eq(owner_id))
        .first(conn)
        .optional()
}

/// Fetch-then-delete so callers can tell "absent" from a storage failure.
/// Returns the number of rows removed; zero means not found.
pub fn delete(conn: &mut PgConnection, todo_id: i64, owner_id: i64) -> QueryResult<usize> {
    let existing: Option<i64> = todos::table
        .filter(todos::id.eq(todo_id))
        .filter(todos::user_id.eq(owner_id))
        .select(todos::id)
        .first(conn)
        .optional()?;

    if existing.is_none() {
        return Ok(0);
    }

    diesel::delete(
        todos::table
            .filter(todos::id.eq(todo_id))
            .filter(todos::user_id.eq(owner_id)),
    )
    .execute(conn)
}

/// Links a stored blob to a todo. The per-todo order number comes from the
/// `attachment_seq` counter, bumped in the same transaction as the insert,
/// so concurrent uploads for one todo can never be handed the same order.
/// The counter only grows; deletions never free numbers for reuse.
///
/// Returns `None` when the todo does not exist under this owner.
pub fn create_attachment(
    conn: &mut PgConnection,
    todo_id: i64,
    owner_id: i64,
    path: &str,
) -> QueryResult<Option<Attachment>> {
    conn.transaction(|conn| {
        let next_order: Option<i64> = diesel::update(
            todos::table
                .filter(todos::id.eq(todo_id))
                .filter(todos::user_id.eq(owner_id)),
        )
        .set(todos::attachment_seq.eq(todos::attachment_seq + 1))
        .returning(todos::attachment_seq)
        .get_result(conn)
        .optional()?;

        let Some(next_order) = next_order else {
            return Ok(None);
        };

        let attachment = diesel::insert_into(attachments::table)
            .values(&NewAttachment {
                todo_id,
                path: path.to_string(),
                attachment_order: next_order,
            })
            .get_result(conn)?;

        Ok(Some(attachment))
    })
}

/// Transactional full replace of a todo's attachment rows, used to push an
/// in-memory attachment list back to storage. Row ids are regenerated;
/// paths and order numbers are preserved as given.
pub fn replace_attachments(
    conn: &mut PgConnection,
    todo_id: i64,
    owner_id: i64,
    rows: Vec<NewAttachment>,
) -> QueryResult<Option<Vec<Attachment>>> {
    conn.transaction(|conn| {
        let existing: Option<i64> = todos::table
            .filter(todos::id.eq(todo_id))
            .filter(todos::user_id.eq(owner_id))
            .select(todos::id)
            .first(conn)
            .optional()?;

        if existing.is_none() {
            return Ok(None);
        }

        diesel::delete(attachments::table.filter(attachments::todo_id.eq(todo_id)))
            .execute(conn)?;

        let inserted = diesel::insert_into(attachments::table)
            .values(&rows)
            .get_results(conn)?;

        Ok(Some(inserted))
    })
}

/// Case-insensitive substring search over titles, offset-paged. The total
/// count is computed independently of the page window.
pub fn search_by_owner(
    conn: &mut PgConnection,
    owner_id: i64,
    term: &str,
    page: i64,
    per_page: i64,
) -> QueryResult<(Vec<TodoWithAttachments>, i64)> {
    let pattern = format!("%{term}%");

    let total: i64 = todos::table
        .filter(todos::user_id.eq(owner_id))
        .filter(todos::title.ilike(&pattern))
        .count()
        .get_result(conn)?;

    let offset = (page - 1) * per_page;
    let matched: Vec<Todo> = todos::table
        .filter(todos::user_id.eq(owner_id))
        .filter(todos::title.ilike(&pattern))
        .order(todos::id.asc())
        .offset(offset)
        .limit(per_page)
        .load(conn)?;

    let grouped = Attachment::belonging_to(&matched)
        .order(attachments::attachment_order.asc())
        .load::<Attachment>(conn)?
        .grouped_by(&matched);

    Ok((matched.into_iter().zip(grouped).collect(), total))
}
