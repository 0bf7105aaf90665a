//! Postgres-backed credential store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate(field)` | username/email/role name/(resource, action) taken |
//! | Database (other) | Any other | `Unavailable` | Constraint or SQL failure |
//! | PoolClosed, Io, Tls, ... | N/A | `Unavailable` | Connection failures |
//!
//! Missing rows are detected with `fetch_optional`/`rows_affected` and
//! reported as `StoreError::NotFound`.
//!
//! ## Consistency
//!
//! Identity loads run in a single `REPEATABLE READ, READ ONLY` transaction so
//! the user, its roles and their permissions come from one snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use warden_auth::{IdentityStore, PasswordHash, Permission, Role, StoreError, User};
use warden_core::{PermissionId, RoleId, UserId};

use super::r#trait::{
    CredentialStore, NewPermission, NewRole, NewUser, PermissionChanges, RoleChanges, UserChanges,
};

/// Idempotent schema bootstrap, applied in order by [`PostgresCredentialStore::migrate`].
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            UUID PRIMARY KEY,
        username      TEXT NOT NULL,
        email         TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        full_name     TEXT NOT NULL DEFAULT '',
        created_at    TIMESTAMPTZ NOT NULL,
        updated_at    TIMESTAMPTZ NOT NULL,
        CONSTRAINT users_username_key UNIQUE (username),
        CONSTRAINT users_email_key UNIQUE (email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at  TIMESTAMPTZ NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL,
        CONSTRAINT roles_name_key UNIQUE (name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id          UUID PRIMARY KEY,
        resource    TEXT NOT NULL,
        action      TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at  TIMESTAMPTZ NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL,
        CONSTRAINT permissions_resource_action_key UNIQUE (resource, action)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id       UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        permission_id UUID NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
];

/// Postgres-backed credential store.
///
/// `Send + Sync`; all operations go through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    async fn conn(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, StoreError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))
    }

    /// Load a user row and expand it, inside one read-only snapshot.
    async fn load_identity(&self, filter: IdentityFilter<'_>) -> Result<User, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_transaction", e))?;

        let row = match filter {
            IdentityFilter::Id(id) => {
                sqlx::query(USER_BY_ID)
                    .bind(id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
            }
            IdentityFilter::Username(username) => {
                sqlx::query(USER_BY_USERNAME)
                    .bind(username)
                    .fetch_optional(&mut *tx)
                    .await
            }
        }
        .map_err(|e| map_sqlx_error("load_identity", e))?
        .ok_or(StoreError::NotFound("user"))?;

        let user_row = UserRow::from_row(&row).map_err(|e| map_sqlx_error("decode_user", e))?;
        let roles = roles_for_users(&mut *tx, &[user_row.id])
            .await?
            .remove(&user_row.id)
            .unwrap_or_default();

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(user_row.into_user(roles))
    }
}

enum IdentityFilter<'a> {
    Id(UserId),
    Username(&'a str),
}

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, created_at, updated_at";

const USER_BY_ID: &str = "SELECT id, username, email, password_hash, full_name, created_at, updated_at \
                          FROM users WHERE id = $1";

const USER_BY_USERNAME: &str = "SELECT id, username, email, password_hash, full_name, created_at, updated_at \
                                FROM users WHERE username = $1";

#[async_trait]
impl IdentityStore for PostgresCredentialStore {
    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_identity_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.load_identity(IdentityFilter::Id(id)).await
    }

    #[instrument(skip(self), err)]
    async fn get_identity_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.load_identity(IdentityFilter::Username(username)).await
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self), err)]
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut conn = self.conn().await?;
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        let users = rows
            .iter()
            .map(UserRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_user", e))?;

        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        let mut roles = roles_for_users(&mut *conn, &ids).await?;

        Ok(users
            .into_iter()
            .map(|u| {
                let user_roles = roles.remove(&u.id).unwrap_or_default();
                u.into_user(user_roles)
            })
            .collect())
    }

    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let created = User::new(user.username, user.email, user.password_hash, user.full_name);

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(created.id.as_uuid())
        .bind(&created.username)
        .bind(&created.email)
        .bind(created.password_hash.as_str())
        .bind(&created.full_name)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        Ok(created)
    }

    #[instrument(skip(self, changes), fields(user_id = %id), err)]
    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username      = COALESCE($2, username),
                email         = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                full_name     = COALESCE($5, full_name),
                updated_at    = $6
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.password_hash.map(PasswordHash::into_inner))
        .bind(changes.full_name)
        .bind(Utc::now())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        self.get_identity_by_id(id).await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        delete_by_id(&self.pool, "users", *id.as_uuid(), "user").await
    }

    #[instrument(skip(self), fields(user_id = %user_id, role_id = %role_id), err)]
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        ensure_exists(&mut *tx, "users", *user_id.as_uuid(), "user").await?;
        ensure_exists(&mut *tx, "roles", *role_id.as_uuid(), "role").await?;

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("assign_role", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id, role_id = %role_id), err)]
    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        ensure_exists(&mut *tx, "users", *user_id.as_uuid(), "user").await?;
        ensure_exists(&mut *tx, "roles", *role_id.as_uuid(), "role").await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("revoke_role", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let mut conn = self.conn().await?;
        let rows = sqlx::query("SELECT id, name, description, created_at, updated_at FROM roles ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;

        let roles = rows
            .iter()
            .map(RoleRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_role", e))?;

        let ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        let mut permissions = permissions_for_roles(&mut *conn, &ids).await?;

        Ok(roles
            .into_iter()
            .map(|r| {
                let granted = permissions.remove(&r.id).unwrap_or_default();
                r.into_role(granted)
            })
            .collect())
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn get_role(&self, id: RoleId) -> Result<Role, StoreError> {
        let mut conn = self.conn().await?;
        let row = sqlx::query("SELECT id, name, description, created_at, updated_at FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("get_role", e))?
            .ok_or(StoreError::NotFound("role"))?;

        expand_role(&mut *conn, &row).await
    }

    #[instrument(skip(self), err)]
    async fn find_role_by_name(&self, name: &str) -> Result<Role, StoreError> {
        let mut conn = self.conn().await?;
        let row = sqlx::query("SELECT id, name, description, created_at, updated_at FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_name", e))?
            .ok_or(StoreError::NotFound("role"))?;

        expand_role(&mut *conn, &row).await
    }

    #[instrument(skip(self, role), fields(name = %role.name), err)]
    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError> {
        let created = Role::new(role.name, role.description);

        sqlx::query(
            "INSERT INTO roles (id, name, description, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(created.id.as_uuid())
        .bind(&created.name)
        .bind(&created.description)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_role", e))?;

        Ok(created)
    }

    #[instrument(skip(self, changes), fields(role_id = %id), err)]
    async fn update_role(&self, id: RoleId, changes: RoleChanges) -> Result<Role, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE roles SET
                name        = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at  = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(changes.name)
        .bind(changes.description)
        .bind(Utc::now())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_role", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("role"));
        }
        self.get_role(id).await
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> Result<(), StoreError> {
        delete_by_id(&self.pool, "roles", *id.as_uuid(), "role").await
    }

    #[instrument(skip(self), fields(role_id = %role_id, permission_id = %permission_id), err)]
    async fn grant_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        ensure_exists(&mut *tx, "roles", *role_id.as_uuid(), "role").await?;
        ensure_exists(&mut *tx, "permissions", *permission_id.as_uuid(), "permission").await?;

        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("grant_permission", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(role_id = %role_id, permission_id = %permission_id), err)]
    async fn revoke_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        ensure_exists(&mut *tx, "roles", *role_id.as_uuid(), "role").await?;
        ensure_exists(&mut *tx, "permissions", *permission_id.as_uuid(), "permission").await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id.as_uuid())
            .bind(permission_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("revoke_permission", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, resource, action, description, created_at, updated_at FROM permissions ORDER BY id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_permissions", e))?;

        rows.iter()
            .map(|row| PermissionRow::from_row(row).map(Permission::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_permission", e))
    }

    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn get_permission(&self, id: PermissionId) -> Result<Permission, StoreError> {
        let row = sqlx::query(
            "SELECT id, resource, action, description, created_at, updated_at FROM permissions WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_permission", e))?
        .ok_or(StoreError::NotFound("permission"))?;

        PermissionRow::from_row(&row)
            .map(Permission::from)
            .map_err(|e| map_sqlx_error("decode_permission", e))
    }

    #[instrument(skip(self), err)]
    async fn find_permission(&self, resource: &str, action: &str) -> Result<Permission, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, resource, action, description, created_at, updated_at
            FROM permissions WHERE resource = $1 AND action = $2
            "#,
        )
        .bind(resource)
        .bind(action)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_permission", e))?
        .ok_or(StoreError::NotFound("permission"))?;

        PermissionRow::from_row(&row)
            .map(Permission::from)
            .map_err(|e| map_sqlx_error("decode_permission", e))
    }

    #[instrument(skip(self, permission), fields(resource = %permission.resource, action = %permission.action), err)]
    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, StoreError> {
        let created = Permission::new(permission.resource, permission.action, permission.description);

        sqlx::query(
            r#"
            INSERT INTO permissions (id, resource, action, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(created.id.as_uuid())
        .bind(&created.resource)
        .bind(&created.action)
        .bind(&created.description)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_permission", e))?;

        Ok(created)
    }

    /// The unique constraint only fires against other rows, so an update that
    /// keeps its own `(resource, action)` never conflicts.
    #[instrument(skip(self, changes), fields(permission_id = %id), err)]
    async fn update_permission(
        &self,
        id: PermissionId,
        changes: PermissionChanges,
    ) -> Result<Permission, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE permissions SET
                resource    = COALESCE($2, resource),
                action      = COALESCE($3, action),
                description = COALESCE($4, description),
                updated_at  = $5
            WHERE id = $1
            RETURNING id, resource, action, description, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(changes.resource)
        .bind(changes.action)
        .bind(changes.description)
        .bind(Utc::now())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_permission", e))?
        .ok_or(StoreError::NotFound("permission"))?;

        PermissionRow::from_row(&row)
            .map(Permission::from)
            .map_err(|e| map_sqlx_error("decode_permission", e))
    }

    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn delete_permission(&self, id: PermissionId) -> Result<(), StoreError> {
        delete_by_id(&self.pool, "permissions", *id.as_uuid(), "permission").await
    }
}

// Shared helpers

async fn ensure_exists(
    conn: &mut PgConnection,
    table: &'static str,
    id: Uuid,
    what: &'static str,
) -> Result<(), StoreError> {
    let found = sqlx::query(&format!("SELECT 1 FROM {table} WHERE id = $1 FOR SHARE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("ensure_exists", e))?;

    found.map(|_| ()).ok_or(StoreError::NotFound(what))
}

async fn delete_by_id(
    pool: &PgPool,
    table: &'static str,
    id: Uuid,
    what: &'static str,
) -> Result<(), StoreError> {
    // Association rows go with ON DELETE CASCADE.
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("delete", e))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(what));
    }
    Ok(())
}

async fn expand_role(conn: &mut PgConnection, row: &PgRow) -> Result<Role, StoreError> {
    let role = RoleRow::from_row(row).map_err(|e| map_sqlx_error("decode_role", e))?;
    let permissions = permissions_for_roles(conn, &[role.id])
        .await?
        .remove(&role.id)
        .unwrap_or_default();
    Ok(role.into_role(permissions))
}

/// Roles (with permissions) for each of the given users, ordered by role id.
async fn roles_for_users(
    conn: &mut PgConnection,
    user_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Role>>, StoreError> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT ur.user_id, r.id, r.name, r.description, r.created_at, r.updated_at
        FROM user_roles ur
        JOIN roles r ON r.id = ur.role_id
        WHERE ur.user_id = ANY($1)
        ORDER BY r.id
        "#,
    )
    .bind(user_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_user_roles", e))?;

    let mut assignments = Vec::with_capacity(rows.len());
    for row in &rows {
        let user_id: Uuid = row.try_get("user_id").map_err(|e| map_sqlx_error("decode_role", e))?;
        let role = RoleRow::from_row(row).map_err(|e| map_sqlx_error("decode_role", e))?;
        assignments.push((user_id, role));
    }

    let mut role_ids: Vec<Uuid> = assignments.iter().map(|(_, r)| r.id).collect();
    role_ids.sort();
    role_ids.dedup();
    let permissions = permissions_for_roles(conn, &role_ids).await?;

    let mut by_user: HashMap<Uuid, Vec<Role>> = HashMap::new();
    for (user_id, role) in assignments {
        let granted = permissions.get(&role.id).cloned().unwrap_or_default();
        by_user.entry(user_id).or_default().push(role.into_role(granted));
    }
    Ok(by_user)
}

/// Permissions granted to each of the given roles, ordered by permission id.
async fn permissions_for_roles(
    conn: &mut PgConnection,
    role_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Permission>>, StoreError> {
    if role_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT rp.role_id, p.id, p.resource, p.action, p.description, p.created_at, p.updated_at
        FROM role_permissions rp
        JOIN permissions p ON p.id = rp.permission_id
        WHERE rp.role_id = ANY($1)
        ORDER BY p.id
        "#,
    )
    .bind(role_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_role_permissions", e))?;

    let mut by_role: HashMap<Uuid, Vec<Permission>> = HashMap::new();
    for row in &rows {
        let role_id: Uuid = row.try_get("role_id").map_err(|e| map_sqlx_error("decode_permission", e))?;
        let permission = PermissionRow::from_row(row).map_err(|e| map_sqlx_error("decode_permission", e))?;
        by_role.entry(role_id).or_default().push(permission.into());
    }
    Ok(by_role)
}

/// Map SQLx errors to `StoreError`.
///
/// Unique violations become `Duplicate` naming the field behind the violated
/// constraint; everything else is an unavailable store.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let field = match db_err.constraint() {
                    Some("users_username_key") => "username",
                    Some("users_email_key") => "email",
                    Some("roles_name_key") => "name",
                    Some("permissions_resource_action_key") => "resource/action",
                    _ => "record",
                };
                return StoreError::Duplicate(field.to_string());
            }
            StoreError::Unavailable(format!("database error in {}: {}", operation, db_err.message()))
        }
        other => StoreError::Unavailable(format!("{} failed: {}", operation, other)),
    }
}

// SQLx row types

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    full_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            full_name: row.try_get("full_name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl UserRow {
    fn into_user(self, roles: Vec<Role>) -> User {
        User {
            id: UserId::from_uuid(self.id),
            username: self.username,
            email: self.email,
            password_hash: PasswordHash::from_stored(self.password_hash),
            full_name: self.full_name,
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for RoleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RoleRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl RoleRow {
    fn into_role(self, permissions: Vec<Permission>) -> Role {
        Role {
            id: RoleId::from_uuid(self.id),
            name: self.name,
            description: self.description,
            permissions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug)]
struct PermissionRow {
    id: Uuid,
    resource: String,
    action: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PermissionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PermissionRow {
            id: row.try_get("id")?,
            resource: row.try_get("resource")?,
            action: row.try_get("action")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: PermissionId::from_uuid(row.id),
            resource: row.resource,
            action: row.action,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
