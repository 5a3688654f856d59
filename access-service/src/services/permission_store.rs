use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::error::ServiceError;
use crate::models::{Application, ApplicationAccess, Permission, Role, Service};

/// Read-only view of the application, service and role graph.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// `None` when no application has the slug.
    async fn get_application_access(
        &self,
        user_id: i64,
        application_slug: &str,
    ) -> Result<Option<ApplicationAccess>, ServiceError>;

    async fn get_service_by_slug(
        &self,
        application_id: i64,
        service_slug: &str,
    ) -> Result<Option<Service>, ServiceError>;

    async fn get_role_for_user(&self, user_id: i64, application_id: i64) -> Result<Option<Role>, ServiceError>;

    async fn get_permissions(&self, role_id: i64, service_id: i64) -> Result<Vec<Permission>, ServiceError>;
}

#[derive(Clone)]
pub struct PgPermissionStore {
    pool: PgPool,
}

impl PgPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn get_application_access(
        &self,
        user_id: i64,
        application_slug: &str,
    ) -> Result<Option<ApplicationAccess>, ServiceError> {
        let access = sqlx::query_as::<_, ApplicationAccess>(
            r#"
            SELECT
                app.id AS application_id,
                app.slug AS application_slug,
                app.name AS application_name,
                app.is_active AS is_app_active,
                EXISTS (
                    SELECT 1
                    FROM user_applications AS usr_app
                    JOIN application_scope AS app_scope
                        ON usr_app.application_scope_id = app_scope.id
                    WHERE usr_app.user_id = $1
                        AND app_scope.application_id = app.id
                ) AS has_access
            FROM applications AS app
            WHERE app.slug = $2
            "#,
        )
        .bind(user_id)
        .bind(application_slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(access)
    }

    async fn get_service_by_slug(
        &self,
        application_id: i64,
        service_slug: &str,
    ) -> Result<Option<Service>, ServiceError> {
        let service = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, application_id, slug, name, scope, is_active
            FROM application_services
            WHERE application_id = $1 AND slug = $2
            "#,
        )
        .bind(application_id)
        .bind(service_slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(service)
    }

    async fn get_role_for_user(&self, user_id: i64, application_id: i64) -> Result<Option<Role>, ServiceError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT role.id, role.application_id, role.slug, role.name
            FROM guardian_user_roles AS gur
            INNER JOIN guardian_roles AS role
                ON role.id = gur.role_id
            WHERE gur.user_id = $1 AND gur.application_id = $2
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn get_permissions(&self, role_id: i64, service_id: i64) -> Result<Vec<Permission>, ServiceError> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT gp.id, gp.slug, gp.name
            FROM guardian_role_permissions AS grp
            JOIN guardian_permissions AS gp
                ON gp.id = grp.permission_id
            WHERE grp.role_id = $1 AND grp.application_service_id = $2
            ORDER BY gp.id
            "#,
        )
        .bind(role_id)
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }
}

#[derive(Default)]
struct MockGraph {
    applications: HashMap<String, Application>,
    access: HashSet<(i64, i64)>,
    services: Vec<Service>,
    roles: HashMap<(i64, i64), Role>,
    permissions: HashMap<(i64, i64), Vec<Permission>>,
    lookups: Vec<&'static str>,
}

/// In-memory permission graph for tests. Records which lookups ran.
#[derive(Default)]
pub struct MockPermissionStore {
    graph: Mutex<MockGraph>,
}

impl MockPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockGraph>, ServiceError> {
        self.graph
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock permission store mutex poisoned: {}", e)))
    }

    pub fn add_application(&self, id: i64, slug: &str, is_active: bool) -> Result<(), ServiceError> {
        self.lock()?.applications.insert(
            slug.to_string(),
            Application {
                id,
                slug: slug.to_string(),
                name: slug.to_string(),
                is_active,
            },
        );
        Ok(())
    }

    pub fn grant_access(&self, user_id: i64, application_id: i64) -> Result<(), ServiceError> {
        self.lock()?.access.insert((user_id, application_id));
        Ok(())
    }

    pub fn add_service(&self, service: Service) -> Result<(), ServiceError> {
        self.lock()?.services.push(service);
        Ok(())
    }

    pub fn assign_role(&self, user_id: i64, role: Role) -> Result<(), ServiceError> {
        self.lock()?.roles.insert((user_id, role.application_id), role);
        Ok(())
    }

    pub fn grant_permissions(&self, role_id: i64, service_id: i64, slugs: &[&str]) -> Result<(), ServiceError> {
        let permissions = slugs
            .iter()
            .enumerate()
            .map(|(i, slug)| Permission {
                id: i as i64 + 1,
                slug: slug.to_string(),
                name: None,
            })
            .collect();
        self.lock()?.permissions.insert((role_id, service_id), permissions);
        Ok(())
    }

    /// Names of the lookups performed so far, in order.
    pub fn lookups(&self) -> Vec<&'static str> {
        self.graph.lock().map(|g| g.lookups.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PermissionStore for MockPermissionStore {
    async fn get_application_access(
        &self,
        user_id: i64,
        application_slug: &str,
    ) -> Result<Option<ApplicationAccess>, ServiceError> {
        let mut graph = self.lock()?;
        graph.lookups.push("application_access");
        let access = graph.applications.get(application_slug).map(|app| ApplicationAccess {
            application_id: app.id,
            application_slug: app.slug.clone(),
            application_name: app.name.clone(),
            is_app_active: app.is_active,
            has_access: graph.access.contains(&(user_id, app.id)),
        });
        Ok(access)
    }

    async fn get_service_by_slug(
        &self,
        application_id: i64,
        service_slug: &str,
    ) -> Result<Option<Service>, ServiceError> {
        let mut graph = self.lock()?;
        graph.lookups.push("service");
        Ok(graph
            .services
            .iter()
            .find(|s| s.application_id == application_id && s.slug == service_slug)
            .cloned())
    }

    async fn get_role_for_user(&self, user_id: i64, application_id: i64) -> Result<Option<Role>, ServiceError> {
        let mut graph = self.lock()?;
        graph.lookups.push("role");
        Ok(graph.roles.get(&(user_id, application_id)).cloned())
    }

    async fn get_permissions(&self, role_id: i64, service_id: i64) -> Result<Vec<Permission>, ServiceError> {
        let mut graph = self.lock()?;
        graph.lookups.push("permissions");
        Ok(graph
            .permissions
            .get(&(role_id, service_id))
            .cloned()
            .unwrap_or_default())
    }
}
