use diesel::prelude::*;
use dotenvy::dotenv;
use rocket::fairing::AdHoc;

use crate::models::{Role, UserInput};
use crate::orm::DbConn;
use crate::orm::login::hash_password;
use crate::orm::user::{get_user_by_email, insert_user};

/// Creates the default administrator if its email is not registered yet.
///
/// Email, password and display name come from `HELPDESK_DEFAULT_EMAIL`,
/// `HELPDESK_DEFAULT_PASSWORD` and `HELPDESK_DEFAULT_NAME`.
pub fn admin_init_fairing() -> AdHoc {
    AdHoc::try_on_ignite("Admin User Initialization", |rocket| async {
        dotenv().ok();

        let Some(conn) = DbConn::get_one(&rocket).await else {
            error!("[admin-init] ERROR: Could not get DB connection.");
            return Err(rocket);
        };

        let admin = DefaultAdmin::from_env();
        match conn.run(move |c| create_admin_user_if_needed(c, &admin)).await {
            Ok(()) => Ok(rocket),
            Err(e) => {
                error!("[admin-init] FATAL: Admin user creation failed: {}", e);
                Err(rocket)
            }
        }
    })
}

struct DefaultAdmin {
    email: String,
    password: String,
    name: String,
}

impl DefaultAdmin {
    fn from_env() -> Self {
        let var = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        DefaultAdmin {
            email: var("HELPDESK_DEFAULT_EMAIL", "admin@example.com"),
            password: var("HELPDESK_DEFAULT_PASSWORD", "admin"),
            name: var("HELPDESK_DEFAULT_NAME", "Administrator"),
        }
    }
}

fn create_admin_user_if_needed(
    c: &mut SqliteConnection,
    admin: &DefaultAdmin,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if get_user_by_email(c, &admin.email)?.is_some() {
        info!("[admin-init] Admin user '{}' already exists", admin.email);
        return Ok(());
    }

    let password_hash = hash_password(&admin.password).map_err(|e| e.to_string())?;
    let user = insert_user(
        c,
        UserInput {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password_hash,
            role: Role::Admin,
        },
    )?;
    info!("[admin-init] Created admin user: '{}' (id {})", user.email, user.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::testing::setup_test_db;
    use crate::orm::user::list_all_users;

    #[test]
    fn admin_is_created_once() {
        let mut conn = setup_test_db();
        let admin = DefaultAdmin {
            email: "root@example.com".to_string(),
            password: "pw".to_string(),
            name: "Root".to_string(),
        };

        create_admin_user_if_needed(&mut conn, &admin).unwrap();
        create_admin_user_if_needed(&mut conn, &admin).unwrap();

        let users = list_all_users(&mut conn).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
        assert_eq!(users[0].name, "Root");
    }
}
