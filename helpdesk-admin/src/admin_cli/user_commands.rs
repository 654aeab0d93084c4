use std::io::{self, Write};

use clap::Subcommand;
use diesel::sqlite::SqliteConnection;
use helpdesk_api::models::{Role, User, UserInput};
use helpdesk_api::orm::login::hash_password;
use helpdesk_api::orm::user::{
    delete_user, get_user_by_email, insert_user, list_all_users, update_password, update_role,
};
use rpassword::read_password;

use super::utils::{SearchFilter, confirm};

#[derive(Subcommand)]
pub enum UserAction {
    #[command(about = "Add a new user")]
    Add {
        #[arg(short, long, help = "Display name")]
        name: String,
        #[arg(short, long, help = "Email address")]
        email: String,
        #[arg(short, long, help = "Password (will be prompted securely if not provided)")]
        password: Option<String>,
        #[arg(
            short,
            long,
            default_value = "solicitante",
            help = "Role: admin, tecnico or solicitante"
        )]
        role: Role,
    },
    #[command(about = "List users, optionally filtered by search term")]
    Ls {
        #[arg(help = "Search term matched against name and email (regex by default, use -F for fixed string)")]
        search_term: Option<String>,
        #[arg(
            short = 'F',
            long = "fixed-string",
            help = "Treat search term as fixed string instead of regex"
        )]
        fixed_string: bool,
    },
    #[command(about = "Change user password")]
    Passwd {
        #[arg(short, long, help = "Email address")]
        email: String,
        #[arg(short, long, help = "New password (will be prompted securely if not provided)")]
        password: Option<String>,
    },
    #[command(about = "Change the role of a user")]
    SetRole {
        #[arg(short, long, help = "Email address")]
        email: String,
        #[arg(short, long, help = "Role: admin, tecnico or solicitante")]
        role: Role,
    },
    #[command(about = "Remove users matching search term")]
    Rm {
        #[arg(help = "Search term matched against email (regex by default, use -F for fixed string)")]
        search_term: String,
        #[arg(
            short = 'F',
            long = "fixed-string",
            help = "Treat search term as fixed string instead of regex"
        )]
        fixed_string: bool,
        #[arg(short = 'y', long = "yes", help = "Skip confirmation prompt")]
        yes: bool,
    },
}

pub fn handle_user_command_with_conn(
    conn: &mut SqliteConnection,
    action: UserAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        UserAction::Add { name, email, password, role } => {
            add_user_impl(conn, &name, &email, password, role)?;
        }
        UserAction::Ls { search_term, fixed_string } => {
            list_users_impl(conn, search_term, fixed_string)?;
        }
        UserAction::Passwd { email, password } => {
            change_password_impl(conn, &email, password)?;
        }
        UserAction::SetRole { email, role } => {
            set_role_impl(conn, &email, role)?;
        }
        UserAction::Rm { search_term, fixed_string, yes } => {
            remove_users_impl(conn, search_term, fixed_string, yes)?;
        }
    }
    Ok(())
}

pub fn add_user_impl(
    conn: &mut SqliteConnection,
    name: &str,
    email: &str,
    password: Option<String>,
    role: Role,
) -> Result<User, Box<dyn std::error::Error>> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() || email.is_empty() {
        return Err("Name and email are required".into());
    }
    if get_user_by_email(conn, email)?.is_some() {
        return Err(format!("A user with email '{}' already exists", email).into());
    }

    let password = match password {
        Some(p) if !p.is_empty() => p,
        Some(_) => return Err("Password cannot be empty".into()),
        None => prompt_for_password()?,
    };
    let password_hash =
        hash_password(&password).map_err(|e| format!("Failed to hash password: {}", e))?;

    let user = insert_user(
        conn,
        UserInput {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role,
        },
    )?;

    println!("User created successfully!");
    println!("ID: {}", user.id);
    println!("Name: {}", user.name);
    println!("Email: {}", user.email);
    println!("Role: {}", user.role);

    Ok(user)
}

/// Users whose name or email matches the filter, in id order.
pub fn find_users(
    conn: &mut SqliteConnection,
    filter: &SearchFilter,
) -> Result<Vec<User>, Box<dyn std::error::Error>> {
    Ok(list_all_users(conn)?
        .into_iter()
        .filter(|user| filter.matches(&user.email) || filter.matches(&user.name))
        .collect())
}

pub fn list_users_impl(
    conn: &mut SqliteConnection,
    search_term: Option<String>,
    fixed_string: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = SearchFilter::new(search_term, fixed_string)?;
    let users = find_users(conn, &filter)?;

    if users.is_empty() {
        println!("No users found.");
    } else {
        println!("Users:");
        for user in users {
            println!(
                "  ID: {}, Name: {}, Email: {}, Role: {}, Created: {}",
                user.id, user.name, user.email, user.role, user.created_at
            );
        }
    }

    Ok(())
}

pub fn change_password_impl(
    conn: &mut SqliteConnection,
    email: &str,
    password: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = get_user_by_email(conn, email)?
        .ok_or_else(|| format!("User with email '{}' not found", email))?;

    let password = match password {
        Some(p) if !p.is_empty() => p,
        Some(_) => return Err("Password cannot be empty".into()),
        None => prompt_for_password()?,
    };
    let password_hash =
        hash_password(&password).map_err(|e| format!("Failed to hash password: {}", e))?;
    update_password(conn, user.id, &password_hash)?;

    println!("Password changed successfully for user: {}", email);
    Ok(())
}

pub fn set_role_impl(
    conn: &mut SqliteConnection,
    email: &str,
    role: Role,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = get_user_by_email(conn, email)?
        .ok_or_else(|| format!("User with email '{}' not found", email))?;

    if user.role == role {
        println!("User '{}' already has role '{}'", email, role);
        return Ok(());
    }

    update_role(conn, user.id, role)?;
    println!("Changed role of '{}' from '{}' to '{}'", email, user.role, role);
    Ok(())
}

/// Returns how many users were deleted. Users who opened tickets or wrote
/// comments cannot be deleted; those are reported and the command fails.
pub fn remove_users_impl(
    conn: &mut SqliteConnection,
    search_term: String,
    fixed_string: bool,
    yes: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let filter = SearchFilter::new(Some(search_term), fixed_string)?;
    let matching_users: Vec<User> = list_all_users(conn)?
        .into_iter()
        .filter(|user| filter.matches(&user.email))
        .collect();

    if matching_users.is_empty() {
        println!("No users found matching the search term.");
        return Ok(0);
    }

    println!("Found {} user(s) matching the search term:", matching_users.len());
    for user in &matching_users {
        println!("  ID: {}, Name: {}, Email: {}", user.id, user.name, user.email);
    }

    if !yes
        && !confirm(&format!(
            "Are you sure you want to delete these {} user(s)?",
            matching_users.len()
        ))?
    {
        println!("Operation cancelled.");
        return Ok(0);
    }

    let mut deleted_count = 0;
    let mut errors = Vec::new();

    for user in matching_users {
        match delete_user(conn, user.id) {
            Ok(rows_affected) if rows_affected > 0 => {
                deleted_count += 1;
                println!("Deleted user: {} (ID: {})", user.email, user.id);
            }
            Ok(_) => {}
            Err(e) => {
                errors.push(format!(
                    "Failed to delete user {} (ID: {}): {}",
                    user.email, user.id, e
                ));
            }
        }
    }

    println!("Successfully deleted {} user(s).", deleted_count);

    if !errors.is_empty() {
        println!("Errors encountered:");
        for error in errors {
            println!("  {}", error);
        }
        return Err("Some deletions failed".into());
    }

    Ok(deleted_count)
}

pub fn prompt_for_password() -> Result<String, Box<dyn std::error::Error>> {
    print!("Enter new password: ");
    io::stdout().flush()?;
    let password = read_password()?;

    if password.is_empty() {
        return Err("Password cannot be empty".into());
    }

    print!("Confirm new password: ");
    io::stdout().flush()?;
    let confirm_password = read_password()?;

    if password != confirm_password {
        return Err("Passwords do not match".into());
    }

    Ok(password)
}

#[cfg(test)]
mod tests {
    use helpdesk_api::orm::login::verify_password;
    use helpdesk_api::orm::testing::{insert_test_ticket, insert_test_user, setup_test_db};

    use super::*;

    #[test]
    fn add_user_hashes_the_password() {
        let mut conn = setup_test_db();
        let user = add_user_impl(
            &mut conn,
            "Ana Lima",
            "ana@example.com",
            Some("s3cret".to_string()),
            Role::Tecnico,
        )
        .unwrap();

        assert_eq!(user.role, Role::Tecnico);
        assert_ne!(user.password_hash, "s3cret");
        assert!(verify_password("s3cret", &user.password_hash));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let mut conn = setup_test_db();
        add_user_impl(&mut conn, "Ana", "ana@example.com", Some("pw".to_string()), Role::Tecnico)
            .unwrap();
        let err = add_user_impl(
            &mut conn,
            "Other Ana",
            "ana@example.com",
            Some("pw".to_string()),
            Role::Solicitante,
        )
        .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn password_and_role_changes() {
        let mut conn = setup_test_db();
        insert_test_user(&mut conn, "bruno@example.com", "old", Role::Solicitante);

        change_password_impl(&mut conn, "bruno@example.com", Some("new".to_string())).unwrap();
        set_role_impl(&mut conn, "bruno@example.com", Role::Admin).unwrap();

        let user = get_user_by_email(&mut conn, "bruno@example.com").unwrap().unwrap();
        assert!(verify_password("new", &user.password_hash));
        assert!(!verify_password("old", &user.password_hash));
        assert_eq!(user.role, Role::Admin);

        assert!(set_role_impl(&mut conn, "nobody@example.com", Role::Admin).is_err());
    }

    #[test]
    fn search_matches_name_or_email() {
        let mut conn = setup_test_db();
        insert_test_user(&mut conn, "tech@example.com", "pw", Role::Tecnico);
        insert_test_user(&mut conn, "carla@example.com", "pw", Role::Solicitante);

        let filter = SearchFilter::new(Some("^tech$".to_string()), false).unwrap();
        let found = find_users(&mut conn, &filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "tech@example.com");
    }

    #[test]
    fn remove_skips_users_with_tickets() {
        let mut conn = setup_test_db();
        let busy = insert_test_user(&mut conn, "busy@example.com", "pw", Role::Solicitante);
        insert_test_user(&mut conn, "idle@example.com", "pw", Role::Solicitante);
        insert_test_ticket(&mut conn, busy.id);

        let removed = remove_users_impl(&mut conn, "idle".to_string(), true, true).unwrap();
        assert_eq!(removed, 1);
        assert!(get_user_by_email(&mut conn, "idle@example.com").unwrap().is_none());

        assert!(remove_users_impl(&mut conn, "busy".to_string(), true, true).is_err());
        assert!(get_user_by_email(&mut conn, "busy@example.com").unwrap().is_some());
    }
}
