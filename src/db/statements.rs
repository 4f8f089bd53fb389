//! Seed-override statements applied after the installer has run.
//!
//! Statements are rendered as literal SQL text (values quoted as string
//! literals) so the executed text matches the stock deployment scripts.

use crate::config::{DatabaseConfig, SiteConfig};

/// Primary key of the administrator created by the installer.
pub const ADMIN_USER_ID: u64 = 1;

pub const OPTION_SITEURL: &str = "siteurl";
pub const OPTION_HOME: &str = "home";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    AdminPassword {
        users_table: String,
        password: String,
    },
    SiteOption {
        options_table: String,
        name: &'static str,
        value: String,
    },
}

impl Statement {
    pub fn sql(&self) -> String {
        match self {
            Statement::AdminPassword {
                users_table,
                password,
            } => format!(
                "UPDATE {users_table} SET user_pass = MD5({}) WHERE ID = {ADMIN_USER_ID} LIMIT 1",
                quote_literal(password)
            ),
            Statement::SiteOption {
                options_table,
                name,
                value,
            } => format!(
                "UPDATE {options_table} SET option_value = {} WHERE option_name = {}",
                quote_literal(value),
                quote_literal(name)
            ),
        }
    }

    /// Short description used in logs and error messages. Never contains values.
    pub fn action(&self) -> &'static str {
        match self {
            Statement::AdminPassword { .. } => "setting the administrator password",
            Statement::SiteOption { name, .. } if *name == OPTION_SITEURL => {
                "setting option 'siteurl'"
            }
            Statement::SiteOption { .. } => "setting option 'home'",
        }
    }
}

/// The three overrides, in the order they are applied.
pub fn seed_overrides(db: &DatabaseConfig, site: &SiteConfig) -> Vec<Statement> {
    let options_table = db.options_table();
    vec![
        Statement::AdminPassword {
            users_table: db.users_table(),
            password: site.admin_password.clone(),
        },
        Statement::SiteOption {
            options_table: options_table.clone(),
            name: OPTION_SITEURL,
            value: site.url.clone(),
        },
        Statement::SiteOption {
            options_table,
            name: OPTION_HOME,
            value: site.url.clone(),
        },
    ]
}

/// `USE` cannot go through the prepared-statement protocol, so it is sent as text.
pub fn use_database(name: &str) -> String {
    format!("USE `{}`", name.replace('`', "``"))
}

/// Quote a value as a MySQL string literal.
///
/// Assumes the server's default `sql_mode`, where backslash is an escape
/// character. Under `NO_BACKSLASH_ESCAPES` the value is still safely quoted,
/// but each backslash is stored doubled.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}
