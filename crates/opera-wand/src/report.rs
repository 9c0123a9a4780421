//! Console-facing recovery report over a parsed wand store.

use std::io::{self, Write};

use crate::store::{FormCredential, WandFile};

/// One reportable entry recovered from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveredLogin {
    /// A stored form credential with a password-flagged input.
    Form {
        url: String,
        /// Value of the first username-flagged input, if one exists.
        username: Option<String>,
        password: String,
    },
    /// A stored form credential without any password-flagged input.
    NoPassword { url: String },
    /// A pre-form-store credential, emitted regardless of emptiness.
    Legacy {
        url: String,
        username: String,
        password: String,
    },
}

/// Collect every reportable login from `file`: all form credentials of
/// all profiles (the log profile included), then all legacy credentials.
pub fn recovered_logins(file: &WandFile) -> Vec<RecoveredLogin> {
    let mut logins = Vec::new();

    let profiles = file.profiles.iter().chain(std::iter::once(&file.log_profile));
    for credential in profiles.flat_map(|profile| profile.credentials.iter()) {
        if let Some(login) = form_login(credential) {
            logins.push(login);
        }
    }

    for credential in &file.credentials {
        logins.push(RecoveredLogin::Legacy {
            url: credential.url.clone().unwrap_or_default(),
            username: credential.username.clone().unwrap_or_default(),
            password: credential.password.clone().unwrap_or_default(),
        });
    }

    logins
}

fn form_login(credential: &FormCredential) -> Option<RecoveredLogin> {
    // Credentials without a form URL carry nothing reportable.
    let url = credential.form_url.as_deref().filter(|url| !url.is_empty())?;

    let username = credential
        .inputs
        .iter()
        .find(|input| input.flags.is_username())
        .map(|input| input.value.clone().unwrap_or_default());

    let Some(password_input) = credential
        .inputs
        .iter()
        .find(|input| input.flags.is_password())
    else {
        return Some(RecoveredLogin::NoPassword {
            url: url.to_owned(),
        });
    };

    if password_input.extra.is_none() && password_input.value.is_some() {
        // Password text has only ever been observed in the extra-value
        // slot; flag samples that break that assumption.
        log::warn!(
            "password input for {url} has an empty extra value; its value field was not used"
        );
    }

    Some(RecoveredLogin::Form {
        url: url.to_owned(),
        username,
        password: password_input.extra.clone().unwrap_or_default(),
    })
}

/// Render logins in the classic dump format, one blank-line-separated
/// block per entry.
pub fn write_report<W: Write>(output: &mut W, logins: &[RecoveredLogin]) -> io::Result<()> {
    for login in logins {
        match login {
            RecoveredLogin::Form {
                url,
                username,
                password,
            } => {
                writeln!(output, "URL ....: {url}")?;
                if let Some(username) = username {
                    writeln!(output, "Username: {username}")?;
                }
                writeln!(output, "Password: {password}")?;
            }
            RecoveredLogin::NoPassword { url } => {
                writeln!(output, "No password for {url}")?;
            }
            RecoveredLogin::Legacy {
                url,
                username,
                password,
            } => {
                writeln!(output, "URL ....: {url}")?;
                writeln!(output, "Username: {username}")?;
                writeln!(output, "Password: {password}")?;
            }
        }
        writeln!(output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn report(logins: &[RecoveredLogin]) -> String {
        let mut out = Vec::new();
        write_report(&mut out, logins).expect("write to vec");
        String::from_utf8(out).expect("report is utf-8")
    }

    #[test]
    fn form_login_renders_all_lines() {
        let logins = [RecoveredLogin::Form {
            url: "https://example.net/login".to_owned(),
            username: Some("alice".to_owned()),
            password: "hunter2".to_owned(),
        }];
        assert_eq!(
            report(&logins),
            "URL ....: https://example.net/login\nUsername: alice\nPassword: hunter2\n\n"
        );
    }

    #[test]
    fn username_line_is_omitted_without_a_username_input() {
        let logins = [RecoveredLogin::Form {
            url: "https://example.net/login".to_owned(),
            username: None,
            password: "hunter2".to_owned(),
        }];
        assert_eq!(
            report(&logins),
            "URL ....: https://example.net/login\nPassword: hunter2\n\n"
        );
    }

    #[test]
    fn missing_password_input_renders_a_notice() {
        let logins = [RecoveredLogin::NoPassword {
            url: "https://example.net/login".to_owned(),
        }];
        assert_eq!(report(&logins), "No password for https://example.net/login\n\n");
    }

    #[test]
    fn legacy_login_renders_empty_fields() {
        let logins = [RecoveredLogin::Legacy {
            url: "https://old.example.net/".to_owned(),
            username: String::new(),
            password: "secret".to_owned(),
        }];
        assert_eq!(
            report(&logins),
            "URL ....: https://old.example.net/\nUsername: \nPassword: secret\n\n"
        );
    }
}
