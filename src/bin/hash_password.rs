//! Print an Argon2 hash for a `[[auth.users]]` entry.
//!
//! Usage: `hash-password --password <password>` or pipe the password on stdin
//! (preferred; keeps it out of shell history and `ps`).

use anyhow::{bail, Context};
use fail2rest::AuthService;
use std::io::Read;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: hash-password [--password <password>]");
        println!();
        println!("Without --password the password is read from stdin.");
        println!("Example: echo -n 'mySecurePassword123' | hash-password");
        return Ok(());
    }

    let password = match args.iter().position(|a| a == "--password" || a == "-password") {
        Some(i) => args
            .get(i + 1)
            .cloned()
            .context("--password needs a value")?,
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read password from stdin")?;
            input.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let hash = AuthService::hash_password(&password).context("Error hashing password")?;
    println!("{}", hash);
    Ok(())
}
