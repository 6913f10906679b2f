//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

pub mod connect;
pub mod import;
pub mod profiles;
pub mod setup;
pub mod trust;

use fvpn_core::error::FvpnError;
use std::io::{self, Write};

/// Low-level input prompting
pub(crate) fn prompt_input(prompt: &str) -> Result<String, FvpnError> {
    print!("{}", prompt);
    io::stdout().flush().map_err(FvpnError::Io)?;

    let mut input = String::new();
    io::stdin().read_line(&mut input).map_err(FvpnError::Io)?;

    Ok(input.trim_end().to_string())
}

/// Prompt for a required value with default
pub(crate) fn prompt_required(prompt: &str, default: &str) -> Result<String, FvpnError> {
    let prompt_text = if default.is_empty() {
        format!("{}: ", prompt)
    } else {
        format!("{} [{}]: ", prompt, default)
    };

    loop {
        let input = prompt_input(&prompt_text)?;

        if input.trim().is_empty() {
            if !default.is_empty() {
                return Ok(default.to_string());
            }
            println!("❌ This field is required. Please enter a value.");
            continue;
        }

        return Ok(input.trim().to_string());
    }
}

/// Prompt for an optional value
pub(crate) fn prompt_optional(prompt: &str, default: &str) -> Result<String, FvpnError> {
    let prompt_text = format!("{} [{}]: ", prompt, default);
    let input = prompt_input(&prompt_text)?;

    if input.trim().is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.trim().to_string())
    }
}

/// Prompt for yes/no with default
pub(crate) fn prompt_yes_no(prompt: &str, default_yes: bool) -> Result<bool, FvpnError> {
    let default_indicator = if default_yes { "[Y/n]" } else { "[y/N]" };
    let prompt_text = format!("{} {}: ", prompt, default_indicator);

    loop {
        let input = prompt_input(&prompt_text)?.to_lowercase();

        match input.as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            "" => return Ok(default_yes),
            _ => {
                println!("Please enter 'y' for yes or 'n' for no.");
                continue;
            }
        }
    }
}
