//! Profile listing and removal commands

use crate::cli::prompt_yes_no;
use colored::Colorize;
use fvpn_core::{
    auth::keyring,
    config::ProfileStore,
    error::FvpnError,
};

/// Run the profiles command
pub fn run_list() -> Result<(), FvpnError> {
    let store = ProfileStore::load()?;

    if store.profiles.is_empty() {
        println!("No profiles configured. Run 'fvpn setup' to create one.");
        return Ok(());
    }

    for profile in &store.profiles {
        let has_password = keyring::has_password(&profile.name).unwrap_or(false);

        println!("{}", profile.name.bold());
        println!("  username:  {}", profile.username);
        for (index, gateway) in profile.gateways.iter().enumerate() {
            println!("  gateway {}: {}", index + 1, gateway);
        }
        if let Some(cert) = &profile.trusted_cert {
            println!("  trusted:   {}", cert);
        }
        if profile.otp_enabled {
            println!("  otp:       prompted on connect");
        }
        if !has_password {
            println!("  {}", "no stored password".yellow());
        }
        println!();
    }

    Ok(())
}

/// Run the remove command
pub fn run_remove(name: &str) -> Result<(), FvpnError> {
    let mut store = ProfileStore::load()?;

    // Resolve first so a typo gives a clear error
    store.find(name)?;

    if !prompt_yes_no(&format!("Remove profile '{}'?", name), false)? {
        println!("Nothing removed.");
        return Ok(());
    }

    store.remove(name);
    store.save()?;
    keyring::delete_password(name)?;

    println!("Removed profile '{}'.", name);
    Ok(())
}
