//! Import command implementation
//!
//! Scans the usual openfortivpn config locations and converts readable
//! files into profiles. Plaintext passwords found in legacy files are
//! moved into the system keyring.

use crate::cli::{prompt_required, prompt_yes_no};
use fvpn_core::{
    auth::keyring,
    config::{legacy, ProfileStore},
    error::FvpnError,
};

/// Run the import command
pub fn run_import() -> Result<(), FvpnError> {
    let found = legacy::detect_legacy_configs();

    if found.is_empty() {
        println!("No openfortivpn config files found.");
        println!("Looked in:");
        for path in legacy::legacy_config_paths() {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    let mut store = ProfileStore::load()?;
    let mut imported = 0usize;

    for config in found {
        println!();
        println!("Found {}", config.path.display());

        let Some(draft) = config.to_profile("imported") else {
            println!("  Skipping: missing host or username.");
            continue;
        };

        println!("  host:     {}", draft.gateways[0]);
        println!("  username: {}", draft.username);
        if !prompt_yes_no("Import this config?", true)? {
            continue;
        }

        let name = prompt_required("Profile name", "imported")?;
        if store.find(&name).is_ok() && !prompt_yes_no("Profile exists, overwrite?", false)? {
            continue;
        }

        // to_profile only fails on missing host/username, checked above
        let Some(profile) = config.to_profile(&name) else {
            continue;
        };

        if config.has_password() {
            if let Some(password) = config.entries.get("password") {
                keyring::store_password(&name, password)?;
                println!("  Password moved to the system keyring.");
                println!("  Consider deleting it from {}.", config.path.display());
            }
        } else {
            println!("  No password in the file; you will be prompted on connect,");
            println!("  or store one by rerunning 'fvpn setup'.");
        }

        store.upsert(profile);
        imported += 1;
    }

    if imported > 0 {
        store.save()?;
        println!();
        println!("Imported {} profile(s).", imported);
    } else {
        println!();
        println!("Nothing imported.");
    }

    Ok(())
}
