//! Setup command implementation
//!
//! Interactive command for first-time profile configuration with secure
//! credential storage.

use crate::cli::{prompt_input, prompt_optional, prompt_required, prompt_yes_no};
use fvpn_core::{
    auth::keyring,
    config::{get_profiles_path, Profile, ProfileStore},
    error::FvpnError,
    types::GatewayTarget,
};

/// Run the setup command
pub fn run_setup() -> Result<(), FvpnError> {
    println!("🔐 fvpn Profile Setup");
    println!("=====================");
    println!();
    println!("This will configure a Fortinet VPN connection profile.");
    println!("The password is stored in your system keyring.");
    println!(
        "Profile settings are saved to {}",
        get_profiles_path()?.display()
    );
    println!();

    // Check keyring availability before collecting anything
    check_keyring_availability()?;

    let mut store = ProfileStore::load()?;

    let name = prompt_required("Profile name", "default")?;

    if store.find(&name).is_ok() {
        println!("⚠️  Profile '{}' already exists.", name);
        if !prompt_yes_no("Overwrite it?", false)? {
            println!("Setup cancelled.");
            return Ok(());
        }
        println!();
    }

    let profile = collect_profile(name)?;
    profile.validate().map_err(|message| {
        FvpnError::Config(fvpn_core::error::ConfigError::ValidationError { message })
    })?;

    let password = collect_password()?;

    println!();
    println!("💾 Saving profile...");

    keyring::store_password(&profile.name, &password)?;
    store.upsert(profile.clone());
    store.save()?;

    println!("✅ Setup complete!");
    println!();
    println!("You can now use:");
    println!("  fvpn connect {:<12} - Connect to the VPN", profile.name);
    println!("  fvpn profiles            - List configured profiles");

    Ok(())
}

/// Check if the keyring is available
fn check_keyring_availability() -> Result<(), FvpnError> {
    // Try to create a test entry to check keyring availability
    match keyring::store_password("__fvpn_test__", "test") {
        Ok(_) => {
            // Clean up test entry
            let _ = keyring::delete_password("__fvpn_test__");
            Ok(())
        }
        Err(FvpnError::Keyring(_)) => {
            println!("❌ Keyring is not available or locked.");
            println!("Please ensure your system keyring is unlocked and available.");
            println!("On GNOME systems, this is usually handled automatically.");
            Err(FvpnError::Keyring(
                fvpn_core::error::KeyringError::ServiceUnavailable,
            ))
        }
        Err(e) => Err(e),
    }
}

/// Collect profile settings interactively
fn collect_profile(name: String) -> Result<Profile, FvpnError> {
    println!();
    println!("Gateway Configuration:");
    println!("---------------------");
    println!("Enter one or more gateways. Connection attempts walk the list in");
    println!("order, falling over to the next gateway when one fails.");
    println!();

    let mut gateways = Vec::new();
    loop {
        let ordinal = gateways.len() + 1;
        let host = if gateways.is_empty() {
            prompt_required(&format!("Gateway {} host", ordinal), "")?
        } else {
            let extra = prompt_optional(&format!("Gateway {} host (blank to finish)", ordinal), "")?;
            if extra.is_empty() {
                break;
            }
            extra
        };

        let port: u16 = prompt_required("Port", "443")?.parse().map_err(|_| {
            FvpnError::Config(fvpn_core::error::ConfigError::ValidationError {
                message: "Invalid port number".to_string(),
            })
        })?;

        gateways.push(GatewayTarget::new(host, port));
    }

    let username = prompt_required("Username", "")?;

    let trusted_cert = prompt_optional("Trusted certificate hash (optional)", "")?;
    let trusted_cert = if trusted_cert.is_empty() {
        None
    } else {
        Some(trusted_cert)
    };

    let otp_enabled = prompt_yes_no("Prompt for a one-time password on connect?", false)?;

    Ok(Profile {
        name,
        username,
        gateways,
        trusted_cert,
        otp_enabled,
    })
}

/// Collect the VPN password interactively
fn collect_password() -> Result<String, FvpnError> {
    println!();
    println!("Credentials:");
    println!("------------");

    loop {
        let password = prompt_input("Password: ")?;

        if password.trim().is_empty() {
            println!("❌ Password cannot be empty. Please try again.");
            continue;
        }

        return Ok(password);
    }
}
