use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Only non-secret values. Keys, passkeys and the admin secret are never printed.
    const DISPLAY_ENVS: [&str; 18] = [
        "RUST_LOG",
        "EAS_HOST",
        "EAS_PORT",
        "EAS_DATABASE_URL",
        "EAS_PUBLIC_BASE_URL",
        "EAS_DASHBOARD_URL",
        "EAS_CATALOG_PATH",
        "EAS_EMAIL_TIMEOUT_SECS",
        "EAS_AUTO_MIGRATE",
        "EAS_WEBHOOK_IP_WHITELIST",
        "EAS_USE_X_FORWARDED_FOR",
        "EAS_USE_FORWARDED",
        "EAS_PESAPAL_BASE_URL",
        "EAS_PESAPAL_IPN_ID",
        "EAS_MPESA_BASE_URL",
        "EAS_MPESA_SHORTCODE",
        "EAS_PAYPAL_BASE_URL",
        "EAS_MAIL_API_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
