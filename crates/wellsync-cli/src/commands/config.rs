use serde_json::json;
use wellsync_core::util::{normalize_base_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig, EnvOverrides};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_base_url,
            tenant_id,
            timeout_ms,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            api_base_url,
            tenant_id,
            timeout_ms,
            no_activate,
        ),
        ConfigCommands::Show { json } => run_config_show(global_profile, json),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    api_base_url: Option<String>,
    tenant_id: Option<String>,
    timeout_ms: Option<u64>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let explicit_api_base_url = normalize_text_option(api_base_url)
        .map(normalize_api_base_url)
        .transpose()?;
    let explicit_tenant_id = normalize_text_option(tenant_id);
    if timeout_ms == Some(0) {
        return Err(CliError::Config(
            "timeout must be greater than 0".to_string(),
        ));
    }

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(value) = explicit_api_base_url {
        profile.api_base_url = Some(value);
    }
    if let Some(value) = explicit_tenant_id {
        profile.tenant_id = Some(value);
    }
    if let Some(value) = timeout_ms {
        profile.request_timeout_ms = Some(value);
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profiles
        .get(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = missing_profile_fields(profile);
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Export WELLSYNC_TENANT_SECRET and run `wellsync sync`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

pub fn run_config_show(profile_name: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let overrides = EnvOverrides::from_env();

    let api_base_url = overrides.api_base_url.or_else(|| profile.api_base_url());
    let tenant_id = overrides.tenant_id.or_else(|| profile.tenant_id());
    let secret_set = overrides.tenant_secret.is_some();

    if as_json {
        let document = json!({
            "profile": profile_name,
            "apiBaseUrl": api_base_url,
            "tenantId": tenant_id,
            "requestTimeoutMs": profile.request_timeout_ms,
            "tenantSecretSet": secret_set,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    println!("profile:        {profile_name}");
    println!("api base url:   {}", api_base_url.as_deref().unwrap_or("-"));
    println!("tenant id:      {}", tenant_id.as_deref().unwrap_or("-"));
    println!(
        "timeout (ms):   {}",
        profile
            .request_timeout_ms
            .map_or_else(|| "default".to_string(), |ms| ms.to_string())
    );
    println!(
        "tenant secret:  {}",
        if secret_set { "set" } else { "not set" }
    );
    Ok(())
}

pub fn missing_profile_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing_fields = Vec::new();
    if profile.api_base_url().is_none() {
        missing_fields.push("api_base_url");
    }
    if profile.tenant_id().is_none() {
        missing_fields.push("tenant_id");
    }
    missing_fields
}

pub fn normalize_api_base_url(url: String) -> Result<String, CliError> {
    Ok(normalize_base_url(&url)?)
}
