use anyhow::{Context, Result};
use crates::payments::stripe_client::DEFAULT_STRIPE_API_BASE;

use super::{
    config_model::{BackendServer, Checkout, Database, DotEnvyConfig, Stripe},
    stage::Stage,
};

const DEFAULT_RETURN_URL: &str = "http://localhost:3000/subscription";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        api_base: std::env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
    };

    let checkout = Checkout {
        default_return_url: std::env::var("CHECKOUT_DEFAULT_RETURN_URL")
            .unwrap_or_else(|_| DEFAULT_RETURN_URL.to_string()),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        checkout,
        stage: get_stage(),
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{} is invalid", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Single test so env mutations never race with each other.
    #[test]
    fn loads_config_and_reports_bad_values() {
        unsafe {
            env::set_var("SERVER_PORT_BACKEND", "8080");
            env::set_var("SERVER_BODY_LIMIT", "10");
            env::set_var("SERVER_TIMEOUT", "30");
            env::set_var("DATABASE_URL", "postgres://localhost:5432/db");
            env::set_var("STRIPE_SECRET_KEY", "sk_test_123");
            env::remove_var("STRIPE_API_BASE");
            env::remove_var("CHECKOUT_DEFAULT_RETURN_URL");
            env::set_var("STAGE", "development");
        }

        let config = load().unwrap();
        assert_eq!(config.backend_server.port, 8080);
        assert_eq!(config.backend_server.timeout, 30);
        assert_eq!(config.stripe.api_base, "https://api.stripe.com");
        assert_eq!(config.checkout.default_return_url, DEFAULT_RETURN_URL);
        assert_eq!(config.stage, Stage::Development);

        unsafe {
            env::set_var("SERVER_PORT_BACKEND", "not-a-port");
        }
        let err = load().unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT_BACKEND"));
    }

    #[test]
    fn unknown_stage_is_rejected() {
        assert!(Stage::try_from("staging").is_err());
        assert_eq!(Stage::try_from("production").unwrap(), Stage::Production);
    }
}
