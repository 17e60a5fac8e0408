use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) default_directive: String,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let service_name = non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone());
        let environment = non_empty("STAGE").unwrap_or_else(|| "unknown".to_string());
        let default_directive = non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            default_directive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn falls_back_to_component_and_info() {
        let config = ObservabilityConfig::from_lookup(" backend ", |_| None);

        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "unknown");
        assert_eq!(config.default_directive, "info");
    }

    #[test]
    fn reads_service_context_from_env() {
        let vars = HashMap::from([
            ("SERVICE_NAME", "learning-billing"),
            ("STAGE", "production"),
            ("LOG_LEVEL", "  "),
        ]);

        let config = ObservabilityConfig::from_lookup("backend", |key| {
            vars.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.service_context.service_name, "learning-billing");
        assert_eq!(config.service_context.environment, "production");
        assert_eq!(config.service_context.component, "backend");
        assert_eq!(config.default_directive, "info");
    }
}
