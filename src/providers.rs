use serde::{Deserialize, Serialize};

use crate::store::CustomProvider;

// ── CLI / API format enums ────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CliType {
    #[default]
    Claude,
    Codex,
}

impl std::fmt::Display for CliType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliType::Claude => write!(f, "claude"),
            CliType::Codex => write!(f, "codex"),
        }
    }
}

impl std::str::FromStr for CliType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(CliType::Claude),
            "codex" => Ok(CliType::Codex),
            other => anyhow::bail!("Unknown CLI type '{other}'"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    Anthropic,
    Openai,
}

impl std::fmt::Display for ApiFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiFormat::Anthropic => write!(f, "anthropic"),
            ApiFormat::Openai => write!(f, "openai"),
        }
    }
}

// ── Provider registry ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    pub display_name: String,
    /// Empty string means "use the CLI's default endpoint".
    pub base_url: String,
    pub default_model: String,
    pub small_fast_model: Option<String>,
    pub description: String,
    pub pricing: Option<String>,
    pub compatibility: Vec<CliType>,
    pub api_format: ApiFormat,
    pub is_custom: bool,
}

impl Provider {
    fn builtin(
        name: &str,
        display_name: &str,
        base_url: &str,
        default_model: &str,
        small_fast_model: Option<&str>,
        description: &str,
        pricing: &str,
        compatibility: &[CliType],
        api_format: ApiFormat,
    ) -> Self {
        Provider {
            name: name.to_string(),
            display_name: display_name.to_string(),
            base_url: base_url.to_string(),
            default_model: default_model.to_string(),
            small_fast_model: small_fast_model.map(String::from),
            description: description.to_string(),
            pricing: Some(pricing.to_string()),
            compatibility: compatibility.to_vec(),
            api_format,
            is_custom: false,
        }
    }

    pub fn supports(&self, cli: CliType) -> bool {
        self.compatibility.contains(&cli)
    }
}

pub fn registry() -> Vec<Provider> {
    use ApiFormat::{Anthropic, Openai};
    use CliType::{Claude, Codex};

    vec![
        // Anthropic-compatible providers (claude CLI)
        Provider::builtin(
            "anthropic",
            "Claude (Anthropic)",
            "",
            "claude-sonnet-4-5",
            Some("claude-3-5-haiku-20241022"),
            "Official Anthropic Claude models",
            "Varies by model",
            &[Claude],
            Anthropic,
        ),
        Provider::builtin(
            "qwen",
            "Qwen (Alibaba)",
            "https://dashscope-intl.aliyuncs.com/apps/anthropic",
            "qwen-plus",
            Some("qwen-flash"),
            "Alibaba Qwen models via DashScope Anthropic API",
            "$0.14-$2.49 per million tokens",
            &[Claude],
            Anthropic,
        ),
        Provider::builtin(
            "minimax",
            "MiniMax",
            "https://api.minimax.io/anthropic",
            "MiniMax-M2",
            None,
            "MiniMax M2 coding model",
            "$10/month coding plan",
            &[Claude],
            Anthropic,
        ),
        Provider::builtin(
            "kimi",
            "Kimi K2 (Moonshot AI)",
            "https://api.moonshot.ai/anthropic",
            "kimi-k2-turbo-preview",
            None,
            "Moonshot AI Kimi K2 with 256K context",
            "$0.14-$2.49 per million tokens",
            &[Claude],
            Anthropic,
        ),
        Provider::builtin(
            "deepseek",
            "DeepSeek",
            "https://api.deepseek.com/anthropic",
            "deepseek-chat",
            None,
            "DeepSeek via Anthropic-compatible API",
            "$0.28-$0.42 per million tokens (lowest cost)",
            &[Claude],
            Anthropic,
        ),
        Provider::builtin(
            "glm",
            "GLM 4.6 (Zhipu/ZAI)",
            "https://api.z.ai/api/anthropic",
            "glm-4-plus",
            None,
            "Zhipu GLM 4.6 models",
            "$3/month coding plan",
            &[Claude],
            Anthropic,
        ),
        // OpenAI-compatible providers (codex CLI)
        Provider::builtin(
            "deepseek-openai",
            "DeepSeek (OpenAI)",
            "https://api.deepseek.com/v1",
            "deepseek-chat",
            Some("deepseek-reasoner"),
            "DeepSeek via native OpenAI-compatible API",
            "$0.28-$0.42 per million tokens (lowest cost)",
            &[Codex],
            Openai,
        ),
        Provider::builtin(
            "qwen-openai",
            "Qwen (OpenAI)",
            "https://dashscope-intl.aliyuncs.com/compatible-mode/v1",
            "qwen-plus",
            Some("qwen-turbo"),
            "Alibaba Qwen via OpenAI-compatible DashScope API",
            "$0.14-$2.49 per million tokens",
            &[Codex],
            Openai,
        ),
        Provider::builtin(
            "openrouter",
            "OpenRouter (Universal)",
            "https://openrouter.ai/api/v1",
            "anthropic/claude-sonnet-4.5",
            Some("anthropic/claude-3.5-haiku"),
            "300+ models: Claude, Gemini, GPT, Llama, etc.",
            "Varies by model",
            &[Codex],
            Openai,
        ),
        // Custom/local providers; the user fills in the blanks interactively
        Provider {
            name: "custom".to_string(),
            display_name: "Custom Provider".to_string(),
            base_url: String::new(),
            default_model: String::new(),
            small_fast_model: None,
            description: "Custom/local LLM (localhost, LAN, or self-hosted)".to_string(),
            pricing: Some("Varies".to_string()),
            compatibility: vec![Claude, Codex],
            api_format: Openai,
            is_custom: true,
        },
    ]
}

pub fn get(name: &str) -> Option<Provider> {
    registry().into_iter().find(|p| p.name == name)
}

pub fn for_cli(cli: CliType) -> Vec<Provider> {
    registry().into_iter().filter(|p| p.supports(cli)).collect()
}

/// Build a Provider from user-supplied custom provider details.
pub fn from_custom(custom: &CustomProvider, name: &str) -> Provider {
    let display_name = custom.display_name.clone().unwrap_or_else(|| {
        let host = url::Url::parse(&custom.base_url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_else(|| custom.base_url.clone());
        format!("Custom ({host})")
    });

    let compatibility = match custom.api_format {
        ApiFormat::Openai => vec![CliType::Codex],
        ApiFormat::Anthropic => vec![CliType::Claude],
    };

    Provider {
        name: name.to_string(),
        display_name,
        base_url: custom.base_url.clone(),
        default_model: custom.default_model.clone(),
        small_fast_model: custom.small_fast_model.clone(),
        description: format!("Custom {}-compatible provider", custom.api_format),
        pricing: Some("Self-hosted / varies".to_string()),
        compatibility,
        api_format: custom.api_format,
        is_custom: true,
    }
}

/// Validate a custom provider base URL: localhost, RFC1918 LAN addresses,
/// or any well-formed http(s) URL.
pub fn validate_base_url(input: &str) -> Result<(), String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Base URL is required".to_string());
    }

    let url = url::Url::parse(trimmed).map_err(|_| {
        "Invalid URL format. Examples: http://localhost:1234, http://192.168.1.100:8080, https://api.example.com"
            .to_string()
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err("URL must use http:// or https://".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_the_builtin_providers() {
        let names: Vec<String> = registry().into_iter().map(|p| p.name).collect();
        for expected in [
            "anthropic",
            "qwen",
            "minimax",
            "kimi",
            "deepseek",
            "glm",
            "deepseek-openai",
            "qwen-openai",
            "openrouter",
            "custom",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn compatibility_filter_splits_by_cli() {
        let claude = for_cli(CliType::Claude);
        assert!(claude.iter().any(|p| p.name == "minimax"));
        assert!(!claude.iter().any(|p| p.name == "openrouter"));

        let codex = for_cli(CliType::Codex);
        assert!(codex.iter().any(|p| p.name == "openrouter"));
        assert!(!codex.iter().any(|p| p.name == "minimax"));

        // custom is offered for both
        assert!(claude.iter().any(|p| p.name == "custom"));
        assert!(codex.iter().any(|p| p.name == "custom"));
    }

    #[test]
    fn base_url_validation_accepts_local_and_remote() {
        assert!(validate_base_url("http://localhost:1234").is_ok());
        assert!(validate_base_url("http://192.168.1.100:8080").is_ok());
        assert!(validate_base_url("https://api.example.com").is_ok());
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn custom_provider_compatibility_follows_api_format() {
        let custom = CustomProvider {
            base_url: "http://localhost:11434/v1".to_string(),
            api_format: ApiFormat::Openai,
            default_model: "llama3".to_string(),
            small_fast_model: None,
            display_name: None,
        };
        let provider = from_custom(&custom, "local");
        assert_eq!(provider.compatibility, vec![CliType::Codex]);
        assert_eq!(provider.display_name, "Custom (localhost)");
        assert!(provider.is_custom);
    }
}
