use crate::utils::error::{LaunchError, Result};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(LaunchError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 檢查本地模型目錄：config.json 與權重檔必須存在，tokenizer 缺少時只警告
pub fn validate_model_dir(field_name: &str, dir: &str) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    let path = Path::new(dir);

    if !path.exists() {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: dir.to_string(),
            reason: "Model path does not exist".to_string(),
        });
    }

    if !path.is_dir() {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: dir.to_string(),
            reason: "Model path is not a directory".to_string(),
        });
    }

    if !path.join("config.json").exists() {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: dir.to_string(),
            reason: "Missing config.json in model directory".to_string(),
        });
    }

    let tokenizer_files = ["tokenizer.json", "tokenizer_config.json", "tokenizer.model"];
    if !tokenizer_files.iter().any(|f| path.join(f).exists()) {
        warnings.push(format!("No tokenizer file found in {}", dir));
    }

    let weight_extensions = ["safetensors", "bin", "pt"];
    let has_weights = std::fs::read_dir(path)
        .map(|entries| {
            entries.flatten().any(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| weight_extensions.contains(&ext))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);

    if !has_weights {
        return Err(LaunchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: dir.to_string(),
            reason: "No model weight files found (expected *.safetensors, *.bin or *.pt)"
                .to_string(),
        });
    }

    Ok(warnings)
}

/// HuggingFace 模型 ID 應為 owner/model 格式，不符合只給警告
pub fn validate_hf_model_id(model_id: &str) -> Option<String> {
    if model_id.contains('/') {
        None
    } else {
        Some(format!(
            "HuggingFace model ID should be in 'owner/model' format: {}",
            model_id
        ))
    }
}

/// vLLM 額外參數裡夾帶 --model / --port 會和受管設定打架
pub fn vllm_extra_args_warnings(extra_args: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    if extra_args.contains("--model") {
        warnings.push("VLLM_EXTRA_ARGS contains --model; use --model-path instead".to_string());
    }
    if extra_args.contains("--port") {
        warnings.push("VLLM_EXTRA_ARGS contains --port; ports are allocated by the launcher".to_string());
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("health_url", "https://example.com").is_ok());
        assert!(validate_url("health_url", "http://127.0.0.1:8080/health").is_ok());
        assert!(validate_url("health_url", "").is_err());
        assert!(validate_url("health_url", "invalid-url").is_err());
        assert!(validate_url("health_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("base_port", 8000u16, 1024, 65535).is_ok());
        assert!(validate_range("base_port", 80u16, 1024, 65535).is_err());
    }

    #[test]
    fn test_validate_model_dir_missing() {
        let err = validate_model_dir("model_path", "/nonexistent/model/dir").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_model_dir_requires_weights() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), "{\"model_type\": \"llama\"}").unwrap();

        // config.json 有了但沒有權重檔
        assert!(validate_model_dir("model_path", dir.path().to_str().unwrap()).is_err());

        fs::write(dir.path().join("model.safetensors"), b"fake").unwrap();
        let warnings = validate_model_dir("model_path", dir.path().to_str().unwrap()).unwrap();
        // 沒有 tokenizer，應有警告
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_validate_hf_model_id() {
        assert!(validate_hf_model_id("mistralai/Mistral-7B-Instruct-v0.2").is_none());
        assert!(validate_hf_model_id("not-namespaced").is_some());
    }

    #[test]
    fn test_vllm_extra_args_warnings() {
        assert!(vllm_extra_args_warnings("--max-model-len 8192").is_empty());
        assert_eq!(vllm_extra_args_warnings("--model x --port 9").len(), 2);
    }
}
