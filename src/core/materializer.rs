use crate::utils::error::{LaunchError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// 環境檔中的一個鍵值項。value_template 可含 ${NAME} 佔位符。
#[derive(Debug, Clone)]
pub struct EnvEntry {
    pub key: String,
    pub value_template: String,
    pub required: bool,
}

impl EnvEntry {
    pub fn required(key: &str, template: &str) -> Self {
        Self {
            key: key.to_string(),
            value_template: template.to_string(),
            required: true,
        }
    }

    pub fn optional(key: &str, template: &str) -> Self {
        Self {
            key: key.to_string(),
            value_template: template.to_string(),
            required: false,
        }
    }
}

/// 把模板渲染成 Launcher 消費的環境檔。
/// 取代原本 sed 文字替換：替換只查明確傳入的值映射，不碰 process env。
#[derive(Debug, Clone)]
pub struct EnvTemplate {
    entries: Vec<EnvEntry>,
}

impl EnvTemplate {
    pub fn new(entries: Vec<EnvEntry>) -> Self {
        Self { entries }
    }

    /// RAG 堆疊的標準環境檔結構。
    /// 服務互連 URL（VLLM_URL、RAG_URL）跟執行後端的網路模型綁定，
    /// 由配置層以 with_entry 附加。
    pub fn standard() -> Self {
        Self::new(vec![
            EnvEntry::required("RUNMODE", "${RUNMODE}"),
            EnvEntry::required("RUNTYPE", "${RUNTYPE}"),
            EnvEntry::required("MODEL_SOURCE", "${MODEL_SOURCE}"),
            EnvEntry::required("MODEL_NAME", "${MODEL_NAME}"),
            EnvEntry::required("VLLM_SERVER_PORT", "${VLLM_SERVER_PORT}"),
            EnvEntry::optional("CHROMA_PORT", "${CHROMA_PORT}"),
            EnvEntry::optional("RAG_PORT", "${RAG_PORT}"),
            EnvEntry::optional("PROXY_PORT", "${PROXY_PORT}"),
            EnvEntry::required("DOCS_DIR", "${DOCS_DIR}"),
            EnvEntry::required("EMBEDDING_MODEL", "${EMBEDDING_MODEL}"),
            EnvEntry::optional("EMBEDDING_CACHE_DIR", "${EMBEDDING_CACHE_DIR}"),
            EnvEntry::optional("HF_CACHE", "${HF_CACHE}"),
            EnvEntry::optional("VLLM_API_KEY", "${VLLM_API_KEY}"),
            EnvEntry::optional("VLLM_EXTRA_ARGS", "${VLLM_EXTRA_ARGS}"),
        ])
    }

    pub fn with_entry(mut self, entry: EnvEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(&self) -> &[EnvEntry] {
        &self.entries
    }

    /// 渲染為 `export KEY="VALUE"` 格式。
    /// 必要項有未解析的佔位符時回傳 MissingRequiredValue；
    /// 選用項解析不了就整行省略。
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("valid placeholder regex");
        let mut lines = vec![
            "# Generated by ragstack; regenerated on every run".to_string(),
        ];

        for entry in &self.entries {
            let mut missing: Option<String> = None;
            let value = re
                .replace_all(&entry.value_template, |caps: &regex::Captures| {
                    let name = &caps[1];
                    match values.get(name) {
                        Some(v) => v.clone(),
                        None => {
                            if missing.is_none() {
                                missing = Some(name.to_string());
                            }
                            String::new()
                        }
                    }
                })
                .to_string();

            match missing {
                Some(key) if entry.required => {
                    return Err(LaunchError::MissingRequiredValue { key });
                }
                Some(_) => continue,
                None => {
                    let escaped = value.replace('"', "\\\"");
                    lines.push(format!("export {}=\"{}\"", entry.key, escaped));
                }
            }
        }

        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    /// 寫到固定位置；重複執行時直接覆蓋
    pub fn materialize<P: AsRef<Path>>(
        &self,
        values: &HashMap<String, String>,
        path: P,
    ) -> Result<()> {
        let rendered = self.render(values)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, rendered)?;
        tracing::debug!("Environment file written to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn base_values() -> HashMap<String, String> {
        let mut values = HashMap::new();
        for (k, v) in [
            ("RUNMODE", "docker"),
            ("RUNTYPE", "all"),
            ("MODEL_SOURCE", "local"),
            ("MODEL_NAME", "/models/mistral-7b"),
            ("VLLM_SERVER_PORT", "9000"),
            ("RAG_PORT", "9002"),
            ("DOCS_DIR", "./docs"),
            ("EMBEDDING_MODEL", "sentence-transformers/all-MiniLM-L6-v2"),
        ] {
            values.insert(k.to_string(), v.to_string());
        }
        values
    }

    #[test]
    fn test_render_substitutes_allocated_ports() {
        let template = EnvTemplate::standard()
            .with_entry(EnvEntry::optional(
                "VLLM_URL",
                "http://127.0.0.1:${VLLM_SERVER_PORT}/v1",
            ))
            .with_entry(EnvEntry::optional("RAG_URL", "http://127.0.0.1:${RAG_PORT}"));

        let rendered = template.render(&base_values()).unwrap();
        assert!(rendered.contains("export VLLM_SERVER_PORT=\"9000\""));
        assert!(rendered.contains("export VLLM_URL=\"http://127.0.0.1:9000/v1\""));
        assert!(rendered.contains("export RAG_URL=\"http://127.0.0.1:9002\""));
    }

    #[test]
    fn test_missing_required_value() {
        let mut values = base_values();
        values.remove("MODEL_NAME");

        let err = EnvTemplate::standard().render(&values).unwrap_err();
        match err {
            LaunchError::MissingRequiredValue { key } => assert_eq!(key, "MODEL_NAME"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_optional_entries_are_omitted() {
        let rendered = EnvTemplate::standard().render(&base_values()).unwrap();
        // CHROMA_PORT 未提供，整行不該出現
        assert!(!rendered.contains("CHROMA_PORT"));
        assert!(!rendered.contains("VLLM_API_KEY"));
    }

    #[test]
    fn test_materialize_is_idempotent_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join(".run.env");
        let template = EnvTemplate::standard();

        template.materialize(&base_values(), &path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        template.materialize(&base_values(), &path).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_literal_values_pass_through() {
        let template = EnvTemplate::new(vec![EnvEntry::required("COLLECTION", "activate_rag")]);
        let rendered = template.render(&HashMap::new()).unwrap();
        assert!(rendered.contains("export COLLECTION=\"activate_rag\""));
    }
}
