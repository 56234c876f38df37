use crate::domain::model::{DeployScope, ModelSource, MountSpec, ServiceSpec};

pub const VLLM: &str = "vllm";
pub const CHROMA: &str = "chroma";
pub const RAG: &str = "rag";
pub const PROXY: &str = "proxy";

/// 堆疊的靜態參數，從配置解析後傳入
#[derive(Debug, Clone)]
pub struct StackParams {
    /// 本地模型目錄或 HuggingFace ID
    pub model_ref: String,
    pub model_source: ModelSource,
    pub docs_dir: String,
    pub embedding_model: String,
    pub vllm_extra_args: Vec<String>,
    pub hf_cache: Option<String>,
    pub vllm_image: String,
    pub chroma_image: String,
    pub rag_image: String,
    pub proxy_image: String,
}

/// 服務名稱對應到環境檔中的埠號鍵
pub fn port_env_key(service: &str) -> String {
    match service {
        VLLM => "VLLM_SERVER_PORT".to_string(),
        CHROMA => "CHROMA_PORT".to_string(),
        RAG => "RAG_PORT".to_string(),
        PROXY => "PROXY_PORT".to_string(),
        other => format!("{}_PORT", other.to_uppercase().replace('-', "_")),
    }
}

/// 標準堆疊的服務表，依啟動順序排列（依賴在前）。
/// 埠號為 0，由 Port Allocator 填入。
pub fn stack_services(scope: DeployScope, params: &StackParams) -> Vec<ServiceSpec> {
    // local: 掛載主機目錄並以容器內路徑引用；
    // huggingface: ID 原樣傳遞，不產生掛載（ID 不是路徑）
    let mut vllm_mounts = Vec::new();
    let model_arg = match params.model_source {
        ModelSource::Local => {
            vllm_mounts.push(MountSpec {
                host_path: params.model_ref.clone(),
                container_path: "/model".to_string(),
            });
            "/model".to_string()
        }
        ModelSource::HuggingFace => params.model_ref.clone(),
    };

    let mut vllm_args = vec!["--model".to_string(), model_arg];
    vllm_args.extend(params.vllm_extra_args.iter().cloned());

    if let Some(cache) = &params.hf_cache {
        vllm_mounts.push(MountSpec {
            host_path: cache.clone(),
            container_path: "/root/.cache/huggingface".to_string(),
        });
    }

    let vllm = ServiceSpec {
        name: VLLM.to_string(),
        image: params.vllm_image.clone(),
        args: vllm_args,
        port: 0,
        container_port: 8000,
        health_path: Some("/health".to_string()),
        depends_on: vec![],
        mounts: vllm_mounts,
    };

    if scope == DeployScope::InferenceOnly {
        return vec![vllm];
    }

    let chroma = ServiceSpec {
        name: CHROMA.to_string(),
        image: params.chroma_image.clone(),
        args: vec![],
        port: 0,
        container_port: 8000,
        health_path: Some("/api/v1/heartbeat".to_string()),
        depends_on: vec![],
        mounts: vec![],
    };

    let rag = ServiceSpec {
        name: RAG.to_string(),
        image: params.rag_image.clone(),
        args: vec![
            "--collection".to_string(),
            "activate_rag".to_string(),
            "--embedding_model".to_string(),
            params.embedding_model.clone(),
        ],
        port: 0,
        container_port: 8080,
        health_path: Some("/health".to_string()),
        depends_on: vec![CHROMA.to_string(), VLLM.to_string()],
        mounts: vec![MountSpec {
            host_path: params.docs_dir.clone(),
            container_path: "/docs".to_string(),
        }],
    };

    let proxy = ServiceSpec {
        name: PROXY.to_string(),
        image: params.proxy_image.clone(),
        args: vec![],
        port: 0,
        container_port: 8081,
        health_path: Some("/health".to_string()),
        depends_on: vec![VLLM.to_string(), RAG.to_string()],
        mounts: vec![],
    };

    vec![vllm, chroma, rag, proxy]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> StackParams {
        StackParams {
            model_ref: "/models/mistral-7b".to_string(),
            model_source: ModelSource::Local,
            docs_dir: "./docs".to_string(),
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            vllm_extra_args: vec!["--max-model-len".to_string(), "8192".to_string()],
            hf_cache: None,
            vllm_image: "vllm/vllm-openai:latest".to_string(),
            chroma_image: "chromadb/chroma:latest".to_string(),
            rag_image: "activate/rag-server:latest".to_string(),
            proxy_image: "activate/rag-proxy:latest".to_string(),
        }
    }

    #[test]
    fn test_full_scope_has_four_services_in_dependency_order() {
        let services = stack_services(DeployScope::Full, &test_params());
        let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![VLLM, CHROMA, RAG, PROXY]);

        // 每個依賴都出現在被依賴者之後
        for (i, spec) in services.iter().enumerate() {
            for dep in &spec.depends_on {
                let dep_pos = names.iter().position(|n| n == dep).unwrap();
                assert!(dep_pos < i, "{} listed before its dependency {}", spec.name, dep);
            }
        }
    }

    #[test]
    fn test_inference_only_scope_never_includes_retrieval_services() {
        let services = stack_services(DeployScope::InferenceOnly, &test_params());
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, VLLM);
    }

    #[test]
    fn test_vllm_extra_args_appended() {
        let services = stack_services(DeployScope::InferenceOnly, &test_params());
        let args = &services[0].args;
        assert!(args.contains(&"--max-model-len".to_string()));
    }

    #[test]
    fn test_local_model_mounted_and_referenced_by_container_path() {
        let services = stack_services(DeployScope::InferenceOnly, &test_params());
        let vllm = &services[0];

        // --model 必須指向容器內路徑，主機路徑在容器裡不存在
        assert!(vllm.args.contains(&"/model".to_string()));
        assert!(!vllm.args.contains(&"/models/mistral-7b".to_string()));

        let mount = vllm
            .mounts
            .iter()
            .find(|m| m.container_path == "/model")
            .unwrap();
        assert_eq!(mount.host_path, "/models/mistral-7b");
    }

    #[test]
    fn test_hf_model_id_passed_through_without_mount() {
        let mut params = test_params();
        params.model_ref = "mistralai/Mistral-7B-Instruct-v0.2".to_string();
        params.model_source = ModelSource::HuggingFace;
        params.hf_cache = Some("/home/user/.cache/huggingface".to_string());

        let services = stack_services(DeployScope::InferenceOnly, &params);
        let vllm = &services[0];

        // ID 不是路徑，不能出現在 -v / --bind
        assert!(vllm.args.contains(&"mistralai/Mistral-7B-Instruct-v0.2".to_string()));
        assert!(vllm.mounts.iter().all(|m| m.container_path != "/model"));

        // HF 快取掛載仍然保留
        assert!(vllm
            .mounts
            .iter()
            .any(|m| m.container_path == "/root/.cache/huggingface"));
    }

    #[test]
    fn test_port_env_keys() {
        assert_eq!(port_env_key(VLLM), "VLLM_SERVER_PORT");
        assert_eq!(port_env_key(CHROMA), "CHROMA_PORT");
        assert_eq!(port_env_key(RAG), "RAG_PORT");
        assert_eq!(port_env_key(PROXY), "PROXY_PORT");
        assert_eq!(port_env_key("my-svc"), "MY_SVC_PORT");
    }
}
