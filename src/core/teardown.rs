use crate::domain::model::RunContext;
use crate::domain::ports::Backend;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 產生可重複執行的停止腳本。
/// 每次啟動一開始就寫出（當下是合法的空操作腳本），
/// 之後每新增一個控制代碼就重寫，所以不管跑到哪一步，
/// 操作者手上永遠有一份能反轉現狀的腳本。
pub struct TeardownGenerator {
    path: PathBuf,
}

impl TeardownGenerator {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(&self, backend: &dyn Backend, ctx: &RunContext) -> String {
        let mut lines = vec![
            "#!/usr/bin/env bash".to_string(),
            format!(
                "# Stop script for stack '{}' (run {}), generated {}",
                ctx.stack_name,
                ctx.run_id,
                chrono::Utc::now().to_rfc3339()
            ),
            "# Safe to run more than once: every stop tolerates 'already stopped'.".to_string(),
            "set +e".to_string(),
            String::new(),
        ];

        // dependents 先停，dependencies 後停
        for handle in ctx.handles.iter().rev() {
            lines.push(format!("echo \"Stopping {}...\"", handle.service));
            lines.push(backend.stop_command_line(handle));
        }

        lines.extend(backend.teardown_footer_lines());

        lines.push(String::new());
        lines.push("exit 0".to_string());
        lines.join("\n")
    }

    pub fn write(&self, backend: &dyn Backend, ctx: &RunContext) -> Result<()> {
        let script = self.render(backend, ctx);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o755))?;
        }

        tracing::debug!("Teardown script written to {}", self.path.display());
        Ok(())
    }
}
