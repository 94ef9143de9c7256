use crate::tools::report;
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};

pub const NAME: &str = "get_disk_usage";
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
struct Mount {
    mount_point: PathBuf,
    total: u64,
    available: u64,
}

/// The mount holding `path`: the one with the longest matching mount point.
fn mount_for<'a>(path: &Path, mounts: &'a [Mount]) -> Option<&'a Mount> {
    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.components().count())
}

fn format_usage(path: &Path, mount: &Mount) -> String {
    let used = mount.total.saturating_sub(mount.available);
    format!(
        "Disk usage for {}:\n- total: {:.2} GB\n- used: {:.2} GB\n- free: {:.2} GB",
        path.display(),
        mount.total as f64 / GB,
        used as f64 / GB,
        mount.available as f64 / GB,
    )
}

fn list_mounts() -> Vec<Mount> {
    sysinfo::Disks::new_with_refreshed_list()
        .list()
        .iter()
        .map(|disk| Mount {
            mount_point: disk.mount_point().to_path_buf(),
            total: disk.total_space(),
            available: disk.available_space(),
        })
        .collect()
}

pub struct DiskUsageTool {
    path: PathBuf,
}

impl DiskUsageTool {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for DiskUsageTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Shows the current disk usage (total, used, free) on this system."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let mounts = tokio::task::spawn_blocking(list_mounts).await?;

        match mount_for(&self.path, &mounts) {
            Some(mount) => Ok(report(NAME, format_usage(&self.path, mount))),
            None => Ok(ToolResult::failure(
                NAME,
                format!("No mounted disk found for {}", self.path.display()),
            )),
        }
    }
}
