//! 截图命名：`{序号:03}-{label}-{时间戳}.png`，首张起始截图固定为 `000-start.png`

use std::path::{Path, PathBuf};

use chrono::Local;

pub const START_LABEL: &str = "start";

#[derive(Debug, Clone)]
pub struct SnapshotNamer {
    dir: PathBuf,
    index: u32,
}

impl SnapshotNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: 0,
        }
    }

    /// 确保截图目录存在
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 下一张截图的路径；序号在计算路径时递增
    pub fn next_path(&mut self, label: &str) -> PathBuf {
        if label == START_LABEL && self.index == 0 {
            return self.dir.join("000-start.png");
        }
        self.index += 1;
        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        self.dir
            .join(format!("{:03}-{}-{}.png", self.index, sanitize(label), timestamp))
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect()
}
