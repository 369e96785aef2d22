//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEE__*` 覆盖（双下划线表示嵌套，如 `BEE__BROWSER__HEADLESS=false`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub browser: BrowserSection,
    pub agent: AgentSection,
}

/// [app] 段：起始页、目标、提示词与输出位置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub start_url: String,
    /// 导航目标，拼入内置 system prompt
    pub goal: String,
    /// 自定义 system prompt 文件；未设置时依次尝试 config/prompts/system.md
    pub system_prompt_path: Option<PathBuf>,
    pub screenshots_dir: PathBuf,
    /// 运行结束后写入 JSON 报告（可选）
    pub report_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            start_url: "https://www.oberlin.edu/".to_string(),
            goal: default_goal(),
            system_prompt_path: None,
            screenshots_dir: PathBuf::from("screenshots"),
            report_path: None,
        }
    }
}

fn default_goal() -> String {
    "Navigate to the Computer Science department page, find the section listing \
     faculty members, and extract the names of all emeriti (Emeritus/Emerita) faculty. \
     At the end, output only the names, one per line."
        .to_string()
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 每轮 follow-up 是否重新附带完整工具集
    pub resend_tools_each_turn: bool,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            resend_tools_each_turn: true,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 120 }
    }
}

/// [browser] 段：Chrome 启动参数与单次操作超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// 单次页面操作超时（秒）
    pub action_timeout_secs: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1440,
            window_height: 1700,
            action_timeout_secs: 8,
        }
    }
}

/// [agent] 段：确认预算与工具输出上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 启动时的自动放行次数
    pub initial_skip: u32,
    /// 单次工具结果最大字符数，超出截断
    pub max_result_chars: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            initial_skip: 0,
            max_result_chars: 60_000,
        }
    }
}

/// 从 config 目录加载配置，环境变量 BEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 BEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 读取 system prompt：配置路径 > config/prompts/system.md > 内置模板（含 goal）
pub fn load_system_prompt(cfg: &AppConfig) -> String {
    let configured = cfg.app.system_prompt_path.iter().cloned();
    let defaults = ["config/prompts/system.md", "../config/prompts/system.md"]
        .into_iter()
        .map(PathBuf::from);
    configured
        .chain(defaults)
        .find_map(|p| std::fs::read_to_string(p).ok())
        .map(|text| text.replace("{goal}", &cfg.app.goal))
        .unwrap_or_else(|| default_system_prompt(&cfg.app.goal))
}

pub fn default_system_prompt(goal: &str) -> String {
    format!(
        "You are an AI-enabled program with excellent understanding of HTML/CSS and no personality.\n\
         \n\
         I am providing you with the HTML of the page I'm currently on.\n\
         Using the tools available, navigate the website.\n\
         (You will need to click on things to leave the first page!)\n\
         \n\
         YOUR GOAL:\n\
         {goal}\n\
         \n\
         This is not an interactive session, so do not ask questions or expect responses.\n\
         You can navigate the site by clicking links; each navigation returns the new page HTML.\n\
         Prefix selectors with `css=` or `xpath=`. A selector must match exactly one element."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.browser.action_timeout_secs, 8);
        assert_eq!(cfg.agent.initial_skip, 0);
        assert!(cfg.llm.resend_tools_each_turn);
        assert_eq!(cfg.app.screenshots_dir, PathBuf::from("screenshots"));
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[app]\nstart_url = \"https://www.rfc-editor.org/\"\n\n[browser]\naction_timeout_secs = 3\n\n[agent]\ninitial_skip = 2"
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.app.start_url, "https://www.rfc-editor.org/");
        assert_eq!(cfg.browser.action_timeout_secs, 3);
        assert_eq!(cfg.browser.window_width, 1440);
        assert_eq!(cfg.agent.initial_skip, 2);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let missing = PathBuf::from("/nonexistent/bee-browse.toml");
        assert!(load_config(Some(missing)).is_err());
    }

    #[test]
    fn test_prompt_file_substitutes_goal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Goal: {{goal}}").unwrap();
        let mut cfg = AppConfig::default();
        cfg.app.goal = "find RFC 2616".to_string();
        cfg.app.system_prompt_path = Some(file.path().to_path_buf());
        assert_eq!(load_system_prompt(&cfg), "Goal: find RFC 2616");
    }

    #[test]
    fn test_builtin_prompt_contains_goal() {
        let prompt = default_system_prompt("list emeriti");
        assert!(prompt.contains("YOUR GOAL:\nlist emeriti"));
    }
}
