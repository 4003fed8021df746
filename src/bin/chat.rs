//! Concierge 命令行对话
//!
//! 启动: cargo run --bin concierge-chat [config.toml]
//! 每行输入作为一条客人消息，经同一编排器处理；`/new` 开始新会话，`/history` 查看日志，`quit` 退出。

use std::path::PathBuf;

use anyhow::Context;
use concierge::config::{load_config, AppConfig};
use concierge::core::Orchestrator;
use concierge::gateway::generate_session_id;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        eprintln!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    // 交互模式下默认只输出告警
    concierge::observability::init("warn");

    let (orchestrator, _sessions) =
        Orchestrator::from_config(&cfg).context("Failed to assemble orchestrator")?;

    let mut session_id = generate_session_id();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("{} (session {})\n> ", cfg.app.name, session_id).as_bytes())
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "quit" | "exit" => break,
            "/new" => {
                session_id = generate_session_id();
                stdout
                    .write_all(format!("new session {}\n", session_id).as_bytes())
                    .await?;
            }
            "/history" => match orchestrator.history(&session_id).await {
                Ok(turns) => {
                    for turn in turns {
                        stdout
                            .write_all(format!("  {}: {}\n", turn.from.as_str(), turn.content).as_bytes())
                            .await?;
                    }
                }
                Err(e) => stdout.write_all(format!("  ({})\n", e).as_bytes()).await?,
            },
            message => match orchestrator.process_message(Some(&session_id), message).await {
                Ok(resp) => {
                    let who = resp
                        .agent
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "concierge".to_string());
                    stdout
                        .write_all(format!("[{}] {}\n", who, resp.response).as_bytes())
                        .await?;
                    if !resp.user_info.is_empty() {
                        let facts = serde_json::to_string(&resp.user_info)?;
                        stdout.write_all(format!("  facts: {}\n", facts).as_bytes()).await?;
                    }
                }
                Err(e) => stdout.write_all(format!("error: {}\n", e).as_bytes()).await?,
            },
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
