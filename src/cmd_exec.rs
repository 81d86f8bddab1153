//! `exec` and `script` subcommand handlers.

use std::path::Path;

use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use webhands_protocols::{Tool, ToolContext, ToolError};
use webhands_tools_browser::BrowserTool;

const SESSION: &str = "cli";

/// Run one action and print its envelope.
pub(crate) async fn handle_exec(
    tool: &BrowserTool,
    params: &str,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let params: Value = serde_json::from_str(params)?;
    let result = run_one(tool, params, "exec-1".to_string()).await;
    shutdown(tool).await;

    let envelope = match result {
        Ok(envelope) => envelope,
        Err(e) => {
            println!("{}", json!({ "ok": false, "error": e.to_string() }));
            return Err(e.into());
        }
    };
    if pretty {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{}", envelope);
    }
    Ok(())
}

/// Run a JSON-lines script. Blank lines and `#` comments are skipped; every
/// action prints one line, failures as `{"ok":false,...}`.
pub(crate) async fn handle_script(
    tool: &BrowserTool,
    file: &Path,
    keep_going: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_script(file).await?;
    let mut failures = 0usize;
    let mut total = 0usize;

    for (number, line) in script_lines(&source) {
        total += 1;
        let outcome = match serde_json::from_str::<Value>(line) {
            Ok(params) => run_one(tool, params, format!("line-{}", number)).await,
            Err(e) => Err(ToolError::InvalidParameters(format!("line {} is not JSON: {}", number, e))),
        };
        match outcome {
            Ok(envelope) => println!("{}", envelope),
            Err(e) => {
                failures += 1;
                println!("{}", json!({ "ok": false, "line": number, "error": e.to_string() }));
                if !keep_going {
                    warn!("Stopping script at line {}", number);
                    break;
                }
            }
        }
    }
    shutdown(tool).await;

    info!("Script finished: {} actions, {} failed", total, failures);
    if failures > 0 {
        return Err(format!("{} of {} actions failed", failures, total).into());
    }
    Ok(())
}

async fn run_one(tool: &BrowserTool, params: Value, call_id: String) -> Result<Value, ToolError> {
    let ctx = ToolContext::new(SESSION).with_correlation_id(call_id);
    Ok(tool.execute(params, ctx).await?.into_envelope())
}

/// Tear the live browser down so no Chrome process outlives the CLI.
async fn shutdown(tool: &BrowserTool) {
    if let Err(e) = run_one(tool, json!({ "action": "reset" }), "shutdown".to_string()).await {
        warn!("Browser shutdown failed: {}", e);
    }
}

async fn read_script(file: &Path) -> std::io::Result<String> {
    if file == Path::new("-") {
        let mut source = String::new();
        tokio::io::stdin().read_to_string(&mut source).await?;
        return Ok(source);
    }
    tokio::fs::read_to_string(file).await
}

/// Non-empty, non-comment lines with their 1-based line numbers.
fn script_lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}
