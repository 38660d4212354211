// Output formatting and display for CLI

use crate::error::{Result, WatchdeckError};
use crate::ipc::protocol::ResponseData;
use crate::logs::NO_LOG_PLACEHOLDER;
use crate::process::TerminationOutcome;
use crate::registry::{InstanceView, StatusSnapshot, StopReport};
use chrono::{DateTime, Local, Utc};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Print a success response to stdout
pub fn print_success(data: &ResponseData) {
    match data {
        ResponseData::InstanceList(instances) => {
            if instances.is_empty() {
                println!("{}", "No instances registered".yellow());
            } else {
                print_instance_table(instances);
            }
        }

        ResponseData::Instance(Some(view)) => print_detailed_status(view),

        ResponseData::Instance(None) => {
            println!("{}", "Instance not found".yellow());
        }

        ResponseData::Created(view) => {
            println!("{}", "✓ Instance created successfully".green().bold());
            println!("  {}: {}", "ID".bold(), view.record.id);
            println!("  {}: {}", "Name".bold(), view.record.name.cyan());
            println!("  {}: {}", "Target".bold(), view.record.target);
            if let Some(pid) = view.record.process_id {
                println!("  {}: {}", "PID".bold(), pid);
            }
        }

        ResponseData::Stopped(report) => print_stop_report(report),

        ResponseData::Status(snapshot) => print_status_table(snapshot),
    }
}

/// Print a response as pretty JSON; a status response prints only its snapshot
pub fn print_json(data: &ResponseData) -> Result<()> {
    let json = match data {
        ResponseData::Status(snapshot) => serde_json::to_string_pretty(snapshot),
        other => serde_json::to_string_pretty(other),
    }
    .map_err(|e| WatchdeckError::SerializationError(e.to_string()))?;

    println!("{}", json);
    Ok(())
}

/// Print a formatted table of instances
fn print_instance_table(instances: &[InstanceView]) {
    #[derive(Tabled)]
    struct InstanceRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "PID")]
        pid: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Uptime")]
        uptime: String,
        #[tabled(rename = "Recent log")]
        recent_log: String,
    }

    let now = Utc::now();
    let rows: Vec<InstanceRow> = instances
        .iter()
        .map(|view| InstanceRow {
            id: view.record.id.clone(),
            name: truncate(&view.record.name, 20),
            target: truncate(&view.record.target, 40),
            pid: format_pid(view.record.process_id),
            status: format_running_colored(view.running),
            uptime: if view.running {
                format_duration(&since(view.record.created_at, now))
            } else {
                "-".to_string()
            },
            recent_log: log_cell(&view.log_lines, 60),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);
    let running = instances.iter().filter(|view| view.running).count();
    println!(
        "{}",
        format!(
            "Total: {} instance(s), {} running",
            instances.len(),
            running
        )
        .dimmed()
        .italic()
    );
}

/// Print detailed status view for a single instance
pub fn print_detailed_status(view: &InstanceView) {
    let record = &view.record;

    println!("\n{}", "Instance Details".bold().underline());
    println!();
    println!("  {:<15} {}", "ID:".bold(), record.id);
    println!("  {:<15} {}", "Name:".bold(), record.name.cyan());
    println!("  {:<15} {}", "Target:".bold(), record.target);
    println!(
        "  {:<15} {}",
        "Status:".bold(),
        format_running_colored(view.running)
    );
    println!("  {:<15} {}", "PID:".bold(), format_pid(record.process_id));

    let created: DateTime<Local> = record.created_at.into();
    println!(
        "  {:<15} {}",
        "Created:".bold(),
        created.format("%Y-%m-%d %H:%M:%S")
    );

    if view.running {
        println!(
            "  {:<15} {}",
            "Uptime:".bold(),
            format_duration(&since(record.created_at, Utc::now()))
        );
    }

    print_logs(&view.log_lines);
}

/// Print the outcome of a stop request
fn print_stop_report(report: &StopReport) {
    if !report.removed {
        println!(
            "{}",
            format!("No instance with ID {}", report.id).yellow()
        );
        return;
    }

    match report.outcome {
        Some(TerminationOutcome::Terminated) => println!(
            "{}",
            format!("✓ Instance {} stopped successfully", report.id)
                .green()
                .bold()
        ),
        Some(TerminationOutcome::TimedOut) => println!(
            "{}",
            format!(
                "⚠ Instance {} removed, but its process did not exit in time",
                report.id
            )
            .yellow()
            .bold()
        ),
        Some(TerminationOutcome::NotFound) => println!(
            "{}",
            format!("✓ Instance {} removed (process already gone)", report.id).green()
        ),
        None => println!(
            "{}",
            format!("✓ Instance {} removed (no process recorded)", report.id).green()
        ),
    }
}

/// Print the liveness of every instance
fn print_status_table(snapshot: &StatusSnapshot) {
    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "PID")]
        pid: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    if snapshot.instances.is_empty() {
        println!("{}", "No instances registered".yellow());
        return;
    }

    let rows: Vec<StatusRow> = snapshot
        .instances
        .values()
        .map(|view| StatusRow {
            id: view.record.id.clone(),
            name: truncate(&view.record.name, 20),
            pid: format_pid(view.record.process_id),
            status: format_running_colored(view.running),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);
}

/// Print log lines under a heading
fn print_logs(lines: &[String]) {
    println!("\n{}", "Logs".bold().underline());
    println!();

    if is_placeholder(lines) {
        println!("  {}", NO_LOG_PLACEHOLDER.yellow());
    } else {
        for line in lines {
            println!("  {}", line);
        }
    }

    println!();
}

fn is_placeholder(lines: &[String]) -> bool {
    lines.is_empty() || (lines.len() == 1 && lines[0] == NO_LOG_PLACEHOLDER)
}

/// Format a running flag with color coding
fn format_running_colored(running: bool) -> String {
    if running {
        "running".green().to_string()
    } else {
        "stopped".bright_black().to_string()
    }
}

fn format_pid(pid: Option<u32>) -> String {
    pid.map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One table cell holding each log line, truncated
fn log_cell(lines: &[String], max_len: usize) -> String {
    if is_placeholder(lines) {
        return "-".to_string();
    }

    lines
        .iter()
        .map(|line| truncate(line, max_len))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Time elapsed since `start`, zero if `start` is in the future
fn since(start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - start).to_std().unwrap_or_default()
}

/// Format a duration in human-readable format
fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    }
}

/// Truncate a string to a maximum number of characters
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Create a spinner for long operations
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
