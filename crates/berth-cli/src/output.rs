//! Table and JSON rendering of command results.

use anyhow::Result;

use berth_core::assembly::AssemblyReport;
use berth_core::deploy::ArchiveReport;
use berth_core::install::Component;
use berth_core::markers::{DeploymentAction, DeploymentReport};
use berth_core::outcome::Outcome;
use berth_core::server::LifecycleReport;

use crate::OutputFormat;

pub fn print_deployment(report: &DeploymentReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let verb = match report.action {
                DeploymentAction::Deploy => "Deployed",
                DeploymentAction::Undeploy => "Undeployed",
            };
            match report.outcome {
                Outcome::Confirmed => println!("{verb}: {}", report.name),
                Outcome::Failed => println!("FAILED: {} (see the server log)", report.name),
                Outcome::TimedOutUnknown => println!(
                    "TIMED_OUT: {} after {:.1}s, state {}",
                    report.name,
                    report.elapsed.as_secs_f64(),
                    report
                        .state
                        .map(|s| format!("{s:?}"))
                        .unwrap_or_else(|| "unknown".to_string())
                ),
            }
            Ok(())
        }
    }
}

pub fn print_lifecycle(report: &LifecycleReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let observed = report.observed.as_deref().unwrap_or("-");
            match report.outcome {
                Outcome::Confirmed => println!("{}: {}", report.server, observed),
                Outcome::Failed => println!(
                    "FAILED: {} ({})",
                    report.server,
                    report.error.as_deref().unwrap_or("command refused")
                ),
                Outcome::TimedOutUnknown => println!(
                    "TIMED_OUT: {} expected {}, last seen {}",
                    report.server, report.expected, observed
                ),
            }
            Ok(())
        }
    }
}

pub fn print_status(server: &str, status: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "server": server,
            "status": status,
        })),
        OutputFormat::Table => {
            println!("{server}: {status}");
            Ok(())
        }
    }
}

pub fn print_archive(report: &ArchiveReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            println!(
                "Created {} ({} entries)",
                report.path.display(),
                report.entries
            );
            Ok(())
        }
    }
}

pub fn print_plan(plan: &[Component], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&plan),
        OutputFormat::Table => {
            if plan.is_empty() {
                println!("No components discovered.");
                return Ok(());
            }
            println!("  {:<4} {:<20} {:<10} Source", "#", "Name", "Kind");
            println!("  {}", "-".repeat(60));
            for (i, component) in plan.iter().enumerate() {
                println!(
                    "  {:<4} {:<20} {:<10} {}",
                    i + 1,
                    component.name,
                    format!("{:?}", component.kind).to_lowercase(),
                    component.source.display()
                );
            }
            Ok(())
        }
    }
}

pub fn print_assembly(report: &AssemblyReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            for name in &report.laid_down {
                println!("Laid down: {name}");
            }
            for name in &report.skipped {
                println!("Already present: {name}");
            }
            if report.resources_copied {
                println!("Resources copied");
            }
            println!(
                "Installed {} component(s): {}",
                report.installed.installed.len(),
                report.installed.installed.join(", ")
            );
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
