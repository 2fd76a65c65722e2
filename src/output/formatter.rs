use std::fmt::Write as _;

use colored::Colorize;

use crate::config::secret::REDACTED;
use crate::executor::engine::{PlanSummary, PlannedChange, ResourceAction};
use crate::state::models::{ResourceResult, ResourceState, RunRecord};

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print a resource-level execution plan.
pub fn print_resource_plan(plan: &PlanSummary) {
    print!("{}", render_resource_plan(plan));
}

/// Render the plan. Manifests in the plan are already redacted, so the
/// result is safe to show or log.
pub fn render_resource_plan(plan: &PlanSummary) -> String {
    let mut out = String::new();
    out.push('\n');

    let actionable: Vec<&PlannedChange> = plan
        .changes
        .iter()
        .filter(|c| c.action != ResourceAction::NoOp)
        .collect();

    if actionable.is_empty() {
        let _ = writeln!(out, "{}", "No changes. Infrastructure is up-to-date.".green());
        return out;
    }

    // Legend
    let _ = writeln!(out, "pgstack compared the declared stack with recorded state.");
    let _ = writeln!(out, "Resource actions are indicated with the following symbols:");

    let has = |action: ResourceAction| actionable.iter().any(|c| c.action == action);
    if has(ResourceAction::Create) {
        let _ = writeln!(out, "  {} create", "+".green().bold());
    }
    if has(ResourceAction::Update) {
        let _ = writeln!(out, "  {} update in-place", "~".yellow().bold());
    }
    if has(ResourceAction::Delete) {
        let _ = writeln!(out, "  {} destroy", "-".red().bold());
    }

    out.push('\n');
    let _ = writeln!(out, "pgstack will perform the following actions:");
    out.push('\n');

    for change in &actionable {
        render_resource_change(&mut out, change);
    }

    let _ = writeln!(out, "{}", plan);
    out.push('\n');
    out
}

type Paint = fn(&str) -> colored::ColoredString;

/// Render a single resource change with its manifest fields.
fn render_resource_change(out: &mut String, change: &PlannedChange) {
    let (icon, paint, action_desc): (&str, Paint, &str) = match change.action {
        ResourceAction::Create => ("+", (|s: &str| s.green()) as Paint, "will be created"),
        ResourceAction::Update => ("~", (|s: &str| s.yellow()) as Paint, "will be updated in-place"),
        ResourceAction::Delete => ("-", (|s: &str| s.red()) as Paint, "will be destroyed"),
        ResourceAction::NoOp => return,
    };

    // # sg_cluster.stackgres-cluster will be created
    let _ = writeln!(
        out,
        "  {} {} {}",
        "#".dimmed(),
        change.address.bold(),
        action_desc.dimmed()
    );

    let logical_name = change
        .address
        .split_once('.')
        .map(|(_, name)| name)
        .unwrap_or(&change.address);
    let header = format!(
        "  {} resource \"{}\" \"{}\" {{",
        icon, change.kind_token, logical_name
    );
    let _ = writeln!(out, "{}", paint(&header));

    let shown = match change.action {
        ResourceAction::Delete => change.prior_state.as_ref(),
        _ => change.planned_state.as_ref(),
    };
    let prior = change.prior_state.as_ref().and_then(|v| v.as_object());

    if let Some(obj) = shown.and_then(|v| v.as_object()) {
        let max_key_len = obj.keys().map(|k| k.len()).max().unwrap_or(0).min(35);
        for (key, value) in obj {
            let attr_icon = match change.action {
                ResourceAction::Update => {
                    if prior.and_then(|p| p.get(key)) != Some(value) {
                        "~"
                    } else {
                        " "
                    }
                }
                _ => icon,
            };
            render_field(out, paint, attr_icon, key, value, 6, max_key_len);
        }
    }

    let closing = format!(
        "  {} }}",
        if change.action == ResourceAction::Delete {
            "-"
        } else {
            " "
        }
    );
    let _ = writeln!(out, "{}", paint(&closing));
    out.push('\n');
}

/// Render one manifest field, descending into nested mappings.
fn render_field(
    out: &mut String,
    paint: Paint,
    icon: &str,
    key: &str,
    value: &serde_json::Value,
    indent: usize,
    width: usize,
) {
    let pad = " ".repeat(indent);
    match value {
        serde_json::Value::Object(obj) if !obj.is_empty() => {
            let line = format!("{}{} {:<width$} = {{", pad, icon, key, width = width);
            let _ = writeln!(out, "{}", paint(&line));
            let inner_width = obj.keys().map(|k| k.len()).max().unwrap_or(0).min(35);
            for (k, v) in obj {
                render_field(out, paint, " ", k, v, indent + 4, inner_width);
            }
            let _ = writeln!(out, "{}", paint(&format!("{}  }}", pad)));
        }
        _ => {
            let line = format!("{}{} {:<width$} = ", pad, icon, key, width = width);
            let _ = writeln!(out, "{}{}", paint(&line), format_value_short(value));
        }
    }
}

/// Format a JSON value for short inline display.
fn format_value_short(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) if s == REDACTED => REDACTED.dimmed().to_string(),
        serde_json::Value::String(s) if s.contains('\n') => {
            format!("<<-EOT ({} lines)", s.lines().count())
        }
        serde_json::Value::String(s) => format!("\"{}\"", s),
        serde_json::Value::Null => "null".dimmed().to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Array(arr) => {
            if arr.is_empty() {
                "[]".to_string()
            } else if arr.len() <= 4 && arr.iter().all(|v| !v.is_object() && !v.is_array()) {
                let items: Vec<String> = arr.iter().map(format_value_short).collect();
                format!("[{}]", items.join(", "))
            } else {
                format!("[...{} items]", arr.len())
            }
        }
        serde_json::Value::Object(obj) => {
            if obj.is_empty() {
                "{}".to_string()
            } else if obj.len() <= 4 {
                let items: Vec<String> = obj
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, format_value_short(v)))
                    .collect();
                format!("{{ {} }}", items.join(", "))
            } else {
                format!("{{...{} keys}}", obj.len())
            }
        }
    }
}

fn colored_status(status: &str) -> String {
    match status {
        "created" | "succeeded" => status.green().to_string(),
        "failed" => status.red().to_string(),
        "creating" | "updating" | "deleting" | "running" => status.yellow().to_string(),
        "planned" => status.blue().to_string(),
        "skipped" => status.dimmed().to_string(),
        _ => status.to_string(),
    }
}

/// Print a list of resources from state.
pub fn print_resource_list(resources: &[ResourceState]) {
    if resources.is_empty() {
        println!("{}", "No resources in state.".dimmed());
        return;
    }

    println!();
    println!("{}", "Resources".bold().cyan());
    println!("{}", "─".repeat(96));
    println!(
        "  {:<45} {:<20} {:<12} {}",
        "ADDRESS".bold(),
        "KIND".bold(),
        "STATUS".bold(),
        "NAMESPACE".bold()
    );
    println!("{}", "─".repeat(96));

    for resource in resources {
        println!(
            "  {:<45} {:<20} {:<12} {}",
            resource.address,
            resource.kind,
            colored_status(&resource.status),
            resource.namespace.as_deref().unwrap_or("-").dimmed()
        );
    }

    println!();
    println!("  {} resource(s) total.", resources.len());
    println!();
}

/// Print detailed resource state. Sensitive fields were redacted before
/// the manifest was stored.
pub fn print_resource_detail(resource: &ResourceState, dependencies: &[String]) {
    println!();
    println!("{} {}", "Resource:".bold().cyan(), resource.address.bold());
    println!("{}", "─".repeat(60));
    println!("  {:<18} {}", "API Version:".bold(), resource.api_version);
    println!("  {:<18} {}", "Kind:".bold(), resource.kind);
    println!("  {:<18} {}", "Name:".bold(), resource.object_name);
    if let Some(ref ns) = resource.namespace {
        println!("  {:<18} {}", "Namespace:".bold(), ns);
    }
    println!("  {:<18} {}", "Status:".bold(), colored_status(&resource.status));
    println!("  {:<18} {}", "Manifest Hash:".bold(), resource.manifest_hash.dimmed());
    println!("  {:<18} {}", "Created:".bold(), resource.created_at);
    println!("  {:<18} {}", "Updated:".bold(), resource.updated_at);

    if !dependencies.is_empty() {
        println!("  {:<18} {}", "Depends On:".bold(), dependencies.join(", "));
    }
    if !resource.sensitive_paths.is_empty() {
        println!(
            "  {:<18} {}",
            "Sensitive:".bold(),
            resource.sensitive_paths.join(", ").dimmed()
        );
    }

    if let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&resource.manifest_json) {
        if let Some(obj) = manifest.as_object().filter(|o| !o.is_empty()) {
            println!();
            println!("  {}:", "Manifest".bold());
            let mut out = String::new();
            let width = obj.keys().map(|k| k.len()).max().unwrap_or(0).min(35);
            for (key, value) in obj {
                render_field(&mut out, |s: &str| s.normal(), " ", key, value, 2, width);
            }
            print!("{}", out);
        }
    }

    println!("{}", "─".repeat(60));
    println!();
}

/// Print recent runs, newest first.
pub fn print_runs(runs: &[RunRecord]) {
    if runs.is_empty() {
        println!("{}", "No runs recorded.".dimmed());
        return;
    }

    println!();
    println!("{}", "Runs".bold().cyan());
    println!("{}", "─".repeat(96));
    println!(
        "  {:<27} {:<9} {:<11} {:>4} {:>4} {:>4}  {}",
        "STARTED".bold(),
        "OPERATION".bold(),
        "STATUS".bold(),
        "PLAN".bold(),
        "OK".bold(),
        "FAIL".bold(),
        "ERROR".bold()
    );
    println!("{}", "─".repeat(96));

    for run in runs {
        println!(
            "  {:<27} {:<9} {:<11} {:>4} {:>4} {:>4}  {}",
            run.started_at,
            run.operation,
            colored_status(&run.status),
            run.resources_planned,
            run.resources_succeeded,
            run.resources_failed,
            run.error_message.as_deref().unwrap_or("").red()
        );
    }
    println!();
}

/// Print the per-resource results of one run.
pub fn print_run_results(results: &[ResourceResult]) {
    for result in results {
        let line = format!(
            "  {:<45} {:<8} {}",
            result.address,
            result.action,
            colored_status(&result.status)
        );
        match &result.error_message {
            Some(err) => println!("{} {}", line, err.dimmed()),
            None => println!("{}", line),
        }
    }
    if !results.is_empty() {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ObjectIdentity;
    use serde_json::json;

    fn secret_change(action: ResourceAction) -> PlannedChange {
        PlannedChange {
            address: "secret.stackgres-sqls-secret".to_string(),
            action,
            kind_token: "secret".to_string(),
            identity: ObjectIdentity {
                api_version: "v1".to_string(),
                kind: "Secret".to_string(),
                name: "stackgres-sqls-secret".to_string(),
                namespace: Some("stackgres".to_string()),
            },
            planned_state: Some(json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "stringData": { "create-user.sql": REDACTED },
            })),
            prior_state: None,
            sensitive_paths: vec!["/stringData/create-user.sql".to_string()],
        }
    }

    #[test]
    fn test_render_create_plan() {
        let plan = PlanSummary {
            changes: vec![secret_change(ResourceAction::Create)],
            creates: 1,
            updates: 0,
            deletes: 0,
            no_ops: 0,
        };
        let out = render_resource_plan(&plan);
        assert!(out.contains("secret.stackgres-sqls-secret"));
        assert!(out.contains("will be created"));
        assert!(out.contains("resource \"secret\" \"stackgres-sqls-secret\""));
        assert!(out.contains("create-user.sql"));
        assert!(out.contains(REDACTED));
        assert!(out.contains("Plan: 1 to add, 0 to change, 0 to destroy."));
    }

    #[test]
    fn test_render_noop_plan() {
        let plan = PlanSummary {
            changes: vec![secret_change(ResourceAction::NoOp)],
            creates: 0,
            updates: 0,
            deletes: 0,
            no_ops: 1,
        };
        let out = render_resource_plan(&plan);
        assert!(out.contains("No changes."));
        assert!(!out.contains("will be created"));
    }

    #[test]
    fn test_format_value_short() {
        assert_eq!(format_value_short(&json!("x")), "\"x\"");
        assert_eq!(format_value_short(&json!(3)), "3");
        assert_eq!(format_value_short(&json!(["a", "b"])), "[\"a\", \"b\"]");
        assert_eq!(format_value_short(&json!("a\nb\n")), "<<-EOT (2 lines)");
    }
}
