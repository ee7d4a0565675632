//! Format workspace status, entries, objects and relations as text.

use crate::reconcile::ReconcileReport;
use crate::relation::RelationInfo;
use crate::store::{MetadataEntry, MetadataObject};
use crate::types::ContentHash;
use crate::workspace::types::{EntryView, WorkspaceStatus};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline. Respects NO_COLOR and TTY.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Format workspace status as human-readable text.
pub fn format_workspace_status_text(data: &WorkspaceStatus) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Workspace Status")));
    out.push_str(&format!("  Root: {}\n", data.root));
    out.push_str(&format!("  Metadata: {}\n\n", data.meta_dir));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Indexed files", "Objects", "Active", "Inactive", "Relations"]);
    table.add_row(vec![
        data.indexed_files.to_string(),
        data.objects.to_string(),
        data.active_entries.to_string(),
        data.inactive_entries.to_string(),
        data.relation_nodes.to_string(),
    ]);
    out.push_str(&format!("{}\n", table));
    out
}

/// Format a reconciliation report as human-readable text.
pub fn format_reconcile_report_text(report: &ReconcileReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Reconciliation")));
    out.push_str(&format!("  Files indexed: {}\n", report.files_indexed));
    out.push_str(&format!("  Objects scanned: {}\n", report.objects_scanned));
    out.push_str(&format!("  Entries created: {}\n", report.created));
    out.push_str(&format!("  Entries reactivated: {}\n", report.reactivated));
    out.push_str(&format!("  Entries disabled: {}\n", report.disabled));
    if !report.changed() {
        out.push_str("\nMetadata already up to date.\n");
    }
    out
}

fn entry_rows(table: &mut Table, entry: &MetadataEntry) {
    table.add_row(vec!["Name".to_string(), entry.name.clone()]);
    table.add_row(vec!["Extension".to_string(), entry.file_extension.clone()]);
    table.add_row(vec!["Created".to_string(), entry.created_time.to_rfc3339()]);
    table.add_row(vec!["Modified".to_string(), entry.modified_time.to_rfc3339()]);
    table.add_row(vec!["Deleted".to_string(), yes_no(entry.is_deleted).to_string()]);
    if let Some(info) = &entry.build_info {
        table.add_row(vec![
            "Toolchain".to_string(),
            format!("{} {}", info.toolchain_name, info.toolchain_version),
        ]);
        if let Some(input) = &info.input {
            table.add_row(vec!["Input".to_string(), input.clone()]);
        }
    }
    for (key, value) in &entry.extra {
        table.add_row(vec![key.clone(), value.to_string()]);
    }
}

/// Format one path's entry as human-readable text.
pub fn format_entry_text(view: &EntryView) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading(&view.path)));
    out.push_str(&format!("  Hash: {}\n\n", view.hash));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    entry_rows(&mut table, &view.entry);
    out.push_str(&format!("{}\n", table));

    if !view.siblings.is_empty() {
        out.push_str(&format!("\n  Shared with: {}\n", view.siblings.join(", ")));
    }
    out
}

/// Format a metadata object as human-readable text.
pub fn format_object_text(hash: &ContentHash, object: &MetadataObject) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading(&format!("Object {}", hash.short()))));
    if object.is_empty() {
        out.push_str("No entries recorded for this hash.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Modified", "Deleted", "Toolchain"]);
    for (path, entry) in object.iter() {
        let toolchain = entry
            .build_info
            .as_ref()
            .map(|b| format!("{} {}", b.toolchain_name, b.toolchain_version))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            path.clone(),
            entry.modified_time.to_rfc3339(),
            yes_no(entry.is_deleted).to_string(),
            toolchain,
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!(
        "Total: {} entries, {} active.\n",
        object.len(),
        object.active_count()
    ));
    out
}

/// Format a relation view as human-readable text.
pub fn format_relation_text(info: &RelationInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Relations of {}", info.selected.short()))
    ));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Hash", "Parent", "Path", "Paths"]);
    for node in &info.relation_data {
        let marker = if node.id == info.selected { "*" } else { "" };
        let parent = node
            .parent
            .as_ref()
            .map(|p| p.short().to_string())
            .unwrap_or_else(|| "-".to_string());
        let shown = node
            .data_list
            .get(node.represent_idx)
            .map(|d| d.path.clone())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            format!("{}{}", node.id.short(), marker),
            parent,
            shown,
            node.data_list.len().to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_text_mentions_up_to_date() {
        let text = format_reconcile_report_text(&ReconcileReport::default());
        assert!(text.contains("Files indexed: 0"));
        assert!(text.contains("already up to date"));
    }

    #[test]
    fn test_empty_object_text() {
        let hash = ContentHash::from_digest(&[7; 32]);
        let text = format_object_text(&hash, &MetadataObject::new());
        assert!(text.contains("No entries"));
    }
}
