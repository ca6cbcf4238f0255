//! Plain-text submission report, stored next to the files in the service folder.

use crate::output::{ProcessedFile, RejectedFile};
use crate::submission::FieldStatusMap;

/// Render the report for one submission.
///
/// Sections: header, status of every form field, files now in storage, and
/// (only when there are any) rejected files with their reasons. The output is
/// a pure function of its inputs, so an identical resubmission renders an
/// identical report.
pub fn build_report(
    client_name: &str,
    phone: &str,
    service: &str,
    field_status: &FieldStatusMap,
    stored: &[ProcessedFile],
    rejected: &[RejectedFile],
) -> String {
    let mut lines = vec![
        "Submission report".to_string(),
        "=================".to_string(),
        format!("Name: {client_name}"),
        format!("Phone: {phone}"),
        format!("Selected service: {service}"),
        String::new(),
        "Field status:".to_string(),
    ];

    for (field_id, status) in field_status {
        let label = status.label.as_deref().unwrap_or(field_id);
        let qty = status.uploaded_count;
        let state = if qty > 0 { "Document attached" } else { "Not submitted" };
        lines.push(format!("- {label}: {state} (Qty: {qty})"));
    }

    lines.push(String::new());
    lines.push("Files sent to storage:".to_string());
    if stored.is_empty() {
        lines.push("- No approved files".to_string());
    } else {
        lines.extend(
            stored
                .iter()
                .map(|f| format!("- {} -> {}", f.original_name, f.stored_name)),
        );
    }

    if !rejected.is_empty() {
        lines.push(String::new());
        lines.push("Rejected files:".to_string());
        lines.extend(
            rejected
                .iter()
                .map(|r| format!("- {} ({})", r.filename, r.reason)),
        );
    }

    lines.join("\n")
}
