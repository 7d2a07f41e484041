// ABOUTME: AuditSink that writes operation-log events through tracing.
// ABOUTME: Events land on the docshare::audit target so they can be routed separately.

use docshare_core::{AuditEvent, AuditSink};

/// Logs each audit event as a structured tracing record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn notify(&self, event: AuditEvent) {
        tracing::info!(
            target: "docshare::audit",
            action = ?event.action,
            actor_id = %event.actor_id,
            project_id = event.project_id.as_deref().unwrap_or("-"),
            resource_id = %event.resource_id,
            at = %event.at,
            "{}",
            event.summary
        );
    }
}
