use recovery_transaction::{StageProgress, TransactionAuditLog};

pub(crate) fn print_step(progress: &StageProgress<'_>) {
    println!("[{}/{}] {}", progress.step(), progress.total, progress.message);
}

/// Stage-by-stage outcome of a run that did not commit.
pub(crate) fn print_audit(audit: &TransactionAuditLog) {
    eprintln!("{}", audit.summary());
    for record in audit.rollback_failures() {
        eprintln!(
            "warning: could not undo '{}': {}",
            record.name,
            record.error.as_deref().unwrap_or("unknown error")
        );
    }
}
