use std::sync::Arc;

use crate::application::reconcile::ReconcileService;

/// Shared by every reconciliation worker.
#[derive(Clone)]
pub struct ReconcileJobContext {
    pub reconcile: Arc<ReconcileService>,
}

impl ReconcileJobContext {
    pub fn new(reconcile: Arc<ReconcileService>) -> Self {
        Self { reconcile }
    }
}
