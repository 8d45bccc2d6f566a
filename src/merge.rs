//! Composite merge: the primary document followed by normalized attachments.

use crate::document::PagedDocument;
use crate::normalize::NormalizedAttachment;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct CompositeMerger;

impl CompositeMerger {
    pub fn new() -> Self {
        Self
    }

    /// Concatenate `primary` and `attachments` in the given order.
    ///
    /// Returns `None` when there is nothing to append; the primary document is then
    /// the deliverable on its own.
    pub fn merge(
        &self,
        primary: &PagedDocument,
        attachments: &[NormalizedAttachment],
    ) -> Option<PagedDocument> {
        if attachments.is_empty() {
            return None;
        }

        let mut composite = primary.clone();
        for attachment in attachments {
            composite.extend_from(&attachment.document);
        }
        debug!(
            primary_pages = primary.page_count(),
            attachments = attachments.len(),
            total_pages = composite.page_count(),
            "Merged composite"
        );
        Some(composite)
    }
}
