//! Label catalog: the one-shot label listing that seeds the accumulators

use log::info;
use std::collections::BTreeMap;

use crate::error::ScanError;
use crate::gmail::MailboxService;
use crate::models::{Label, LabelId};

/// Fetch every label and return it with zeroed totals, keyed by id
pub fn fetch_all_labels(
    service: &dyn MailboxService,
) -> Result<BTreeMap<LabelId, Label>, ScanError> {
    info!("Getting labels");
    let labels = service
        .list_labels()
        .map_err(|e| ScanError::remote("list labels", e))?;

    let catalog: BTreeMap<LabelId, Label> = labels
        .into_iter()
        .map(|info| {
            let label = Label::with_category(info.id, info.name, info.category);
            (label.id.clone(), label)
        })
        .collect();

    info!("Found {} labels", catalog.len());
    Ok(catalog)
}
