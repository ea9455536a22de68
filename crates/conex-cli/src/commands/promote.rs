//! Promote command - server-side copy of a package list

use std::path::Path;

use conex_core::PackageList;
use conex_repo::{ConnectionArgs, PromotionEvent, promote_package_list};

use crate::error::Result;
use crate::output;

pub async fn run(
    list_path: &Path,
    origin: &str,
    destination: &str,
    remote: Option<&str>,
    connection: &ConnectionArgs,
) -> Result<()> {
    let list = PackageList::load(list_path)?;
    let client = super::connect(connection)?;

    let summary = promote_package_list(&client, &list, remote, origin, destination, |event| {
        match event {
            PromotionEvent::Promoting(path) => output::title(format!("Promoting {}", path)),
            PromotionEvent::Promoted(_) => output::success("Promoted file"),
            PromotionEvent::AlreadyExists(_) => {
                output::warning("Destination already exists, skipping")
            }
            PromotionEvent::Note(note) => output::info(note),
        }
    })
    .await?;

    output::info(format!(
        "{} promoted, {} skipped, from {} to {}",
        summary.promoted, summary.skipped, origin, destination
    ));
    Ok(())
}
