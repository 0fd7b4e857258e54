use std::path::Path;

use wellsync_core::export::render_json_export;
use wellsync_core::util::now_millis;

use crate::commands::common::{list_all_entries, open_service};
use crate::error::CliError;

pub async fn run_export(output_path: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let entries = list_all_entries(&service).await?;
    let events = service.all_events().await?;
    let rendered = render_json_export(&entries, &events, now_millis())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
