//! Dry-run route selection.

use console::style;

use crate::config::Settings;
use crate::models::FileDescriptor;
use crate::orchestrator::{select_route, Route};

pub fn cmd_classify(settings: &Settings, names: &[String]) -> anyhow::Result<()> {
    for name in names {
        let file = FileDescriptor::new(name.as_str(), &settings.storage.source_container, "");
        match select_route(&file, settings.features) {
            Route::Extract(kind) => println!("{} {}", style(kind).green(), name),
            Route::Skip(reason) => println!("{} {} ({})", style("skip").yellow(), name, reason),
        }
    }
    Ok(())
}
